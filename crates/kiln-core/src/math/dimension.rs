// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integer extents and origins used to address texels, mip levels and layers.

/// A three-dimensional extent: width, height and depth or layer count.
///
/// Cube maps use `depth_or_array_layers == 6`, array textures the layer count,
/// 1D and 2D textures always `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth or number of array layers.
    pub depth_or_array_layers: u32,
}

impl Extent3D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32, depth_or_array_layers: u32) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers,
        }
    }

    /// Returns `true` if every component is at least one.
    pub const fn is_valid(&self) -> bool {
        self.width >= 1 && self.height >= 1 && self.depth_or_array_layers >= 1
    }

    /// Returns the extent of mip `level`, halving width and height and clamping at one.
    ///
    /// Layers are never halved.
    pub fn mip_level(&self, level: u32) -> Self {
        Self {
            width: mip_dimension(self.width, level),
            height: mip_dimension(self.height, level),
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }

    /// The largest of width and height.
    pub fn max_planar(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Number of texels covered by the extent.
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth_or_array_layers as u64
    }
}

/// A three-dimensional origin, `z` being the layer or cube face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3D {
    /// The x-coordinate of the origin.
    pub x: u32,
    /// The y-coordinate of the origin.
    pub y: u32,
    /// The z-coordinate or array layer of the origin.
    pub z: u32,
}

impl Origin3D {
    /// The origin at (0, 0, 0).
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Creates a new origin.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// `max(1, size >> level)`, saturating for shifts beyond the bit width.
pub fn mip_dimension(size: u32, level: u32) -> u32 {
    size.checked_shr(level).unwrap_or(0).max(1)
}

/// Number of mip levels below the base for an automatic chain: `floor(log2(size))`.
pub fn auto_mip_level_count(size: u32) -> u32 {
    if size == 0 {
        0
    } else {
        31 - size.leading_zeros()
    }
}
