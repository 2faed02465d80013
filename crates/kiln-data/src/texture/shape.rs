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

//! The per-kind strategy plugged into [`GpuTexture`](super::GpuTexture).

use kiln_core::math::{mip_dimension, Extent3D};
use kiln_core::memory::MemoryCategory;
use kiln_core::renderer::{TextureError, TextureKind};
use std::fmt::Debug;

/// What differs between 1D, 2D, cube and array textures.
///
/// Everything else about a texture's lifecycle is shared in `GpuTexture<S>`.
pub trait TextureShape: Debug + Send + Sync + 'static {
    /// The kind handed to the backend and the format table.
    const KIND: TextureKind;
    /// Memory tracker bucket.
    const CATEGORY: MemoryCategory;
    /// The caller-facing size type.
    type Size: Copy + PartialEq + Debug + Send + Sync;
    /// Size of a freshly constructed texture.
    const DEFAULT_SIZE: Self::Size;

    /// Base level extent; `depth_or_array_layers` holds layers or the six cube faces.
    fn extent(size: Self::Size) -> Extent3D;

    /// The size type for an extent produced by [`extent`](Self::extent) or a mip level of it.
    fn size_from_extent(extent: Extent3D) -> Self::Size;

    /// Layers uploaded by a whole-level pixel buffer.
    fn face_count(size: Self::Size) -> u32 {
        Self::extent(size).depth_or_array_layers
    }

    /// Rejects sizes with a dimension below one.
    fn validate(size: Self::Size) -> Result<(), TextureError> {
        if Self::extent(size).is_valid() {
            Ok(())
        } else {
            Err(TextureError::invalid(format!(
                "{} texture size {:?} has a dimension below 1",
                Self::KIND.label(),
                size
            )))
        }
    }

    /// Extent of a mip level. Layers and faces are never halved.
    fn level_extent(size: Self::Size, level: u32) -> Extent3D {
        let base = Self::extent(size);
        Extent3D::new(
            mip_dimension(base.width, level),
            mip_dimension(base.height, level),
            base.depth_or_array_layers,
        )
    }

    /// Prefix of native debug labels.
    fn label_prefix() -> &'static str {
        Self::KIND.label()
    }
}

/// One-dimensional texture, sized by width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape1D;

impl TextureShape for Shape1D {
    const KIND: TextureKind = TextureKind::D1;
    const CATEGORY: MemoryCategory = MemoryCategory::Texture1D;
    type Size = u32;
    const DEFAULT_SIZE: u32 = 1;

    fn extent(width: u32) -> Extent3D {
        Extent3D::new(width, 1, 1)
    }

    fn size_from_extent(extent: Extent3D) -> u32 {
        extent.width
    }
}

/// Two-dimensional texture, sized by `(width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape2D;

impl TextureShape for Shape2D {
    const KIND: TextureKind = TextureKind::D2;
    const CATEGORY: MemoryCategory = MemoryCategory::Texture2D;
    type Size = (u32, u32);
    const DEFAULT_SIZE: (u32, u32) = (1, 1);

    fn extent((width, height): (u32, u32)) -> Extent3D {
        Extent3D::new(width, height, 1)
    }

    fn size_from_extent(extent: Extent3D) -> (u32, u32) {
        (extent.width, extent.height)
    }
}

/// Cube map with six square faces, sized by the face edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeCube;

impl ShapeCube {
    /// Number of faces.
    pub const FACES: u32 = 6;
}

impl TextureShape for ShapeCube {
    const KIND: TextureKind = TextureKind::Cube;
    const CATEGORY: MemoryCategory = MemoryCategory::TextureCube;
    type Size = u32;
    const DEFAULT_SIZE: u32 = 1;

    fn extent(size: u32) -> Extent3D {
        Extent3D::new(size, size, Self::FACES)
    }

    fn size_from_extent(extent: Extent3D) -> u32 {
        extent.width
    }

    fn label_prefix() -> &'static str {
        "CubeMap"
    }
}

/// Array of 2D layers, sized by `(width, height, layers)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeArray;

impl TextureShape for ShapeArray {
    const KIND: TextureKind = TextureKind::Array;
    const CATEGORY: MemoryCategory = MemoryCategory::ArrayTexture;
    type Size = (u32, u32, u32);
    const DEFAULT_SIZE: (u32, u32, u32) = (1, 1, 1);

    fn extent((width, height, layers): (u32, u32, u32)) -> Extent3D {
        Extent3D::new(width, height, layers)
    }

    fn size_from_extent(extent: Extent3D) -> (u32, u32, u32) {
        (extent.width, extent.height, extent.depth_or_array_layers)
    }

    fn label_prefix() -> &'static str {
        "ArrayTexture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_extent_keeps_layers() {
        assert_eq!(
            ShapeArray::level_extent((16, 4, 3), 3),
            Extent3D::new(2, 1, 3)
        );
        assert_eq!(ShapeCube::level_extent(8, 1), Extent3D::new(4, 4, 6));
        assert_eq!(Shape1D::level_extent(5, 2), Extent3D::new(1, 1, 1));
    }

    #[test]
    fn test_validate() {
        assert!(Shape2D::validate((0, 4)).is_err());
        assert!(ShapeArray::validate((4, 4, 0)).is_err());
        assert!(ShapeCube::validate(1).is_ok());
    }

    #[test]
    fn test_face_count() {
        assert_eq!(ShapeCube::face_count(32), 6);
        assert_eq!(Shape2D::face_count((3, 3)), 1);
        assert_eq!(ShapeArray::face_count((3, 3, 9)), 9);
    }
}
