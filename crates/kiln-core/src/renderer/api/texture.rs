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

//! Backend-facing texture types: kinds, opaque native handles and descriptors.

use super::texture_format::{ChannelSwizzle, TextureFormat};
use crate::math::{Extent3D, Origin3D};
use std::borrow::Cow;

/// An opaque handle to a native texture owned by a backend.
///
/// IDs are never reused by a backend; `0` is reserved as the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeTextureId(pub u64);

impl NativeTextureId {
    /// The null handle. Never returned by a backend.
    pub const NULL: Self = Self(0);

    /// `true` for the null handle.
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// The four texture kinds managed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureKind {
    /// One-dimensional texture, height and layers fixed at one.
    D1,
    /// Two-dimensional texture.
    D2,
    /// Cube map, six square faces stored as layers.
    Cube,
    /// Two-dimensional array texture.
    Array,
}

impl TextureKind {
    /// All kinds, in declaration order.
    pub const ALL: [TextureKind; 4] = [
        TextureKind::D1,
        TextureKind::D2,
        TextureKind::Cube,
        TextureKind::Array,
    ];

    /// Short name used in debug labels and logs.
    pub const fn label(&self) -> &'static str {
        match self {
            TextureKind::D1 => "1D",
            TextureKind::D2 => "2D",
            TextureKind::Cube => "Cube",
            TextureKind::Array => "Array",
        }
    }
}

/// What a resolved format will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatUsage {
    /// Sampled texture whose content is uploaded from pixel buffers.
    Mapping,
    /// Render target attachment.
    Fbo,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// Addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Repeat the texture.
    Repeat,
}

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Passes if the incoming value is less than or equal to the stored one.
    LessEqual,
    /// Passes if the incoming value is greater than or equal to the stored one.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Sampling state applied when a texture is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplingParameters {
    /// Magnification and minification filter.
    pub filter: FilterMode,
    /// Wrap mode on every axis.
    pub address_mode: AddressMode,
    /// `true` enables depth comparison sampling.
    pub compare_enabled: bool,
    /// Comparison used when `compare_enabled` is set.
    pub compare_function: CompareFunction,
    /// Channel swizzle derived from the format.
    pub swizzle: ChannelSwizzle,
}

impl SamplingParameters {
    /// Linear filtering, clamp-to-edge, compare disabled with less-equal function, and the
    /// format's swizzle.
    pub fn for_format(format: &TextureFormat) -> Self {
        Self {
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
            compare_enabled: false,
            compare_function: CompareFunction::LessEqual,
            swizzle: format.swizzle(),
        }
    }
}

/// Everything a backend needs to allocate a native texture and all its levels.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeTextureDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// The texture kind.
    pub kind: TextureKind,
    /// Base level size; `depth_or_array_layers` is 6 for cube maps.
    pub size: Extent3D,
    /// Total level count including the base level.
    pub mip_level_count: u32,
    /// The resolved format.
    pub format: TextureFormat,
    /// Sampling state.
    pub sampling: SamplingParameters,
}

/// A GPU-side copy between two textures at one mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyRegion {
    /// Level read from the source.
    pub src_level: u32,
    /// Level written in the destination.
    pub dst_level: u32,
    /// Top-left corner (and first layer) in the source.
    pub src_origin: Origin3D,
    /// Top-left corner (and first layer) in the destination.
    pub dst_origin: Origin3D,
    /// Size of the copied region; layers copied equals `depth_or_array_layers`.
    pub extent: Extent3D,
}

/// Lifecycle state of an engine texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureState {
    /// No native handle exists.
    Uninitialized,
    /// A native handle exists, its content is undefined.
    Allocated,
    /// Pixels were uploaded at least once since allocation.
    Populated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::texture_format::NativeFormat;

    #[test]
    fn test_null_native_id() {
        assert!(NativeTextureId::NULL.is_null());
        assert!(!NativeTextureId(3).is_null());
    }

    #[test]
    fn test_sampling_defaults_follow_format() {
        let params =
            SamplingParameters::for_format(&TextureFormat::from_native(NativeFormat::R16Float));
        assert_eq!(params.filter, FilterMode::Linear);
        assert_eq!(params.address_mode, AddressMode::ClampToEdge);
        assert!(!params.compare_enabled);
        assert_eq!(params.compare_function, CompareFunction::LessEqual);
        assert_eq!(params.swizzle, ChannelSwizzle::RED_AS_GREY);
    }
}
