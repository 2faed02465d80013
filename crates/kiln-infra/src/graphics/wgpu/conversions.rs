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

use kiln_core::math::{Extent3D, Origin3D};
use kiln_core::renderer::{
    AddressMode, CompareFunction, FilterMode, NativeFormat, SamplingParameters, TextureKind,
};

/// A local extension trait to convert engine types into wgpu types.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::Extent3d> for Extent3D {
    fn into_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }
}

impl IntoWgpu<wgpu::Origin3d> for Origin3D {
    fn into_wgpu(self) -> wgpu::Origin3d {
        wgpu::Origin3d {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

// 1D textures are stored as single-row 2D textures so they can carry mip levels.
impl IntoWgpu<wgpu::TextureDimension> for TextureKind {
    fn into_wgpu(self) -> wgpu::TextureDimension {
        wgpu::TextureDimension::D2
    }
}

impl IntoWgpu<wgpu::FilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::AddressMode> for AddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// The storage format backing a native format. 3-channel formats are widened to four.
impl IntoWgpu<wgpu::TextureFormat> for NativeFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        use wgpu::TextureFormat as W;
        match self {
            NativeFormat::R8Unorm => W::R8Unorm,
            NativeFormat::R16Unorm => W::R16Unorm,
            NativeFormat::R8Snorm => W::R8Snorm,
            NativeFormat::R16Snorm => W::R16Snorm,
            NativeFormat::R8Uint => W::R8Uint,
            NativeFormat::R8Sint => W::R8Sint,
            NativeFormat::R16Uint => W::R16Uint,
            NativeFormat::R16Sint => W::R16Sint,
            NativeFormat::R16Float => W::R16Float,
            NativeFormat::R32Float => W::R32Float,
            NativeFormat::Rg8Unorm => W::Rg8Unorm,
            NativeFormat::Rg16Unorm => W::Rg16Unorm,
            NativeFormat::Rg8Snorm => W::Rg8Snorm,
            NativeFormat::Rg16Snorm => W::Rg16Snorm,
            NativeFormat::Rg8Uint => W::Rg8Uint,
            NativeFormat::Rg8Sint => W::Rg8Sint,
            NativeFormat::Rg16Uint => W::Rg16Uint,
            NativeFormat::Rg16Sint => W::Rg16Sint,
            NativeFormat::Rg16Float => W::Rg16Float,
            NativeFormat::Rg32Float => W::Rg32Float,
            NativeFormat::Rgb8Unorm | NativeFormat::Rgba8Unorm => W::Rgba8Unorm,
            NativeFormat::Rgb8Snorm | NativeFormat::Rgba8Snorm => W::Rgba8Snorm,
            NativeFormat::Rgb16Float | NativeFormat::Rgba16Float => W::Rgba16Float,
            NativeFormat::Rgb32Float | NativeFormat::Rgba32Float => W::Rgba32Float,
            NativeFormat::Rgba8Uint => W::Rgba8Uint,
            NativeFormat::Rgba8Sint => W::Rgba8Sint,
            NativeFormat::Rgba16Unorm => W::Rgba16Unorm,
            NativeFormat::Rgba16Snorm => W::Rgba16Snorm,
            NativeFormat::Rgba16Uint => W::Rgba16Uint,
            NativeFormat::Rgba16Sint => W::Rgba16Sint,
            NativeFormat::Rgb10a2Unorm => W::Rgb10a2Unorm,
            NativeFormat::Rg11b10Float => W::Rg11b10Ufloat,
            NativeFormat::Bc1RgbaUnorm => W::Bc1RgbaUnorm,
            NativeFormat::Bc2RgbaUnorm => W::Bc2RgbaUnorm,
            NativeFormat::Bc3RgbaUnorm => W::Bc3RgbaUnorm,
            NativeFormat::Bc4RUnorm => W::Bc4RUnorm,
            NativeFormat::Bc5RgUnorm => W::Bc5RgUnorm,
            NativeFormat::Etc2Rgb8Unorm => W::Etc2Rgb8Unorm,
            NativeFormat::Etc2Rgba8Unorm => W::Etc2Rgba8Unorm,
            NativeFormat::Depth16Unorm => W::Depth16Unorm,
            NativeFormat::Depth24Plus => W::Depth24Plus,
            NativeFormat::Depth32Float => W::Depth32Float,
            NativeFormat::Depth24PlusStencil8 => W::Depth24PlusStencil8,
            NativeFormat::Depth32FloatStencil8 => W::Depth32FloatStencil8,
            NativeFormat::Stencil8 => W::Stencil8,
        }
    }
}

impl IntoWgpu<wgpu::SamplerDescriptor<'static>> for SamplingParameters {
    fn into_wgpu(self) -> wgpu::SamplerDescriptor<'static> {
        let filter = self.filter.into_wgpu();
        let address = self.address_mode.into_wgpu();
        wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            compare: self
                .compare_enabled
                .then(|| self.compare_function.into_wgpu()),
            ..Default::default()
        }
    }
}

/// `true` for native formats stored with an extra alpha channel.
pub fn is_widened_rgb(format: NativeFormat) -> bool {
    matches!(
        format,
        NativeFormat::Rgb8Unorm
            | NativeFormat::Rgb8Snorm
            | NativeFormat::Rgb16Float
            | NativeFormat::Rgb32Float
    )
}

/// How one channel of a storage format is laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// One byte per channel.
    Byte,
    /// IEEE half per channel.
    Half,
    /// IEEE single per channel.
    Float,
    /// Packed, depth, stencil or block-compressed texels.
    Opaque,
}

/// Channel layout and count of a storage format.
pub fn channel_layout(format: wgpu::TextureFormat) -> (ChannelLayout, u32) {
    use wgpu::TextureFormat as W;
    match format {
        W::R8Unorm | W::R8Snorm | W::R8Uint | W::R8Sint => (ChannelLayout::Byte, 1),
        W::Rg8Unorm | W::Rg8Snorm | W::Rg8Uint | W::Rg8Sint => (ChannelLayout::Byte, 2),
        W::Rgba8Unorm | W::Rgba8Snorm | W::Rgba8Uint | W::Rgba8Sint => (ChannelLayout::Byte, 4),
        W::R16Float => (ChannelLayout::Half, 1),
        W::Rg16Float => (ChannelLayout::Half, 2),
        W::Rgba16Float => (ChannelLayout::Half, 4),
        W::R32Float => (ChannelLayout::Float, 1),
        W::Rg32Float => (ChannelLayout::Float, 2),
        W::Rgba32Float => (ChannelLayout::Float, 4),
        _ => (ChannelLayout::Opaque, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_formats_are_widened() {
        let storage: wgpu::TextureFormat = NativeFormat::Rgb8Unorm.into_wgpu();
        assert_eq!(storage, wgpu::TextureFormat::Rgba8Unorm);
        assert!(is_widened_rgb(NativeFormat::Rgb16Float));
        assert!(!is_widened_rgb(NativeFormat::Rgba16Float));
        assert_eq!(
            channel_layout(NativeFormat::Rgb16Float.into_wgpu()),
            (ChannelLayout::Half, 4)
        );
    }

    #[test]
    fn test_sampler_compare_follows_flag() {
        let mut params = SamplingParameters {
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
            compare_enabled: false,
            compare_function: CompareFunction::LessEqual,
            swizzle: kiln_core::renderer::ChannelSwizzle::IDENTITY,
        };
        let desc: wgpu::SamplerDescriptor<'static> = params.into_wgpu();
        assert_eq!(desc.compare, None);
        params.compare_enabled = true;
        let desc: wgpu::SamplerDescriptor<'static> = params.into_wgpu();
        assert_eq!(desc.compare, Some(wgpu::CompareFunction::LessEqual));
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToEdge);
    }
}
