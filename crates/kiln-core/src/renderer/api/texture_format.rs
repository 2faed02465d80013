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

//! Portable (logical) texture formats, the concrete formats a GPU exposes, and the
//! resolved descriptor textures hold.
//!
//! Callers ask for a [`LogicalFormat`] ("4 channels, 16-bit float"); the
//! [`FormatTable`](super::format_table::FormatTable) decides which [`NativeFormat`]
//! the active GPU actually supports and hands back a [`TextureFormat`].

use crate::renderer::error::TextureError;

/// A portable texture format request, independent of what the GPU supports.
///
/// Suffixes: `C` compressed if possible, `F` float, `I`/`Ui` signed/unsigned integral,
/// `S` signed normalized.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalFormat {
    R8,
    R16,
    R8C,
    R16F,
    R32F,
    R8I,
    R16I,
    R8Ui,
    R16Ui,
    R8S,
    R16S,
    Rg8,
    Rg16,
    Rg8C,
    Rg16F,
    Rg32F,
    Rg8I,
    Rg16I,
    Rg8Ui,
    Rg16Ui,
    Rg8S,
    Rg16S,
    R3G3B2,
    Rgb4,
    Rgb5,
    Rgb8,
    Rgb16,
    Rgb8C,
    Rg11B10F,
    Rgb16F,
    Rgb32F,
    Rgb8I,
    Rgb16I,
    Rgb8Ui,
    Rgb16Ui,
    Rgb8S,
    Rgb16S,
    Rgba2,
    Rgba4,
    Rgb5A1,
    Rgba8,
    Rgb10A2,
    Rgba16,
    Rgba8C,
    Rgba16F,
    Rgba32F,
    Rgba8I,
    Rgba16I,
    Rgba8Ui,
    Rgba16Ui,
    Rgba8S,
    Rgba16S,
    Depth,
    DepthF,
    DepthStencil,
    DepthFStencil,
    Stencil,
    Depth16,
}

impl LogicalFormat {
    /// Every logical format, in declaration order.
    pub const ALL: [LogicalFormat; 58] = {
        use LogicalFormat::*;
        [
            R8, R16, R8C, R16F, R32F, R8I, R16I, R8Ui, R16Ui, R8S, R16S, Rg8, Rg16, Rg8C, Rg16F,
            Rg32F, Rg8I, Rg16I, Rg8Ui, Rg16Ui, Rg8S, Rg16S, R3G3B2, Rgb4, Rgb5, Rgb8, Rgb16,
            Rgb8C, Rg11B10F, Rgb16F, Rgb32F, Rgb8I, Rgb16I, Rgb8Ui, Rgb16Ui, Rgb8S, Rgb16S,
            Rgba2, Rgba4, Rgb5A1, Rgba8, Rgb10A2, Rgba16, Rgba8C, Rgba16F, Rgba32F, Rgba8I,
            Rgba16I, Rgba8Ui, Rgba16Ui, Rgba8S, Rgba16S, Depth, DepthF, DepthStencil,
            DepthFStencil, Stencil, Depth16,
        ]
    };

    /// Format for sampled (mapping) textures.
    ///
    /// `float` selects 16-bit float channels, otherwise 8-bit normalized; `compressed`
    /// requests a block-compressed variant and is ignored for float formats.
    pub fn mapping(channels: u32, float: bool, compressed: bool) -> Result<Self, TextureError> {
        use LogicalFormat::*;
        let format = match (channels, float, compressed) {
            (1, true, _) => R16F,
            (1, false, true) => R8C,
            (1, false, false) => R8,
            (2, true, _) => Rg16F,
            (2, false, true) => Rg8C,
            (2, false, false) => Rg8,
            (3, true, _) => Rgb16F,
            (3, false, true) => Rgb8C,
            (3, false, false) => Rgb8,
            (4, true, _) => Rgba16F,
            (4, false, true) => Rgba8C,
            (4, false, false) => Rgba8,
            _ => return Err(invalid_channels(channels)),
        };
        Ok(format)
    }

    /// Format for render targets: 8-bit normalized or 16-bit float.
    pub fn fbo(channels: u32, float: bool) -> Result<Self, TextureError> {
        use LogicalFormat::*;
        let format = match (channels, float) {
            (1, true) => R16F,
            (1, false) => R8,
            (2, true) => Rg16F,
            (2, false) => Rg8,
            (3, true) => Rgb16F,
            (3, false) => Rgb8,
            (4, true) => Rgba16F,
            (4, false) => Rgba8,
            _ => return Err(invalid_channels(channels)),
        };
        Ok(format)
    }

    /// Render target format with 32-bit float channels.
    pub fn fbo_float32(channels: u32) -> Result<Self, TextureError> {
        use LogicalFormat::*;
        match channels {
            1 => Ok(R32F),
            2 => Ok(Rg32F),
            3 => Ok(Rgb32F),
            4 => Ok(Rgba32F),
            _ => Err(invalid_channels(channels)),
        }
    }

    /// Integral render target format with 8 or 16 bits per channel.
    pub fn fbo_integral(channels: u32, bits: u32, unsigned: bool) -> Result<Self, TextureError> {
        use LogicalFormat::*;
        let format = match (channels, bits, unsigned) {
            (1, 8, true) => R8Ui,
            (1, 8, false) => R8I,
            (1, 16, true) => R16Ui,
            (1, 16, false) => R16I,
            (2, 8, true) => Rg8Ui,
            (2, 8, false) => Rg8I,
            (2, 16, true) => Rg16Ui,
            (2, 16, false) => Rg16I,
            (3, 8, true) => Rgb8Ui,
            (3, 8, false) => Rgb8I,
            (3, 16, true) => Rgb16Ui,
            (3, 16, false) => Rgb16I,
            (4, 8, true) => Rgba8Ui,
            (4, 8, false) => Rgba8I,
            (4, 16, true) => Rgba16Ui,
            (4, 16, false) => Rgba16I,
            (1..=4, _, _) => return Err(invalid_bits(bits)),
            _ => return Err(invalid_channels(channels)),
        };
        Ok(format)
    }

    /// Signed normalized render target format with 8 or 16 bits per channel.
    pub fn fbo_snorm(channels: u32, bits: u32) -> Result<Self, TextureError> {
        use LogicalFormat::*;
        let format = match (channels, bits) {
            (1, 8) => R8S,
            (1, 16) => R16S,
            (2, 8) => Rg8S,
            (2, 16) => Rg16S,
            (3, 8) => Rgb8S,
            (3, 16) => Rgb16S,
            (4, 8) => Rgba8S,
            (4, 16) => Rgba16S,
            (1..=4, _) => return Err(invalid_bits(bits)),
            _ => return Err(invalid_channels(channels)),
        };
        Ok(format)
    }

    /// Depth format, optionally packed with stencil, optionally float depth.
    pub fn depth(packed_stencil: bool, float: bool) -> Self {
        match (packed_stencil, float) {
            (true, true) => LogicalFormat::DepthFStencil,
            (true, false) => LogicalFormat::DepthStencil,
            (false, true) => LogicalFormat::DepthF,
            (false, false) => LogicalFormat::Depth,
        }
    }
}

fn invalid_channels(channels: u32) -> TextureError {
    TextureError::invalid(format!("channel count {channels} out of range 1..=4"))
}

fn invalid_bits(bits: u32) -> TextureError {
    TextureError::invalid(format!("bits per channel {bits} must be 8 or 16"))
}

/// A concrete format a GPU can allocate.
///
/// The 3-channel formats only exist on backends that store them natively;
/// the format table falls back to the 4-channel variants elsewhere.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFormat {
    R8Unorm,
    R16Unorm,
    R8Snorm,
    R16Snorm,
    R8Uint,
    R8Sint,
    R16Uint,
    R16Sint,
    R16Float,
    R32Float,
    Rg8Unorm,
    Rg16Unorm,
    Rg8Snorm,
    Rg16Snorm,
    Rg8Uint,
    Rg8Sint,
    Rg16Uint,
    Rg16Sint,
    Rg16Float,
    Rg32Float,
    Rgb8Unorm,
    Rgb8Snorm,
    Rgb16Float,
    Rgb32Float,
    Rgba8Unorm,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Rgba16Unorm,
    Rgba16Snorm,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    Rgba32Float,
    Rgb10a2Unorm,
    Rg11b10Float,
    Bc1RgbaUnorm,
    Bc2RgbaUnorm,
    Bc3RgbaUnorm,
    Bc4RUnorm,
    Bc5RgUnorm,
    Etc2Rgb8Unorm,
    Etc2Rgba8Unorm,
    Depth16Unorm,
    Depth24Plus,
    Depth32Float,
    Depth24PlusStencil8,
    Depth32FloatStencil8,
    Stencil8,
}

impl NativeFormat {
    /// Nominal storage bits per texel. Block formats report their average rate.
    pub const fn bits_per_pixel(&self) -> u32 {
        use NativeFormat::*;
        match self {
            R8Unorm | R8Snorm | R8Uint | R8Sint | Stencil8 | Bc2RgbaUnorm | Bc3RgbaUnorm
            | Bc5RgUnorm | Etc2Rgba8Unorm => 8,
            Bc1RgbaUnorm | Bc4RUnorm | Etc2Rgb8Unorm => 4,
            R16Unorm | R16Snorm | R16Uint | R16Sint | R16Float | Rg8Unorm | Rg8Snorm | Rg8Uint
            | Rg8Sint | Depth16Unorm => 16,
            Rgb8Unorm | Rgb8Snorm => 24,
            R32Float | Rg16Unorm | Rg16Snorm | Rg16Uint | Rg16Sint | Rg16Float | Rgba8Unorm
            | Rgba8Snorm | Rgba8Uint | Rgba8Sint | Rgb10a2Unorm | Rg11b10Float | Depth24Plus
            | Depth32Float | Depth24PlusStencil8 => 32,
            Rgb16Float => 48,
            Depth32FloatStencil8 => 40,
            Rg32Float | Rgba16Unorm | Rgba16Snorm | Rgba16Uint | Rgba16Sint | Rgba16Float => 64,
            Rgb32Float => 96,
            Rgba32Float => 128,
        }
    }

    /// Number of color channels, `0` for depth/stencil formats.
    pub const fn channel_count(&self) -> u32 {
        use NativeFormat::*;
        match self {
            R8Unorm | R16Unorm | R8Snorm | R16Snorm | R8Uint | R8Sint | R16Uint | R16Sint
            | R16Float | R32Float | Bc4RUnorm => 1,
            Rg8Unorm | Rg16Unorm | Rg8Snorm | Rg16Snorm | Rg8Uint | Rg8Sint | Rg16Uint
            | Rg16Sint | Rg16Float | Rg32Float | Bc5RgUnorm => 2,
            Rgb8Unorm | Rgb8Snorm | Rgb16Float | Rgb32Float | Rg11b10Float | Bc1RgbaUnorm
            | Etc2Rgb8Unorm => 3,
            Rgba8Unorm | Rgba8Snorm | Rgba8Uint | Rgba8Sint | Rgba16Unorm | Rgba16Snorm
            | Rgba16Uint | Rgba16Sint | Rgba16Float | Rgba32Float | Rgb10a2Unorm
            | Bc2RgbaUnorm | Bc3RgbaUnorm | Etc2Rgba8Unorm => 4,
            Depth16Unorm | Depth24Plus | Depth32Float | Depth24PlusStencil8
            | Depth32FloatStencil8 | Stencil8 => 0,
        }
    }

    /// `true` for 4x4 block-compressed formats.
    pub const fn is_compressed(&self) -> bool {
        use NativeFormat::*;
        matches!(
            self,
            Bc1RgbaUnorm
                | Bc2RgbaUnorm
                | Bc3RgbaUnorm
                | Bc4RUnorm
                | Bc5RgUnorm
                | Etc2Rgb8Unorm
                | Etc2Rgba8Unorm
        )
    }

    /// `true` for formats carrying depth.
    pub const fn is_depth(&self) -> bool {
        use NativeFormat::*;
        matches!(
            self,
            Depth16Unorm | Depth24Plus | Depth32Float | Depth24PlusStencil8 | Depth32FloatStencil8
        )
    }

    /// `true` for formats carrying stencil.
    pub const fn has_stencil(&self) -> bool {
        use NativeFormat::*;
        matches!(self, Depth24PlusStencil8 | Depth32FloatStencil8 | Stencil8)
    }

    /// `true` for float depth formats.
    pub const fn is_float_depth(&self) -> bool {
        matches!(
            self,
            NativeFormat::Depth32Float | NativeFormat::Depth32FloatStencil8
        )
    }

    /// `true` for non-normalized integer color formats.
    pub const fn is_integer(&self) -> bool {
        use NativeFormat::*;
        matches!(
            self,
            R8Uint
                | R8Sint
                | R16Uint
                | R16Sint
                | Rg8Uint
                | Rg8Sint
                | Rg16Uint
                | Rg16Sint
                | Rgba8Uint
                | Rgba8Sint
                | Rgba16Uint
                | Rgba16Sint
        )
    }

    /// `true` for float color formats.
    pub const fn is_float(&self) -> bool {
        use NativeFormat::*;
        matches!(
            self,
            R16Float
                | R32Float
                | Rg16Float
                | Rg32Float
                | Rgb16Float
                | Rgb32Float
                | Rgba16Float
                | Rgba32Float
                | Rg11b10Float
        )
    }
}

/// Where a channel of a swizzled texture reads from.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwizzleSource {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

/// Per-channel read mapping applied when sampling a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelSwizzle {
    /// Source of the red channel.
    pub r: SwizzleSource,
    /// Source of the green channel.
    pub g: SwizzleSource,
    /// Source of the blue channel.
    pub b: SwizzleSource,
    /// Source of the alpha channel.
    pub a: SwizzleSource,
}

impl ChannelSwizzle {
    /// Identity mapping.
    pub const IDENTITY: Self = Self {
        r: SwizzleSource::Red,
        g: SwizzleSource::Green,
        b: SwizzleSource::Blue,
        a: SwizzleSource::Alpha,
    };
    /// Single channel read as grey with opaque alpha.
    pub const RED_AS_GREY: Self = Self {
        r: SwizzleSource::Red,
        g: SwizzleSource::Red,
        b: SwizzleSource::Red,
        a: SwizzleSource::One,
    };
    /// Two channels read as grey plus alpha from green.
    pub const RED_GREEN_AS_GREY_ALPHA: Self = Self {
        r: SwizzleSource::Red,
        g: SwizzleSource::Red,
        b: SwizzleSource::Red,
        a: SwizzleSource::Green,
    };
}

/// A resolved texture format, obtained from the format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureFormat {
    native: NativeFormat,
    logical: Option<LogicalFormat>,
}

impl TextureFormat {
    /// Wraps a native format the caller knows to be supported.
    ///
    /// Normal code goes through [`FormatTable::resolve`](super::format_table::FormatTable::resolve).
    pub const fn from_native(native: NativeFormat) -> Self {
        Self {
            native,
            logical: None,
        }
    }

    pub(crate) const fn resolved(native: NativeFormat, logical: LogicalFormat) -> Self {
        Self {
            native,
            logical: Some(logical),
        }
    }

    /// The concrete GPU format.
    pub const fn native(&self) -> NativeFormat {
        self.native
    }

    /// The logical format this was resolved from, if any.
    pub const fn logical(&self) -> Option<LogicalFormat> {
        self.logical
    }

    /// Nominal bits per texel.
    pub const fn bits_per_pixel(&self) -> u32 {
        self.native.bits_per_pixel()
    }

    /// `true` for block-compressed formats.
    pub const fn is_compressed(&self) -> bool {
        self.native.is_compressed()
    }

    /// `true` for depth formats.
    pub const fn is_depth(&self) -> bool {
        self.native.is_depth()
    }

    /// `true` for formats with a stencil component.
    pub const fn has_stencil(&self) -> bool {
        self.native.has_stencil()
    }

    /// Sampling swizzle: single and dual channel colour formats are read as grey.
    pub fn swizzle(&self) -> ChannelSwizzle {
        if self.native.is_depth() || self.native.has_stencil() {
            return ChannelSwizzle::IDENTITY;
        }
        match self.native.channel_count() {
            1 => ChannelSwizzle::RED_AS_GREY,
            2 => ChannelSwizzle::RED_GREEN_AS_GREY_ALPHA,
            _ => ChannelSwizzle::IDENTITY,
        }
    }

    /// Uncompressed byte size of an extent in this format.
    pub fn uncompressed_bytes(&self, width: u32, height: u32, depth: u32) -> u64 {
        (width as u64 * height as u64 * depth as u64 * self.bits_per_pixel() as u64).div_ceil(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_format_selection() {
        assert_eq!(LogicalFormat::mapping(4, false, false).unwrap(), LogicalFormat::Rgba8);
        assert_eq!(LogicalFormat::mapping(4, false, true).unwrap(), LogicalFormat::Rgba8C);
        assert_eq!(LogicalFormat::mapping(1, true, true).unwrap(), LogicalFormat::R16F);
        assert!(matches!(
            LogicalFormat::mapping(0, false, false),
            Err(TextureError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_fbo_format_helpers() {
        assert_eq!(LogicalFormat::fbo(3, true).unwrap(), LogicalFormat::Rgb16F);
        assert_eq!(LogicalFormat::fbo_float32(2).unwrap(), LogicalFormat::Rg32F);
        assert_eq!(
            LogicalFormat::fbo_integral(4, 16, true).unwrap(),
            LogicalFormat::Rgba16Ui
        );
        assert!(LogicalFormat::fbo_integral(4, 32, true).is_err());
        assert_eq!(LogicalFormat::fbo_snorm(1, 8).unwrap(), LogicalFormat::R8S);
        assert!(LogicalFormat::fbo_snorm(5, 8).is_err());
        assert_eq!(LogicalFormat::depth(true, true), LogicalFormat::DepthFStencil);
        assert_eq!(LogicalFormat::depth(false, false), LogicalFormat::Depth);
    }

    #[test]
    fn test_swizzle_for_single_and_dual_channel() {
        let r8 = TextureFormat::from_native(NativeFormat::R8Unorm);
        assert_eq!(r8.swizzle(), ChannelSwizzle::RED_AS_GREY);
        let rg = TextureFormat::from_native(NativeFormat::Rg16Float);
        assert_eq!(rg.swizzle(), ChannelSwizzle::RED_GREEN_AS_GREY_ALPHA);
        let depth = TextureFormat::from_native(NativeFormat::Depth24Plus);
        assert_eq!(depth.swizzle(), ChannelSwizzle::IDENTITY);
    }

    #[test]
    fn test_uncompressed_bytes() {
        let rgba8 = TextureFormat::from_native(NativeFormat::Rgba8Unorm);
        assert_eq!(rgba8.uncompressed_bytes(256, 256, 1), 262_144);
        let bc1 = TextureFormat::from_native(NativeFormat::Bc1RgbaUnorm);
        assert_eq!(bc1.uncompressed_bytes(4, 4, 1), 8);
    }
}
