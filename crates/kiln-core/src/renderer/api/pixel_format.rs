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

//! The fixed set of CPU-side pixel layouts a [`PixelBuffer`](super::PixelBuffer) can hold.

use crate::renderer::error::TextureError;

/// Layout of the texels stored in a pixel buffer.
///
/// Byte formats store one `u8` per channel, float formats one `f32` per channel.
/// Block-compressed formats store 4x4 texel blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One 8-bit channel.
    Byte1,
    /// Two 8-bit channels.
    Byte2,
    /// Three 8-bit channels.
    Byte3,
    /// Four 8-bit channels.
    Byte4,
    /// One 32-bit float channel.
    Float1,
    /// Two 32-bit float channels.
    Float2,
    /// Three 32-bit float channels.
    Float3,
    /// Four 32-bit float channels.
    Float4,
    /// Normalized depth stored as a 32-bit unsigned integer.
    Depth,
    /// Depth stored as a 32-bit float.
    FloatDepth,
    /// 8-bit stencil.
    Stencil,
    /// 24-bit depth in the high bits, 8-bit stencil in the low bits.
    DepthStencil,
    /// DXT1 / BC1, 8 bytes per 4x4 block.
    Dxt1,
    /// DXT3 / BC2, 16 bytes per 4x4 block.
    Dxt3,
    /// DXT5 / BC3, 16 bytes per 4x4 block.
    Dxt5,
}

impl PixelFormat {
    /// Every format, in declaration order.
    pub const ALL: [PixelFormat; 15] = [
        PixelFormat::Byte1,
        PixelFormat::Byte2,
        PixelFormat::Byte3,
        PixelFormat::Byte4,
        PixelFormat::Float1,
        PixelFormat::Float2,
        PixelFormat::Float3,
        PixelFormat::Float4,
        PixelFormat::Depth,
        PixelFormat::FloatDepth,
        PixelFormat::Stencil,
        PixelFormat::DepthStencil,
        PixelFormat::Dxt1,
        PixelFormat::Dxt3,
        PixelFormat::Dxt5,
    ];

    /// Bytes per texel. For compressed formats this is the size of one 4x4 block.
    pub const fn unit_size(&self) -> usize {
        match self {
            PixelFormat::Byte1 | PixelFormat::Stencil => 1,
            PixelFormat::Byte2 => 2,
            PixelFormat::Byte3 => 3,
            PixelFormat::Byte4 => 4,
            PixelFormat::Float1 => 4,
            PixelFormat::Float2 => 8,
            PixelFormat::Float3 => 12,
            PixelFormat::Float4 => 16,
            PixelFormat::Depth | PixelFormat::FloatDepth | PixelFormat::DepthStencil => 4,
            PixelFormat::Dxt1 => 8,
            PixelFormat::Dxt3 | PixelFormat::Dxt5 => 16,
        }
    }

    /// Number of color channels, `0` for depth, stencil and compressed formats.
    pub const fn channel_count(&self) -> u32 {
        match self {
            PixelFormat::Byte1 | PixelFormat::Float1 => 1,
            PixelFormat::Byte2 | PixelFormat::Float2 => 2,
            PixelFormat::Byte3 | PixelFormat::Float3 => 3,
            PixelFormat::Byte4 | PixelFormat::Float4 => 4,
            _ => 0,
        }
    }

    /// `true` for the float color formats.
    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            PixelFormat::Float1 | PixelFormat::Float2 | PixelFormat::Float3 | PixelFormat::Float4
        )
    }

    /// `true` for the byte color formats.
    pub const fn is_byte(&self) -> bool {
        matches!(
            self,
            PixelFormat::Byte1 | PixelFormat::Byte2 | PixelFormat::Byte3 | PixelFormat::Byte4
        )
    }

    /// `true` for the 4x4 block-compressed formats.
    pub const fn is_compressed(&self) -> bool {
        matches!(self, PixelFormat::Dxt1 | PixelFormat::Dxt3 | PixelFormat::Dxt5)
    }

    /// `true` for formats carrying a depth component.
    pub const fn is_depth(&self) -> bool {
        matches!(
            self,
            PixelFormat::Depth | PixelFormat::FloatDepth | PixelFormat::DepthStencil
        )
    }

    /// Edge length in texels of one storage block: 4 for compressed formats, else 1.
    pub const fn block_dimension(&self) -> u32 {
        if self.is_compressed() {
            4
        } else {
            1
        }
    }

    /// The byte or float format with the given channel count.
    pub fn color(channels: u32, float: bool) -> Result<Self, TextureError> {
        match (channels, float) {
            (1, false) => Ok(PixelFormat::Byte1),
            (2, false) => Ok(PixelFormat::Byte2),
            (3, false) => Ok(PixelFormat::Byte3),
            (4, false) => Ok(PixelFormat::Byte4),
            (1, true) => Ok(PixelFormat::Float1),
            (2, true) => Ok(PixelFormat::Float2),
            (3, true) => Ok(PixelFormat::Float3),
            (4, true) => Ok(PixelFormat::Float4),
            _ => Err(TextureError::invalid(format!(
                "channel count {channels} out of range 1..=4"
            ))),
        }
    }

    /// The four-channel format used to read back a 1-3 channel format on backends
    /// lacking direct readback for it.
    pub const fn intermediate_rgba(&self) -> Option<PixelFormat> {
        match self {
            PixelFormat::Byte1 | PixelFormat::Byte2 | PixelFormat::Byte3 => {
                Some(PixelFormat::Byte4)
            }
            PixelFormat::Float1 | PixelFormat::Float2 | PixelFormat::Float3 => {
                Some(PixelFormat::Float4)
            }
            _ => None,
        }
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = TextureError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        PixelFormat::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| TextureError::invalid(format!("pixel format index {value} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_rejects_out_of_range() {
        assert_eq!(PixelFormat::try_from(0).unwrap(), PixelFormat::Byte1);
        assert_eq!(PixelFormat::try_from(14).unwrap(), PixelFormat::Dxt5);
        assert!(matches!(
            PixelFormat::try_from(15),
            Err(TextureError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_intermediate_rgba() {
        assert_eq!(PixelFormat::Byte3.intermediate_rgba(), Some(PixelFormat::Byte4));
        assert_eq!(PixelFormat::Float1.intermediate_rgba(), Some(PixelFormat::Float4));
        assert_eq!(PixelFormat::Byte4.intermediate_rgba(), None);
        assert_eq!(PixelFormat::Depth.intermediate_rgba(), None);
    }

    #[test]
    fn test_color_format_selection() {
        assert_eq!(PixelFormat::color(2, true).unwrap(), PixelFormat::Float2);
        assert!(PixelFormat::color(5, false).is_err());
        assert!(PixelFormat::color(0, true).is_err());
    }
}
