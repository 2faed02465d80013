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

//! A CPU-side block of image data with a fixed shape and pixel format.
//!
//! `PixelBuffer` is the unit of exchange between decoders, the texture objects and
//! the backends. Its dimensions and format never change after construction; only the
//! content is mutable. Typed views are checked against the format, so a buffer
//! holding `Byte4` texels can never be reinterpreted as `Float4` by accident.

use super::pixel_format::PixelFormat;
use crate::math::Extent3D;
use crate::renderer::error::TextureError;

/// The largest value a 24-bit packed depth can hold.
pub const DEPTH24_MAX: u32 = 0x00FF_FFFF;

/// A single 8-byte compressed 4x4 block (DXT1).
pub type CompressedBlock8 = [u8; 8];
/// A single 16-byte compressed 4x4 block (DXT3 / DXT5).
pub type CompressedBlock16 = [u8; 16];

/// Raw image data in one [`PixelFormat`], `depth` layers of `width` x `height` texels.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    format: PixelFormat,
    width: u32,
    height: u32,
    depth: u32,
    line_stride: usize,
    layer_stride: usize,
    image_size: usize,
    // u32 backing keeps the float and packed-depth views aligned.
    storage: Vec<u32>,
}

macro_rules! typed_views {
    ($($(#[$doc:meta])* $name:ident, $name_mut:ident => $ty:ty, [$($fmt:ident),+];)+) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> Result<&[$ty], TextureError> {
                self.check_format(&[$(PixelFormat::$fmt),+])?;
                bytemuck::try_cast_slice(self.bytes())
                    .map_err(|e| TextureError::invalid(format!("pixel view cast failed: {e:?}")))
            }

            $(#[$doc])*
            pub fn $name_mut(&mut self) -> Result<&mut [$ty], TextureError> {
                self.check_format(&[$(PixelFormat::$fmt),+])?;
                bytemuck::try_cast_slice_mut(self.bytes_mut())
                    .map_err(|e| TextureError::invalid(format!("pixel view cast failed: {e:?}")))
            }
        )+
    };
}

impl PixelBuffer {
    /// Creates a zero-initialized buffer.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidParameter` if any dimension is below one.
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<Self, TextureError> {
        if width < 1 || height < 1 || depth < 1 {
            return Err(TextureError::invalid(format!(
                "pixel buffer dimensions must be >= 1, got {width}x{height}x{depth}"
            )));
        }

        let (line_stride, layer_stride) = Self::strides(format, width, height);
        let image_size = layer_stride * depth as usize;

        Ok(Self {
            format,
            width,
            height,
            depth,
            line_stride,
            layer_stride,
            image_size,
            storage: vec![0u32; image_size.div_ceil(4)],
        })
    }

    /// Creates a buffer and copies `data` into it.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidParameter` if the dimensions are invalid or `data` is not exactly
    /// [`image_size`](Self::image_size) bytes long.
    pub fn from_bytes(
        format: PixelFormat,
        width: u32,
        height: u32,
        depth: u32,
        data: &[u8],
    ) -> Result<Self, TextureError> {
        let mut buffer = Self::new(format, width, height, depth)?;
        if data.len() != buffer.image_size {
            return Err(TextureError::invalid(format!(
                "pixel data is {} bytes, {format:?} {width}x{height}x{depth} needs {}",
                data.len(),
                buffer.image_size
            )));
        }
        buffer.bytes_mut().copy_from_slice(data);
        Ok(buffer)
    }

    /// Computes `(line_stride, layer_stride)` for a format and a layer size.
    ///
    /// Block-compressed formats count `ceil(w / 4)` block columns and `ceil(h / 4)` block rows.
    pub fn strides(format: PixelFormat, width: u32, height: u32) -> (usize, usize) {
        let block = format.block_dimension();
        let columns = width.div_ceil(block) as usize;
        let rows = height.div_ceil(block) as usize;
        let line_stride = columns * format.unit_size();
        (line_stride, line_stride * rows)
    }

    /// The pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of layers (1 for 2D, 6 for cube maps).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Width, height and depth as an extent.
    pub fn extent(&self) -> Extent3D {
        Extent3D::new(self.width, self.height, self.depth)
    }

    /// Bytes per texel, or per block for compressed formats.
    pub fn unit_size(&self) -> usize {
        self.format.unit_size()
    }

    /// Bytes per row of texels (or row of blocks).
    pub fn line_stride(&self) -> usize {
        self.line_stride
    }

    /// Bytes per layer.
    pub fn layer_stride(&self) -> usize {
        self.layer_stride
    }

    /// Total size of the image data in bytes.
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// `true` if the buffer holds block-compressed data.
    pub fn is_compressed(&self) -> bool {
        self.format.is_compressed()
    }

    /// The raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u32, u8>(&self.storage)[..self.image_size]
    }

    /// The raw image bytes, mutable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let size = self.image_size;
        &mut bytemuck::cast_slice_mut::<u32, u8>(&mut self.storage)[..size]
    }

    /// The bytes of one layer.
    pub fn layer(&self, layer: u32) -> Result<&[u8], TextureError> {
        let range = self.layer_range(layer)?;
        Ok(&self.bytes()[range])
    }

    /// The bytes of one layer, mutable.
    pub fn layer_mut(&mut self, layer: u32) -> Result<&mut [u8], TextureError> {
        let range = self.layer_range(layer)?;
        Ok(&mut self.bytes_mut()[range])
    }

    fn layer_range(&self, layer: u32) -> Result<std::ops::Range<usize>, TextureError> {
        if layer >= self.depth {
            return Err(TextureError::invalid(format!(
                "layer {layer} out of range, buffer has {} layers",
                self.depth
            )));
        }
        let start = self.layer_stride * layer as usize;
        Ok(start..start + self.layer_stride)
    }

    fn check_format(&self, accepted: &[PixelFormat]) -> Result<(), TextureError> {
        if accepted.contains(&self.format) {
            Ok(())
        } else {
            Err(TextureError::TypeMismatch {
                expected: accepted[0],
                actual: self.format,
            })
        }
    }

    typed_views! {
        /// Texels of a `Byte1` buffer.
        byte1, byte1_mut => u8, [Byte1];
        /// Texels of a `Byte2` buffer.
        byte2, byte2_mut => [u8; 2], [Byte2];
        /// Texels of a `Byte3` buffer.
        byte3, byte3_mut => [u8; 3], [Byte3];
        /// Texels of a `Byte4` buffer.
        byte4, byte4_mut => [u8; 4], [Byte4];
        /// Texels of a `Float1` buffer.
        float1, float1_mut => f32, [Float1];
        /// Texels of a `Float2` buffer.
        float2, float2_mut => [f32; 2], [Float2];
        /// Texels of a `Float3` buffer.
        float3, float3_mut => [f32; 3], [Float3];
        /// Texels of a `Float4` buffer.
        float4, float4_mut => [f32; 4], [Float4];
        /// Texels of a `Depth` buffer.
        depth_texels, depth_texels_mut => u32, [Depth];
        /// Texels of a `FloatDepth` buffer.
        float_depth, float_depth_mut => f32, [FloatDepth];
        /// Texels of a `Stencil` buffer.
        stencil, stencil_mut => u8, [Stencil];
        /// Packed texels of a `DepthStencil` buffer.
        depth_stencil, depth_stencil_mut => u32, [DepthStencil];
        /// Blocks of a `Dxt1` buffer.
        compressed_blocks8, compressed_blocks8_mut => CompressedBlock8, [Dxt1];
        /// Blocks of a `Dxt3` or `Dxt5` buffer.
        compressed_blocks16, compressed_blocks16_mut => CompressedBlock16, [Dxt3, Dxt5];
    }

    /// Fills every texel with a color given as integers.
    ///
    /// Byte formats take the narrowed value, float formats `value / 255`.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidParameter` for depth, stencil and compressed formats.
    pub fn set_to_int_color(&mut self, r: i32, g: i32, b: i32, a: i32) -> Result<(), TextureError> {
        self.fill_color(
            [r as u8, g as u8, b as u8, a as u8],
            [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0],
        )
    }

    /// Fills every texel with a color given as unsigned integers.
    ///
    /// Same conversion rules as [`set_to_int_color`](Self::set_to_int_color).
    pub fn set_to_uint_color(
        &mut self,
        r: u32,
        g: u32,
        b: u32,
        a: u32,
    ) -> Result<(), TextureError> {
        self.fill_color(
            [r as u8, g as u8, b as u8, a as u8],
            [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0],
        )
    }

    /// Fills every texel with a color given as floats.
    ///
    /// Byte formats take `value * 255` truncated, float formats the value unchanged.
    pub fn set_to_float_color(
        &mut self,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> Result<(), TextureError> {
        self.fill_color(
            [
                (r * 255.0) as u8,
                (g * 255.0) as u8,
                (b * 255.0) as u8,
                (a * 255.0) as u8,
            ],
            [r, g, b, a],
        )
    }

    fn fill_color(&mut self, bytes: [u8; 4], floats: [f32; 4]) -> Result<(), TextureError> {
        let channels = self.format.channel_count() as usize;
        if channels == 0 {
            return Err(TextureError::invalid(format!(
                "cannot fill {:?} buffer with a color",
                self.format
            )));
        }

        if self.format.is_float() {
            let texel = &floats[..channels];
            let data: &mut [f32] = bytemuck::try_cast_slice_mut(self.bytes_mut())
                .map_err(|e| TextureError::invalid(format!("pixel view cast failed: {e:?}")))?;
            for chunk in data.chunks_exact_mut(channels) {
                chunk.copy_from_slice(texel);
            }
        } else {
            let texel = &bytes[..channels];
            for chunk in self.bytes_mut().chunks_exact_mut(channels) {
                chunk.copy_from_slice(texel);
            }
        }
        Ok(())
    }

    /// Fills every texel of a `DepthStencil` buffer.
    ///
    /// The depth is scaled to 24 bits and clamped to `[0, 16777215]`, then packed
    /// above the 8-bit stencil.
    ///
    /// ## Errors
    ///
    /// Returns `TypeMismatch` for any other format.
    pub fn set_to_depth_stencil(&mut self, depth: f32, stencil: u8) -> Result<(), TextureError> {
        let packed = pack_depth_stencil(depth, stencil);
        self.depth_stencil_mut()?.fill(packed);
        Ok(())
    }

    /// Copies the leading channels of `source` into this buffer.
    ///
    /// Used to truncate a 4-channel intermediate readback into a 1-3 channel destination.
    /// Both buffers must share dimensions and element type (byte or float), and `source`
    /// must have at least as many channels.
    pub fn copy_channels_from(&mut self, source: &PixelBuffer) -> Result<(), TextureError> {
        let dst_channels = self.format.channel_count() as usize;
        let src_channels = source.format.channel_count() as usize;
        if self.extent() != source.extent()
            || dst_channels == 0
            || src_channels < dst_channels
            || self.format.is_float() != source.format.is_float()
        {
            return Err(TextureError::invalid(format!(
                "cannot truncate {:?} {:?} into {:?} {:?}",
                source.format,
                source.extent(),
                self.format,
                self.extent()
            )));
        }

        let element = if self.format.is_float() { 4 } else { 1 };
        let src_texel = src_channels * element;
        let dst_texel = dst_channels * element;
        let src = source.bytes();
        for (dst, src) in self
            .bytes_mut()
            .chunks_exact_mut(dst_texel)
            .zip(src.chunks_exact(src_texel))
        {
            dst.copy_from_slice(&src[..dst_texel]);
        }
        Ok(())
    }
}

/// Packs a float depth and a stencil value into a 24/8 texel.
pub fn pack_depth_stencil(depth: f32, stencil: u8) -> u32 {
    let scaled = (depth * DEPTH24_MAX as f32).clamp(0.0, DEPTH24_MAX as f32) as u32;
    (scaled << 8) | stencil as u32
}
