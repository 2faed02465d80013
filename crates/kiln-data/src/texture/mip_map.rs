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

//! CPU-side mip chains of pixel buffers.

use kiln_core::math::{auto_mip_level_count, mip_dimension};
use kiln_core::renderer::{PixelBuffer, PixelFormat, TextureError};

/// Which color channels a mip generation pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask {
    bits: u8,
}

impl ChannelMask {
    /// No channel.
    pub const NONE: Self = Self { bits: 0 };
    /// Red channel.
    pub const RED: Self = Self { bits: 1 << 0 };
    /// Green channel.
    pub const GREEN: Self = Self { bits: 1 << 1 };
    /// Blue channel.
    pub const BLUE: Self = Self { bits: 1 << 2 };
    /// Alpha channel.
    pub const ALPHA: Self = Self { bits: 1 << 3 };
    /// Every channel.
    pub const ALL: Self = Self { bits: 0b1111 };

    /// Combines two masks.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// `true` if channel `index` (0 = red) is selected.
    pub const fn has_channel(&self, index: usize) -> bool {
        index < 4 && self.bits & (1 << index) != 0
    }
}

impl std::ops::BitOr for ChannelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// A base pixel buffer and its successively halved levels.
///
/// Level count is `min(floor(log2(max(w, h))), max_level) + 1`. Layers are never halved.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBufferMipMap {
    levels: Vec<PixelBuffer>,
}

impl PixelBufferMipMap {
    /// Allocates every level, zero-initialized.
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        depth: u32,
        max_level: u32,
    ) -> Result<Self, TextureError> {
        if width < 1 || height < 1 || depth < 1 {
            return Err(TextureError::invalid(format!(
                "mip map base dimensions must be >= 1, got {width}x{height}x{depth}"
            )));
        }
        let count = auto_mip_level_count(width.max(height)).min(max_level) + 1;
        let levels = (0..count)
            .map(|level| {
                PixelBuffer::new(
                    format,
                    mip_dimension(width, level),
                    mip_dimension(height, level),
                    depth,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { levels })
    }

    /// Number of levels including the base.
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Pixel format of every level.
    pub fn format(&self) -> PixelFormat {
        self.levels[0].format()
    }

    /// One level.
    pub fn level(&self, level: u32) -> Result<&PixelBuffer, TextureError> {
        let count = self.levels.len();
        self.levels
            .get(level as usize)
            .ok_or_else(|| out_of_range(level, count))
    }

    /// One level, mutable.
    pub fn level_mut(&mut self, level: u32) -> Result<&mut PixelBuffer, TextureError> {
        let count = self.levels.len();
        self.levels
            .get_mut(level as usize)
            .ok_or_else(|| out_of_range(level, count))
    }

    /// The base level.
    pub fn base_mut(&mut self) -> &mut PixelBuffer {
        &mut self.levels[0]
    }

    /// All levels, base first.
    pub fn levels(&self) -> &[PixelBuffer] {
        &self.levels
    }

    /// Fills levels 1.. with a 2x2 box filter of the previous level.
    pub fn create_mip_maps(&mut self, mask: ChannelMask) -> Result<(), TextureError> {
        self.downsample(
            mask,
            |s| ((s[0] as u32 + s[1] as u32 + s[2] as u32 + s[3] as u32) >> 2) as u8,
            |s| (s[0] + s[1] + s[2] + s[3]) * 0.25,
        )
    }

    /// Fills levels 1.. with the per-channel maximum of each 2x2 block.
    pub fn create_mip_maps_max(&mut self, mask: ChannelMask) -> Result<(), TextureError> {
        self.downsample(
            mask,
            |s| s[0].max(s[1]).max(s[2]).max(s[3]),
            |s| s[0].max(s[1]).max(s[2]).max(s[3]),
        )
    }

    fn downsample(
        &mut self,
        mask: ChannelMask,
        combine_byte: fn([u8; 4]) -> u8,
        combine_float: fn([f32; 4]) -> f32,
    ) -> Result<(), TextureError> {
        let format = self.format();
        if !format.is_byte() && !format.is_float() {
            return Err(TextureError::invalid(format!(
                "mip generation needs a byte or float color format, got {format:?}"
            )));
        }
        let channels = format.channel_count() as usize;

        for level in 1..self.levels.len() {
            let (head, tail) = self.levels.split_at_mut(level);
            let source = &head[level - 1];
            let target = &mut tail[0];
            let sampler = BlockSampler::new(source, target, channels);

            if format.is_float() {
                let src: &[f32] = cast(source.bytes())?;
                let dst: &mut [f32] = cast_mut(target.bytes_mut())?;
                sampler.run(src, dst, mask, combine_float);
            } else {
                sampler.run(source.bytes(), target.bytes_mut(), mask, combine_byte);
            }
        }
        Ok(())
    }
}

/// Index arithmetic for one level-to-level reduction.
struct BlockSampler {
    channels: usize,
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    depth: usize,
}

impl BlockSampler {
    fn new(source: &PixelBuffer, target: &PixelBuffer, channels: usize) -> Self {
        Self {
            channels,
            src_width: source.width() as usize,
            src_height: source.height() as usize,
            dst_width: target.width() as usize,
            dst_height: target.height() as usize,
            depth: target.depth() as usize,
        }
    }

    fn run<T: Copy>(&self, src: &[T], dst: &mut [T], mask: ChannelMask, combine: fn([T; 4]) -> T) {
        let src_layer = self.src_width * self.src_height * self.channels;
        let dst_layer = self.dst_width * self.dst_height * self.channels;

        for z in 0..self.depth {
            for y in 0..self.dst_height {
                // A 1-wide source row or column samples itself instead of its neighbour.
                let y0 = (2 * y).min(self.src_height - 1);
                let y1 = (2 * y + 1).min(self.src_height - 1);
                for x in 0..self.dst_width {
                    let x0 = (2 * x).min(self.src_width - 1);
                    let x1 = (2 * x + 1).min(self.src_width - 1);
                    let at = |sx: usize, sy: usize| {
                        z * src_layer + (sy * self.src_width + sx) * self.channels
                    };
                    let taps = [at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1)];
                    let out = z * dst_layer + (y * self.dst_width + x) * self.channels;

                    for c in (0..self.channels).filter(|c| mask.has_channel(*c)) {
                        dst[out + c] = combine(taps.map(|t| src[t + c]));
                    }
                }
            }
        }
    }
}

fn cast(bytes: &[u8]) -> Result<&[f32], TextureError> {
    bytemuck::try_cast_slice(bytes)
        .map_err(|e| TextureError::invalid(format!("float view cast failed: {e:?}")))
}

fn cast_mut(bytes: &mut [u8]) -> Result<&mut [f32], TextureError> {
    bytemuck::try_cast_slice_mut(bytes)
        .map_err(|e| TextureError::invalid(format!("float view cast failed: {e:?}")))
}

fn out_of_range(level: u32, count: usize) -> TextureError {
    TextureError::invalid(format!("mip level {level} out of range, chain has {count}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_count() {
        let chain = PixelBufferMipMap::new(PixelFormat::Byte4, 256, 64, 1, 100).unwrap();
        assert_eq!(chain.level_count(), 9);
        let last = chain.level(8).unwrap();
        assert_eq!((last.width(), last.height()), (1, 1));

        let capped = PixelBufferMipMap::new(PixelFormat::Byte4, 256, 256, 1, 2).unwrap();
        assert_eq!(capped.level_count(), 3);
        assert!(capped.level(3).is_err());
    }

    #[test]
    fn test_box_filter_bytes() {
        let mut chain = PixelBufferMipMap::new(PixelFormat::Byte1, 2, 2, 1, 8).unwrap();
        chain.base_mut().bytes_mut().copy_from_slice(&[10, 20, 30, 41]);
        chain.create_mip_maps(ChannelMask::ALL).unwrap();
        // (10 + 20 + 30 + 41) >> 2
        assert_eq!(chain.level(1).unwrap().bytes(), &[25]);
    }

    #[test]
    fn test_box_filter_floats_with_thin_level() {
        let mut chain = PixelBufferMipMap::new(PixelFormat::Float1, 2, 1, 1, 8).unwrap();
        chain
            .base_mut()
            .float1_mut()
            .unwrap()
            .copy_from_slice(&[1.0, 3.0]);
        chain.create_mip_maps(ChannelMask::ALL).unwrap();
        let level1 = chain.level(1).unwrap().float1().unwrap();
        assert_relative_eq!(level1[0], 2.0);
    }

    #[test]
    fn test_mask_and_max() {
        let mut chain = PixelBufferMipMap::new(PixelFormat::Byte2, 2, 2, 1, 8).unwrap();
        chain
            .base_mut()
            .bytes_mut()
            .copy_from_slice(&[1, 100, 9, 100, 4, 100, 2, 7]);
        chain.create_mip_maps_max(ChannelMask::RED).unwrap();
        assert_eq!(chain.level(1).unwrap().bytes(), &[9, 0]);
        chain
            .create_mip_maps_max(ChannelMask::RED | ChannelMask::GREEN)
            .unwrap();
        assert_eq!(chain.level(1).unwrap().bytes(), &[9, 100]);
    }

    #[test]
    fn test_layers_processed_independently() {
        let mut chain = PixelBufferMipMap::new(PixelFormat::Byte1, 2, 2, 2, 8).unwrap();
        chain
            .base_mut()
            .bytes_mut()
            .copy_from_slice(&[4, 4, 4, 4, 8, 8, 8, 8]);
        chain.create_mip_maps(ChannelMask::ALL).unwrap();
        assert_eq!(chain.level(1).unwrap().bytes(), &[4, 8]);
    }

    #[test]
    fn test_rejects_depth_formats() {
        let mut chain = PixelBufferMipMap::new(PixelFormat::Depth, 4, 4, 1, 8).unwrap();
        assert!(chain.create_mip_maps(ChannelMask::ALL).is_err());
    }
}
