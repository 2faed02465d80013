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

use super::conversions::{channel_layout, ChannelLayout, IntoWgpu};
use anyhow::{anyhow, Result};
use kiln_core::math::Origin3D;
use kiln_core::renderer::{
    FormatUsage, NativeFormat, NativeTextureDescriptor, NativeTextureId, PixelBuffer,
    PixelFormat, ResourceError, TextureBackend, TextureCopyRegion, TextureKind,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct WgpuTextureEntry {
    texture: wgpu::Texture,
    sampler: wgpu::Sampler,
    descriptor: NativeTextureDescriptor,
    label: Option<String>,
}

impl WgpuTextureEntry {
    fn level_size(&self, level: u32) -> Result<wgpu::Extent3d, ResourceError> {
        if level >= self.texture.mip_level_count() {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(self.texture.size().mip_level_size(level, self.texture.dimension()))
    }
}

/// A [`TextureBackend`] over a wgpu device.
///
/// 3-channel formats are stored with a fourth channel and uploads are widened on the fly.
/// Readback goes through a staging buffer and blocks until the GPU is done.
#[derive(Debug)]
pub struct WgpuTextureBackend {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: Mutex<HashMap<NativeTextureId, WgpuTextureEntry>>,
    next_id: AtomicU64,
}

impl WgpuTextureBackend {
    /// Opens the default adapter without a surface.
    ///
    /// Enables texture compression and 16-bit normalized formats when the adapter has them.
    pub fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .map_err(|e| anyhow!("Failed to find a suitable GPU adapter: {}", e))?;

        let optional = wgpu::Features::TEXTURE_COMPRESSION_BC
            | wgpu::Features::TEXTURE_COMPRESSION_ETC2
            | wgpu::Features::TEXTURE_FORMAT_16BIT_NORM
            | wgpu::Features::DEPTH32FLOAT_STENCIL8;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Kiln Texture Device"),
            required_features: adapter.features() & optional,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;

        let info = adapter.get_info();
        log::info!(
            "WgpuTextureBackend: using {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );
        Ok(Self::from_parts(adapter, device, queue))
    }

    /// Wraps an existing device.
    pub fn from_parts(adapter: wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            adapter,
            device,
            queue,
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The wgpu texture behind a native handle, for binding by the caller's render code.
    pub fn wgpu_texture(&self, id: NativeTextureId) -> Option<wgpu::Texture> {
        self.textures.lock().ok()?.get(&id).map(|e| e.texture.clone())
    }

    /// The sampler built from the texture's sampling parameters.
    pub fn wgpu_sampler(&self, id: NativeTextureId) -> Option<wgpu::Sampler> {
        self.textures.lock().ok()?.get(&id).map(|e| e.sampler.clone())
    }

    /// The descriptor the texture was created from.
    pub fn descriptor(&self, id: NativeTextureId) -> Option<NativeTextureDescriptor> {
        self.textures.lock().ok()?.get(&id).map(|e| e.descriptor.clone())
    }

    /// The most recent debug label. wgpu objects cannot be renamed, so a relabel is only
    /// visible here.
    pub fn debug_label(&self, id: NativeTextureId) -> Option<String> {
        self.textures.lock().ok()?.get(&id).and_then(|e| e.label.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<NativeTextureId, WgpuTextureEntry>>, ResourceError> {
        self.textures.lock().map_err(|e| {
            ResourceError::BackendError(format!("Mutex poisoned (wgpu textures): {e}"))
        })
    }

    fn allowed_usages(&self, format: wgpu::TextureFormat) -> wgpu::TextureUsages {
        if !self.device.features().contains(format.required_features()) {
            return wgpu::TextureUsages::empty();
        }
        self.adapter.get_texture_format_features(format).allowed_usages
    }

    fn submit_copy_to_staging(
        &self,
        entry: &WgpuTextureEntry,
        level: u32,
    ) -> Result<(wgpu::Buffer, u32, u32, wgpu::Extent3d), ResourceError> {
        let size = entry.level_size(level)?;
        let texel = entry
            .texture
            .format()
            .block_copy_size(Some(wgpu::TextureAspect::All))
            .ok_or_else(|| {
                ResourceError::Unsupported(format!("readback of {:?}", entry.texture.format()))
            })?;
        let unpadded = size.width * texel;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kiln Readback Staging"),
            size: u64::from(padded) * u64::from(size.height) * u64::from(size.depth_or_array_layers),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Kiln Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(size.height),
                },
            },
            size,
        );
        self.queue.submit(Some(encoder.finish()));
        Ok((staging, unpadded, padded, size))
    }

    /// Reads one level tightly packed in the storage format.
    fn read_level(&self, entry: &WgpuTextureEntry, level: u32) -> Result<Vec<u8>, ResourceError> {
        let (staging, unpadded, padded, size) = self.submit_copy_to_staging(entry, level)?;
        let slice = staging.slice(..);
        let (tx, rx) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| ResourceError::BackendError(format!("device poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|e| ResourceError::BackendError(format!("map callback dropped: {e}")))?
            .map_err(|e| ResourceError::BackendError(format!("WGPU map_async failed: {e:?}")))?;

        let rows = (size.height * size.depth_or_array_layers) as usize;
        let mut packed = Vec::with_capacity(unpadded as usize * rows);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize).take(rows) {
                packed.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();
        Ok(packed)
    }

    fn write_level(
        &self,
        entry: &WgpuTextureEntry,
        level: u32,
        origin: Origin3D,
        data: &[u8],
        size: wgpu::Extent3d,
    ) {
        let format = entry.texture.format();
        let (block_w, block_h) = format.block_dimensions();
        let block_bytes = format
            .block_copy_size(Some(wgpu::TextureAspect::All))
            .unwrap_or(0);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: level,
                origin: origin.into_wgpu(),
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width.div_ceil(block_w) * block_bytes),
                rows_per_image: Some(size.height.div_ceil(block_h)),
            },
            size,
        );
    }
}

impl TextureBackend for WgpuTextureBackend {
    fn backend_name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("wgpu ({:?})", self.adapter.get_info().backend))
    }

    fn supports_format(&self, _kind: TextureKind, format: NativeFormat, usage: FormatUsage) -> bool {
        let needed = match usage {
            FormatUsage::Mapping => {
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
            }
            FormatUsage::Fbo => wgpu::TextureUsages::RENDER_ATTACHMENT,
        };
        self.allowed_usages(format.into_wgpu()).contains(needed)
    }

    fn create_texture(
        &self,
        descriptor: &NativeTextureDescriptor,
    ) -> Result<NativeTextureId, ResourceError> {
        let format: wgpu::TextureFormat = descriptor.format.native().into_wgpu();
        let wanted = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::RENDER_ATTACHMENT;
        let usage = wanted & self.allowed_usages(format);
        if !usage.contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(ResourceError::Unsupported(format!(
                "{format:?} cannot be sampled on this adapter"
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size.into_wgpu(),
            mip_level_count: descriptor.mip_level_count,
            sample_count: 1,
            dimension: descriptor.kind.into_wgpu(),
            format,
            usage,
            view_formats: &[],
        });
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            texture.destroy();
            return Err(ResourceError::AllocationFailed(error.to_string()));
        }

        let sampler = self.device.create_sampler(&descriptor.sampling.into_wgpu());
        let id = NativeTextureId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()?.insert(
            id,
            WgpuTextureEntry {
                texture,
                sampler,
                descriptor: descriptor.clone(),
                label: descriptor.label.as_ref().map(|l| l.to_string()),
            },
        );
        log::debug!(
            "WgpuTextureBackend: created {} texture {} {:?} as {format:?}",
            descriptor.kind.label(),
            id.0,
            descriptor.size
        );
        Ok(id)
    }

    fn write_pixels(
        &self,
        id: NativeTextureId,
        level: u32,
        first_layer: u32,
        pixels: &PixelBuffer,
    ) -> Result<(), ResourceError> {
        let textures = self.lock()?;
        let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
        let level_size = entry.level_size(level)?;
        if pixels.width() != level_size.width
            || pixels.height() != level_size.height
            || first_layer + pixels.depth() > level_size.depth_or_array_layers
        {
            return Err(ResourceError::OutOfBounds);
        }

        let data = encode_upload(pixels, entry.texture.format())?;
        let size = wgpu::Extent3d {
            width: pixels.width(),
            height: pixels.height(),
            depth_or_array_layers: pixels.depth(),
        };
        self.write_level(entry, level, Origin3D::new(0, 0, first_layer), &data, size);
        Ok(())
    }

    fn read_pixels(
        &self,
        id: NativeTextureId,
        level: u32,
        pixels: &mut PixelBuffer,
    ) -> Result<(), ResourceError> {
        let textures = self.lock()?;
        let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
        let size = entry.level_size(level)?;
        if (pixels.width(), pixels.height(), pixels.depth())
            != (size.width, size.height, size.depth_or_array_layers)
        {
            return Err(ResourceError::OutOfBounds);
        }
        let (layout, channels) = channel_layout(entry.texture.format());
        if layout == ChannelLayout::Opaque
            || channels != pixels.format().channel_count()
            || !self.supports_direct_readback(pixels.format())
        {
            return Err(ResourceError::Unsupported(format!(
                "readback of {:?} into {:?}",
                entry.texture.format(),
                pixels.format()
            )));
        }
        let raw = self.read_level(entry, level)?;
        decode_readback(&raw, layout, pixels)
    }

    fn supports_direct_readback(&self, format: PixelFormat) -> bool {
        matches!(
            format,
            PixelFormat::Byte1
                | PixelFormat::Byte2
                | PixelFormat::Byte4
                | PixelFormat::Float1
                | PixelFormat::Float2
                | PixelFormat::Float4
        )
    }

    fn copy_texture(
        &self,
        src: NativeTextureId,
        dst: NativeTextureId,
        region: &TextureCopyRegion,
    ) -> Result<(), ResourceError> {
        let textures = self.lock()?;
        let source = textures.get(&src).ok_or(ResourceError::NotFound)?;
        let target = textures.get(&dst).ok_or(ResourceError::NotFound)?;
        let (s, d) = (source.level_size(region.src_level)?, target.level_size(region.dst_level)?);
        let e = region.extent;
        let fits = |o: Origin3D, l: wgpu::Extent3d| {
            o.x + e.width <= l.width
                && o.y + e.height <= l.height
                && o.z + e.depth_or_array_layers <= l.depth_or_array_layers
        };
        if !fits(region.src_origin, s) || !fits(region.dst_origin, d) {
            return Err(ResourceError::OutOfBounds);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Kiln Texture Copy"),
            });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: region.src_level,
                origin: region.src_origin.into_wgpu(),
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: region.dst_level,
                origin: region.dst_origin.into_wgpu(),
                aspect: wgpu::TextureAspect::All,
            },
            e.into_wgpu(),
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Box-filters byte levels through host memory; wgpu has no built-in mip generation.
    fn generate_mipmaps(&self, id: NativeTextureId) -> Result<(), ResourceError> {
        let textures = self.lock()?;
        let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
        let (layout, channels) = channel_layout(entry.texture.format());
        if layout != ChannelLayout::Byte {
            return Err(ResourceError::Unsupported(format!(
                "mip generation for {:?}",
                entry.texture.format()
            )));
        }

        let mut previous = self.read_level(entry, 0)?;
        let mut previous_size = entry.level_size(0)?;
        for level in 1..entry.texture.mip_level_count() {
            let size = entry.level_size(level)?;
            let next = downsample_bytes(&previous, previous_size, size, channels as usize);
            self.write_level(entry, level, Origin3D::ZERO, &next, size);
            previous = next;
            previous_size = size;
        }
        Ok(())
    }

    fn compressed_level_size(
        &self,
        id: NativeTextureId,
        level: u32,
    ) -> Result<Option<u64>, ResourceError> {
        let textures = self.lock()?;
        let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
        let format = entry.texture.format();
        if !format.is_compressed() {
            return Ok(None);
        }
        let size = entry.level_size(level)?;
        let (bw, bh) = format.block_dimensions();
        let block = u64::from(format.block_copy_size(None).unwrap_or(0));
        Ok(Some(
            u64::from(size.width.div_ceil(bw))
                * u64::from(size.height.div_ceil(bh))
                * u64::from(size.depth_or_array_layers)
                * block,
        ))
    }

    /// wgpu labels are fixed at creation; later labels are only kept for diagnostics.
    fn set_debug_label(&self, id: NativeTextureId, label: &str) -> Result<(), ResourceError> {
        let mut textures = self.lock()?;
        let entry = textures.get_mut(&id).ok_or(ResourceError::NotFound)?;
        entry.label = Some(label.to_string());
        Ok(())
    }

    fn destroy_texture(&self, id: NativeTextureId) -> Result<(), ResourceError> {
        let entry = self.lock()?.remove(&id).ok_or(ResourceError::NotFound)?;
        entry.texture.destroy();
        log::debug!("WgpuTextureBackend: destroyed texture {}", id.0);
        Ok(())
    }
}

/// Converts a pixel buffer into the byte layout of `storage`.
fn encode_upload(pixels: &PixelBuffer, storage: wgpu::TextureFormat) -> Result<Vec<u8>, ResourceError> {
    let format = pixels.format();
    if format.is_compressed() {
        return match storage.is_compressed() {
            true => Ok(pixels.bytes().to_vec()),
            false => Err(unsupported_upload(format, storage)),
        };
    }

    let (layout, channels) = channel_layout(storage);
    let from = format.channel_count() as usize;
    let to = channels as usize;
    let widening = from == to || (from == 3 && to == 4);
    if !widening {
        return Err(unsupported_upload(format, storage));
    }

    match layout {
        ChannelLayout::Byte if format.is_byte() => Ok(widen(pixels.bytes(), from, to, u8::MAX)),
        ChannelLayout::Float if format.is_float() => {
            let floats: &[f32] = bytemuck::try_cast_slice(pixels.bytes())
                .map_err(|e| ResourceError::BackendError(format!("{e:?}")))?;
            Ok(bytemuck::cast_slice(&widen(floats, from, to, 1.0)).to_vec())
        }
        ChannelLayout::Half if format.is_float() => {
            let floats: &[f32] = bytemuck::try_cast_slice(pixels.bytes())
                .map_err(|e| ResourceError::BackendError(format!("{e:?}")))?;
            Ok(widen(floats, from, to, 1.0)
                .into_iter()
                .flat_map(|f| half::f16::from_f32(f).to_le_bytes())
                .collect())
        }
        _ => Err(unsupported_upload(format, storage)),
    }
}

fn decode_readback(
    raw: &[u8],
    layout: ChannelLayout,
    pixels: &mut PixelBuffer,
) -> Result<(), ResourceError> {
    match layout {
        ChannelLayout::Byte | ChannelLayout::Float => {
            pixels.bytes_mut().copy_from_slice(raw);
            Ok(())
        }
        ChannelLayout::Half => {
            let target: &mut [f32] = bytemuck::try_cast_slice_mut(pixels.bytes_mut())
                .map_err(|e| ResourceError::BackendError(format!("{e:?}")))?;
            for (value, bytes) in target.iter_mut().zip(raw.chunks_exact(2)) {
                *value = half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32();
            }
            Ok(())
        }
        ChannelLayout::Opaque => Err(ResourceError::Unsupported(
            "readback of packed formats".to_string(),
        )),
    }
}

fn unsupported_upload(format: PixelFormat, storage: wgpu::TextureFormat) -> ResourceError {
    ResourceError::Unsupported(format!("upload of {format:?} pixels into {storage:?}"))
}

fn widen<T: Copy>(src: &[T], from: usize, to: usize, alpha: T) -> Vec<T> {
    if from == to {
        return src.to_vec();
    }
    let mut out = Vec::with_capacity(src.len() / from * to);
    for texel in src.chunks_exact(from) {
        out.extend_from_slice(texel);
        out.push(alpha);
    }
    out
}

fn downsample_bytes(
    src: &[u8],
    from: wgpu::Extent3d,
    to: wgpu::Extent3d,
    channels: usize,
) -> Vec<u8> {
    let (sw, sh) = (from.width as usize, from.height as usize);
    let (tw, th) = (to.width as usize, to.height as usize);
    let mut out = vec![0u8; tw * th * to.depth_or_array_layers as usize * channels];
    for z in 0..to.depth_or_array_layers as usize {
        for y in 0..th {
            let (y0, y1) = ((2 * y).min(sh - 1), (2 * y + 1).min(sh - 1));
            for x in 0..tw {
                let (x0, x1) = ((2 * x).min(sw - 1), (2 * x + 1).min(sw - 1));
                let at = |px: usize, py: usize| ((z * sh + py) * sw + px) * channels;
                let taps = [at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1)];
                let o = ((z * th + y) * tw + x) * channels;
                for c in 0..channels {
                    let sum: u32 = taps.iter().map(|&i| u32::from(src[i + c])).sum();
                    out[o + c] = (sum >> 2) as u8;
                }
            }
        }
    }
    out
}
