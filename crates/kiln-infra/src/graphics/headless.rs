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

//! A CPU-only [`TextureBackend`] for tests, tools and machines without a GPU.
//!
//! Levels are stored as pixel buffers in whatever pixel format was last written. The
//! backend counts every call and can be told to fail, which makes it the fake device
//! texture objects are tested against.

use kiln_core::renderer::{
    FormatUsage, NativeFormat, NativeTextureDescriptor, NativeTextureId, PixelBuffer,
    PixelFormat, ResourceError, TextureBackend, TextureCopyRegion, TextureKind,
};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct HeadlessTexture {
    descriptor: NativeTextureDescriptor,
    levels: Vec<Option<PixelBuffer>>,
    label: Option<String>,
}

impl HeadlessTexture {
    fn level_extent(&self, level: u32) -> Result<(u32, u32, u32), ResourceError> {
        if level >= self.descriptor.mip_level_count {
            return Err(ResourceError::OutOfBounds);
        }
        let e = self.descriptor.size.mip_level(level);
        Ok((e.width, e.height, e.depth_or_array_layers))
    }
}

#[derive(Debug, Default)]
struct Counters {
    creates: AtomicUsize,
    destroys: AtomicUsize,
    writes: AtomicUsize,
    reads: AtomicUsize,
    copies: AtomicUsize,
    mipmaps: AtomicUsize,
}

/// A texture backend keeping every level in host memory.
#[derive(Debug)]
pub struct HeadlessTextureBackend {
    textures: Mutex<HashMap<NativeTextureId, HeadlessTexture>>,
    next_id: AtomicU64,
    unsupported: HashSet<(Option<TextureKind>, NativeFormat)>,
    direct_readback: bool,
    fail_next_create: AtomicBool,
    fail_next_compressed_query: AtomicBool,
    counters: Counters,
}

impl Default for HeadlessTextureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessTextureBackend {
    /// Creates a backend supporting every native format and direct readback.
    pub fn new() -> Self {
        Self {
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            unsupported: HashSet::new(),
            direct_readback: true,
            fail_next_create: AtomicBool::new(false),
            fail_next_compressed_query: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Removes `formats` from the supported set for every kind.
    pub fn without_formats(mut self, formats: &[NativeFormat]) -> Self {
        self.unsupported
            .extend(formats.iter().map(|&f| (None, f)));
        self
    }

    /// Removes `formats` from the supported set for one kind.
    pub fn without_formats_for(mut self, kind: TextureKind, formats: &[NativeFormat]) -> Self {
        self.unsupported
            .extend(formats.iter().map(|&f| (Some(kind), f)));
        self
    }

    /// With `false`, only 4-channel color buffers can be read back, like GLES drivers.
    pub fn with_direct_readback(mut self, enabled: bool) -> Self {
        self.direct_readback = enabled;
        self
    }

    /// Makes the next `create_texture` fail with `AllocationFailed`.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Makes the next `compressed_level_size` fail with a backend error.
    pub fn fail_next_compressed_query(&self) {
        self.fail_next_compressed_query.store(true, Ordering::SeqCst);
    }

    /// Number of successful allocations.
    pub fn create_count(&self) -> usize {
        self.counters.creates.load(Ordering::SeqCst)
    }

    /// Number of successful destructions.
    pub fn destroy_count(&self) -> usize {
        self.counters.destroys.load(Ordering::SeqCst)
    }

    /// Number of pixel uploads.
    pub fn write_count(&self) -> usize {
        self.counters.writes.load(Ordering::SeqCst)
    }

    /// Number of pixel downloads.
    pub fn read_count(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Number of texture-to-texture copies.
    pub fn copy_count(&self) -> usize {
        self.counters.copies.load(Ordering::SeqCst)
    }

    /// Number of mip generation requests.
    pub fn mipmap_count(&self) -> usize {
        self.counters.mipmaps.load(Ordering::SeqCst)
    }

    /// Number of textures currently allocated.
    pub fn live_count(&self) -> usize {
        self.textures.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// `true` if `id` is allocated.
    pub fn is_live(&self, id: NativeTextureId) -> bool {
        self.textures
            .lock()
            .map(|t| t.contains_key(&id))
            .unwrap_or(false)
    }

    /// The descriptor a texture was allocated with.
    pub fn descriptor(&self, id: NativeTextureId) -> Option<NativeTextureDescriptor> {
        self.textures
            .lock()
            .ok()?
            .get(&id)
            .map(|t| t.descriptor.clone())
    }

    /// The debug label of a texture.
    pub fn debug_label(&self, id: NativeTextureId) -> Option<String> {
        self.textures.lock().ok()?.get(&id)?.label.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<NativeTextureId, HeadlessTexture>>, ResourceError> {
        self.textures.lock().map_err(|e| {
            ResourceError::BackendError(format!("Mutex poisoned (headless textures): {e}"))
        })
    }
}

impl TextureBackend for HeadlessTextureBackend {
    fn backend_name(&self) -> Cow<'static, str> {
        Cow::Borrowed("headless")
    }

    fn supports_format(&self, kind: TextureKind, format: NativeFormat, _usage: FormatUsage) -> bool {
        !self.unsupported.contains(&(None, format))
            && !self.unsupported.contains(&(Some(kind), format))
    }

    fn create_texture(
        &self,
        descriptor: &NativeTextureDescriptor,
    ) -> Result<NativeTextureId, ResourceError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(ResourceError::AllocationFailed(
                "injected allocation failure".to_string(),
            ));
        }
        let native = descriptor.format.native();
        if !self.supports_format(descriptor.kind, native, FormatUsage::Mapping) {
            return Err(ResourceError::Unsupported(format!(
                "{native:?} for {} textures",
                descriptor.kind.label()
            )));
        }
        if !descriptor.size.is_valid() || descriptor.mip_level_count == 0 {
            return Err(ResourceError::AllocationFailed(format!(
                "invalid texture size {:?} with {} levels",
                descriptor.size, descriptor.mip_level_count
            )));
        }

        let id = NativeTextureId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock()?.insert(
            id,
            HeadlessTexture {
                descriptor: descriptor.clone(),
                levels: vec![None; descriptor.mip_level_count as usize],
                label: descriptor.label.as_ref().map(|l| l.to_string()),
            },
        );
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "HeadlessTextureBackend: created texture {} {:?} {:?}",
            id.0,
            descriptor.size,
            native
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
        let mut textures = self.lock()?;
        let texture = textures.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let (width, height, layers) = texture.level_extent(level)?;
        let end_layer = first_layer
            .checked_add(pixels.depth())
            .ok_or(ResourceError::OutOfBounds)?;
        if pixels.width() != width || pixels.height() != height || end_layer > layers {
            return Err(ResourceError::OutOfBounds);
        }

        let stored = &mut texture.levels[level as usize];
        if stored.as_ref().is_none_or(|s| s.format() != pixels.format()) {
            *stored = Some(new_buffer(pixels.format(), width, height, layers)?);
        }
        if let Some(target) = stored.as_mut() {
            for z in 0..pixels.depth() {
                target
                    .layer_mut(first_layer + z)
                    .map_err(to_backend)?
                    .copy_from_slice(pixels.layer(z).map_err(to_backend)?);
            }
        }
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_pixels(
        &self,
        id: NativeTextureId,
        level: u32,
        pixels: &mut PixelBuffer,
    ) -> Result<(), ResourceError> {
        if !self.supports_direct_readback(pixels.format()) {
            return Err(ResourceError::Unsupported(format!(
                "direct readback into {:?}",
                pixels.format()
            )));
        }
        let textures = self.lock()?;
        let texture = textures.get(&id).ok_or(ResourceError::NotFound)?;
        let (width, height, layers) = texture.level_extent(level)?;
        if (pixels.width(), pixels.height(), pixels.depth()) != (width, height, layers) {
            return Err(ResourceError::OutOfBounds);
        }

        match &texture.levels[level as usize] {
            Some(stored) => convert_texels(stored, pixels)?,
            None => pixels.bytes_mut().fill(0),
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn supports_direct_readback(&self, format: PixelFormat) -> bool {
        self.direct_readback || matches!(format, PixelFormat::Byte4 | PixelFormat::Float4)
    }

    fn copy_texture(
        &self,
        src: NativeTextureId,
        dst: NativeTextureId,
        region: &TextureCopyRegion,
    ) -> Result<(), ResourceError> {
        let mut textures = self.lock()?;
        let source = textures.get(&src).ok_or(ResourceError::NotFound)?;
        let src_extent = source.level_extent(region.src_level)?;
        let block = source.levels[region.src_level as usize].clone();
        let target = textures.get_mut(&dst).ok_or(ResourceError::NotFound)?;
        let dst_extent = target.level_extent(region.dst_level)?;

        let within = |start: u32, len: u32, limit: u32| {
            start.checked_add(len).is_some_and(|end| end <= limit)
        };
        let fits = |origin: [u32; 3], (w, h, d): (u32, u32, u32)| {
            within(origin[0], region.extent.width, w)
                && within(origin[1], region.extent.height, h)
                && within(origin[2], region.extent.depth_or_array_layers, d)
        };
        let (s, t) = (region.src_origin, region.dst_origin);
        if !fits([s.x, s.y, s.z], src_extent) || !fits([t.x, t.y, t.z], dst_extent) {
            return Err(ResourceError::OutOfBounds);
        }

        if let Some(source_level) = block {
            let format = source_level.format();
            let slot = &mut target.levels[region.dst_level as usize];
            if slot.as_ref().is_none_or(|b| b.format() != format) {
                *slot = Some(new_buffer(format, dst_extent.0, dst_extent.1, dst_extent.2)?);
            }
            if let Some(target_level) = slot.as_mut() {
                copy_block(&source_level, target_level, region)?;
            }
        }
        self.counters.copies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn generate_mipmaps(&self, id: NativeTextureId) -> Result<(), ResourceError> {
        let mut textures = self.lock()?;
        let texture = textures.get_mut(&id).ok_or(ResourceError::NotFound)?;
        for level in 1..texture.descriptor.mip_level_count {
            let Some(previous) = texture.levels[level as usize - 1].clone() else {
                break;
            };
            let (w, h, d) = texture.level_extent(level)?;
            let mut next = new_buffer(previous.format(), w, h, d)?;
            box_filter(&previous, &mut next)?;
            texture.levels[level as usize] = Some(next);
        }
        self.counters.mipmaps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn compressed_level_size(
        &self,
        id: NativeTextureId,
        level: u32,
    ) -> Result<Option<u64>, ResourceError> {
        if self.fail_next_compressed_query.swap(false, Ordering::SeqCst) {
            return Err(ResourceError::BackendError(
                "injected compressed size query failure".to_string(),
            ));
        }
        let textures = self.lock()?;
        let texture = textures.get(&id).ok_or(ResourceError::NotFound)?;
        let format = texture.descriptor.format.native();
        if !format.is_compressed() {
            return Ok(None);
        }
        let (w, h, d) = texture.level_extent(level)?;
        // a 4x4 block holds 16 texels
        let block_bytes = u64::from(format.bits_per_pixel()) * 2;
        Ok(Some(
            u64::from(w.div_ceil(4)) * u64::from(h.div_ceil(4)) * u64::from(d) * block_bytes,
        ))
    }

    fn set_debug_label(&self, id: NativeTextureId, label: &str) -> Result<(), ResourceError> {
        let mut textures = self.lock()?;
        let texture = textures.get_mut(&id).ok_or(ResourceError::NotFound)?;
        texture.label = Some(label.to_string());
        Ok(())
    }

    fn destroy_texture(&self, id: NativeTextureId) -> Result<(), ResourceError> {
        if self.lock()?.remove(&id).is_none() {
            return Err(ResourceError::NotFound);
        }
        self.counters.destroys.fetch_add(1, Ordering::SeqCst);
        log::debug!("HeadlessTextureBackend: destroyed texture {}", id.0);
        Ok(())
    }
}

fn to_backend(e: impl std::fmt::Display) -> ResourceError {
    ResourceError::BackendError(e.to_string())
}

fn new_buffer(format: PixelFormat, w: u32, h: u32, d: u32) -> Result<PixelBuffer, ResourceError> {
    PixelBuffer::new(format, w, h, d).map_err(to_backend)
}

/// Copies texels between same-typed formats, dropping or filling channels.
/// Missing alpha reads as opaque.
fn convert_texels(source: &PixelBuffer, target: &mut PixelBuffer) -> Result<(), ResourceError> {
    let (from, to) = (source.format(), target.format());
    if from == to {
        target.bytes_mut().copy_from_slice(source.bytes());
        return Ok(());
    }
    let (fc, tc) = (from.channel_count() as usize, to.channel_count() as usize);
    if from.is_byte() && to.is_byte() {
        expand(source.bytes(), target.bytes_mut(), fc, tc, u8::MAX);
        Ok(())
    } else if from.is_float() && to.is_float() {
        let src: &[f32] = bytemuck::try_cast_slice(source.bytes()).map_err(to_backend)?;
        let dst: &mut [f32] =
            bytemuck::try_cast_slice_mut(target.bytes_mut()).map_err(to_backend)?;
        expand(src, dst, fc, tc, 1.0);
        Ok(())
    } else {
        Err(ResourceError::Unsupported(format!(
            "readback of {from:?} storage into {to:?}"
        )))
    }
}

fn expand<T: Copy + Default>(src: &[T], dst: &mut [T], from: usize, to: usize, opaque: T) {
    for (s, d) in src.chunks_exact(from).zip(dst.chunks_exact_mut(to)) {
        for (c, value) in d.iter_mut().enumerate() {
            *value = match s.get(c) {
                Some(v) => *v,
                None if c == 3 => opaque,
                None => T::default(),
            };
        }
    }
}

fn copy_block(
    source: &PixelBuffer,
    target: &mut PixelBuffer,
    region: &TextureCopyRegion,
) -> Result<(), ResourceError> {
    if source.is_compressed() {
        return Err(ResourceError::Unsupported(
            "region copies of compressed levels".to_string(),
        ));
    }
    let unit = source.unit_size();
    let row_bytes = region.extent.width as usize * unit;
    for z in 0..region.extent.depth_or_array_layers {
        let src_layer = source.layer(region.src_origin.z + z).map_err(to_backend)?;
        let src_stride = source.line_stride();
        let dst_stride = target.line_stride();
        let dst_layer = target
            .layer_mut(region.dst_origin.z + z)
            .map_err(to_backend)?;
        for y in 0..region.extent.height as usize {
            let s = (region.src_origin.y as usize + y) * src_stride
                + region.src_origin.x as usize * unit;
            let d = (region.dst_origin.y as usize + y) * dst_stride
                + region.dst_origin.x as usize * unit;
            dst_layer[d..d + row_bytes].copy_from_slice(&src_layer[s..s + row_bytes]);
        }
    }
    Ok(())
}

fn box_filter(source: &PixelBuffer, target: &mut PixelBuffer) -> Result<(), ResourceError> {
    let format = source.format();
    let channels = format.channel_count() as usize;
    let (sw, sh) = (source.width() as usize, source.height() as usize);
    let (tw, th) = (target.width() as usize, target.height() as usize);
    let layers = target.depth() as usize;

    let taps = |z: usize, x: usize, y: usize| {
        let (x0, x1) = ((2 * x).min(sw - 1), (2 * x + 1).min(sw - 1));
        let (y0, y1) = ((2 * y).min(sh - 1), (2 * y + 1).min(sh - 1));
        let at = |px: usize, py: usize| ((z * sh + py) * sw + px) * channels;
        [at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1)]
    };
    let out = |z: usize, x: usize, y: usize| ((z * th + y) * tw + x) * channels;

    if format.is_byte() {
        let src = source.bytes();
        let dst = target.bytes_mut();
        for z in 0..layers {
            for y in 0..th {
                for x in 0..tw {
                    let t = taps(z, x, y);
                    for c in 0..channels {
                        let sum: u32 = t.iter().map(|&i| u32::from(src[i + c])).sum();
                        dst[out(z, x, y) + c] = (sum >> 2) as u8;
                    }
                }
            }
        }
        Ok(())
    } else if format.is_float() {
        let src: &[f32] = bytemuck::try_cast_slice(source.bytes()).map_err(to_backend)?;
        let dst: &mut [f32] =
            bytemuck::try_cast_slice_mut(target.bytes_mut()).map_err(to_backend)?;
        for z in 0..layers {
            for y in 0..th {
                for x in 0..tw {
                    let t = taps(z, x, y);
                    for c in 0..channels {
                        dst[out(z, x, y) + c] = t.iter().map(|&i| src[i + c]).sum::<f32>() * 0.25;
                    }
                }
            }
        }
        Ok(())
    } else {
        Err(ResourceError::Unsupported(format!(
            "mip generation for {format:?} levels"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::math::{Extent3D, Origin3D};
    use kiln_core::renderer::{SamplingParameters, TextureFormat};

    fn descriptor(native: NativeFormat, size: Extent3D, levels: u32) -> NativeTextureDescriptor {
        let format = TextureFormat::from_native(native);
        NativeTextureDescriptor {
            label: None,
            kind: TextureKind::D2,
            size,
            mip_level_count: levels,
            format,
            sampling: SamplingParameters::for_format(&format),
        }
    }

    #[test]
    fn test_write_read_roundtrip() {
        let backend = HeadlessTextureBackend::new();
        let id = backend
            .create_texture(&descriptor(NativeFormat::Rgba8Unorm, Extent3D::new(2, 2, 1), 1))
            .unwrap();
        let mut pixels = PixelBuffer::new(PixelFormat::Byte4, 2, 2, 1).unwrap();
        pixels.set_to_int_color(1, 2, 3, 4).unwrap();
        backend.write_pixels(id, 0, 0, &pixels).unwrap();

        let mut back = PixelBuffer::new(PixelFormat::Byte4, 2, 2, 1).unwrap();
        backend.read_pixels(id, 0, &mut back).unwrap();
        assert_eq!(back, pixels);
    }

    #[test]
    fn test_restricted_readback_expands_channels() {
        let backend = HeadlessTextureBackend::new().with_direct_readback(false);
        let id = backend
            .create_texture(&descriptor(NativeFormat::Rgb8Unorm, Extent3D::new(1, 1, 1), 1))
            .unwrap();
        let pixels = PixelBuffer::from_bytes(PixelFormat::Byte3, 1, 1, 1, &[7, 8, 9]).unwrap();
        backend.write_pixels(id, 0, 0, &pixels).unwrap();

        let mut direct = PixelBuffer::new(PixelFormat::Byte3, 1, 1, 1).unwrap();
        assert!(matches!(
            backend.read_pixels(id, 0, &mut direct),
            Err(ResourceError::Unsupported(_))
        ));
        let mut rgba = PixelBuffer::new(PixelFormat::Byte4, 1, 1, 1).unwrap();
        backend.read_pixels(id, 0, &mut rgba).unwrap();
        assert_eq!(rgba.bytes(), &[7, 8, 9, 255]);
    }

    #[test]
    fn test_copy_region_and_bounds() {
        let backend = HeadlessTextureBackend::new();
        let src = backend
            .create_texture(&descriptor(NativeFormat::R8Unorm, Extent3D::new(4, 4, 1), 1))
            .unwrap();
        let dst = backend
            .create_texture(&descriptor(NativeFormat::R8Unorm, Extent3D::new(2, 2, 1), 1))
            .unwrap();
        let bytes = (0u8..16).collect::<Vec<_>>();
        let pixels = PixelBuffer::from_bytes(PixelFormat::Byte1, 4, 4, 1, &bytes).unwrap();
        backend.write_pixels(src, 0, 0, &pixels).unwrap();

        let mut region = TextureCopyRegion {
            src_level: 0,
            dst_level: 0,
            src_origin: Origin3D::new(2, 2, 0),
            dst_origin: Origin3D::ZERO,
            extent: Extent3D::new(2, 2, 1),
        };
        backend.copy_texture(src, dst, &region).unwrap();
        let mut back = PixelBuffer::new(PixelFormat::Byte1, 2, 2, 1).unwrap();
        backend.read_pixels(dst, 0, &mut back).unwrap();
        assert_eq!(back.bytes(), &[10, 11, 14, 15]);

        region.dst_origin = Origin3D::new(1, 0, 0);
        assert_eq!(
            backend.copy_texture(src, dst, &region),
            Err(ResourceError::OutOfBounds)
        );
    }

    #[test]
    fn test_extreme_offsets_are_out_of_bounds() {
        let backend = HeadlessTextureBackend::new();
        let a = backend
            .create_texture(&descriptor(NativeFormat::R8Unorm, Extent3D::new(2, 2, 1), 1))
            .unwrap();
        let b = backend
            .create_texture(&descriptor(NativeFormat::R8Unorm, Extent3D::new(2, 2, 1), 1))
            .unwrap();

        let pixels = PixelBuffer::new(PixelFormat::Byte1, 2, 2, 1).unwrap();
        assert_eq!(
            backend.write_pixels(a, 0, u32::MAX, &pixels),
            Err(ResourceError::OutOfBounds)
        );

        let mut region = TextureCopyRegion {
            src_level: 0,
            dst_level: 0,
            src_origin: Origin3D::new(u32::MAX, 0, 0),
            dst_origin: Origin3D::ZERO,
            extent: Extent3D::new(2, 2, 1),
        };
        assert_eq!(
            backend.copy_texture(a, b, &region),
            Err(ResourceError::OutOfBounds)
        );
        region.src_origin = Origin3D::ZERO;
        region.dst_origin = Origin3D::new(0, 0, u32::MAX);
        assert_eq!(
            backend.copy_texture(a, b, &region),
            Err(ResourceError::OutOfBounds)
        );
        assert_eq!(backend.write_count(), 0);
        assert_eq!(backend.copy_count(), 0);
    }

    #[test]
    fn test_generate_mipmaps() {
        let backend = HeadlessTextureBackend::new();
        let id = backend
            .create_texture(&descriptor(NativeFormat::R8Unorm, Extent3D::new(2, 2, 1), 2))
            .unwrap();
        let pixels =
            PixelBuffer::from_bytes(PixelFormat::Byte1, 2, 2, 1, &[0, 4, 8, 12]).unwrap();
        backend.write_pixels(id, 0, 0, &pixels).unwrap();
        backend.generate_mipmaps(id).unwrap();
        let mut level1 = PixelBuffer::new(PixelFormat::Byte1, 1, 1, 1).unwrap();
        backend.read_pixels(id, 1, &mut level1).unwrap();
        assert_eq!(level1.bytes(), &[6]);
    }

    #[test]
    fn test_failure_injection_and_counters() {
        let backend = HeadlessTextureBackend::new();
        backend.fail_next_create();
        let desc = descriptor(NativeFormat::Rgba8Unorm, Extent3D::new(1, 1, 1), 1);
        assert!(matches!(
            backend.create_texture(&desc),
            Err(ResourceError::AllocationFailed(_))
        ));
        let id = backend.create_texture(&desc).unwrap();
        assert_eq!(backend.create_count(), 1);
        backend.destroy_texture(id).unwrap();
        assert_eq!(backend.destroy_texture(id), Err(ResourceError::NotFound));
        assert_eq!(backend.destroy_count(), 1);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_unsupported_formats() {
        let backend = HeadlessTextureBackend::new()
            .without_formats(&[NativeFormat::Bc1RgbaUnorm])
            .without_formats_for(TextureKind::Cube, &[NativeFormat::Depth24PlusStencil8]);
        assert!(!backend.supports_format(
            TextureKind::D2,
            NativeFormat::Bc1RgbaUnorm,
            FormatUsage::Mapping
        ));
        assert!(backend.supports_format(
            TextureKind::D2,
            NativeFormat::Depth24PlusStencil8,
            FormatUsage::Fbo
        ));
        assert!(!backend.supports_format(
            TextureKind::Cube,
            NativeFormat::Depth24PlusStencil8,
            FormatUsage::Fbo
        ));
    }
}
