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

use super::mip_map::PixelBufferMipMap;
use super::shape::{Shape1D, Shape2D, ShapeArray, ShapeCube, TextureShape};
use kiln_core::math::{auto_mip_level_count, Extent3D, Origin3D};
use kiln_core::memory::ConsumptionEntry;
use kiln_core::renderer::{
    FormatUsage, LogicalFormat, NativeTextureDescriptor, NativeTextureId, PixelBuffer,
    ReadbackMode, SamplingParameters, TextureCopyRegion, TextureError, TextureFormat,
    TextureState,
};
use kiln_core::RenderContext;
use std::borrow::Cow;
use std::marker::PhantomData;

/// A one-dimensional texture.
pub type Texture1D = GpuTexture<Shape1D>;
/// A two-dimensional texture.
pub type Texture2D = GpuTexture<Shape2D>;
/// A cube map.
pub type CubeMap = GpuTexture<ShapeCube>;
/// A 2D array texture.
pub type ArrayTexture = GpuTexture<ShapeArray>;

/// A region copied by [`GpuTexture::copy_from_region`], expressed at level 0.
///
/// `extent.depth_or_array_layers` layers are copied starting at `src_origin.z` /
/// `dst_origin.z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    /// Size of the copied block.
    pub extent: Extent3D,
    /// Corner in the source texture.
    pub src_origin: Origin3D,
    /// Corner in this texture.
    pub dst_origin: Origin3D,
}

/// A GPU texture owning at most one native handle.
///
/// Changing size, format or mip policy on an allocated texture queues the native handle
/// for delayed destruction and returns the texture to [`TextureState::Uninitialized`];
/// the next operation needing the handle recreates it. Destruction always goes through
/// the render context's delayed operations queue, so dropping a texture is safe on any
/// thread.
#[derive(Debug)]
pub struct GpuTexture<S: TextureShape> {
    context: RenderContext,
    size: S::Size,
    format: Option<TextureFormat>,
    mip_mapped: bool,
    mip_level_count: u32,
    real_mip_level_count: u32,
    native: NativeTextureId,
    state: TextureState,
    memory: ConsumptionEntry,
    debug_label: Option<String>,
    _shape: PhantomData<S>,
}

impl<S: TextureShape> GpuTexture<S> {
    /// Creates an unallocated texture of the default size, using the RGB8 mapping format
    /// when the format table provides one.
    pub fn new(context: &RenderContext) -> Self {
        let format = context
            .formats()
            .resolve(S::KIND, LogicalFormat::Rgb8, FormatUsage::Mapping)
            .ok();
        Self {
            context: context.clone(),
            size: S::DEFAULT_SIZE,
            format,
            mip_mapped: false,
            mip_level_count: 0,
            real_mip_level_count: 0,
            native: NativeTextureId::NULL,
            state: TextureState::Uninitialized,
            memory: ConsumptionEntry::new(context.memory().clone(), S::CATEGORY),
            debug_label: None,
            _shape: PhantomData,
        }
    }

    /// Current size.
    pub fn size(&self) -> S::Size {
        self.size
    }

    /// Base level extent.
    pub fn extent(&self) -> Extent3D {
        S::extent(self.size)
    }

    /// Current format, `None` until one is set if the default could not be resolved.
    pub fn format(&self) -> Option<&TextureFormat> {
        self.format.as_ref()
    }

    /// Whether mip levels are allocated.
    pub fn mip_mapped(&self) -> bool {
        self.mip_mapped
    }

    /// Requested mip level count, `0` for automatic.
    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    /// Mip levels beyond the base actually allocated. Valid levels are `0..=real`.
    pub fn real_mip_level_count(&self) -> u32 {
        self.real_mip_level_count
    }

    /// The native handle, null when not allocated.
    pub fn native_id(&self) -> NativeTextureId {
        self.native
    }

    /// Lifecycle state.
    pub fn state(&self) -> TextureState {
        self.state
    }

    /// `true` when a native handle exists.
    pub fn is_created(&self) -> bool {
        !self.native.is_null()
    }

    /// This texture's current memory contribution, in bytes.
    pub fn memory_usage(&self) -> u64 {
        self.memory.total()
    }

    /// Sets the size. Destroys the native handle if the size changes.
    ///
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If any dimension is below one.
    pub fn set_size(&mut self, size: S::Size) -> Result<(), TextureError> {
        S::validate(size)?;
        if size != self.size {
            self.destroy_texture();
            self.size = size;
        }
        Ok(())
    }

    /// Sets a resolved format. Destroys the native handle if the format changes.
    pub fn set_format(&mut self, format: TextureFormat) {
        if self.format != Some(format) {
            self.destroy_texture();
            self.format = Some(format);
        }
    }

    /// Resolves `logical` in the mapping table for this kind and sets it.
    pub fn set_format_mapping(&mut self, logical: LogicalFormat) -> Result<(), TextureError> {
        let format = self
            .context
            .formats()
            .resolve(S::KIND, logical, FormatUsage::Mapping)?;
        self.set_format(format);
        Ok(())
    }

    /// Resolves `logical` in the render target table for this kind and sets it.
    pub fn set_format_fbo(&mut self, logical: LogicalFormat) -> Result<(), TextureError> {
        let format = self
            .context
            .formats()
            .resolve(S::KIND, logical, FormatUsage::Fbo)?;
        self.set_format(format);
        Ok(())
    }

    /// Sets a sampled-texture format by channel count.
    pub fn set_mapping_format(
        &mut self,
        channels: u32,
        float: bool,
        compressed: bool,
    ) -> Result<(), TextureError> {
        self.set_format_mapping(LogicalFormat::mapping(channels, float, compressed)?)
    }

    /// Sets an 8-bit or 16-bit float render target format by channel count.
    pub fn set_fbo_format(&mut self, channels: u32, float: bool) -> Result<(), TextureError> {
        self.set_format_fbo(LogicalFormat::fbo(channels, float)?)
    }

    /// Sets a 32-bit float render target format by channel count.
    pub fn set_fbo_format_float32(&mut self, channels: u32) -> Result<(), TextureError> {
        self.set_format_fbo(LogicalFormat::fbo_float32(channels)?)
    }

    /// Sets an integral render target format.
    pub fn set_fbo_format_integral(
        &mut self,
        channels: u32,
        bits: u32,
        unsigned: bool,
    ) -> Result<(), TextureError> {
        self.set_format_fbo(LogicalFormat::fbo_integral(channels, bits, unsigned)?)
    }

    /// Sets a signed normalized render target format.
    pub fn set_fbo_format_snorm(&mut self, channels: u32, bits: u32) -> Result<(), TextureError> {
        self.set_format_fbo(LogicalFormat::fbo_snorm(channels, bits)?)
    }

    /// Sets a depth render target format.
    pub fn set_depth_format(&mut self, packed_stencil: bool, float: bool) -> Result<(), TextureError> {
        self.set_format_fbo(LogicalFormat::depth(packed_stencil, float))
    }

    /// Enables or disables mip levels. Destroys the native handle on change.
    pub fn set_mip_mapped(&mut self, mip_mapped: bool) {
        if mip_mapped != self.mip_mapped {
            self.destroy_texture();
            self.mip_mapped = mip_mapped;
        }
    }

    /// Sets the number of levels beyond the base; `0` derives it from the size.
    /// Destroys the native handle on change.
    pub fn set_mip_map_level_count(&mut self, count: u32) {
        if count != self.mip_level_count {
            self.destroy_texture();
            self.mip_level_count = count;
        }
    }

    fn planned_mip_levels(&self) -> u32 {
        if !self.mip_mapped {
            return 0;
        }
        let auto = auto_mip_level_count(self.extent().max_planar());
        match self.mip_level_count {
            0 => auto,
            requested => requested.min(auto),
        }
    }

    /// Allocates the native texture with every mip level. No-op when already allocated.
    ///
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If no format is set.
    /// * `TextureError::AllocationFailure` - If the backend rejected the allocation. Any
    ///   partially created handle has been queued for destruction.
    pub fn create_texture(&mut self) -> Result<(), TextureError> {
        if self.is_created() {
            return Ok(());
        }
        self.context
            .affinity()
            .assert_render_thread("GpuTexture::create_texture");

        let format = self.format.ok_or_else(|| {
            TextureError::invalid(format!("{} texture has no format", S::KIND.label()))
        })?;
        let levels = self.planned_mip_levels();
        let label = match self.context.settings().debug_labels {
            true => self.debug_label.clone().map(Cow::Owned),
            false => None,
        };
        let descriptor = NativeTextureDescriptor {
            label,
            kind: S::KIND,
            size: self.extent(),
            mip_level_count: levels + 1,
            format,
            sampling: SamplingParameters::for_format(&format),
        };

        self.native = self.context.backend().create_texture(&descriptor)?;
        self.real_mip_level_count = levels;
        self.state = TextureState::Allocated;

        if let Err(e) = self.update_memory_usage() {
            log::warn!(
                "GpuTexture: rolling back {} texture {} after failed creation: {e}",
                S::KIND.label(),
                self.native.0
            );
            self.destroy_texture();
            return Err(e);
        }
        self.apply_debug_label();

        log::info!(
            "GpuTexture: created {} texture {} {:?} {:?} with {} levels ({} bytes)",
            S::KIND.label(),
            self.native.0,
            self.size,
            format.native(),
            levels + 1,
            self.memory.total()
        );
        Ok(())
    }

    /// Queues the native handle for delayed destruction and clears the memory contribution.
    pub fn destroy_texture(&mut self) {
        if self.native.is_null() {
            return;
        }
        self.context.delayed().delete_texture(self.native);
        self.native = NativeTextureId::NULL;
        self.state = TextureState::Uninitialized;
        self.memory.clear();
    }

    /// Destroys the native handle right away, bypassing the delayed queue.
    ///
    /// Only valid on the render thread, for objects known not to be referenced by
    /// in-flight work.
    pub fn release_immediately(&mut self) -> Result<(), TextureError> {
        self.context
            .affinity()
            .assert_render_thread("GpuTexture::release_immediately");
        if self.native.is_null() {
            return Ok(());
        }
        let id = std::mem::replace(&mut self.native, NativeTextureId::NULL);
        self.state = TextureState::Uninitialized;
        self.memory.clear();
        self.context.backend().destroy_texture(id)?;
        Ok(())
    }

    /// Size of a mip level: `max(1, size >> level)` per planar axis.
    ///
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If `level` exceeds the realised level count.
    pub fn level_size(&self, level: u32) -> Result<S::Size, TextureError> {
        Ok(S::size_from_extent(self.level_extent(level)?))
    }

    fn level_extent(&self, level: u32) -> Result<Extent3D, TextureError> {
        if level > self.real_mip_level_count {
            return Err(TextureError::invalid(format!(
                "mip level {level} out of range 0..={}",
                self.real_mip_level_count
            )));
        }
        Ok(S::level_extent(self.size, level))
    }

    fn check_buffer(&self, level: u32, pixels: &PixelBuffer) -> Result<(), TextureError> {
        let expected = self.level_extent(level)?;
        if pixels.extent() != expected {
            return Err(TextureError::invalid(format!(
                "pixel buffer {:?} does not match {} level {level} size {:?}",
                pixels.extent(),
                S::KIND.label(),
                expected
            )));
        }
        Ok(())
    }

    /// Uploads level 0.
    pub fn set_pixels(&mut self, pixels: &PixelBuffer) -> Result<(), TextureError> {
        self.set_pixels_level(0, pixels)
    }

    /// Uploads one mip level, creating the texture first if needed.
    ///
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If the buffer size (including layers) does not
    ///   match the level exactly.
    pub fn set_pixels_level(&mut self, level: u32, pixels: &PixelBuffer) -> Result<(), TextureError> {
        self.create_texture()?;
        self.check_buffer(level, pixels)?;
        self.context
            .backend()
            .write_pixels(self.native, level, 0, pixels)?;
        self.state = TextureState::Populated;
        Ok(())
    }

    /// Uploads every level of a mip chain the texture has room for.
    pub fn set_pixels_mip_map(&mut self, chain: &PixelBufferMipMap) -> Result<(), TextureError> {
        self.create_texture()?;
        let last = (chain.level_count() - 1).min(self.real_mip_level_count);
        for level in 0..=last {
            self.set_pixels_level(level, chain.level(level)?)?;
        }
        Ok(())
    }

    /// Downloads level 0.
    pub fn get_pixels(&self, pixels: &mut PixelBuffer) -> Result<(), TextureError> {
        self.get_pixels_level(0, pixels)
    }

    /// Downloads one mip level into a buffer of the level's size. No-op when not allocated.
    ///
    /// Formats the backend cannot read back directly are read into a 4-channel buffer and
    /// truncated.
    pub fn get_pixels_level(&self, level: u32, pixels: &mut PixelBuffer) -> Result<(), TextureError> {
        self.check_buffer(level, pixels)?;
        if self.native.is_null() {
            return Ok(());
        }
        self.context
            .affinity()
            .assert_render_thread("GpuTexture::get_pixels_level");

        let backend = self.context.backend();
        let direct = self.context.settings().direct_readback == ReadbackMode::Auto
            && backend.supports_direct_readback(pixels.format());

        match pixels.format().intermediate_rgba() {
            Some(intermediate) if !direct => {
                let mut staging = PixelBuffer::new(
                    intermediate,
                    pixels.width(),
                    pixels.height(),
                    pixels.depth(),
                )?;
                backend.read_pixels(self.native, level, &mut staging)?;
                pixels.copy_channels_from(&staging)
            }
            _ => Ok(backend.read_pixels(self.native, level, pixels)?),
        }
    }

    /// Regenerates levels 1.. on the GPU. Only for mip-mapped textures with an automatic
    /// level count.
    pub fn create_mip_maps(&mut self) -> Result<(), TextureError> {
        if !self.mip_mapped || self.mip_level_count > 0 || self.native.is_null() {
            return Ok(());
        }
        self.context.backend().generate_mipmaps(self.native)?;
        Ok(())
    }

    /// Copies the whole of `source` (this texture's size) GPU-side.
    pub fn copy_from(&mut self, source: &GpuTexture<S>, with_mip_maps: bool) -> Result<(), TextureError> {
        let region = CopyRegion {
            extent: self.extent(),
            src_origin: Origin3D::ZERO,
            dst_origin: Origin3D::ZERO,
        };
        self.copy_from_region(source, with_mip_maps, region)
    }

    /// Copies a region of `source` GPU-side, level by level when both textures are
    /// mip-mapped and `with_mip_maps` is set.
    ///
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If the region exceeds either texture, or the
    ///   source is not allocated.
    pub fn copy_from_region(
        &mut self,
        source: &GpuTexture<S>,
        with_mip_maps: bool,
        region: CopyRegion,
    ) -> Result<(), TextureError> {
        check_region_bounds(region.dst_origin, region.extent, self.extent(), "destination")?;
        check_region_bounds(region.src_origin, region.extent, source.extent(), "source")?;
        if source.native.is_null() {
            return Err(TextureError::invalid("copy source texture is not allocated"));
        }

        self.create_texture()?;

        let last_level = if with_mip_maps && self.mip_mapped && source.mip_mapped {
            self.real_mip_level_count.min(source.real_mip_level_count)
        } else {
            0
        };

        let mut copy = TextureCopyRegion {
            src_level: 0,
            dst_level: 0,
            src_origin: region.src_origin,
            dst_origin: region.dst_origin,
            extent: region.extent,
        };
        for level in 0..=last_level {
            copy.src_level = level;
            copy.dst_level = level;
            self.context
                .backend()
                .copy_texture(source.native, self.native, &copy)?;

            copy.src_origin = half_origin(copy.src_origin);
            copy.dst_origin = half_origin(copy.dst_origin);
            copy.extent = Extent3D::new(
                (copy.extent.width >> 1).max(1),
                (copy.extent.height >> 1).max(1),
                copy.extent.depth_or_array_layers,
            );
        }
        self.state = TextureState::Populated;
        Ok(())
    }

    /// Recomputes this texture's contribution to the memory tracker.
    ///
    /// Compressed formats ask the backend for the storage really used, since drivers may
    /// silently store small or odd-sized levels uncompressed.
    pub fn update_memory_usage(&mut self) -> Result<(), TextureError> {
        self.memory.clear();
        let Some(format) = self.format else {
            return Ok(());
        };
        if self.native.is_null() {
            return Ok(());
        }

        let levels = self.real_mip_level_count + 1;
        if format.is_compressed() {
            let backend = self.context.backend();
            let mut compressed = Some(0u64);
            for level in 0..levels {
                match backend.compressed_level_size(self.native, level)? {
                    Some(bytes) => compressed = compressed.map(|sum| sum + bytes),
                    None => {
                        compressed = None;
                        break;
                    }
                }
            }
            if let Some(bytes) = compressed {
                self.memory.set_compressed(bytes);
                return Ok(());
            }
        }
        self.memory.set_uncompressed(&format, self.extent(), levels);
        Ok(())
    }

    /// Sets the debug name; the native label becomes `"<kind>: <name>"`.
    pub fn set_debug_name(&mut self, name: &str) {
        self.debug_label = Some(format!("{}: {name}", S::label_prefix()));
        if self.is_created() {
            self.apply_debug_label();
        }
    }

    /// The full debug label, if a name was set.
    pub fn debug_label(&self) -> Option<&str> {
        self.debug_label.as_deref()
    }

    fn apply_debug_label(&self) {
        if !self.context.settings().debug_labels {
            return;
        }
        if let Some(label) = &self.debug_label {
            if let Err(e) = self.context.backend().set_debug_label(self.native, label) {
                log::warn!("GpuTexture: failed to label texture {}: {e}", self.native.0);
            }
        }
    }
}

impl GpuTexture<ShapeArray> {
    /// Number of layers.
    pub fn layer_count(&self) -> u32 {
        self.size.2
    }

    /// Uploads a contiguous run of layers of one mip level, starting at `first_layer`.
    ///
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If the buffer's width or height does not match
    ///   the level, or the layers run past the end of the array.
    pub fn set_pixels_level_layer(
        &mut self,
        level: u32,
        pixels: &PixelBuffer,
        first_layer: u32,
    ) -> Result<(), TextureError> {
        self.create_texture()?;
        let expected = self.level_extent(level)?;
        let layers = self.layer_count();
        if pixels.width() != expected.width
            || pixels.height() != expected.height
            || first_layer
                .checked_add(pixels.depth())
                .is_none_or(|end| end > layers)
        {
            return Err(TextureError::invalid(format!(
                "pixel buffer {:?} at layer {first_layer} does not fit level {level} {:?}",
                pixels.extent(),
                expected
            )));
        }
        self.context
            .backend()
            .write_pixels(self.native, level, first_layer, pixels)?;
        self.state = TextureState::Populated;
        Ok(())
    }
}

impl GpuTexture<Shape2D> {
    /// Width of level 0.
    pub fn width(&self) -> u32 {
        self.size.0
    }

    /// Height of level 0.
    pub fn height(&self) -> u32 {
        self.size.1
    }
}

impl<S: TextureShape> Drop for GpuTexture<S> {
    fn drop(&mut self) {
        self.destroy_texture();
    }
}

fn half_origin(origin: Origin3D) -> Origin3D {
    Origin3D::new(origin.x >> 1, origin.y >> 1, origin.z)
}

fn check_region_bounds(
    origin: Origin3D,
    extent: Extent3D,
    bounds: Extent3D,
    which: &str,
) -> Result<(), TextureError> {
    let fits = |start: u32, len: u32, limit: u32| start.checked_add(len).is_some_and(|end| end <= limit);
    if extent.is_valid()
        && fits(origin.x, extent.width, bounds.width)
        && fits(origin.y, extent.height, bounds.height)
        && fits(origin.z, extent.depth_or_array_layers, bounds.depth_or_array_layers)
    {
        Ok(())
    } else {
        Err(TextureError::invalid(format!(
            "copy {which} region {extent:?} at {origin:?} exceeds {bounds:?}"
        )))
    }
}
