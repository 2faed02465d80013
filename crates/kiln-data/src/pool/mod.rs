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

//! Pools of render target textures reused across passes and frames.
//!
//! A pool owns its textures and lends them to one consumer at a time through the in-use
//! flag. Pools only grow while rendering; [`RenderablePool::trim_unused`] releases free
//! entries explicitly, for example after a resolution change.

use crate::texture::{GpuTexture, Shape1D, Shape2D, ShapeArray, ShapeCube, TextureShape};
use kiln_core::renderer::{FormatUsage, LogicalFormat, TextureError, TextureFormat};
use kiln_core::RenderContext;

/// Index of an entry in a [`RenderablePool`]. Stays valid until the entry is trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolSlot(usize);

impl PoolSlot {
    /// The raw entry index.
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct PoolEntry<S: TextureShape> {
    size: S::Size,
    format: TextureFormat,
    in_use: bool,
    texture: GpuTexture<S>,
}

/// A pool of render target textures of one kind, keyed by size and format.
#[derive(Debug)]
pub struct RenderablePool<S: TextureShape> {
    context: RenderContext,
    entries: Vec<Option<PoolEntry<S>>>,
}

impl<S: TextureShape> RenderablePool<S> {
    /// Creates an empty pool.
    pub fn new(context: &RenderContext) -> Self {
        Self {
            context: context.clone(),
            entries: Vec::new(),
        }
    }

    /// Lends a free texture of exactly `size` and `format`, creating one if none is free.
    ///
    /// ## Arguments
    /// * `size` - The texture size.
    /// * `format` - The resolved texture format.
    /// ## Returns
    /// The slot of the entry, now marked in use.
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If `size` is invalid.
    /// * `TextureError::AllocationFailure` - If a new texture could not be created.
    pub fn get_texture_with(
        &mut self,
        size: S::Size,
        format: TextureFormat,
    ) -> Result<PoolSlot, TextureError> {
        let hit = self.entries.iter_mut().enumerate().find_map(|(index, entry)| {
            entry
                .as_mut()
                .filter(|e| !e.in_use && e.size == size && e.format == format)
                .map(|e| (index, e))
        });
        if let Some((index, entry)) = hit {
            entry.in_use = true;
            return Ok(PoolSlot(index));
        }

        let mut texture = GpuTexture::<S>::new(&self.context);
        texture.set_size(size)?;
        texture.set_format(format);
        texture.create_texture()?;

        let entry = PoolEntry {
            size,
            format,
            in_use: true,
            texture,
        };
        let index = match self.entries.iter().position(Option::is_none) {
            Some(hole) => {
                self.entries[hole] = Some(entry);
                hole
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };

        let count = self.len();
        log::debug!(
            "RenderablePool: new {} entry {:?} {:?}, {} entries",
            S::KIND.label(),
            size,
            format.native(),
            count
        );
        if let Some(cap) = self.context.settings().pool_soft_cap {
            if count > cap {
                log::warn!(
                    "RenderablePool: {} pool holds {count} entries, above the soft cap of {cap}",
                    S::KIND.label()
                );
            }
        }
        Ok(PoolSlot(index))
    }

    /// Lends a color render target with `channels` 8-bit or 16-bit float channels.
    pub fn get_color(
        &mut self,
        size: S::Size,
        channels: u32,
        float: bool,
    ) -> Result<PoolSlot, TextureError> {
        let format = self.resolve_fbo(LogicalFormat::fbo(channels, float)?)?;
        self.get_texture_with(size, format)
    }

    /// Lends a depth render target.
    pub fn get_depth(
        &mut self,
        size: S::Size,
        packed_stencil: bool,
        float: bool,
    ) -> Result<PoolSlot, TextureError> {
        let format = self.resolve_fbo(LogicalFormat::depth(packed_stencil, float))?;
        self.get_texture_with(size, format)
    }

    fn resolve_fbo(&self, logical: LogicalFormat) -> Result<TextureFormat, TextureError> {
        self.context
            .formats()
            .resolve(S::KIND, logical, FormatUsage::Fbo)
    }

    fn entry(&self, slot: PoolSlot) -> Result<&PoolEntry<S>, TextureError> {
        self.entries
            .get(slot.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| TextureError::invalid(format!("no pool entry at slot {}", slot.0)))
    }

    fn entry_mut(&mut self, slot: PoolSlot) -> Result<&mut PoolEntry<S>, TextureError> {
        self.entries
            .get_mut(slot.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| TextureError::invalid(format!("no pool entry at slot {}", slot.0)))
    }

    /// The texture behind a slot.
    pub fn texture(&self, slot: PoolSlot) -> Result<&GpuTexture<S>, TextureError> {
        Ok(&self.entry(slot)?.texture)
    }

    /// The texture behind a slot, mutable for uploads and copies.
    ///
    /// Changing the texture's size or format would break the entry's key, so callers
    /// should only write pixels.
    pub fn texture_mut(&mut self, slot: PoolSlot) -> Result<&mut GpuTexture<S>, TextureError> {
        Ok(&mut self.entry_mut(slot)?.texture)
    }

    /// Whether the entry is lent out.
    pub fn is_in_use(&self, slot: PoolSlot) -> Result<bool, TextureError> {
        Ok(self.entry(slot)?.in_use)
    }

    /// Sets the in-use flag of an entry.
    pub fn set_in_use(&mut self, slot: PoolSlot, in_use: bool) -> Result<(), TextureError> {
        self.entry_mut(slot)?.in_use = in_use;
        Ok(())
    }

    /// Returns an entry to the pool.
    pub fn release(&mut self, slot: PoolSlot) -> Result<(), TextureError> {
        self.set_in_use(slot, false)
    }

    /// Number of entries, lent or free.
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// `true` if the pool holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lent entries.
    pub fn in_use_count(&self) -> usize {
        self.entries.iter().flatten().filter(|e| e.in_use).count()
    }

    /// Drops every free entry, queuing its texture for delayed destruction.
    ///
    /// ## Returns
    /// The number of entries removed. Slots of lent entries stay valid.
    pub fn trim_unused(&mut self) -> usize {
        let mut removed = 0;
        for entry in self.entries.iter_mut() {
            if entry.as_ref().is_some_and(|e| !e.in_use) {
                *entry = None;
                removed += 1;
            }
        }
        while matches!(self.entries.last(), Some(None)) {
            self.entries.pop();
        }
        if removed > 0 {
            log::debug!(
                "RenderablePool: trimmed {removed} free {} entries",
                S::KIND.label()
            );
        }
        removed
    }
}

/// The render target pools of one render thread.
#[derive(Debug)]
pub struct RenderablePools {
    textures_1d: RenderablePool<Shape1D>,
    textures: RenderablePool<Shape2D>,
    cube_maps: RenderablePool<ShapeCube>,
    array_textures: RenderablePool<ShapeArray>,
}

impl RenderablePools {
    /// Creates empty pools.
    pub fn new(context: &RenderContext) -> Self {
        Self {
            textures_1d: RenderablePool::new(context),
            textures: RenderablePool::new(context),
            cube_maps: RenderablePool::new(context),
            array_textures: RenderablePool::new(context),
        }
    }

    /// 1D render targets.
    pub fn textures_1d(&mut self) -> &mut RenderablePool<Shape1D> {
        &mut self.textures_1d
    }

    /// 2D render targets.
    pub fn textures(&mut self) -> &mut RenderablePool<Shape2D> {
        &mut self.textures
    }

    /// Cube map render targets.
    pub fn cube_maps(&mut self) -> &mut RenderablePool<ShapeCube> {
        &mut self.cube_maps
    }

    /// Array render targets.
    pub fn array_textures(&mut self) -> &mut RenderablePool<ShapeArray> {
        &mut self.array_textures
    }

    /// Entries across all pools.
    pub fn len(&self) -> usize {
        self.textures_1d.len()
            + self.textures.len()
            + self.cube_maps.len()
            + self.array_textures.len()
    }

    /// `true` if every pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trims every pool, returning the total number of entries removed.
    pub fn trim_unused(&mut self) -> usize {
        self.textures_1d.trim_unused()
            + self.textures.trim_unused()
            + self.cube_maps.trim_unused()
            + self.array_textures.trim_unused()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::renderer::RenderSettings;
    use kiln_infra::graphics::headless::HeadlessTextureBackend;
    use std::sync::Arc;

    fn context() -> (Arc<HeadlessTextureBackend>, RenderContext) {
        let backend = Arc::new(HeadlessTextureBackend::new());
        let ctx = RenderContext::detect(backend.clone(), RenderSettings::default()).unwrap();
        (backend, ctx)
    }

    #[test]
    fn test_released_entry_is_reused() {
        let (backend, ctx) = context();
        let mut pool = RenderablePool::<Shape2D>::new(&ctx);

        let first = pool.get_color((64, 64), 4, false).unwrap();
        let native = pool.texture(first).unwrap().native_id();
        pool.release(first).unwrap();
        assert_eq!(backend.create_count(), 1);

        let again = pool.get_color((64, 64), 4, false).unwrap();
        assert_eq!(again, first);
        assert_eq!(pool.texture(again).unwrap().native_id(), native);
        assert_eq!(backend.create_count(), 1);
        assert!(pool.is_in_use(again).unwrap());
    }

    #[test]
    fn test_released_1d_entry_is_reused() {
        let (backend, ctx) = context();
        let mut pools = RenderablePools::new(&ctx);

        let first = pools.textures_1d().get_color(256, 4, true).unwrap();
        let native = pools.textures_1d().texture(first).unwrap().native_id();
        assert_eq!(pools.textures_1d().texture(first).unwrap().size(), 256);
        pools.textures_1d().release(first).unwrap();

        let again = pools.textures_1d().get_color(256, 4, true).unwrap();
        assert_eq!(again, first);
        assert_eq!(pools.textures_1d().texture(again).unwrap().native_id(), native);
        assert_eq!(backend.create_count(), 1);

        let depth = pools.textures_1d().get_depth(256, false, false).unwrap();
        assert_ne!(depth, again);
        assert_eq!(pools.len(), 2);
        assert_eq!(backend.create_count(), 2);
    }

    #[test]
    fn test_in_use_or_novel_key_creates_one_entry() {
        let (backend, ctx) = context();
        let mut pool = RenderablePool::<Shape2D>::new(&ctx);

        let a = pool.get_color((32, 32), 4, false).unwrap();
        let b = pool.get_color((32, 32), 4, false).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.create_count(), 2);

        pool.release(a).unwrap();
        let c = pool.get_color((16, 32), 4, false).unwrap();
        assert_ne!(c, a);
        assert_eq!(backend.create_count(), 3);

        let d = pool.get_depth((32, 32), false, false).unwrap();
        assert_ne!(d, a);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.in_use_count(), 3);
    }

    #[test]
    fn test_trim_keeps_lent_slots() {
        let (backend, ctx) = context();
        let mut pool = RenderablePool::<Shape2D>::new(&ctx);
        let a = pool.get_color((8, 8), 1, false).unwrap();
        let b = pool.get_color((8, 8), 1, false).unwrap();
        pool.release(a).unwrap();

        assert_eq!(pool.trim_unused(), 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.texture(b).unwrap().is_created());
        assert!(pool.texture(a).is_err());

        ctx.delayed().drain(ctx.backend());
        assert_eq!(backend.live_count(), 1);

        // the freed hole is filled before the pool grows
        let c = pool.get_color((4, 4), 1, false).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_soft_cap_only_warns() {
        let backend = Arc::new(HeadlessTextureBackend::new());
        let settings = RenderSettings {
            pool_soft_cap: Some(1),
            ..RenderSettings::default()
        };
        let ctx = RenderContext::detect(backend, settings).unwrap();
        let mut pools = RenderablePools::new(&ctx);
        pools.cube_maps().get_color(16, 4, true).unwrap();
        pools.cube_maps().get_color(16, 4, true).unwrap();
        pools.array_textures().get_color((8, 8, 2), 4, false).unwrap();
        assert_eq!(pools.len(), 3);
    }

    #[test]
    fn test_invalid_size_creates_nothing() {
        let (backend, ctx) = context();
        let mut pool = RenderablePool::<Shape2D>::new(&ctx);
        assert!(pool.get_color((0, 8), 4, false).is_err());
        assert!(pool.is_empty());
        assert_eq!(backend.create_count(), 0);
    }
}
