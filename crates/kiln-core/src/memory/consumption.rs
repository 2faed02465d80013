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

use crate::math::Extent3D;
use crate::renderer::api::TextureFormat;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A bucket GPU memory is accounted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryCategory {
    /// One-dimensional textures.
    Texture1D,
    /// Two-dimensional textures.
    Texture2D,
    /// Cube maps.
    TextureCube,
    /// Array textures.
    ArrayTexture,
    /// Render buffers.
    RenderBuffer,
    /// Skin-owned resources.
    Skin,
}

impl MemoryCategory {
    /// All categories, in snapshot order.
    pub const ALL: [MemoryCategory; 6] = [
        MemoryCategory::Texture1D,
        MemoryCategory::Texture2D,
        MemoryCategory::TextureCube,
        MemoryCategory::ArrayTexture,
        MemoryCategory::RenderBuffer,
        MemoryCategory::Skin,
    ];

    const fn index(self) -> usize {
        match self {
            MemoryCategory::Texture1D => 0,
            MemoryCategory::Texture2D => 1,
            MemoryCategory::TextureCube => 2,
            MemoryCategory::ArrayTexture => 3,
            MemoryCategory::RenderBuffer => 4,
            MemoryCategory::Skin => 5,
        }
    }

    /// Name used in telemetry reports.
    pub const fn label(self) -> &'static str {
        match self {
            MemoryCategory::Texture1D => "texture1D",
            MemoryCategory::Texture2D => "texture2D",
            MemoryCategory::TextureCube => "textureCube",
            MemoryCategory::ArrayTexture => "arrayTexture",
            MemoryCategory::RenderBuffer => "renderBuffer",
            MemoryCategory::Skin => "skin",
        }
    }
}

#[derive(Debug, Default)]
struct CategoryCounters {
    compressed: AtomicI64,
    uncompressed: AtomicI64,
    count: AtomicI64,
}

/// Running totals of GPU memory committed per category.
///
/// Totals are signed: a resize destroys the old contribution before the new one is
/// added, and the two halves may be observed separately. Once delayed operations are
/// drained every total is non-negative, which [`debug_assert_settled`](Self::debug_assert_settled)
/// checks.
#[derive(Debug, Default)]
pub struct MemoryConsumption {
    categories: [CategoryCounters; 6],
    peak_total: AtomicI64,
}

impl MemoryConsumption {
    /// Creates a tracker with every total at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds signed byte deltas to a category.
    pub fn increase_by(&self, category: MemoryCategory, compressed_delta: i64, uncompressed_delta: i64) {
        let counters = &self.categories[category.index()];
        counters
            .compressed
            .fetch_add(compressed_delta, Ordering::Relaxed);
        counters
            .uncompressed
            .fetch_add(uncompressed_delta, Ordering::Relaxed);

        if compressed_delta > 0 || uncompressed_delta > 0 {
            self.peak_total
                .fetch_max(self.total_bytes(), Ordering::Relaxed);
        }
    }

    /// Adds a signed delta to a category's live object count.
    pub fn adjust_count(&self, category: MemoryCategory, delta: i64) {
        self.categories[category.index()]
            .count
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Compressed plus uncompressed bytes over every category.
    pub fn total_bytes(&self) -> i64 {
        self.categories
            .iter()
            .map(|c| c.compressed.load(Ordering::Relaxed) + c.uncompressed.load(Ordering::Relaxed))
            .sum()
    }

    /// Takes a snapshot of every counter.
    pub fn snapshot(&self) -> MemoryConsumptionStats {
        let mut stats = MemoryConsumptionStats {
            peak_total_bytes: self.peak_total.load(Ordering::Relaxed),
            ..Default::default()
        };
        for (slot, counters) in stats.categories.iter_mut().zip(&self.categories) {
            *slot = CategoryStats {
                compressed_bytes: counters.compressed.load(Ordering::Relaxed),
                uncompressed_bytes: counters.uncompressed.load(Ordering::Relaxed),
                object_count: counters.count.load(Ordering::Relaxed),
            };
        }
        stats.calculate_totals();
        stats
    }

    /// Zeroes every counter. Only valid at render thread init or teardown.
    pub fn reset(&self) {
        for counters in &self.categories {
            counters.compressed.store(0, Ordering::Relaxed);
            counters.uncompressed.store(0, Ordering::Relaxed);
            counters.count.store(0, Ordering::Relaxed);
        }
        self.peak_total.store(0, Ordering::Relaxed);
    }

    /// Panics in debug builds if any total is negative. Call after draining delayed operations.
    pub fn debug_assert_settled(&self) {
        if cfg!(debug_assertions) {
            let stats = self.snapshot();
            for category in MemoryCategory::ALL {
                let c = stats.category(category);
                assert!(
                    c.compressed_bytes >= 0 && c.uncompressed_bytes >= 0 && c.object_count >= 0,
                    "MemoryConsumption: negative settled total for {}: {:?}",
                    category.label(),
                    c
                );
            }
        }
    }
}

/// Counters of one category at snapshot time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    /// Bytes held in compressed formats.
    pub compressed_bytes: i64,
    /// Bytes held in uncompressed formats.
    pub uncompressed_bytes: i64,
    /// Live objects contributing to this category.
    pub object_count: i64,
}

impl CategoryStats {
    /// Compressed plus uncompressed bytes.
    pub fn total_bytes(&self) -> i64 {
        self.compressed_bytes + self.uncompressed_bytes
    }
}

/// A snapshot of the tracker, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryConsumptionStats {
    categories: [CategoryStats; 6],
    /// Sum of compressed bytes over every category.
    pub compressed_bytes: i64,
    /// Sum of uncompressed bytes over every category.
    pub uncompressed_bytes: i64,
    /// Highest total ever observed since the last reset.
    pub peak_total_bytes: i64,
}

impl MemoryConsumptionStats {
    fn calculate_totals(&mut self) {
        self.compressed_bytes = self.categories.iter().map(|c| c.compressed_bytes).sum();
        self.uncompressed_bytes = self.categories.iter().map(|c| c.uncompressed_bytes).sum();
    }

    /// Counters for one category.
    pub fn category(&self, category: MemoryCategory) -> CategoryStats {
        self.categories[category.index()]
    }

    /// Compressed plus uncompressed bytes.
    pub fn total_bytes(&self) -> i64 {
        self.compressed_bytes + self.uncompressed_bytes
    }
}

/// One object's contribution to a [`MemoryConsumption`] tracker.
///
/// Setting a new value first withdraws the previous one. Dropping the entry withdraws
/// whatever it still contributes.
#[derive(Debug)]
pub struct ConsumptionEntry {
    tracker: Arc<MemoryConsumption>,
    category: MemoryCategory,
    compressed: i64,
    uncompressed: i64,
    counted: bool,
}

impl ConsumptionEntry {
    /// Creates an empty entry accounting under `category`.
    pub fn new(tracker: Arc<MemoryConsumption>, category: MemoryCategory) -> Self {
        Self {
            tracker,
            category,
            compressed: 0,
            uncompressed: 0,
            counted: false,
        }
    }

    /// The category this entry accounts under.
    pub fn category(&self) -> MemoryCategory {
        self.category
    }

    /// Current compressed contribution.
    pub fn compressed(&self) -> u64 {
        self.compressed as u64
    }

    /// Current uncompressed contribution.
    pub fn uncompressed(&self) -> u64 {
        self.uncompressed as u64
    }

    /// Compressed plus uncompressed contribution.
    pub fn total(&self) -> u64 {
        self.compressed() + self.uncompressed()
    }

    /// Replaces the contribution with `bytes` of compressed storage.
    pub fn set_compressed(&mut self, bytes: u64) {
        self.clear();
        self.compressed = bytes as i64;
        self.commit();
    }

    /// Replaces the contribution with the uncompressed size of `levels` mip levels of
    /// `size` in `format`. Layers are not halved per level.
    pub fn set_uncompressed(&mut self, format: &TextureFormat, size: Extent3D, levels: u32) {
        self.clear();
        self.uncompressed = (0..levels.max(1))
            .map(|level| {
                let e = size.mip_level(level);
                format.uncompressed_bytes(e.width, e.height, e.depth_or_array_layers)
            })
            .sum::<u64>() as i64;
        self.commit();
    }

    /// Withdraws the whole contribution.
    pub fn clear(&mut self) {
        if self.counted {
            self.tracker
                .increase_by(self.category, -self.compressed, -self.uncompressed);
            self.tracker.adjust_count(self.category, -1);
            self.counted = false;
        }
        self.compressed = 0;
        self.uncompressed = 0;
    }

    fn commit(&mut self) {
        self.tracker
            .increase_by(self.category, self.compressed, self.uncompressed);
        self.tracker.adjust_count(self.category, 1);
        self.counted = true;
    }
}

impl Drop for ConsumptionEntry {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::NativeFormat;

    #[test]
    fn test_increase_by_is_additive() {
        let tracker = MemoryConsumption::new();
        tracker.increase_by(MemoryCategory::Texture2D, 100, 50);
        tracker.increase_by(MemoryCategory::Texture2D, -40, 10);
        tracker.increase_by(MemoryCategory::Skin, 0, 7);
        let stats = tracker.snapshot();
        assert_eq!(stats.category(MemoryCategory::Texture2D).compressed_bytes, 60);
        assert_eq!(stats.category(MemoryCategory::Texture2D).uncompressed_bytes, 60);
        assert_eq!(stats.total_bytes(), 127);
        assert_eq!(stats.peak_total_bytes, 160);
    }

    #[test]
    fn test_transient_negative_is_tolerated() {
        let tracker = MemoryConsumption::new();
        tracker.increase_by(MemoryCategory::TextureCube, 0, -64);
        assert_eq!(tracker.total_bytes(), -64);
        tracker.increase_by(MemoryCategory::TextureCube, 0, 64);
        tracker.debug_assert_settled();
    }

    #[test]
    #[should_panic(expected = "negative settled total")]
    #[cfg(debug_assertions)]
    fn test_settled_assert_catches_negative() {
        let tracker = MemoryConsumption::new();
        tracker.increase_by(MemoryCategory::RenderBuffer, -1, 0);
        tracker.debug_assert_settled();
    }

    #[test]
    fn test_entry_replaces_and_drops() {
        let tracker = Arc::new(MemoryConsumption::new());
        let format = TextureFormat::from_native(NativeFormat::Rgba8Unorm);
        {
            let mut entry = ConsumptionEntry::new(tracker.clone(), MemoryCategory::Texture2D);
            entry.set_uncompressed(&format, Extent3D::new(4, 4, 1), 3);
            // 64 + 16 + 4
            assert_eq!(entry.uncompressed(), 84);
            assert_eq!(tracker.total_bytes(), 84);

            entry.set_compressed(32);
            assert_eq!(tracker.snapshot().compressed_bytes, 32);
            assert_eq!(tracker.snapshot().uncompressed_bytes, 0);
            assert_eq!(
                tracker.snapshot().category(MemoryCategory::Texture2D).object_count,
                1
            );
        }
        assert_eq!(tracker.total_bytes(), 0);
        assert_eq!(
            tracker.snapshot().category(MemoryCategory::Texture2D).object_count,
            0
        );
    }

    #[test]
    fn test_cube_layers_not_halved() {
        let tracker = Arc::new(MemoryConsumption::new());
        let format = TextureFormat::from_native(NativeFormat::R8Unorm);
        let mut entry = ConsumptionEntry::new(tracker.clone(), MemoryCategory::TextureCube);
        entry.set_uncompressed(&format, Extent3D::new(2, 2, 6), 2);
        assert_eq!(entry.uncompressed(), 4 * 6 + 6);
    }

    #[test]
    fn test_reset() {
        let tracker = MemoryConsumption::new();
        tracker.increase_by(MemoryCategory::Texture1D, 5, 5);
        tracker.reset();
        assert_eq!(tracker.snapshot(), MemoryConsumptionStats::default());
    }
}
