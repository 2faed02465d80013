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

//! Traits and data structures for polling resource usage.

use crate::memory::{MemoryCategory, MemoryConsumptionStats};
use std::borrow::Cow;
use std::fmt::Debug;

/// A stateful object that knows how to report the usage of one resource.
///
/// Implementations live in `kiln-infra`; `kiln-telemetry` keeps them in a registry and
/// polls them.
pub trait ResourceMonitor: Send + Sync + Debug + 'static {
    /// A unique, human-readable identifier for this monitor.
    fn monitor_id(&self) -> Cow<'static, str>;

    /// The kind of resource being monitored.
    fn resource_type(&self) -> MonitoredResourceType;

    /// A snapshot of current usage.
    fn get_usage_report(&self) -> ResourceUsageReport;

    /// Allows downcasting to the concrete monitor.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Polls the resource. Monitors that update passively keep the default no-op.
    fn update(&self) {}
}

/// The resources that can be monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoredResourceType {
    /// GPU memory committed to texture objects.
    TextureMemory,
    /// GPU memory committed to render buffers and skins.
    AuxiliaryGpuMemory,
}

/// A unified usage report, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsageReport {
    /// Bytes currently in use.
    pub current_bytes: u64,
    /// Peak bytes ever in use, if tracked.
    pub peak_bytes: Option<u64>,
    /// Total capacity, if known.
    pub total_capacity_bytes: Option<u64>,
}

/// Per-category texture memory, for diagnostics overlays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureMemoryReport {
    /// Bytes held by 1D textures.
    pub texture_1d_bytes: u64,
    /// Bytes held by 2D textures.
    pub texture_2d_bytes: u64,
    /// Bytes held by cube maps.
    pub texture_cube_bytes: u64,
    /// Bytes held by array textures.
    pub array_texture_bytes: u64,
    /// Of all texture bytes, how many are compressed.
    pub compressed_bytes: u64,
    /// Live texture objects over every texture category.
    pub texture_count: u64,
}

impl TextureMemoryReport {
    /// Builds the report from a tracker snapshot. Transient negative totals read as zero.
    pub fn from_stats(stats: &MemoryConsumptionStats) -> Self {
        let bytes = |c: MemoryCategory| stats.category(c).total_bytes().max(0) as u64;
        let texture_categories = [
            MemoryCategory::Texture1D,
            MemoryCategory::Texture2D,
            MemoryCategory::TextureCube,
            MemoryCategory::ArrayTexture,
        ];
        Self {
            texture_1d_bytes: bytes(MemoryCategory::Texture1D),
            texture_2d_bytes: bytes(MemoryCategory::Texture2D),
            texture_cube_bytes: bytes(MemoryCategory::TextureCube),
            array_texture_bytes: bytes(MemoryCategory::ArrayTexture),
            compressed_bytes: texture_categories
                .iter()
                .map(|c| stats.category(*c).compressed_bytes.max(0) as u64)
                .sum(),
            texture_count: texture_categories
                .iter()
                .map(|c| stats.category(*c).object_count.max(0) as u64)
                .sum(),
        }
    }

    /// Bytes over every texture category.
    pub fn total_bytes(&self) -> u64 {
        self.texture_1d_bytes
            + self.texture_2d_bytes
            + self.texture_cube_bytes
            + self.array_texture_bytes
    }

    /// Total in megabytes.
    pub fn total_mb(&self) -> f64 {
        self.total_bytes() as f64 / (1024.0 * 1024.0)
    }
}
