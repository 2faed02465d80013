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

//! Texture memory resource monitor.
//!
//! Reads the shared [`MemoryConsumption`] tracker that every texture reports into and
//! keeps the last per-category breakdown for diagnostics overlays.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use kiln_core::memory::{MemoryCategory, MemoryConsumption};
use kiln_core::telemetry::monitoring::{
    MonitoredResourceType, ResourceMonitor, ResourceUsageReport, TextureMemoryReport,
};

/// Monitor over the texture categories of a memory tracker.
#[derive(Debug)]
pub struct TextureMemoryMonitor {
    id: String,
    tracker: Arc<MemoryConsumption>,
    last_report: Mutex<Option<TextureMemoryReport>>,
}

impl TextureMemoryMonitor {
    /// Creates a monitor reading `tracker`.
    pub fn new(id: impl Into<String>, tracker: Arc<MemoryConsumption>) -> Self {
        Self {
            id: id.into(),
            tracker,
            last_report: Mutex::new(None),
        }
    }

    /// The breakdown captured by the last [`update`](ResourceMonitor::update).
    pub fn get_texture_report(&self) -> Option<TextureMemoryReport> {
        self.last_report.lock().ok().and_then(|r| *r)
    }
}

impl ResourceMonitor for TextureMemoryMonitor {
    fn monitor_id(&self) -> Cow<'static, str> {
        Cow::Owned(format!("TextureMemory_{}", self.id))
    }

    fn resource_type(&self) -> MonitoredResourceType {
        MonitoredResourceType::TextureMemory
    }

    fn get_usage_report(&self) -> ResourceUsageReport {
        let stats = self.tracker.snapshot();
        let report = TextureMemoryReport::from_stats(&stats);
        ResourceUsageReport {
            current_bytes: report.total_bytes(),
            peak_bytes: Some(stats.peak_total_bytes.max(0) as u64),
            total_capacity_bytes: None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn update(&self) {
        let report = TextureMemoryReport::from_stats(&self.tracker.snapshot());
        match self.last_report.lock() {
            Ok(mut last) => *last = Some(report),
            Err(e) => log::warn!("TextureMemoryMonitor: report lock poisoned: {}", e),
        }
    }
}

/// Monitor over render buffers and skins, which share the tracker with textures.
#[derive(Debug)]
pub struct AuxiliaryMemoryMonitor {
    tracker: Arc<MemoryConsumption>,
}

impl AuxiliaryMemoryMonitor {
    /// Creates a monitor reading `tracker`.
    pub fn new(tracker: Arc<MemoryConsumption>) -> Self {
        Self { tracker }
    }
}

impl ResourceMonitor for AuxiliaryMemoryMonitor {
    fn monitor_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("AuxiliaryGpuMemory")
    }

    fn resource_type(&self) -> MonitoredResourceType {
        MonitoredResourceType::AuxiliaryGpuMemory
    }

    fn get_usage_report(&self) -> ResourceUsageReport {
        let stats = self.tracker.snapshot();
        let bytes = [MemoryCategory::RenderBuffer, MemoryCategory::Skin]
            .iter()
            .map(|c| stats.category(*c).total_bytes().max(0) as u64)
            .sum();
        ResourceUsageReport {
            current_bytes: bytes,
            peak_bytes: None,
            total_capacity_bytes: None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_monitor_reports_texture_categories_only() {
        let tracker = Arc::new(MemoryConsumption::new());
        tracker.increase_by(MemoryCategory::Texture2D, 0, 4096);
        tracker.increase_by(MemoryCategory::Skin, 0, 100);
        let monitor = TextureMemoryMonitor::new("main", tracker.clone());

        assert_eq!(monitor.monitor_id(), "TextureMemory_main");
        assert_eq!(monitor.resource_type(), MonitoredResourceType::TextureMemory);
        assert_eq!(monitor.get_usage_report().current_bytes, 4096);
        assert_eq!(monitor.get_usage_report().peak_bytes, Some(4196));

        assert!(monitor.get_texture_report().is_none());
        monitor.update();
        assert_eq!(monitor.get_texture_report().unwrap().texture_2d_bytes, 4096);
    }

    #[test]
    fn auxiliary_monitor_sums_buffers_and_skins() {
        let tracker = Arc::new(MemoryConsumption::new());
        tracker.increase_by(MemoryCategory::RenderBuffer, 0, 10);
        tracker.increase_by(MemoryCategory::Skin, 5, 0);
        tracker.increase_by(MemoryCategory::TextureCube, 0, 1000);
        let monitor = AuxiliaryMemoryMonitor::new(tracker);
        assert_eq!(monitor.get_usage_report().current_bytes, 15);
    }
}
