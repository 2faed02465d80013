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

//! Registry for managing resource monitors.

use kiln_core::telemetry::{MonitoredResourceType, ResourceMonitor, ResourceUsageReport};
use std::sync::{Arc, Mutex, MutexGuard};

/// A thread-safe registry for resource monitors.
#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    monitors: Arc<Mutex<Vec<Arc<dyn ResourceMonitor>>>>,
}

impl MonitorRegistry {
    /// Creates a new, empty monitor registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn monitors(&self) -> MutexGuard<'_, Vec<Arc<dyn ResourceMonitor>>> {
        // A panicking monitor leaves the list itself intact.
        self.monitors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new resource monitor.
    pub fn register(&self, monitor: Arc<dyn ResourceMonitor>) {
        let monitor_id = monitor.monitor_id().to_string();
        self.monitors().push(monitor);
        log::info!("Registered resource monitor: {}", monitor_id);
    }

    /// Removes every monitor with the given id. Returns how many were removed.
    pub fn unregister(&self, monitor_id: &str) -> usize {
        let mut monitors = self.monitors();
        let before = monitors.len();
        monitors.retain(|m| m.monitor_id() != monitor_id);
        before - monitors.len()
    }

    /// Calls the `update` method on all registered monitors.
    pub fn update_all(&self) {
        for monitor in self.monitors().iter() {
            monitor.update();
        }
    }

    /// Returns a clone of all registered monitors.
    pub fn get_all_monitors(&self) -> Vec<Arc<dyn ResourceMonitor>> {
        self.monitors().clone()
    }

    /// Sums the current usage of every monitor of `resource_type`.
    pub fn usage_of(&self, resource_type: MonitoredResourceType) -> ResourceUsageReport {
        self.monitors()
            .iter()
            .filter(|m| m.resource_type() == resource_type)
            .map(|m| m.get_usage_report())
            .fold(ResourceUsageReport::default(), |total, report| ResourceUsageReport {
                current_bytes: total.current_bytes + report.current_bytes,
                peak_bytes: match (total.peak_bytes, report.peak_bytes) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                },
                total_capacity_bytes: total.total_capacity_bytes.or(report.total_capacity_bytes),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FixedMonitor {
        id: &'static str,
        bytes: u64,
        updates: AtomicUsize,
    }

    impl FixedMonitor {
        fn new(id: &'static str, bytes: u64) -> Arc<Self> {
            Arc::new(Self {
                id,
                bytes,
                updates: AtomicUsize::new(0),
            })
        }
    }

    impl ResourceMonitor for FixedMonitor {
        fn monitor_id(&self) -> Cow<'static, str> {
            Cow::Borrowed(self.id)
        }

        fn resource_type(&self) -> MonitoredResourceType {
            MonitoredResourceType::TextureMemory
        }

        fn get_usage_report(&self) -> ResourceUsageReport {
            ResourceUsageReport {
                current_bytes: self.bytes,
                peak_bytes: Some(self.bytes),
                total_capacity_bytes: None,
            }
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn update(&self) {
            self.updates.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_register_update_and_sum() {
        let registry = MonitorRegistry::new();
        let a = FixedMonitor::new("a", 100);
        let b = FixedMonitor::new("b", 50);
        registry.register(a.clone());
        registry.register(b.clone());

        registry.update_all();
        assert_eq!(a.updates.load(Ordering::Relaxed), 1);
        assert_eq!(registry.get_all_monitors().len(), 2);

        let usage = registry.usage_of(MonitoredResourceType::TextureMemory);
        assert_eq!(usage.current_bytes, 150);
        assert_eq!(usage.peak_bytes, Some(150));
        assert_eq!(
            registry
                .usage_of(MonitoredResourceType::AuxiliaryGpuMemory)
                .current_bytes,
            0
        );

        assert_eq!(registry.unregister("a"), 1);
        assert_eq!(registry.get_all_monitors().len(), 1);
    }

    #[test]
    fn test_downcast_through_registry() {
        let registry = MonitorRegistry::new();
        registry.register(FixedMonitor::new("only", 1));
        let monitors = registry.get_all_monitors();
        let fixed = monitors[0].as_any().downcast_ref::<FixedMonitor>();
        assert_eq!(fixed.map(|m| m.bytes), Some(1));
    }
}
