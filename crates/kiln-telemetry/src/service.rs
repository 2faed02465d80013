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

//! Interval-gated polling of the monitor registry.

use crate::monitoring::MonitorRegistry;
use kiln_core::telemetry::{MonitoredResourceType, ResourceUsageReport};
use std::time::{Duration, Instant};

/// Polls every registered monitor at most once per interval and keeps the last totals.
#[derive(Debug)]
pub struct TelemetryService {
    registry: MonitorRegistry,
    interval: Duration,
    last_poll: Option<Instant>,
    polls: u64,
    texture_usage: ResourceUsageReport,
    auxiliary_usage: ResourceUsageReport,
}

impl TelemetryService {
    /// A service polling no more often than `interval`. The first tick always polls.
    pub fn new(interval: Duration) -> Self {
        Self {
            registry: MonitorRegistry::new(),
            interval,
            last_poll: None,
            polls: 0,
            texture_usage: ResourceUsageReport::default(),
            auxiliary_usage: ResourceUsageReport::default(),
        }
    }

    /// Call once per frame. Returns `true` when the monitors were polled.
    pub fn tick(&mut self) -> bool {
        let due = self
            .last_poll
            .is_none_or(|last| last.elapsed() >= self.interval);
        if due {
            self.poll();
        }
        due
    }

    /// Polls now, regardless of the interval.
    pub fn poll(&mut self) {
        self.registry.update_all();
        self.texture_usage = self.registry.usage_of(MonitoredResourceType::TextureMemory);
        self.auxiliary_usage = self
            .registry
            .usage_of(MonitoredResourceType::AuxiliaryGpuMemory);
        self.last_poll = Some(Instant::now());
        self.polls += 1;
        log::trace!(
            "TelemetryService: poll {} textures={}B auxiliary={}B",
            self.polls,
            self.texture_usage.current_bytes,
            self.auxiliary_usage.current_bytes
        );
    }

    /// Texture memory as of the last poll.
    pub fn texture_usage(&self) -> ResourceUsageReport {
        self.texture_usage
    }

    /// Render buffer and skin memory as of the last poll.
    pub fn auxiliary_usage(&self) -> ResourceUsageReport {
        self.auxiliary_usage
    }

    /// Number of polls so far.
    pub fn poll_count(&self) -> u64 {
        self.polls
    }

    /// The registry monitors are added to.
    pub fn monitor_registry(&self) -> &MonitorRegistry {
        &self.registry
    }
}

impl Default for TelemetryService {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
