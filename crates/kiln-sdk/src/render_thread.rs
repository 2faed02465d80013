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

//! The render thread: the single owner of native texture work.

use anyhow::{Context, Result};
use kiln_core::memory::MemoryCategory;
use kiln_core::render_thread::DrainReport;
use kiln_core::renderer::{RenderSettings, TextureBackend};
use kiln_core::telemetry::{ResourceMonitor, TextureMemoryReport};
use kiln_core::RenderContext;
use kiln_data::RenderablePools;
use kiln_infra::telemetry::{AuxiliaryMemoryMonitor, TextureMemoryMonitor};
use kiln_infra::WgpuTextureBackend;
use kiln_lanes::RenderTask;
use kiln_telemetry::TelemetryService;
use std::sync::Arc;
use std::time::Duration;

/// What one [`RenderThread::begin_frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Index of the frame that just began.
    pub frame: u64,
    /// Objects prepared for their first render.
    pub prepared: usize,
    /// Delayed operations executed or skipped.
    pub drained: DrainReport,
}

/// Owns the render context, the renderable pools and the memory monitors.
///
/// Construct it on the thread that will issue native texture calls; that thread becomes
/// the render thread.
#[derive(Debug)]
pub struct RenderThread {
    context: RenderContext,
    pools: RenderablePools,
    render_task: RenderTask,
    telemetry: TelemetryService,
    texture_monitor: Arc<TextureMemoryMonitor>,
    frame: u64,
}

impl RenderThread {
    /// Builds the format table for `backend` and binds the calling thread as render thread.
    ///
    /// ## Errors
    ///
    /// Fails when the backend lacks a format every renderer needs.
    pub fn new(backend: Arc<dyn TextureBackend>, settings: RenderSettings) -> Result<Self> {
        kiln_telemetry::init_logging(&settings.logging);

        let context = RenderContext::detect(backend, settings)
            .context("RenderThread: failed to build the format table")?;
        let pools = RenderablePools::new(&context);

        let telemetry = TelemetryService::new(Duration::from_secs(1));
        let texture_monitor = Arc::new(TextureMemoryMonitor::new(
            "RenderThread",
            context.memory().clone(),
        ));
        telemetry.monitor_registry().register(texture_monitor.clone());
        telemetry
            .monitor_registry()
            .register(Arc::new(AuxiliaryMemoryMonitor::new(context.memory().clone())));

        log::info!(
            "RenderThread: ready with {} native formats",
            context.formats().len()
        );
        Ok(Self {
            context,
            pools,
            render_task: RenderTask::new(),
            telemetry,
            texture_monitor,
            frame: 0,
        })
    }

    /// A render thread over a headless wgpu device.
    pub fn with_wgpu(settings: RenderSettings) -> Result<Self> {
        let backend = WgpuTextureBackend::new_headless()?;
        Self::new(Arc::new(backend), settings)
    }

    /// The per-frame synchronisation point: prepares pending objects, then runs every
    /// delayed destroy queued since the previous frame.
    pub fn begin_frame(&mut self) -> FrameReport {
        self.frame += 1;
        let prepared = self.context.delayed().process_init_operations(&self.context);
        let drained = self.context.delayed().drain(self.context.backend());
        if drained.failed > 0 {
            log::warn!(
                "RenderThread: frame {} skipped {} failed delayed operations",
                self.frame,
                drained.failed
            );
        }
        self.telemetry.tick();
        FrameReport {
            frame: self.frame,
            prepared,
            drained,
        }
    }

    /// The context handed to every texture created on this thread.
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Render targets reused across frames.
    pub fn pools(&mut self) -> &mut RenderablePools {
        &mut self.pools
    }

    /// The scratch render task, cleared and rebuilt by the caller every frame.
    pub fn render_task(&mut self) -> &mut RenderTask {
        &mut self.render_task
    }

    /// The service polling this thread's memory monitors.
    pub fn telemetry(&self) -> &TelemetryService {
        &self.telemetry
    }

    /// Texture memory right now, per category.
    pub fn memory_report(&self) -> TextureMemoryReport {
        self.texture_monitor.update();
        self.texture_monitor
            .get_texture_report()
            .unwrap_or_else(|| TextureMemoryReport::from_stats(&self.context.memory().snapshot()))
    }

    /// Bytes held by render buffers and skins.
    pub fn auxiliary_bytes(&self) -> i64 {
        let stats = self.context.memory().snapshot();
        stats.category(MemoryCategory::RenderBuffer).total_bytes()
            + stats.category(MemoryCategory::Skin).total_bytes()
    }

    /// Frames begun so far.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Releases the pools and drains every outstanding delayed operation.
    pub fn shutdown(self) -> DrainReport {
        let Self {
            context,
            pools,
            frame,
            ..
        } = self;
        drop(pools);
        let report = context.delayed().shutdown(context.backend());
        context.memory().debug_assert_settled();
        log::info!("RenderThread: shut down after {frame} frames");
        report
    }
}
