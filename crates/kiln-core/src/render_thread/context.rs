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

use super::affinity::RenderThreadAffinity;
use super::delayed_ops::DelayedOperations;
use crate::memory::MemoryConsumption;
use crate::renderer::api::{FormatTable, RenderSettings};
use crate::renderer::error::TextureError;
use crate::renderer::traits::TextureBackend;
use std::sync::Arc;

/// An object that needs one render-thread step before it can be drawn, such as
/// uploading a pixel buffer handed over by another thread.
pub trait PrepareForRender: Send + Sync {
    /// Performs the render-thread work. Called from
    /// [`DelayedOperations::process_init_operations`].
    fn prepare_for_render(&self, context: &RenderContext) -> Result<(), TextureError>;
}

/// The services a texture object needs, passed explicitly instead of living in globals.
///
/// Cheap to clone; every texture keeps its own copy.
#[derive(Debug, Clone)]
pub struct RenderContext {
    backend: Arc<dyn TextureBackend>,
    formats: Arc<FormatTable>,
    memory: Arc<MemoryConsumption>,
    delayed: DelayedOperations,
    affinity: Arc<RenderThreadAffinity>,
    settings: Arc<RenderSettings>,
}

impl RenderContext {
    /// Creates a context whose render thread is the calling thread.
    pub fn new(
        backend: Arc<dyn TextureBackend>,
        formats: Arc<FormatTable>,
        settings: RenderSettings,
    ) -> Self {
        let affinity = Arc::new(RenderThreadAffinity::bound_to_current());
        Self {
            backend,
            formats,
            memory: Arc::new(MemoryConsumption::new()),
            delayed: DelayedOperations::new(affinity.clone()),
            affinity,
            settings: Arc::new(settings),
        }
    }

    /// Probes `backend` for its formats and creates a context bound to the calling thread.
    pub fn detect(
        backend: Arc<dyn TextureBackend>,
        settings: RenderSettings,
    ) -> Result<Self, TextureError> {
        let formats = FormatTable::detect(backend.as_ref())?;
        Ok(Self::new(backend, Arc::new(formats), settings))
    }

    /// The native texture API.
    pub fn backend(&self) -> &dyn TextureBackend {
        self.backend.as_ref()
    }

    /// A shared handle to the native texture API.
    pub fn backend_arc(&self) -> &Arc<dyn TextureBackend> {
        &self.backend
    }

    /// The negotiated format table.
    pub fn formats(&self) -> &FormatTable {
        &self.formats
    }

    /// The GPU memory tracker.
    pub fn memory(&self) -> &Arc<MemoryConsumption> {
        &self.memory
    }

    /// The delayed operations queue.
    pub fn delayed(&self) -> &DelayedOperations {
        &self.delayed
    }

    /// The render thread affinity.
    pub fn affinity(&self) -> &RenderThreadAffinity {
        &self.affinity
    }

    /// Active settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }
}
