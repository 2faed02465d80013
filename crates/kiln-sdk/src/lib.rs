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

//! # Kiln SDK
//!
//! The entry point for applications: a [`RenderThread`] that owns the texture backend,
//! the format table, the renderable pools and the memory monitors.

#![warn(missing_docs)]

mod render_thread;

pub use render_thread::{FrameReport, RenderThread};

/// Types most applications need alongside the render thread.
pub mod prelude {
    pub use kiln_core::renderer::{LogicalFormat, PixelBuffer, PixelFormat, RenderSettings};
    pub use kiln_core::RenderContext;
    pub use kiln_data::{ArrayTexture, CubeMap, RenderImage, Texture1D, Texture2D};
    pub use kiln_infra::{HeadlessTextureBackend, WgpuTextureBackend};
    pub use kiln_lanes::{PersistentRenderTask, RenderTask, RenderTaskBuilder, RenderTaskFilter};
}
