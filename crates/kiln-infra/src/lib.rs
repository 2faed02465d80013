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

//! # Kiln Infra
//!
//! Concrete implementations of the `kiln-core` contracts: texture backends, resource
//! monitors and the video decode handoff.

#![warn(missing_docs)]

pub mod graphics;
pub mod telemetry;
pub mod video;

pub use graphics::{HeadlessTextureBackend, WgpuTextureBackend};
pub use telemetry::TextureMemoryMonitor;
