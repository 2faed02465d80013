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

//! # Kiln Core
//!
//! Contracts for the GPU texture and render-task core: pixel data, format negotiation,
//! the backend trait, memory bookkeeping and render thread discipline.

#![warn(missing_docs)]

pub mod math;
pub mod memory;
pub mod render_thread;
pub mod renderer;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use render_thread::{DelayedOperations, RenderContext};
