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

//! Render thread discipline.
//!
//! One thread owns every native GPU call. Other threads hand work over through
//! [`DelayedOperations`], which the render thread drains once per frame after the
//! previous frame's GPU work has retired.

mod affinity;
mod context;
mod delayed_ops;

pub use self::affinity::RenderThreadAffinity;
pub use self::context::{PrepareForRender, RenderContext};
pub use self::delayed_ops::{DelayedOperation, DelayedOperations, DrainReport, ReleaseAction};
