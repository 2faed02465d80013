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

//! # Kiln Data
//!
//! Resources that own GPU data: textures of every kind, CPU-side mip chains, pools of
//! render targets and the render-side image bridge.

#![warn(missing_docs)]

pub mod image;
pub mod pool;
pub mod texture;

pub use image::{ImageDescriptor, ImageTexture, RenderImage};
pub use pool::{PoolSlot, RenderablePool, RenderablePools};
pub use texture::{ArrayTexture, CubeMap, GpuTexture, Texture1D, Texture2D};
