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

//! GPU texture objects.
//!
//! [`GpuTexture`] holds the lifecycle shared by every texture kind; a [`TextureShape`]
//! supplies what differs between them.

mod gpu_texture;
pub mod mip_map;
mod shape;

pub use self::gpu_texture::{ArrayTexture, CopyRegion, CubeMap, GpuTexture, Texture1D, Texture2D};
pub use self::mip_map::{ChannelMask, PixelBufferMipMap};
pub use self::shape::{Shape1D, Shape2D, ShapeArray, ShapeCube, TextureShape};
