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

//! Backend-agnostic texture API.
//!
//! - **[`pixel_format`]** / **[`pixel_buffer`]**: CPU-side image data.
//! - **[`texture_format`]** / **[`format_table`]**: logical formats and their resolution
//!   against what the GPU supports.
//! - **[`texture`]**: native handles and descriptors handed to backends.
//! - **[`core`]**: settings.

pub mod core;
pub mod format_table;
pub mod pixel_buffer;
pub mod pixel_format;
pub mod texture;
pub mod texture_format;

pub use self::core::*;
pub use self::format_table::FormatTable;
pub use self::pixel_buffer::*;
pub use self::pixel_format::PixelFormat;
pub use self::texture::*;
pub use self::texture_format::*;
