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

//! Backend-agnostic texture contracts.
//!
//! This module defines what texture objects can ask of a GPU: the [`TextureBackend`]
//! trait, the descriptors it consumes, pixel data and format negotiation. Concrete
//! backends live in `kiln-infra`; `kiln-data` builds engine texture objects on top.

pub mod api;
pub mod error;
pub mod traits;

pub use self::api::*;
pub use self::error::{ResourceError, TextureError};
pub use self::traits::TextureBackend;
