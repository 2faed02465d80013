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

//! Defines the hierarchy of error types for the texture and render-thread subsystem.

use crate::renderer::api::pixel_format::PixelFormat;
use std::fmt;

/// An error reported by a [`TextureBackend`](crate::renderer::traits::TextureBackend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A native object could not be found for the given ID.
    NotFound,
    /// The handle or ID used to reference a native object is invalid.
    InvalidHandle,
    /// The backend could not allocate the requested native object.
    AllocationFailed(String),
    /// The backend does not implement the requested operation or format.
    Unsupported(String),
    /// An attempt was made to access a native object out of its bounds.
    OutOfBounds,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Native object not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid native object handle or ID."),
            ResourceError::AllocationFailed(msg) => {
                write!(f, "Native allocation failed: {msg}")
            }
            ResourceError::Unsupported(msg) => write!(f, "Unsupported by backend: {msg}"),
            ResourceError::OutOfBounds => write!(f, "Native object access out of bounds."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// The engine-level error taxonomy for pixel buffers, textures and formats.
///
/// All variants propagate synchronously to the caller. `UnsupportedOperation` is
/// handled exactly like `InvalidParameter` by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureError {
    /// Malformed caller input: non-positive dimensions, size mismatches, out-of-range values.
    InvalidParameter(String),
    /// A typed pixel view was requested that does not match the buffer's format.
    TypeMismatch {
        /// The format the typed view expects.
        expected: PixelFormat,
        /// The format the buffer was constructed with.
        actual: PixelFormat,
    },
    /// Native GPU allocation or creation failed.
    AllocationFailure(String),
    /// The operation or format has no implementation or fallback on the active GPU.
    UnsupportedOperation(String),
    /// Any other backend failure.
    Resource(ResourceError),
}

impl TextureError {
    /// Shorthand for an [`TextureError::InvalidParameter`] with a message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        TextureError::InvalidParameter(msg.into())
    }

    /// Shorthand for an [`TextureError::UnsupportedOperation`] with a message.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        TextureError::UnsupportedOperation(msg.into())
    }
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::InvalidParameter(msg) => write!(f, "Invalid parameter: {msg}"),
            TextureError::TypeMismatch { expected, actual } => write!(
                f,
                "Pixel buffer type mismatch: expected {expected:?}, buffer is {actual:?}"
            ),
            TextureError::AllocationFailure(msg) => write!(f, "GPU allocation failed: {msg}"),
            TextureError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {msg}"),
            TextureError::Resource(err) => write!(f, "Texture resource error: {err}"),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for TextureError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::AllocationFailed(msg) => TextureError::AllocationFailure(msg),
            ResourceError::Unsupported(msg) => TextureError::UnsupportedOperation(msg),
            other => TextureError::Resource(other),
        }
    }
}
