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

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use std::borrow::Cow;
use std::fmt::Debug;

/// The native texture API the engine's texture objects are built on.
///
/// Every method except [`supports_format`](Self::supports_format),
/// [`supports_direct_readback`](Self::supports_direct_readback) and
/// [`backend_name`](Self::backend_name) must only be called from the render thread.
/// Native destruction is only ever requested by the delayed operations drain.
pub trait TextureBackend: Send + Sync + Debug + 'static {
    /// A short, human-readable backend name for logs.
    fn backend_name(&self) -> Cow<'static, str>;

    /// Checks whether a native format can be used for a texture kind and usage.
    /// ## Arguments
    /// * `kind` - The texture kind the format would be allocated as.
    /// * `format` - The candidate native format.
    /// * `usage` - `Mapping` for sampled textures, `Fbo` for render targets.
    /// ## Returns
    /// `true` if the combination is supported on the active GPU.
    fn supports_format(&self, kind: TextureKind, format: NativeFormat, usage: FormatUsage)
        -> bool;

    /// Allocates a native texture with storage for every level in the descriptor.
    /// ## Arguments
    /// * `descriptor` - Kind, size, level count, format and sampling parameters.
    /// ## Returns
    /// A `Result` containing the new native handle.
    /// ## Errors
    /// * `ResourceError::AllocationFailed` - If the GPU rejected the allocation.
    /// * `ResourceError::Unsupported` - If the format cannot be used for this kind.
    fn create_texture(
        &self,
        descriptor: &NativeTextureDescriptor,
    ) -> Result<NativeTextureId, ResourceError>;

    /// Uploads a pixel buffer into one mip level.
    /// ## Arguments
    /// * `id` - The target texture.
    /// * `level` - The mip level to write.
    /// * `first_layer` - The first layer (or cube face) written; the buffer depth gives the count.
    /// * `pixels` - The texel data, already validated against the level size.
    /// ## Errors
    /// * `ResourceError::NotFound` - If `id` is unknown.
    /// * `ResourceError::Unsupported` - If the pixel format cannot be converted to the texture format.
    fn write_pixels(
        &self,
        id: NativeTextureId,
        level: u32,
        first_layer: u32,
        pixels: &PixelBuffer,
    ) -> Result<(), ResourceError>;

    /// Downloads one mip level, all layers, into a caller-sized buffer.
    /// ## Errors
    /// * `ResourceError::NotFound` - If `id` is unknown.
    /// * `ResourceError::Unsupported` - If the buffer format cannot be read back directly.
    fn read_pixels(
        &self,
        id: NativeTextureId,
        level: u32,
        pixels: &mut PixelBuffer,
    ) -> Result<(), ResourceError>;

    /// Whether [`read_pixels`](Self::read_pixels) accepts buffers of `format` directly.
    ///
    /// When `false`, callers read into the 4-channel intermediate format and truncate.
    fn supports_direct_readback(&self, format: PixelFormat) -> bool;

    /// Copies a region between two textures on the GPU.
    /// ## Errors
    /// * `ResourceError::NotFound` - If either texture is unknown.
    /// * `ResourceError::OutOfBounds` - If the region exceeds either level.
    fn copy_texture(
        &self,
        src: NativeTextureId,
        dst: NativeTextureId,
        region: &TextureCopyRegion,
    ) -> Result<(), ResourceError>;

    /// Regenerates levels 1.. from level 0.
    /// ## Errors
    /// * `ResourceError::Unsupported` - If the backend cannot generate mip maps.
    fn generate_mipmaps(&self, id: NativeTextureId) -> Result<(), ResourceError>;

    /// Returns the storage size the driver actually uses for a compressed level.
    ///
    /// `None` means the driver stored the level uncompressed.
    fn compressed_level_size(
        &self,
        id: NativeTextureId,
        level: u32,
    ) -> Result<Option<u64>, ResourceError>;

    /// Attaches a debug label to the native object.
    fn set_debug_label(&self, id: NativeTextureId, label: &str) -> Result<(), ResourceError>;

    /// Destroys the native texture and releases its storage.
    /// ## Errors
    /// * `ResourceError::NotFound` - If `id` was already destroyed or never existed.
    fn destroy_texture(&self, id: NativeTextureId) -> Result<(), ResourceError>;
}
