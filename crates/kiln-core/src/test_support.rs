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

//! Test doubles shared by the unit tests of this crate.

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::TextureBackend;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const ALL_NATIVE: [NativeFormat; 49] = {
    use NativeFormat::*;
    [
        R8Unorm, R16Unorm, R8Snorm, R16Snorm, R8Uint, R8Sint, R16Uint, R16Sint, R16Float,
        R32Float, Rg8Unorm, Rg16Unorm, Rg8Snorm, Rg16Snorm, Rg8Uint, Rg8Sint, Rg16Uint, Rg16Sint,
        Rg16Float, Rg32Float, Rgb8Unorm, Rgb8Snorm, Rgb16Float, Rgb32Float, Rgba8Unorm,
        Rgba8Snorm, Rgba8Uint, Rgba8Sint, Rgba16Unorm, Rgba16Snorm, Rgba16Uint, Rgba16Sint,
        Rgba16Float, Rgba32Float, Rgb10a2Unorm, Rg11b10Float, Bc1RgbaUnorm, Bc2RgbaUnorm,
        Bc3RgbaUnorm, Bc4RUnorm, Bc5RgUnorm, Etc2Rgb8Unorm, Etc2Rgba8Unorm, Depth16Unorm,
        Depth24Plus, Depth32Float, Depth24PlusStencil8, Depth32FloatStencil8, Stencil8,
    ]
};

/// A backend that only tracks handles. Pixel transfer calls succeed without storage.
#[derive(Debug)]
pub(crate) struct MockTextureBackend {
    supported: HashSet<(TextureKind, NativeFormat)>,
    next_id: AtomicU64,
    live: Mutex<HashSet<NativeTextureId>>,
    pub destroyed: Mutex<Vec<NativeTextureId>>,
}

impl MockTextureBackend {
    pub fn full() -> Self {
        let supported = TextureKind::ALL
            .into_iter()
            .flat_map(|kind| ALL_NATIVE.into_iter().map(move |f| (kind, f)))
            .collect();
        Self {
            supported,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashSet::new()),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    pub fn without(mut self, formats: &[NativeFormat]) -> Self {
        self.supported.retain(|(_, f)| !formats.contains(f));
        self
    }

    pub fn without_for_kind(mut self, kind: TextureKind, formats: &[NativeFormat]) -> Self {
        self.supported
            .retain(|(k, f)| *k != kind || !formats.contains(f));
        self
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl TextureBackend for MockTextureBackend {
    fn backend_name(&self) -> Cow<'static, str> {
        Cow::Borrowed("mock")
    }

    fn supports_format(&self, kind: TextureKind, format: NativeFormat, _usage: FormatUsage) -> bool {
        self.supported.contains(&(kind, format))
    }

    fn create_texture(
        &self,
        _descriptor: &NativeTextureDescriptor,
    ) -> Result<NativeTextureId, ResourceError> {
        let id = NativeTextureId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live.lock().unwrap().insert(id);
        Ok(id)
    }

    fn write_pixels(
        &self,
        _id: NativeTextureId,
        _level: u32,
        _first_layer: u32,
        _pixels: &PixelBuffer,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn read_pixels(
        &self,
        _id: NativeTextureId,
        _level: u32,
        _pixels: &mut PixelBuffer,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn supports_direct_readback(&self, _format: PixelFormat) -> bool {
        true
    }

    fn copy_texture(
        &self,
        _src: NativeTextureId,
        _dst: NativeTextureId,
        _region: &TextureCopyRegion,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn generate_mipmaps(&self, _id: NativeTextureId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn compressed_level_size(
        &self,
        _id: NativeTextureId,
        _level: u32,
    ) -> Result<Option<u64>, ResourceError> {
        Ok(None)
    }

    fn set_debug_label(&self, _id: NativeTextureId, _label: &str) -> Result<(), ResourceError> {
        Ok(())
    }

    fn destroy_texture(&self, id: NativeTextureId) -> Result<(), ResourceError> {
        if !self.live.lock().unwrap().remove(&id) {
            return Err(ResourceError::NotFound);
        }
        self.destroyed.lock().unwrap().push(id);
        Ok(())
    }
}
