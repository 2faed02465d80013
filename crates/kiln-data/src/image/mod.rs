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

//! The render-side counterpart of an engine image.
//!
//! The game thread hands over pixels with [`RenderImage::set_pixel_buffer`]; the render
//! thread turns them into a texture during its init pass.

use crate::texture::{ArrayTexture, CubeMap, ShapeCube, Texture2D};
use kiln_core::render_thread::PrepareForRender;
use kiln_core::renderer::{
    NativeTextureId, PixelBuffer, ResourceError, TextureError, TextureKind,
};
use kiln_core::RenderContext;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Shape and channel layout of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth or layer count; 6 with square layers means a cube map.
    pub depth: u32,
    /// Channels per pixel, 1 to 4.
    pub component_count: u32,
    /// Bits per channel: 8 for bytes, 16 or 32 for floats.
    pub bit_count: u32,
}

impl ImageDescriptor {
    /// The texture kind inferred from the shape.
    pub fn inferred_kind(&self) -> TextureKind {
        if self.depth == 1 {
            TextureKind::D2
        } else if self.depth == ShapeCube::FACES && self.width == self.height {
            TextureKind::Cube
        } else {
            TextureKind::Array
        }
    }

    fn is_float(&self) -> bool {
        self.bit_count > 8
    }
}

/// The texture an image is realised as.
#[derive(Debug)]
pub enum ImageTexture {
    /// A single 2D texture.
    Texture(Texture2D),
    /// Six square faces.
    CubeMap(CubeMap),
    /// Any other layered image.
    Array(ArrayTexture),
}

impl ImageTexture {
    /// The kind of the held texture.
    pub fn kind(&self) -> TextureKind {
        match self {
            ImageTexture::Texture(_) => TextureKind::D2,
            ImageTexture::CubeMap(_) => TextureKind::Cube,
            ImageTexture::Array(_) => TextureKind::Array,
        }
    }

    /// The native handle of the held texture.
    pub fn native_id(&self) -> NativeTextureId {
        match self {
            ImageTexture::Texture(t) => t.native_id(),
            ImageTexture::CubeMap(t) => t.native_id(),
            ImageTexture::Array(t) => t.native_id(),
        }
    }

    fn set_pixels(&mut self, pixels: &PixelBuffer) -> Result<(), TextureError> {
        match self {
            ImageTexture::Texture(t) => t.set_pixels(pixels),
            ImageTexture::CubeMap(t) => t.set_pixels(pixels),
            ImageTexture::Array(t) => t.set_pixels(pixels),
        }
    }

    fn release_immediately(&mut self) -> Result<(), TextureError> {
        match self {
            ImageTexture::Texture(t) => t.release_immediately(),
            ImageTexture::CubeMap(t) => t.release_immediately(),
            ImageTexture::Array(t) => t.release_immediately(),
        }
    }
}

/// Render-side image: a pending pixel buffer and the texture it becomes.
#[derive(Debug)]
pub struct RenderImage {
    descriptor: ImageDescriptor,
    context: RenderContext,
    pending: Mutex<Option<PixelBuffer>>,
    texture: Mutex<Option<ImageTexture>>,
    this: Weak<RenderImage>,
}

impl RenderImage {
    /// Creates an image with no pixels and no texture.
    pub fn new(context: &RenderContext, descriptor: ImageDescriptor) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            descriptor,
            context: context.clone(),
            pending: Mutex::new(None),
            texture: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// The source image layout.
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Stores pixels for upload on the next init pass. Does not touch the GPU.
    ///
    /// ## Errors
    /// * `TextureError::InvalidParameter` - If the buffer size differs from the image.
    pub fn set_pixel_buffer(&self, pixels: PixelBuffer) -> Result<(), TextureError> {
        let d = &self.descriptor;
        if (pixels.width(), pixels.height(), pixels.depth()) != (d.width, d.height, d.depth) {
            return Err(TextureError::invalid(format!(
                "pixel buffer {:?} does not match image {}x{}x{}",
                pixels.extent(),
                d.width,
                d.height,
                d.depth
            )));
        }
        *lock(&self.pending, "pending pixels")? = Some(pixels);
        let this: Weak<dyn PrepareForRender> = self.this.clone();
        self.context.delayed().add_init(this);
        Ok(())
    }

    /// `true` while a pixel buffer waits for upload.
    pub fn has_pending_pixels(&self) -> bool {
        lock(&self.pending, "pending pixels").is_ok_and(|p| p.is_some())
    }

    /// Kind of the realised texture, if any.
    pub fn texture_kind(&self) -> Option<TextureKind> {
        lock(&self.texture, "image texture")
            .ok()
            .and_then(|t| t.as_ref().map(ImageTexture::kind))
    }

    /// Native handle of the realised texture, if any.
    pub fn native_id(&self) -> Option<NativeTextureId> {
        lock(&self.texture, "image texture")
            .ok()
            .and_then(|t| t.as_ref().map(ImageTexture::native_id))
    }

    /// Runs `f` with the realised texture.
    pub fn with_texture<R>(&self, f: impl FnOnce(&ImageTexture) -> R) -> Option<R> {
        lock(&self.texture, "image texture").ok()?.as_ref().map(f)
    }

    /// Replaces the texture with a caller-built 2D texture. Render thread only.
    ///
    /// The previous texture is destroyed immediately, not through the delayed queue.
    pub fn set_texture(&self, texture: Option<Texture2D>) -> Result<(), TextureError> {
        self.replace(texture.map(ImageTexture::Texture))
    }

    /// Replaces the texture with a caller-built cube map. Render thread only.
    pub fn set_cube_map(&self, cube_map: Option<CubeMap>) -> Result<(), TextureError> {
        self.replace(cube_map.map(ImageTexture::CubeMap))
    }

    /// Replaces the texture with a caller-built array texture. Render thread only.
    pub fn set_array_texture(&self, array: Option<ArrayTexture>) -> Result<(), TextureError> {
        self.replace(array.map(ImageTexture::Array))
    }

    fn replace(&self, next: Option<ImageTexture>) -> Result<(), TextureError> {
        self.context
            .affinity()
            .assert_render_thread("RenderImage::replace");
        let mut slot = lock(&self.texture, "image texture")?;
        if let Some(previous) = slot.as_mut() {
            previous.release_immediately()?;
        }
        *slot = next;
        Ok(())
    }

    fn create_inferred(&self, context: &RenderContext) -> Result<ImageTexture, TextureError> {
        let d = &self.descriptor;
        let (channels, float) = (d.component_count, d.is_float());
        let texture = match d.inferred_kind() {
            TextureKind::D2 => {
                let mut t = Texture2D::new(context);
                t.set_size((d.width, d.height))?;
                t.set_mapping_format(channels, float, false)?;
                ImageTexture::Texture(t)
            }
            TextureKind::Cube => {
                let mut t = CubeMap::new(context);
                t.set_size(d.width)?;
                t.set_mapping_format(channels, float, false)?;
                ImageTexture::CubeMap(t)
            }
            _ => {
                let mut t = ArrayTexture::new(context);
                t.set_size((d.width, d.height, d.depth))?;
                t.set_mapping_format(channels, float, false)?;
                ImageTexture::Array(t)
            }
        };
        Ok(texture)
    }
}

impl PrepareForRender for RenderImage {
    fn prepare_for_render(&self, context: &RenderContext) -> Result<(), TextureError> {
        let Some(pixels) = lock(&self.pending, "pending pixels")?.take() else {
            return Ok(());
        };
        let mut slot = lock(&self.texture, "image texture")?;
        if slot.is_none() {
            *slot = Some(self.create_inferred(context)?);
        }
        match slot.as_mut() {
            Some(texture) => texture.set_pixels(&pixels),
            None => Ok(()),
        }
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, TextureError> {
    mutex.lock().map_err(|e| {
        TextureError::Resource(ResourceError::BackendError(format!(
            "Mutex poisoned ({what}): {e}"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::renderer::{LogicalFormat, PixelFormat, RenderSettings};
    use kiln_infra::graphics::headless::HeadlessTextureBackend;
    use std::thread;

    fn context() -> (Arc<HeadlessTextureBackend>, RenderContext) {
        let backend = Arc::new(HeadlessTextureBackend::new());
        let ctx = RenderContext::detect(backend.clone(), RenderSettings::default()).unwrap();
        (backend, ctx)
    }

    fn descriptor(width: u32, height: u32, depth: u32) -> ImageDescriptor {
        ImageDescriptor {
            width,
            height,
            depth,
            component_count: 4,
            bit_count: 8,
        }
    }

    #[test]
    fn test_kind_inference() {
        assert_eq!(descriptor(8, 4, 1).inferred_kind(), TextureKind::D2);
        assert_eq!(descriptor(8, 8, 6).inferred_kind(), TextureKind::Cube);
        assert_eq!(descriptor(8, 4, 6).inferred_kind(), TextureKind::Array);
        assert_eq!(descriptor(8, 8, 3).inferred_kind(), TextureKind::Array);
    }

    #[test]
    fn test_upload_happens_on_render_thread_pass() {
        let (backend, ctx) = context();
        let image = RenderImage::new(&ctx, descriptor(4, 4, 6));

        let producer = image.clone();
        thread::spawn(move || {
            let pixels = PixelBuffer::new(PixelFormat::Byte4, 4, 4, 6).unwrap();
            producer.set_pixel_buffer(pixels).unwrap();
        })
        .join()
        .unwrap();

        assert!(image.has_pending_pixels());
        assert_eq!(backend.create_count(), 0);

        assert_eq!(ctx.delayed().process_init_operations(&ctx), 1);
        assert!(!image.has_pending_pixels());
        assert_eq!(image.texture_kind(), Some(TextureKind::Cube));
        assert_eq!(backend.create_count(), 1);
        assert_eq!(backend.write_count(), 1);

        // the buffer was consumed, a second pass uploads nothing
        image.prepare_for_render(&ctx).unwrap();
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn test_mismatched_buffer_rejected() {
        let (_backend, ctx) = context();
        let image = RenderImage::new(&ctx, descriptor(4, 4, 1));
        let pixels = PixelBuffer::new(PixelFormat::Byte4, 4, 2, 1).unwrap();
        assert!(image.set_pixel_buffer(pixels).is_err());
        assert_eq!(ctx.delayed().init_pending_count(), 0);
    }

    #[test]
    fn test_set_texture_releases_previous_immediately() {
        let (backend, ctx) = context();
        let image = RenderImage::new(&ctx, descriptor(4, 4, 1));
        image
            .set_pixel_buffer(PixelBuffer::new(PixelFormat::Byte4, 4, 4, 1).unwrap())
            .unwrap();
        ctx.delayed().process_init_operations(&ctx);
        let inferred = image.native_id().unwrap();

        let mut replacement = Texture2D::new(&ctx);
        replacement.set_size((2, 2)).unwrap();
        replacement.set_format_mapping(LogicalFormat::Rgba8).unwrap();
        replacement.create_texture().unwrap();
        let replacement_id = replacement.native_id();

        image.set_texture(Some(replacement)).unwrap();
        assert!(!backend.is_live(inferred));
        assert_eq!(ctx.delayed().pending_count(), 0);
        assert_eq!(image.native_id(), Some(replacement_id));

        image.set_array_texture(None).unwrap();
        assert!(!backend.is_live(replacement_id));
        assert_eq!(image.texture_kind(), None);
    }
}
