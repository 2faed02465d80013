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

use kiln_core::renderer::{LogicalFormat, PixelBuffer, PixelFormat, RenderSettings, TextureState};
use kiln_core::RenderContext;
use kiln_data::{ArrayTexture, CubeMap, Texture1D, Texture2D};
use kiln_infra::graphics::headless::HeadlessTextureBackend;
use std::sync::Arc;

fn setup() -> (Arc<HeadlessTextureBackend>, RenderContext) {
    let backend = Arc::new(HeadlessTextureBackend::new());
    let context = RenderContext::detect(backend.clone(), RenderSettings::default())
        .expect("headless backend supports every required format");
    (backend, context)
}

fn live_bytes(textures: &[u64]) -> i64 {
    textures.iter().sum::<u64>() as i64
}

#[test]
fn every_setter_destroys_before_recreate() {
    let (backend, ctx) = setup();
    let mut texture = Texture2D::new(&ctx);
    texture.set_size((32, 32)).unwrap();
    texture.set_format_mapping(LogicalFormat::Rgba8).unwrap();

    let mut expected_destroys = 0;
    let changes: [&dyn Fn(&mut Texture2D); 3] = [
        &|t| t.set_size((64, 32)).unwrap(),
        &|t| t.set_format_mapping(LogicalFormat::Rgb8).unwrap(),
        &|t| t.set_mip_mapped(true),
    ];
    for change in changes {
        texture.create_texture().unwrap();
        assert!(texture.is_created());

        change(&mut texture);
        expected_destroys += 1;
        assert_eq!(texture.state(), TextureState::Uninitialized);
        assert!(texture.native_id().is_null());
        assert_eq!(ctx.delayed().pending_count(), 1);

        ctx.delayed().drain(ctx.backend());
        assert_eq!(backend.destroy_count(), expected_destroys);
    }
}

#[test]
fn create_twice_allocates_once() {
    let (backend, ctx) = setup();
    let mut cube = CubeMap::new(&ctx);
    cube.set_size(16).unwrap();
    cube.create_texture().unwrap();
    let id = cube.native_id();
    cube.create_texture().unwrap();
    assert_eq!(backend.create_count(), 1);
    assert_eq!(cube.native_id(), id);
}

#[test]
fn level_sizes_halve_down_to_one() {
    let (_backend, ctx) = setup();
    let mut texture = Texture2D::new(&ctx);
    texture.set_size((100, 20)).unwrap();
    texture.set_mip_mapped(true);
    texture.create_texture().unwrap();

    let levels = texture.real_mip_level_count();
    assert_eq!(levels, 6);
    for level in 0..=levels {
        let (w, h) = texture.level_size(level).unwrap();
        assert_eq!(w, (100 >> level).max(1));
        assert_eq!(h, (20 >> level).max(1));
    }
    assert!(texture.level_size(levels + 1).is_err());

    let wrong = PixelBuffer::new(PixelFormat::Byte3, 50, 11, 1).unwrap();
    assert!(texture.set_pixels_level(1, &wrong).is_err());
    let right = PixelBuffer::new(PixelFormat::Byte3, 50, 10, 1).unwrap();
    texture.set_pixels_level(1, &right).unwrap();
}

#[test]
fn tracker_matches_live_textures_after_drain() {
    let (_backend, ctx) = setup();

    let mut line = Texture1D::new(&ctx);
    line.set_size(256).unwrap();
    line.set_mip_mapped(true);
    line.create_texture().unwrap();

    let mut plain = Texture2D::new(&ctx);
    plain.set_size((64, 64)).unwrap();
    plain.set_mapping_format(4, false, true).unwrap();
    plain.create_texture().unwrap();

    let mut cube = CubeMap::new(&ctx);
    cube.set_size(32).unwrap();
    cube.set_fbo_format(4, true).unwrap();
    cube.create_texture().unwrap();

    let mut layers = ArrayTexture::new(&ctx);
    layers.set_size((16, 16, 4)).unwrap();
    layers.set_depth_format(false, true).unwrap();
    layers.create_texture().unwrap();

    {
        let mut scratch = Texture2D::new(&ctx);
        scratch.set_size((128, 128)).unwrap();
        scratch.create_texture().unwrap();
    }
    plain.set_size((32, 32)).unwrap();
    plain.create_texture().unwrap();
    cube.destroy_texture();

    ctx.delayed().drain(ctx.backend());
    ctx.memory().debug_assert_settled();

    let live = [
        line.memory_usage(),
        plain.memory_usage(),
        cube.memory_usage(),
        layers.memory_usage(),
    ];
    assert_eq!(cube.memory_usage(), 0);
    assert_eq!(ctx.memory().total_bytes(), live_bytes(&live));
}
