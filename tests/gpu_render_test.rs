#[cfg(feature = "integration-tests")]
use futures::executor::block_on;
#[cfg(feature = "integration-tests")]
use instant::Duration;
#[cfg(feature = "integration-tests")]
use rigview::{
    ViewerConfig, context::Context, gpu::GpuRenderer, resources::LoadedAssets, session::Session,
};

#[cfg(feature = "integration-tests")]
use crate::common::test_utils::{plain_config, rig, stub_texture};

#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
const SIZE: u32 = 64;

#[cfg(feature = "integration-tests")]
const BLUE: [f64; 4] = [0.0, 0.0, 1.0, 1.0];

#[cfg(feature = "integration-tests")]
fn renderer() -> GpuRenderer {
    let ctx = block_on(Context::headless(SIZE, SIZE)).expect("headless context");
    GpuRenderer::new(ctx, BLUE)
}

#[cfg(feature = "integration-tests")]
fn pixels(renderer: &GpuRenderer) -> image::RgbaImage {
    block_on(renderer.context().read_pixels()).expect("readback")
}

#[test]
#[cfg(feature = "integration-tests")]
fn character_preset_clears_to_white_before_load() {
    let mut renderer = renderer();
    let mut session = Session::new(ViewerConfig::character(), (SIZE, SIZE));

    session.tick(Duration::ZERO, &mut renderer).unwrap();

    for pixel in pixels(&renderer).pixels() {
        assert_eq!(pixel.0, [255, 255, 255, 255]);
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn frames_without_explicit_clear_use_the_background() {
    let mut renderer = renderer();
    let mut session = Session::new(ViewerConfig::robot(), (SIZE, SIZE));

    session.tick(Duration::ZERO, &mut renderer).unwrap();

    for pixel in pixels(&renderer).pixels() {
        assert_eq!(pixel.0, [0, 0, 255, 255]);
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn stale_textures_are_uploaded_again() {
    let mut renderer = renderer();
    let mut session = Session::new(plain_config("mixamorigHead"), (SIZE, SIZE));
    let texture = stub_texture();
    session.on_assets_loaded(LoadedAssets {
        model: rig("mixamorigHead"),
        texture: texture.clone(),
    });

    session.tick(Duration::ZERO, &mut renderer).unwrap();
    assert!(renderer.is_texture_cached(&texture));
    assert!(!texture.needs_update());

    // the triangle covers the upper right of the view center
    let pixel = pixels(&renderer).get_pixel(SIZE / 2 + 4, SIZE / 2 - 4).0;
    for (got, want) in pixel.iter().zip([200u8, 10, 10, 255]) {
        assert!(got.abs_diff(want) <= 2, "{pixel:?}");
    }

    texture.set_needs_update();
    session.tick(Duration::ZERO, &mut renderer).unwrap();
    assert!(!texture.needs_update());
    assert!(renderer.is_texture_cached(&texture));
}

#[test]
#[cfg(feature = "integration-tests")]
fn replaced_models_drop_their_textures() {
    let mut renderer = renderer();
    let mut session = Session::new(plain_config("mixamorigHead"), (SIZE, SIZE));
    let first = stub_texture();
    let second = stub_texture();

    session.on_assets_loaded(LoadedAssets {
        model: rig("mixamorigHead"),
        texture: first.clone(),
    });
    session.tick(Duration::ZERO, &mut renderer).unwrap();
    assert!(renderer.is_texture_cached(&first));

    session.on_assets_loaded(LoadedAssets {
        model: rig("mixamorigHead"),
        texture: second.clone(),
    });
    session.tick(Duration::ZERO, &mut renderer).unwrap();
    assert!(!renderer.is_texture_cached(&first));
    assert!(renderer.is_texture_cached(&second));
}
