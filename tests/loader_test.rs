use futures::executor::block_on;
use rigview::{
    ViewerError,
    resources::AssetLoader,
    session::Session,
};

use crate::common::test_utils::{MemorySource, MockRenderer, gltf_rig, plain_config, png_bytes};

mod common;

fn source() -> MemorySource {
    let (json, bin) = gltf_rig();
    MemorySource::new()
        .with("models/rig.gltf", json.into_bytes())
        .with("models/rig.bin", bin)
        .with("rig.png", png_bytes())
}

#[test]
fn fetches_model_buffers_then_texture_once_each() {
    let source = source();
    let fetched = source.fetched.clone();

    let assets = block_on(AssetLoader::new(source, "models/rig.gltf", "rig.png").load()).unwrap();

    assert_eq!(*fetched.borrow(), vec!["models/rig.gltf", "models/rig.bin", "rig.png"]);
    assert!(assets.model.find_joint("mixamorigHead").is_some());
    assert_eq!(assets.model.clips.len(), 1);
    assert_eq!(assets.model.clips[0].duration, 1.0);
    assert_eq!(assets.texture.dimensions(), (2, 2));
    assert!(assets.texture.needs_update());
}

#[test]
fn model_failure_names_the_url_and_skips_the_texture() {
    let source = MemorySource::new().with("rig.png", png_bytes());
    let fetched = source.fetched.clone();

    let err = block_on(AssetLoader::new(source, "missing.glb", "rig.png").load()).unwrap_err();

    match err {
        ViewerError::AssetFetchFailed { resource, .. } => assert_eq!(resource, "missing.glb"),
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(*fetched.borrow(), vec!["missing.glb"]);
}

#[test]
fn undecodable_texture_names_the_texture_url() {
    let source = source().with("rig.png", b"not a png".to_vec());

    let err = block_on(AssetLoader::new(source, "models/rig.gltf", "rig.png").load()).unwrap_err();

    assert!(matches!(err, ViewerError::AssetFetchFailed { ref resource, .. } if resource == "rig.png"));
}

#[test]
fn loaded_rig_follows_the_pointer_end_to_end() {
    let assets = block_on(AssetLoader::new(source(), "models/rig.gltf", "rig.png").load()).unwrap();
    let texture = assets.texture.clone();
    let mut session = Session::new(plain_config("mixamorigHead"), (800, 600));
    session.on_assets_loaded(assets);

    let model = session.scene().model(0).unwrap();
    let body = model
        .nodes()
        .find(|(_, node)| node.name == "Body")
        .and_then(|(_, node)| node.mesh())
        .unwrap();
    assert!(body.material.uses_map(&texture));
    let head = session.joint().unwrap();

    session.on_pointer_moved((600.0, 450.0));
    let mut renderer = MockRenderer::new();
    session.tick(instant::Duration::from_millis(16), &mut renderer).unwrap();

    let transform = &session.scene().model(0).unwrap().node(head).unwrap().transform;
    assert!((transform.yaw() - 0.5).abs() < 1e-5);
    assert!((transform.pitch() - 0.5).abs() < 1e-5);
    // the clip keeps moving the hips
    assert!(session.mixer().unwrap().actions()[0].is_running());
}
