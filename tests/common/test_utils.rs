use std::{cell::RefCell, collections::HashMap, io::Cursor, rc::Rc, sync::Arc};

use cgmath::Vector3;
use rigview::{
    ViewerConfig, ViewerError,
    camera::PerspectiveCamera,
    data_structures::{
        model::{Geometry, Material, Mesh, ModelAsset, Node, NodeKind},
        scene_graph::Scene,
        texture::TextureAsset,
    },
    render::{DrawList, Renderer},
    resources::{
        AssetSource,
        animation::{AnimationClip, Interpolation, Keyframes, Track},
    },
};

/// Shared, ordered record of what happened during a tick.
pub(crate) type Journal = Rc<RefCell<Vec<String>>>;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Clear([f64; 4]),
    Draw { models: usize, meshes: usize },
}

/// Renderer that records calls instead of drawing.
#[derive(Default)]
pub(crate) struct MockRenderer {
    pub calls: Vec<Call>,
    pub journal: Option<Journal>,
    pub fail_draws: bool,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::default()
        }
    }

    pub fn draws(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Draw { .. }))
            .collect()
    }

    pub fn clears(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Clear(_)))
            .count()
    }

    fn note(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.borrow_mut().push(entry.to_string());
        }
    }
}

impl Renderer for MockRenderer {
    fn clear(&mut self, colour: [f64; 4]) {
        self.note("clear");
        self.calls.push(Call::Clear(colour));
    }

    fn draw(&mut self, scene: &Scene, _camera: &PerspectiveCamera) -> rigview::Result<()> {
        self.note("draw");
        if self.fail_draws {
            return Err(ViewerError::Graphics("device lost".to_string()));
        }
        self.calls.push(Call::Draw {
            models: scene.models().len(),
            meshes: DrawList::collect(scene).items.len(),
        });
        Ok(())
    }
}

/// In-memory asset source that logs every URL it is asked for.
#[derive(Default)]
pub(crate) struct MemorySource {
    pub files: HashMap<String, Vec<u8>>,
    pub fetched: Journal,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }
}

impl AssetSource for MemorySource {
    async fn fetch(&self, url: &str) -> rigview::Result<Vec<u8>> {
        self.fetched.borrow_mut().push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| ViewerError::AssetFetchFailed {
                resource: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}

pub(crate) fn stub_texture() -> Arc<TextureAsset> {
    Arc::new(TextureAsset::new(
        "stub",
        image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 10, 10, 255])),
    ))
}

pub(crate) fn png_bytes() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 200, 10, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png encoding");
    bytes.into_inner()
}

fn triangle() -> NodeKind {
    NodeKind::Mesh(Mesh {
        geometry: Arc::new(Geometry {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            tex_coords: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            indices: vec![0, 1, 2],
            ..Default::default()
        }),
        material: Material::default(),
        skin: None,
    })
}

/// `Scene -> Armature -> [Body (mesh), Hips (joint) -> <head_name> (joint)]`
/// with one two-second clip bobbing the hips.
pub(crate) fn rig(head_name: &str) -> ModelAsset {
    let mut model = ModelAsset::new("Scene");
    let armature = model.add_child(model.root(), Node::new("Armature", NodeKind::Transform));
    model.add_child(armature, Node::new("Body", triangle()));
    let hips = model.add_child(armature, Node::new("mixamorigHips", NodeKind::Joint));
    model.add_child(hips, Node::new(head_name, NodeKind::Joint));
    model.clips.push(AnimationClip::new(
        "Idle",
        vec![Track {
            target: hips,
            timestamps: vec![0.0, 1.0, 2.0],
            keyframes: Keyframes::Translation(vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.0, 0.1, 0.0),
                Vector3::new(0.0, 0.0, 0.0),
            ]),
            interpolation: Interpolation::Linear,
        }],
    ));
    model
}

/// Robot preset pointed at `joint_name`, without patches or framing.
pub(crate) fn plain_config(joint_name: &str) -> ViewerConfig {
    ViewerConfig {
        joint_name: joint_name.to_string(),
        placement: Default::default(),
        ..ViewerConfig::robot()
    }
}

fn push_f32s(buffer: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        buffer.extend_from_slice(&value.to_le_bytes());
    }
}

/// A glTF rig with an external `rig.bin` buffer: a triangle mesh, a
/// two-joint skeleton and a one-second clip on the hips.
pub(crate) fn gltf_rig() -> (String, Vec<u8>) {
    let mut bin = Vec::new();
    push_f32s(&mut bin, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    for index in [0u32, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    push_f32s(&mut bin, &[0.0, 1.0]);
    push_f32s(&mut bin, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    assert_eq!(bin.len(), 80);

    let json = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "Armature", "children": [1, 2] },
            { "name": "Body", "mesh": 0 },
            { "name": "mixamorigHips", "children": [3] },
            { "name": "mixamorigHead", "translation": [0.0, 1.5, 0.0] }
        ],
        "skins": [{ "joints": [2, 3] }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
        "animations": [{
            "name": "Idle",
            "channels": [{ "sampler": 0, "target": { "node": 2, "path": "translation" } }],
            "samplers": [{ "input": 2, "output": 3, "interpolation": "LINEAR" }]
        }],
        "buffers": [{ "uri": "rig.bin", "byteLength": 80 }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 12, "target": 34963 },
            { "buffer": 0, "byteOffset": 48, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 56, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5125, "count": 3, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    });
    (json.to_string(), bin)
}
