//! glTF import into the tagged node arena.
//!
//! Only what the viewer draws and animates is kept: node hierarchy and rest
//! transforms, triangle geometry with UVs and skin weights, skins, and clips
//! of translation / rotation / scale tracks. Source materials are reduced to
//! their base colour since the patcher replaces them anyway.

use std::{collections::HashSet, sync::Arc};

use cgmath::{Matrix4, Quaternion, Vector3};

use crate::{
    data_structures::{
        model::{Geometry, Material, Mesh, ModelAsset, Node, NodeId, NodeKind, Skin},
        transform::Transform,
    },
    error::{Result, ViewerError},
    resources::{
        AssetSource,
        animation::{AnimationClip, Interpolation, Keyframes, Track},
    },
};

/// Fetches `url` through `source` and imports it, including external buffers.
pub async fn load_model_gltf<S: AssetSource>(source: &S, url: &str) -> Result<ModelAsset> {
    let bytes = source.fetch(url).await?;
    let gltf = gltf::Gltf::from_slice(&bytes).map_err(|e| ViewerError::fetch(url, e))?;

    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| ViewerError::fetch(url, "binary chunk missing"))?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = source.fetch(&resolve_relative(url, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }

    import(&gltf, &buffer_data, url)
}

/// Resolves a buffer URI relative to the model URL.
fn resolve_relative(base: &str, uri: &str) -> String {
    if uri.contains("://") {
        return uri.to_string();
    }
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

/// Builds a [`ModelAsset`] from a parsed document and its buffers.
pub fn import(doc: &gltf::Document, buffers: &[Vec<u8>], label: &str) -> Result<ModelAsset> {
    let scene = doc
        .default_scene()
        .or_else(|| doc.scenes().next())
        .ok_or_else(|| ViewerError::fetch(label, "document has no scene"))?;

    let joints: HashSet<usize> = doc
        .skins()
        .flat_map(|skin| skin.joints().map(|joint| joint.index()).collect::<Vec<_>>())
        .collect();

    let mut model = ModelAsset::new(scene.name().unwrap_or("Scene"));
    let mut node_map: Vec<Option<NodeId>> = vec![None; doc.nodes().len()];
    let root = model.root();
    for node in scene.nodes() {
        import_node(&node, root, &mut model, &mut node_map, &joints, buffers);
    }

    for skin in doc.skins() {
        let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let inverse_bind = reader
            .read_inverse_bind_matrices()
            .map(|matrices| matrices.map(Matrix4::from).collect())
            .unwrap_or_default();
        let joints = skin
            .joints()
            .filter_map(|joint| {
                let mapped = node_map[joint.index()];
                if mapped.is_none() {
                    log::warn!("skin {} references joint {} outside the scene", skin.index(), joint.index());
                }
                mapped
            })
            .collect();
        model.skins.push(Skin { joints, inverse_bind });
    }

    for animation in doc.animations() {
        let name = animation.name().unwrap_or("Default").to_string();
        let mut tracks = Vec::new();
        for channel in animation.channels() {
            let Some(target) = node_map[channel.target().node().index()] else {
                continue;
            };
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let timestamps: Vec<f32> = match reader.read_inputs() {
                Some(inputs) => inputs.collect(),
                None => {
                    log::warn!("no timestamps in channel {} of {}", channel.index(), name);
                    continue;
                }
            };
            let sampler_mode = channel.sampler().interpolation();
            let keyframes = match reader.read_outputs() {
                Some(gltf::animation::util::ReadOutputs::Translations(values)) => {
                    Keyframes::Translation(spline_values(values.map(Vector3::from), sampler_mode))
                }
                Some(gltf::animation::util::ReadOutputs::Rotations(values)) => {
                    Keyframes::Rotation(spline_values(
                        values
                            .into_f32()
                            .map(|[x, y, z, w]| Quaternion::new(w, x, y, z)),
                        sampler_mode,
                    ))
                }
                Some(gltf::animation::util::ReadOutputs::Scales(values)) => {
                    Keyframes::Scale(spline_values(values.map(Vector3::from), sampler_mode))
                }
                Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) => {
                    log::warn!("morph target channel {} of {} is not supported", channel.index(), name);
                    continue;
                }
                None => {
                    log::warn!("no keyframes in channel {} of {}", channel.index(), name);
                    continue;
                }
            };
            let interpolation = match sampler_mode {
                gltf::animation::Interpolation::Step => Interpolation::Step,
                gltf::animation::Interpolation::Linear
                | gltf::animation::Interpolation::CubicSpline => Interpolation::Linear,
            };
            tracks.push(Track {
                target,
                timestamps,
                keyframes,
                interpolation,
            });
        }
        model.clips.push(AnimationClip::new(name, tracks));
    }

    log::info!(
        "imported {label}: {} nodes, {} skins, {} clips",
        model.len(),
        model.skins.len(),
        model.clips.len()
    );
    Ok(model)
}

/// Cubic spline outputs store (in-tangent, value, out-tangent) triplets; keep the values.
fn spline_values<T>(values: impl Iterator<Item = T>, mode: gltf::animation::Interpolation) -> Vec<T> {
    match mode {
        gltf::animation::Interpolation::CubicSpline => values.skip(1).step_by(3).collect(),
        gltf::animation::Interpolation::Linear | gltf::animation::Interpolation::Step => {
            values.collect()
        }
    }
}

fn import_node(
    node: &gltf::Node,
    parent: NodeId,
    model: &mut ModelAsset,
    node_map: &mut [Option<NodeId>],
    joints: &HashSet<usize>,
    buffers: &[Vec<u8>],
) {
    let (translation, [x, y, z, w], scale) = node.transform().decomposed();
    let transform = Transform {
        position: translation.into(),
        rotation: Quaternion::new(w, x, y, z),
        scale: scale.into(),
    };
    let name = node.name().unwrap_or_default().to_string();
    let mut meshes = node
        .mesh()
        .map(|mesh| read_meshes(&mesh, node.skin().map(|skin| skin.index()), buffers))
        .unwrap_or_default();

    let kind = if joints.contains(&node.index()) {
        NodeKind::Joint
    } else if meshes.len() == 1 {
        NodeKind::Mesh(meshes.remove(0))
    } else {
        NodeKind::Transform
    };
    let id = model.add_child(parent, Node::new(name.clone(), kind).with_transform(transform));
    node_map[node.index()] = Some(id);

    // multi-primitive meshes become one child mesh per primitive
    for (idx, mesh) in meshes.into_iter().enumerate() {
        model.add_child(id, Node::new(format!("{name}_{idx}"), NodeKind::Mesh(mesh)));
    }
    for child in node.children() {
        import_node(&child, id, model, node_map, joints, buffers);
    }
}

fn read_meshes(mesh: &gltf::Mesh, skin: Option<usize>, buffers: &[Vec<u8>]) -> Vec<Mesh> {
    mesh.primitives()
        .filter_map(|primitive| {
            if !matches!(primitive.mode(), gltf::mesh::Mode::Triangles) {
                log::warn!("skipping non-triangle primitive in mesh {:?}", mesh.name());
                return None;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
            let tex_coords = reader
                .read_tex_coords(0)
                .map(|coords| coords.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0; 2]; positions.len()]);
            let (joints, weights) = match (reader.read_joints(0), reader.read_weights(0)) {
                (Some(joints), Some(weights)) if skin.is_some() => (
                    joints.into_u16().collect(),
                    weights.into_f32().collect(),
                ),
                _ => (Vec::new(), Vec::new()),
            };
            let indices = reader
                .read_indices()
                .map(|indices| indices.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());
            let [r, g, b, _] = primitive.material().pbr_metallic_roughness().base_color_factor();

            Some(Mesh {
                geometry: Arc::new(Geometry {
                    positions,
                    tex_coords,
                    joints,
                    weights,
                    indices,
                }),
                material: Material {
                    color: [r, g, b],
                    ..Default::default()
                },
                skin,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIG: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "name": "Scene", "nodes": [0] }],
        "nodes": [
            { "name": "Armature", "children": [1] },
            { "name": "mixamorigHips", "children": [2] },
            { "name": "mixamorigHead", "translation": [0.0, 1.5, 0.0] }
        ],
        "skins": [{ "joints": [1, 2] }]
    }"#;

    #[test]
    fn imports_hierarchy_and_marks_skin_joints() {
        let gltf = gltf::Gltf::from_slice(RIG.as_bytes()).unwrap();
        let model = import(&gltf, &[], "rig.gltf").unwrap();

        let armature = model.resolve(&crate::data_structures::model::NodePath::new([0])).unwrap();
        assert!(matches!(model.node(armature).unwrap().kind, NodeKind::Transform));

        let head = model.find_joint("mixamorigHead").unwrap();
        assert_eq!(model.node(head).unwrap().transform.position.y, 1.5);
        assert_eq!(model.skins.len(), 1);
        assert_eq!(model.skins[0].joints.len(), 2);
        assert!(model.clips.is_empty());
    }

    #[test]
    fn relative_buffers_resolve_next_to_the_model() {
        assert_eq!(
            resolve_relative("https://cdn.example/models/robot.gltf", "robot.bin"),
            "https://cdn.example/models/robot.bin"
        );
        assert_eq!(resolve_relative("robot.gltf", "robot.bin"), "robot.bin");
    }
}
