//! Material patching of a freshly loaded model.
//!
//! Patching runs once per load, in this order:
//! 1. every mesh gets an unlit material mapped with the loaded texture and the
//!    tracked joint is looked up by name ([`patch_materials`])
//! 2. the [`PatchTable`] recolours specific parts addressed by hierarchy path
//! 3. the model root is placed and the camera optionally framed on its bounds
//!
//! Table paths are authored against one specific asset. They are validated one
//! by one: a path that is not present is reported as a hierarchy mismatch and
//! skipped, the rest of the table still applies.

use std::sync::Arc;

use cgmath::{InnerSpace, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    camera::{OrbitControls, PerspectiveCamera},
    config::{Framing, Placement},
    data_structures::{
        model::{Material, ModelAsset, NodeId, NodePath},
        texture::TextureAsset,
    },
    error::ViewerError,
};

/// What a patch does to the meshes it addresses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchEffect {
    /// Flat unlit colour, no texture map.
    Color([f32; 3]),
    /// Vertical gradient texture generated on the spot.
    Gradient { from: [u8; 3], to: [u8; 3], height: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub path: NodePath,
    pub effect: PatchEffect,
}

/// Ordered list of hierarchy patches. Later entries win on overlap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchTable(Vec<PatchEntry>);

impl PatchTable {
    pub fn new(entries: Vec<PatchEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[PatchEntry] {
        &self.0
    }

    /// Applies every entry whose path exists in `model`.
    pub fn apply(&self, model: &mut ModelAsset) -> PatchReport {
        let mut report = PatchReport::default();
        for entry in &self.0 {
            let target = match model.resolve(&entry.path) {
                Ok(target) => target,
                Err(err) => {
                    log::warn!("skipping patch: {err}");
                    report.mismatches.push(err);
                    continue;
                }
            };
            let material = match &entry.effect {
                PatchEffect::Color(color) => Material::flat(*color),
                PatchEffect::Gradient { from, to, height } => Material::unlit(Arc::new(
                    TextureAsset::gradient(format!("gradient {}", entry.path), *from, *to, *height),
                )),
            };
            let meshes = set_subtree_material(model, target, &material);
            if meshes == 0 {
                log::warn!("patch at {} reached no mesh", entry.path);
            }
            report.applied.push(entry.path.clone());
        }
        report
    }
}

/// Outcome of running the patch table against one model.
#[derive(Debug, Default)]
pub struct PatchReport {
    pub applied: Vec<NodePath>,
    pub mismatches: Vec<ViewerError>,
}

/// Replaces every mesh material with an unlit one mapped by `texture` and
/// returns the last joint named `joint_name`, if any.
pub fn patch_materials(
    model: &mut ModelAsset,
    texture: &Arc<TextureAsset>,
    joint_name: &str,
) -> Option<NodeId> {
    model.traverse_mut(|node| {
        if let Some(mesh) = node.mesh_mut() {
            mesh.material = Material::unlit(texture.clone());
        }
    });
    let joint = model.find_joint(joint_name);
    if joint.is_none() {
        log::warn!("no joint named {joint_name}; head tracking disabled");
    }
    joint
}

/// Sets `material` on every mesh in the subtree of `target`; returns how many.
fn set_subtree_material(model: &mut ModelAsset, target: NodeId, material: &Material) -> usize {
    let mut count = 0;
    for id in model.descendants(target) {
        if let Some(mesh) = model.node_mut(id).and_then(|node| node.mesh_mut()) {
            mesh.material = material.clone();
            count += 1;
        }
    }
    count
}

/// Moves and scales the model root.
pub fn place(model: &mut ModelAsset, placement: &Placement) {
    let root = model.root();
    if let Some(node) = model.node_mut(root) {
        node.transform.position = placement.position.into();
        node.transform.scale = Vector3::new(placement.scale, placement.scale, placement.scale);
    }
}

/// Closest the framed camera gets to the model's center.
const MIN_FRAMING_DISTANCE: f32 = 1e-3;

/// Points camera and orbit target at the model's center from a distance of
/// `distance_multiplier` times its largest extent. Returns the center used.
///
/// Point-sized bounds keep the camera's current distance to its target.
pub fn frame(
    model: &ModelAsset,
    framing: &Framing,
    camera: &mut PerspectiveCamera,
    controls: &mut OrbitControls,
) -> Option<Point3<f32>> {
    let Some(bounds) = model.bounding_box() else {
        log::warn!("model has no geometry to frame");
        return None;
    };
    let center = bounds.center();
    let mut distance = bounds.max_extent() * framing.distance_multiplier;
    if !(distance >= MIN_FRAMING_DISTANCE) {
        let current = (camera.position - camera.target).magnitude();
        log::warn!("model bounds have no extent; keeping camera distance {current:.3}");
        distance = current.max(MIN_FRAMING_DISTANCE);
    }
    camera.position = center + Vector3::new(0.0, 0.0, distance);
    controls.target = center;
    camera.look_at(center);
    Some(center)
}
