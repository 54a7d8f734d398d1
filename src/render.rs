//! Draw submission.
//!
//! The session talks to the GPU through the [`Renderer`] trait so the loop
//! can run against a recording renderer in tests. [`DrawList`] flattens a
//! [`Scene`] into per-mesh draw items with world matrices and joint palettes,
//! the form every renderer consumes.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    camera::PerspectiveCamera,
    data_structures::{
        model::{Mesh, NodeId},
        scene_graph::Scene,
    },
    error::Result,
};

/// Something that can put a scene on screen.
pub trait Renderer {
    /// Clears the colour and depth buffers before the next draw.
    fn clear(&mut self, colour: [f64; 4]);

    /// Draws every mesh of `scene` as seen through `camera`.
    fn draw(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()>;
}

/// One mesh to draw.
#[derive(Debug)]
pub struct DrawItem<'a> {
    pub model: usize,
    pub node: NodeId,
    pub mesh: &'a Mesh,
    /// Node world matrix; identity for skinned meshes, whose joints carry
    /// the full transform.
    pub world: Matrix4<f32>,
    /// Index into [`DrawList::palettes`].
    pub palette: Option<usize>,
}

/// All meshes of a scene, plus one joint palette per skin in use.
#[derive(Debug, Default)]
pub struct DrawList<'a> {
    pub items: Vec<DrawItem<'a>>,
    pub palettes: Vec<Vec<Matrix4<f32>>>,
}

impl<'a> DrawList<'a> {
    pub fn collect(scene: &'a Scene) -> Self {
        let mut list = Self::default();
        for (model_idx, model) in scene.models().iter().enumerate() {
            let world = model.world_matrices();
            let palette_base = list.palettes.len();
            list.palettes.extend(
                (0..model.skins.len()).map(|skin| model.joint_palette(skin, &world)),
            );
            for (id, node) in model.nodes() {
                let Some(mesh) = node.mesh() else {
                    continue;
                };
                let skinned = mesh.geometry.is_skinned() && mesh.skin.is_some_and(|s| s < model.skins.len());
                list.items.push(DrawItem {
                    model: model_idx,
                    node: id,
                    mesh,
                    world: if skinned { Matrix4::identity() } else { world[id.0] },
                    palette: mesh.skin.filter(|_| skinned).map(|skin| palette_base + skin),
                });
            }
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cgmath::Vector3;

    use crate::data_structures::model::{Geometry, Material, ModelAsset, Node, NodeKind, Skin};

    use super::*;

    fn mesh(skin: Option<usize>) -> NodeKind {
        let skinned = skin.is_some();
        NodeKind::Mesh(Mesh {
            geometry: Arc::new(Geometry {
                positions: vec![[0.0; 3]],
                joints: if skinned { vec![[0; 4]] } else { Vec::new() },
                weights: if skinned { vec![[1.0, 0.0, 0.0, 0.0]] } else { Vec::new() },
                ..Default::default()
            }),
            material: Material::default(),
            skin,
        })
    }

    #[test]
    fn empty_scene_draws_nothing() {
        let scene = Scene::new();
        assert!(DrawList::collect(&scene).is_empty());
    }

    #[test]
    fn static_meshes_use_world_matrices_and_skinned_ones_palettes() {
        let mut model = ModelAsset::new("scene");
        model.node_mut(model.root()).unwrap().transform.position = Vector3::new(0.0, -1.0, 0.0);
        let hips = model.add_child(model.root(), Node::new("hips", NodeKind::Joint));
        let body = model.add_child(model.root(), Node::new("body", mesh(Some(0))));
        let prop = model.add_child(model.root(), Node::new("prop", mesh(None)));
        model.skins.push(Skin {
            joints: vec![hips],
            inverse_bind: vec![Matrix4::identity()],
        });
        let mut scene = Scene::new();
        scene.add(model);

        let list = DrawList::collect(&scene);
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.palettes.len(), 1);

        let body_item = list.items.iter().find(|item| item.node == body).unwrap();
        assert_eq!(body_item.world, Matrix4::identity());
        assert_eq!(body_item.palette, Some(0));
        assert_eq!(list.palettes[0][0], Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0)));

        let prop_item = list.items.iter().find(|item| item.node == prop).unwrap();
        assert_eq!(prop_item.world, Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0)));
        assert_eq!(prop_item.palette, None);
    }
}
