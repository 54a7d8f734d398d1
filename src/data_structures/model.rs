//! Loaded model hierarchy.
//!
//! A [`ModelAsset`] is an arena of [`Node`]s rooted in one synthetic transform
//! node, the same shape a glTF scene takes once imported: the root's children
//! are the scene's top-level nodes. Nodes are tagged by [`NodeKind`] so a
//! traversal can match exhaustively instead of probing capability flags.
//!
//! Nodes are addressed by [`NodeId`] (an index into the arena) or by a
//! [`NodePath`] of child indices starting at the root.

use std::{fmt, sync::Arc};

use cgmath::{Matrix4, Point3, SquareMatrix, Transform as _};
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{texture::TextureAsset, transform::Transform},
    error::{Result, ViewerError},
    resources::animation::AnimationClip,
};

/// Index of a node inside its [`ModelAsset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Child indices leading from the model root to a node, e.g. `root/0/2/5`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        for idx in &self.0 {
            write!(f, "/{idx}")?;
        }
        Ok(())
    }
}

/// Unlit surface: the colour map scaled by a flat colour.
#[derive(Clone, Debug)]
pub struct Material {
    /// Linear RGB multiplier applied to the colour map.
    pub color: [f32; 3],
    pub map: Option<Arc<TextureAsset>>,
}

impl Material {
    /// Unlit material that shows `map` unmodified.
    pub fn unlit(map: Arc<TextureAsset>) -> Self {
        Self {
            color: [1.0; 3],
            map: Some(map),
        }
    }

    /// Unlit material with one flat colour and no map.
    pub fn flat(color: [f32; 3]) -> Self {
        Self {
            color,
            map: None,
        }
    }

    /// True if the colour map is exactly `texture` (same allocation).
    pub fn uses_map(&self, texture: &Arc<TextureAsset>) -> bool {
        self.map
            .as_ref()
            .is_some_and(|map| Arc::ptr_eq(map, texture))
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [1.0; 3],
            map: None,
        }
    }
}

/// Vertex streams of one mesh primitive.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn is_skinned(&self) -> bool {
        !self.joints.is_empty() && self.joints.len() == self.weights.len()
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: Material,
    /// Index into [`ModelAsset::skins`].
    pub skin: Option<usize>,
}

/// Joints and inverse bind matrices of one skeleton binding.
#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub joints: Vec<NodeId>,
    pub inverse_bind: Vec<Matrix4<f32>>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Plain grouping node.
    Transform,
    /// Skeleton joint that can be posed independently.
    Joint,
    Mesh(Mesh),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::new(),
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn is_joint(&self) -> bool {
        matches!(self.kind, NodeKind::Joint)
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Joint | NodeKind::Transform => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Joint | NodeKind::Transform => None,
        }
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn from_point(p: Point3<f32>) -> Self {
        Self { min: p, max: p }
    }

    pub fn extend(&mut self, p: Point3<f32>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn center(&self) -> Point3<f32> {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    pub fn size(&self) -> cgmath::Vector3<f32> {
        self.max - self.min
    }

    pub fn max_extent(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }
}

/// A loaded model: node arena, skins and animation clips.
#[derive(Clone, Debug)]
pub struct ModelAsset {
    nodes: Vec<Node>,
    pub skins: Vec<Skin>,
    pub clips: Vec<AnimationClip>,
}

impl ModelAsset {
    /// Model with only a root transform node named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(root_name, NodeKind::Transform)],
            skins: Vec::new(),
            clips: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(idx, node)| (NodeId(idx), node))
    }

    /// Appends `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.push(id);
        }
        id
    }

    /// Node ids of the subtree below (and including) `start`, depth first.
    pub fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Depth-first traversal of the whole model with mutable access.
    pub fn traverse_mut(&mut self, mut f: impl FnMut(&mut Node)) {
        for id in self.descendants(self.root()) {
            f(&mut self.nodes[id.0]);
        }
    }

    /// Resolves a child-index path starting at the root.
    pub fn resolve(&self, path: &NodePath) -> Result<NodeId> {
        path.0.iter().try_fold(self.root(), |current, &child| {
            self.node(current)
                .and_then(|node| node.children.get(child))
                .copied()
                .ok_or_else(|| ViewerError::HierarchyMismatch { path: path.clone() })
        })
    }

    /// Last joint named `name` in depth-first order.
    pub fn find_joint(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.nodes[id.0].is_joint() && self.nodes[id.0].name == name)
            .last()
    }

    /// World matrices of all nodes, indexed like the arena.
    pub fn world_matrices(&self) -> Vec<Matrix4<f32>> {
        let mut world = vec![Matrix4::identity(); self.nodes.len()];
        for id in self.descendants(self.root()) {
            let node = &self.nodes[id.0];
            let parent = node
                .parent
                .map_or_else(Matrix4::identity, |parent| world[parent.0]);
            world[id.0] = parent * node.transform.to_matrix();
        }
        world
    }

    /// World-space bounds of all mesh vertices in their rest pose.
    pub fn bounding_box(&self) -> Option<Aabb> {
        let world = self.world_matrices();
        let mut bounds: Option<Aabb> = None;
        for (id, node) in self.nodes() {
            let Some(mesh) = node.mesh() else {
                continue;
            };
            for &position in &mesh.geometry.positions {
                let p = world[id.0].transform_point(Point3::from(position));
                match bounds.as_mut() {
                    Some(aabb) => aabb.extend(p),
                    None => bounds = Some(Aabb::from_point(p)),
                }
            }
        }
        bounds
    }

    /// Joint palette (`joint_world * inverse_bind`) for `skin`.
    pub fn joint_palette(&self, skin: usize, world: &[Matrix4<f32>]) -> Vec<Matrix4<f32>> {
        let Some(skin) = self.skins.get(skin) else {
            return Vec::new();
        };
        skin.joints
            .iter()
            .enumerate()
            .map(|(idx, joint)| {
                let joint_world = world.get(joint.0).copied().unwrap_or_else(Matrix4::identity);
                let inverse_bind = skin
                    .inverse_bind
                    .get(idx)
                    .copied()
                    .unwrap_or_else(Matrix4::identity);
                joint_world * inverse_bind
            })
            .collect()
    }
}
