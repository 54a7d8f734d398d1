//! Viewer data structures: models, textures, transforms and the scene root.
//!
//! - `model` holds the tagged node arena of a loaded model, its skins and bounds
//! - `scene_graph` is the scene root that owns inserted models
//! - `texture` holds the shared texture asset and its GPU wrapper
//! - `transform` holds per-node translation, rotation and scale

pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
