//! rigview
//!
//! A single-scene viewer for one rigged model: the model's first clip loops,
//! one named joint follows the pointer, every mesh is shown unlit with a
//! shared colour map, and a declarative patch table recolours selected parts.
//! Runs in a native window or on a canvas appended to a web page.
//!
//! High-level modules
//! - `camera`: perspective camera, orbit controls and the camera uniform
//! - `clock`: frame deltas
//! - `config`: viewer configuration and the built-in presets
//! - `context`: GPU and window context
//! - `data_structures`: model hierarchy, transforms, textures and the scene
//! - `flow`: the render loop and the winit host driving it
//! - `gpu`: the WGPU renderer
//! - `mixer`: clip playback
//! - `patch`: material patching, placement and framing of a loaded model
//! - `pipelines`: render pipeline definitions
//! - `render`: the renderer seam and draw list
//! - `resources`: asset fetching and glTF / image decoding
//! - `session`: per-viewer state the loop operates on
//! - `tracking`: pointer state and head tracking
//!

pub mod camera;
pub mod clock;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod gpu;
pub mod mixer;
pub mod patch;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod session;
pub mod tracking;

pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use flow::run;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Page entry point: starts the robot viewer on the configured element.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start() -> std::result::Result<(), JsValue> {
    run(ViewerConfig::default()).map_err(|e| JsValue::from_str(&e.to_string()))
}
