//! Viewer configuration and the built-in content presets.
//!
//! Everything that differs between content iterations lives here: asset URLs,
//! the tracked joint name, how the model is placed and framed, and the
//! patch table for hand-authored recolouring. Presets are plain values;
//! a JSON file with the same shape can replace them.

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::model::NodePath,
    error::Result,
    patch::{PatchEffect, PatchEntry, PatchTable},
};

/// Perspective camera start state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 3.0],
        }
    }
}

/// Where the model root sits once inserted into the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub position: [f32; 3],
    pub scale: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            scale: 1.0,
        }
    }
}

/// Moves the camera back from the model's bounds by `distance_multiplier`
/// times the largest extent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Framing {
    pub distance_multiplier: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// CSS selector of the element the canvas is appended to (web only).
    pub attach_selector: String,
    pub model_url: String,
    pub texture_url: String,
    /// Name of the joint that follows the pointer.
    pub joint_name: String,
    /// Index of the clip to loop.
    pub clip_index: usize,
    pub camera: CameraConfig,
    pub placement: Placement,
    pub framing: Option<Framing>,
    pub patches: PatchTable,
    /// Clear the draw buffer explicitly before every draw.
    pub explicit_clear: bool,
    pub clear_colour: [f64; 4],
    /// Keep the camera aspect in sync with the window size.
    pub follow_resize: bool,
}

impl ViewerConfig {
    /// The robot: neck-tracked, model lowered by one unit, camera at z = 3.
    pub fn robot() -> Self {
        Self {
            attach_selector: "[data-3d=\"c\"]".to_string(),
            model_url: "https://uploads-ssl.webflow.com/648c93d1de00e945bb8365a3/649849d0e789129d13692b36_robot.v3-live.glb.txt".to_string(),
            texture_url: "https://uploads-ssl.webflow.com/648c93d1de00e945bb8365a3/649811ff6a5e21b5fd717436_robot-texture.png".to_string(),
            joint_name: "bb_neck".to_string(),
            clip_index: 0,
            camera: CameraConfig::default(),
            placement: Placement {
                position: [0.0, -1.0, 0.0],
                scale: 1.0,
            },
            framing: None,
            patches: PatchTable::default(),
            explicit_clear: false,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            follow_resize: false,
        }
    }

    /// The rigged character: head-tracked, framed on its bounds, with the
    /// accent parts recoloured.
    ///
    /// The asset names, patch paths and colours are placeholders for a local
    /// `character.glb`; point a JSON config at the real asset and its paths.
    pub fn character() -> Self {
        Self {
            model_url: "character.glb".to_string(),
            texture_url: "character-texture.png".to_string(),
            joint_name: "mixamorigHead".to_string(),
            placement: Placement::default(),
            framing: Some(Framing {
                distance_multiplier: 1.5,
            }),
            patches: PatchTable::new(vec![
                PatchEntry {
                    path: NodePath::new([0, 2, 1]),
                    effect: PatchEffect::Color([0.05, 0.05, 0.05]),
                },
                PatchEntry {
                    path: NodePath::new([0, 2, 3]),
                    effect: PatchEffect::Color([0.93, 0.35, 0.14]),
                },
                PatchEntry {
                    path: NodePath::new([0, 2, 4]),
                    effect: PatchEffect::Gradient {
                        from: [255, 140, 60],
                        to: [120, 40, 160],
                        height: 256,
                    },
                },
            ]),
            explicit_clear: true,
            clear_colour: [1.0, 1.0, 1.0, 1.0],
            ..Self::robot()
        }
    }

    /// A preset by name (`robot` or `character`).
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "robot" => Some(Self::robot()),
            "character" => Some(Self::character()),
            _ => None,
        }
    }

    /// Parses a JSON config; missing fields take the robot preset's values.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::robot()
    }
}
