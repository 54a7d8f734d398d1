//! Pointer-driven head tracking.
//!
//! The pointer is kept in normalized device coordinates: `x` runs from -1 at
//! the left edge to 1 at the right, `y` from 1 at the top to -1 at the bottom.
//! Each frame the tracked joint's yaw is set to `x` and its pitch to `-y`
//! radians. Roll is left alone.

use crate::data_structures::model::{ModelAsset, NodeId};

/// Last known pointer position in normalized device coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
}

impl PointerState {
    /// Converts a position in window pixels to normalized coordinates.
    pub fn from_client(position: (f64, f64), size: (u32, u32)) -> Self {
        let mut pointer = Self::default();
        pointer.update(position, size);
        pointer
    }

    /// Records a pointer move. Zero-sized windows leave the state unchanged.
    pub fn update(&mut self, (cx, cy): (f64, f64), (width, height): (u32, u32)) {
        if width == 0 || height == 0 {
            return;
        }
        self.x = (cx / width as f64 * 2.0 - 1.0) as f32;
        self.y = (-(cy / height as f64) * 2.0 + 1.0) as f32;
    }
}

/// Points `joint` along the pointer. Does nothing without a joint.
pub fn apply_head_tracking(pointer: &PointerState, joint: Option<NodeId>, model: &mut ModelAsset) {
    let Some(node) = joint.and_then(|joint| model.node_mut(joint)) else {
        return;
    };
    node.transform.set_yaw_pitch(pointer.x, -pointer.y);
}
