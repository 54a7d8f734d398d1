//! Animation clips and keyframe sampling.

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};

use crate::data_structures::model::{ModelAsset, NodeId};

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
}

impl Keyframes {
    fn len(&self) -> usize {
        match self {
            Keyframes::Translation(values) => values.len(),
            Keyframes::Rotation(values) => values.len(),
            Keyframes::Scale(values) => values.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
}

/// One animated property of one node.
#[derive(Clone, Debug)]
pub struct Track {
    pub target: NodeId,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
    pub interpolation: Interpolation,
}

impl Track {
    /// Index pair and blend factor for time `t`, clamped to the track ends.
    fn locate(&self, t: f32) -> Option<(usize, usize, f32)> {
        let len = self.timestamps.len().min(self.keyframes.len());
        if len == 0 {
            return None;
        }
        if len == 1 || t <= self.timestamps[0] {
            return Some((0, 0, 0.0));
        }
        if t >= self.timestamps[len - 1] {
            return Some((len - 1, len - 1, 0.0));
        }
        let next = self.timestamps[..len].partition_point(|&stamp| stamp <= t);
        let prev = next - 1;
        let span = self.timestamps[next] - self.timestamps[prev];
        let factor = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear if span > 0.0 => (t - self.timestamps[prev]) / span,
            Interpolation::Linear => 0.0,
        };
        Some((prev, next, factor))
    }

    fn apply(&self, t: f32, model: &mut ModelAsset) {
        let Some((prev, next, factor)) = self.locate(t) else {
            return;
        };
        let Some(node) = model.node_mut(self.target) else {
            return;
        };
        let transform = &mut node.transform;
        match &self.keyframes {
            Keyframes::Translation(values) => {
                transform.position = values[prev].lerp(values[next], factor);
            }
            Keyframes::Rotation(values) => {
                let (a, b) = (values[prev], values[next]);
                // take the short way round
                let b = if a.dot(b) < 0.0 { -b } else { b };
                transform.rotation = a.slerp(b, factor).normalize();
            }
            Keyframes::Scale(values) => {
                transform.scale = values[prev].lerp(values[next], factor);
            }
        }
    }
}

/// A named, prerecorded sequence of node transforms.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub tracks: Vec<Track>,
    pub duration: f32,
}

impl AnimationClip {
    /// Clip whose duration is the last timestamp over all tracks.
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .filter_map(|track| track.timestamps.last().copied())
            .fold(0.0, f32::max);
        Self {
            name: name.into(),
            tracks,
            duration,
        }
    }

    /// Poses every targeted node of `model` at time `t`.
    pub fn sample(&self, t: f32, model: &mut ModelAsset) {
        for track in &self.tracks {
            track.apply(t, model);
        }
    }
}
