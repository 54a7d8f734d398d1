//! Clip playback.
//!
//! An [`AnimationMixer`] owns playing instances of clips ([`AnimationAction`])
//! and poses a model from them each frame.

use instant::Duration;

use crate::{data_structures::model::ModelAsset, resources::animation::AnimationClip};

/// One playing instance of a clip. Actions loop: time wraps at the end of
/// the clip, forever.
#[derive(Clone, Debug)]
pub struct AnimationAction {
    clip: AnimationClip,
    time: f32,
    playing: bool,
}

impl AnimationAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            playing: false,
        }
    }

    pub fn play(&mut self) -> &mut Self {
        self.playing = true;
        self
    }

    pub fn is_running(&self) -> bool {
        self.playing
    }

    /// Local time within the clip.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        let duration = self.clip.duration;
        self.time = if duration > 0.0 {
            (self.time + dt).rem_euclid(duration)
        } else {
            0.0
        };
    }
}

#[derive(Debug, Default)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stopped action for `clip` and returns it.
    pub fn clip_action(&mut self, clip: &AnimationClip) -> &mut AnimationAction {
        self.actions.push(AnimationAction::new(clip.clone()));
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    /// Advances every running action by `dt` and poses `model`.
    pub fn update(&mut self, dt: Duration, model: &mut ModelAsset) {
        let dt = dt.as_secs_f32();
        for action in self.actions.iter_mut().filter(|action| action.is_running()) {
            action.advance(dt);
            action.clip.sample(action.time, model);
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use crate::{
        data_structures::model::{Node, NodeKind},
        resources::animation::{Interpolation, Keyframes, Track},
    };

    use super::*;

    fn rig() -> (ModelAsset, AnimationClip) {
        let mut model = ModelAsset::new("scene");
        let hips = model.add_child(model.root(), Node::new("hips", NodeKind::Joint));
        let clip = AnimationClip::new(
            "walk",
            vec![Track {
                target: hips,
                timestamps: vec![0.0, 2.0],
                keyframes: Keyframes::Translation(vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(4.0, 0.0, 0.0)]),
                interpolation: Interpolation::Linear,
            }],
        );
        model.clips.push(clip.clone());
        (model, clip)
    }

    fn hips_x(model: &ModelAsset) -> f32 {
        model.node(model.root()).map(|root| root.children[0]).and_then(|hips| model.node(hips)).unwrap().transform.position.x
    }

    #[test]
    fn repeat_wraps_past_the_duration() {
        let (mut model, clip) = rig();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();

        mixer.update(Duration::from_millis(2500), &mut model);
        assert!(mixer.actions()[0].is_running());
        assert!((mixer.actions()[0].time() - 0.5).abs() < 1e-5);
        assert!((hips_x(&model) - 1.0).abs() < 1e-5);

        mixer.update(Duration::from_secs(10), &mut model);
        assert!(mixer.actions()[0].is_running());
    }

    #[test]
    fn zero_length_clips_stay_at_the_start() {
        let (mut model, mut clip) = rig();
        clip.duration = 0.0;
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();

        mixer.update(Duration::from_secs(3), &mut model);
        assert!(mixer.actions()[0].is_running());
        assert_eq!(mixer.actions()[0].time(), 0.0);
        assert_eq!(hips_x(&model), 0.0);
    }

    #[test]
    fn actions_wait_for_play() {
        let (mut model, clip) = rig();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip);

        mixer.update(Duration::from_secs(1), &mut model);
        assert_eq!(mixer.actions()[0].time(), 0.0);
        assert_eq!(hips_x(&model), 0.0);
    }
}
