//! Viewer session state.
//!
//! A [`Session`] owns everything one viewer instance mutates: the scene, the
//! camera and its orbit controls, the pointer, and, once the assets have
//! arrived, the animation mixer and the tracked joint. The render loop and
//! the host only ever reach this state through the session, on one thread.

use cgmath::Point3;
use instant::Duration;

use crate::{
    camera::{OrbitControls, PerspectiveCamera},
    config::ViewerConfig,
    data_structures::{model::NodeId, scene_graph::Scene},
    error::{Result, ViewerError},
    mixer::AnimationMixer,
    patch::{self, PatchReport},
    render::Renderer,
    resources::LoadedAssets,
    tracking::{self, PointerState},
};

#[derive(Debug)]
pub struct Session {
    config: ViewerConfig,
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    pointer: PointerState,
    mixer: Option<AnimationMixer>,
    joint: Option<NodeId>,
    model: Option<usize>,
    size: (u32, u32),
}

impl Session {
    /// Sets up an empty scene and a camera sized for a `width` x `height` view.
    pub fn new(config: ViewerConfig, (width, height): (u32, u32)) -> Self {
        let aspect = if height > 0 { width as f32 / height as f32 } else { 1.0 };
        let mut camera = PerspectiveCamera::new(
            config.camera.fov_deg,
            aspect,
            config.camera.near,
            config.camera.far,
        );
        camera.position = config.camera.position.into();
        let controls = OrbitControls::new(height);
        camera.look_at(controls.target);

        Self {
            config,
            scene: Scene::new(),
            camera,
            controls,
            pointer: PointerState::default(),
            mixer: None,
            joint: None,
            model: None,
            size: (width, height),
        }
    }

    pub fn on_pointer_moved(&mut self, position: (f64, f64)) {
        self.pointer.update(position, self.size);
    }

    /// Patches the loaded model, starts its clip and inserts it into the scene.
    pub fn on_assets_loaded(&mut self, assets: LoadedAssets) -> PatchReport {
        let LoadedAssets { mut model, texture } = assets;
        if let Some(idx) = self.model {
            log::warn!("replacing previously loaded model {idx}");
        }

        self.joint = patch::patch_materials(&mut model, &texture, &self.config.joint_name);
        let report = self.config.patches.apply(&mut model);
        if !report.mismatches.is_empty() {
            log::warn!(
                "{} of {} patches did not match the model",
                report.mismatches.len(),
                self.config.patches.entries().len()
            );
        }
        patch::place(&mut model, &self.config.placement);
        if let Some(framing) = &self.config.framing {
            patch::frame(&model, framing, &mut self.camera, &mut self.controls);
        }

        self.mixer = match model.clips.get(self.config.clip_index) {
            Some(clip) => {
                log::info!("looping clip {:?} ({:.2}s)", clip.name, clip.duration);
                let mut mixer = AnimationMixer::new();
                mixer.clip_action(clip).play();
                Some(mixer)
            }
            None => {
                log::warn!(
                    "model has {} clips, no clip at index {}",
                    model.clips.len(),
                    self.config.clip_index
                );
                None
            }
        };

        // one top-level model per session
        self.scene = Scene::new();
        self.model = Some(self.scene.add(model));
        log::info!("model inserted, tracking joint {:?}", self.joint);
        report
    }

    /// Logs a failed load. The session keeps rendering its empty scene.
    pub fn on_assets_failed(&mut self, err: &ViewerError) {
        log::error!("asset load failed: {err}");
    }

    /// One frame of work after the next frame has been scheduled.
    pub fn tick(&mut self, dt: Duration, renderer: &mut dyn Renderer) -> Result<()> {
        self.controls.update(&mut self.camera);

        if let Some(model) = self.model.and_then(|idx| self.scene.model_mut(idx)) {
            if let Some(mixer) = self.mixer.as_mut() {
                mixer.update(dt, model);
            }
            tracking::apply_head_tracking(&self.pointer, self.joint, model);
        }

        if self.config.explicit_clear {
            renderer.clear(self.config.clear_colour);
        }
        renderer.draw(&self.scene, &self.camera)
    }

    /// Records the new view size. The camera aspect only follows when
    /// `follow_resize` is set.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.controls.set_viewport_height(height);
        if self.config.follow_resize {
            self.camera.set_aspect(width, height);
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn joint(&self) -> Option<NodeId> {
        self.joint
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    pub fn model_index(&self) -> Option<usize> {
        self.model
    }

    /// Orbit center the controls currently use.
    pub fn orbit_target(&self) -> Point3<f32> {
        self.controls.target
    }
}
