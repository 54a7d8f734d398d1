//! Perspective camera and orbit controls.
//!
//! The camera is a plain eye/target pair with a perspective projection. The
//! [`OrbitControls`] accumulate pointer drags and wheel steps between frames
//! and apply them once per frame in [`OrbitControls::update`], orbiting the
//! camera around the control target at a constant up axis.

use std::f32::consts::PI;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl PerspectiveCamera {
    /// Camera at the origin looking down -Z.
    pub fn new(fovy: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
        Self {
            position: Point3::origin(),
            target: Point3::new(0.0, 0.0, -1.0),
            fovy,
            aspect,
            znear,
            zfar,
        }
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.projection_matrix() * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &PerspectiveCamera) {
        self.view_proj = camera.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the polar angle off the poles so `look_at` never degenerates.
const POLAR_EPSILON: f32 = 1e-3;

/// Orbits a camera around `target`: left drag rotates, wheel zooms.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    viewport_height: f32,
    // accumulated since the last update
    yaw_delta: f32,
    pitch_delta: f32,
    zoom_scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Point3::origin(),
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            dragging: false,
            last_cursor: None,
            viewport_height: 1.0,
            yaw_delta: 0.0,
            pitch_delta: 0.0,
            zoom_scale: 1.0,
        }
    }
}

impl OrbitControls {
    pub fn new(viewport_height: u32) -> Self {
        Self {
            viewport_height: viewport_height.max(1) as f32,
            ..Default::default()
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Drag by `(dx, dy)` pixels. A drag over the full viewport height turns a
    /// full circle.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32) {
        let turn = 2.0 * PI * self.rotate_speed / self.viewport_height;
        self.yaw_delta += dx * turn;
        self.pitch_delta += dy * turn;
    }

    /// Positive steps move away from the target.
    pub fn zoom_by_steps(&mut self, steps: f32) {
        self.zoom_scale *= 0.95_f32.powf(-steps * self.zoom_speed);
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some((x, y))) = (self.dragging, self.last_cursor) {
                    self.rotate_by_pixels((position.x - x) as f32, (position.y - y) as f32);
                }
                self.last_cursor = Some((position.x, position.y));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -*y,
                    MouseScrollDelta::PixelDelta(pos) => -(pos.y as f32) / 100.0,
                };
                self.zoom_by_steps(steps);
            }
            _ => (),
        }
    }

    /// Applies accumulated input to `camera`; returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.magnitude();
        let changed = self.yaw_delta != 0.0 || self.pitch_delta != 0.0 || self.zoom_scale != 1.0;
        if radius > 0.0 && changed {
            let mut theta = offset.x.atan2(offset.z);
            let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
            theta -= self.yaw_delta;
            phi = (phi - self.pitch_delta).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
            let radius = (radius * self.zoom_scale).clamp(self.min_distance, self.max_distance);

            let offset = Vector3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
            camera.position = self.target + offset;
        }
        camera.look_at(self.target);

        self.yaw_delta = 0.0;
        self.pitch_delta = 0.0;
        self.zoom_scale = 1.0;
        changed
    }
}
