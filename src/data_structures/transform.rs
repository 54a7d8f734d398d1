//! Local node transforms.
//!
//! A [`Transform`] is the translation / rotation / scale triple every node in a
//! model carries. Rotations are stored as quaternions; the Euler accessors use
//! XYZ order, which is what head tracking writes through.

use std::ops::Mul;

use cgmath::{Euler, One, Rad};

/// Position, rotation (as quaternion) and scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Rotation as XYZ Euler angles.
    pub fn euler(&self) -> Euler<Rad<f32>> {
        Euler::from(self.rotation)
    }

    /// Rotation about the up axis.
    pub fn yaw(&self) -> f32 {
        self.euler().y.0
    }

    /// Rotation about the side axis.
    pub fn pitch(&self) -> f32 {
        self.euler().x.0
    }

    /// Overwrites yaw and pitch and keeps the current roll.
    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        let roll = self.euler().z;
        self.rotation = Euler::new(Rad(pitch), Rad(yaw), roll).into();
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<cgmath::Vector3<f32>> for Transform {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Self::Output {
        let new_rotation = self.rotation * rhs.rotation;

        let new_scale = cgmath::Vector3::new(
            self.scale.x * rhs.scale.x,
            self.scale.y * rhs.scale.y,
            self.scale.z * rhs.scale.z,
        );
        let scaled_rhs_pos = cgmath::Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        let new_position = self.position + (self.rotation * scaled_rhs_pos);

        Transform {
            position: new_position,
            rotation: new_rotation,
            scale: new_scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Rotation3, Vector3};

    use super::*;

    #[test]
    fn yaw_pitch_round_trip_keeps_roll() {
        let mut t = Transform::new();
        t.rotation = cgmath::Quaternion::from_angle_z(Rad(0.3));
        t.set_yaw_pitch(0.5, -0.25);

        assert!((t.yaw() - 0.5).abs() < 1e-5);
        assert!((t.pitch() + 0.25).abs() < 1e-5);
        assert!((t.euler().z.0 - 0.3).abs() < 1e-5);
    }

    #[test]
    fn composition_applies_parent_scale_and_rotation() {
        let parent = Transform {
            position: Vector3::new(1.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::from_angle_y(cgmath::Deg(90.0)),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let child = Transform::from(Vector3::new(1.0, 0.0, 0.0));
        let world = &parent * &child;

        assert!((world.position.x - 1.0).abs() < 1e-5);
        assert!((world.position.z + 2.0).abs() < 1e-5);
        assert_eq!(world.scale, Vector3::new(2.0, 2.0, 2.0));
    }
}
