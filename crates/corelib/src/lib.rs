//! Core types: math re-exports, Transform, Camera, fur parameters, errors.

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4, vec3};

pub mod camera;
pub mod error;
pub mod fur;
pub mod transform;

pub use error::{CoreResult, FurError};
pub use fur::{FurCommand, FurParams, MeshSlot};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let t = transform::Transform::identity();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn placed_transform_lifts_and_scales() {
        let t = transform::Transform::placed(vec3(0.0, 1.0, 0.0), 2.0);
        let m = t.matrix().to_cols_array();
        assert!((m[13] - 1.0).abs() < 1e-6);
        assert!((m[0] - 2.0).abs() < 1e-6);
        assert!((m[5] - 2.0).abs() < 1e-6);
        assert!((m[10] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn world_applies_parent_first() {
        let t = transform::Transform::placed(Vec3::ZERO, 2.0);
        let parent = Mat4::from_translation(vec3(5.0, 0.0, 0.0));
        let p = t.world(parent).transform_point3(vec3(1.0, 0.0, 0.0));
        assert!((p.x - 7.0).abs() < 1e-6);
    }

    #[test]
    fn orbit_keeps_distance_and_clamps_pitch() {
        let mut cam = camera::Camera::orbiting(Vec3::ZERO, 4.0, 60f32.to_radians(), 16.0 / 9.0);
        cam.orbit(0.7, 10.0);
        assert!((cam.eye().length() - 4.0).abs() < 1e-4);
        assert!(cam.pitch <= 1.5);
        cam.zoom(0.01);
        assert!(cam.distance >= 0.5);
    }

    #[test]
    fn camera_matrices_are_finite() {
        let cam = camera::Camera::orbiting(Vec3::ZERO, 4.0, 60f32.to_radians(), 16.0 / 9.0);
        let pv = cam.proj() * cam.view();
        assert!(pv.to_cols_array().iter().all(|f| f.is_finite()));
    }
}
