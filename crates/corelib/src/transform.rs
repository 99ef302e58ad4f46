use crate::{EulerRot, Mat4, Quat, Vec3};

/// Placement of a renderable: T * R * S with Euler XYZ rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    /// Euler angles in radians (XYZ order).
    pub rotation_euler: Vec3,
    pub scale: Vec3,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation_euler: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    #[inline]
    pub fn from_trs(translation: Vec3, rotation_euler: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation_euler,
            scale,
        }
    }

    /// Lift by `translation`, no rotation, uniform `scale`.
    #[inline]
    pub fn placed(translation: Vec3, scale: f32) -> Self {
        Self::from_trs(translation, Vec3::ZERO, Vec3::splat(scale))
    }

    /// Local matrix (column-major, glam convention).
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        let q = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation_euler.x,
            self.rotation_euler.y,
            self.rotation_euler.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, q, self.translation)
    }

    /// World matrix under a parent: `parent * local`.
    #[inline]
    pub fn world(&self, parent: Mat4) -> Mat4 {
        parent * self.matrix()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
