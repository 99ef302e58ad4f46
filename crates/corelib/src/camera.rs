use crate::{Mat4, Vec3};

const MIN_PITCH: f32 = -1.5;
const MAX_PITCH: f32 = 1.5;
const MIN_DISTANCE: f32 = 0.5;

/// Perspective camera orbiting a target point (right-handed, depth in [0,1]).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub target: Vec3,
    pub up: Vec3,
    /// Rotation around `up`, radians.
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn orbiting(target: Vec3, distance: f32, fov_y_rad: f32, aspect: f32) -> Self {
        Self {
            target,
            up: Vec3::Y,
            yaw: 0.0,
            pitch: 0.0,
            distance: distance.max(MIN_DISTANCE),
            fov_y_rad,
            z_near: 0.1,
            z_far: 100.0,
            aspect,
        }
    }

    /// World-space eye position derived from yaw/pitch/distance.
    pub fn eye(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + Vec3::new(sy * cp, sp, cy * cp) * self.distance
    }

    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw += d_yaw;
        self.pitch = (self.pitch + d_pitch).clamp(MIN_PITCH, MAX_PITCH);
    }

    /// Move toward (`factor < 1`) or away from the target.
    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance * factor).max(MIN_DISTANCE);
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, self.up)
    }

    /// glam's `perspective_rh` already maps depth to [0,1], which is what wgpu wants.
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }
}
