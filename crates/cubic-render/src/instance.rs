// SPDX-License-Identifier: CEPL-1.0
use crate::{StaticMeshId, TextureId};
use cubic_math::{Mat4, Vec3};

/// One placed, textured copy of a static mesh. `transform` is the full
/// projection * view * model matrix pushed per draw.
#[derive(Clone, Copy, Debug)]
pub struct StaticMeshInstance {
    mesh: StaticMeshId,
    texture: TextureId,
    position: Vec3,
    scale: Vec3,
    rotation_axis: Vec3,
    rotation_degrees: f32,
    transform: Mat4,
}

impl StaticMeshInstance {
    pub fn new(
        mesh: StaticMeshId,
        texture: TextureId,
        position: Vec3,
        scale: Vec3,
        rotation_axis: Vec3,
        rotation_degrees: f32,
    ) -> Self {
        Self {
            mesh,
            texture,
            position,
            scale,
            rotation_axis: rotation_axis.try_normalize().unwrap_or(Vec3::Y),
            rotation_degrees,
            transform: Mat4::IDENTITY,
        }
    }

    pub fn mesh(&self) -> StaticMeshId {
        self.mesh
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn rotate_by(&mut self, degrees: f32) {
        self.rotation_degrees += degrees;
        if self.rotation_degrees > 360.0 {
            self.rotation_degrees -= 360.0;
        } else if self.rotation_degrees < -360.0 {
            self.rotation_degrees += 360.0;
        }
    }

    /// Model matrix: translate, then rotate about the axis, then scale.
    pub fn model(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_axis_angle(self.rotation_axis, self.rotation_degrees.to_radians())
            * Mat4::from_scale(self.scale)
    }

    pub fn update(&mut self, projection_view: Mat4) {
        self.transform = projection_view * self.model();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cubic_math::Vec4;

    fn crate_at(x: f32) -> StaticMeshInstance {
        StaticMeshInstance::new(
            StaticMeshId::Crate,
            TextureId::Crate,
            Vec3::new(x, 0.0, 0.0),
            Vec3::splat(2.0),
            Vec3::new(0.0, 0.0, 3.0),
            0.0,
        )
    }

    #[test]
    fn rotation_wraps_past_a_full_turn() {
        let mut i = crate_at(0.0);
        i.rotate_by(350.0);
        i.rotate_by(20.0);
        assert_abs_diff_eq!(i.rotation_degrees(), 10.0, epsilon = 1e-4);
        i.rotate_by(-380.0);
        assert_abs_diff_eq!(i.rotation_degrees(), -10.0, epsilon = 1e-4);
    }

    #[test]
    fn update_composes_translate_rotate_scale() {
        let mut i = crate_at(1.0);
        i.rotate_by(90.0);
        i.update(Mat4::IDENTITY);
        // (1,0,0) scaled to (2,0,0), rotated about +Z to (0,2,0), moved by +1 x.
        let p = i.transform() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn degenerate_axis_falls_back_to_y() {
        let mut i = StaticMeshInstance::new(
            StaticMeshId::Torus,
            TextureId::RedCrossHatch,
            Vec3::ZERO,
            Vec3::ONE,
            Vec3::ZERO,
            45.0,
        );
        i.update(Mat4::IDENTITY);
        assert!(i.transform().is_finite());
    }
}
