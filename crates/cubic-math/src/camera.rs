// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Vec3};

/// Right-handed perspective camera looking from `position` towards
/// `position - direction`.
#[derive(Clone, Copy, Debug)]
pub struct PerspectiveCamera {
    projection: Mat4,
    position: Vec3,
    target: Vec3,
}

impl PerspectiveCamera {
    pub const FIELD_OF_VIEW_DEGREES: f32 = 60.0;
    pub const NEAR: f32 = 0.01;
    pub const FAR: f32 = 100.0;

    pub fn new(width: f32, height: f32) -> Self {
        // A minimised window reports 0 height; keep the aspect finite.
        let aspect = width.max(1.0) / height.max(1.0);
        Self {
            projection: Mat4::perspective_rh_gl(
                Self::FIELD_OF_VIEW_DEGREES.to_radians(),
                aspect,
                Self::NEAR,
                Self::FAR,
            ),
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
        }
    }

    pub fn configure(&mut self, position: Vec3, direction: Vec3) {
        self.position = position;
        self.target = position - direction;
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// `projection * view`, the prefix of every instance transform.
    pub fn projection_view(&self) -> Mat4 {
        self.projection * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Vec4;

    #[test]
    fn view_places_target_on_negative_z() {
        let mut cam = PerspectiveCamera::new(800.0, 600.0);
        cam.configure(Vec3::new(0.0, 0.0, 2.0), Vec3::Z);

        let p = cam.view() * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_height_does_not_produce_nan() {
        let cam = PerspectiveCamera::new(640.0, 0.0);
        assert!(cam.projection_view().is_finite());
    }

    #[test]
    fn aspect_feeds_projection() {
        let wide = PerspectiveCamera::new(1600.0, 800.0).projection();
        let square = PerspectiveCamera::new(800.0, 800.0).projection();
        assert_abs_diff_eq!(wide.x_axis.x * 2.0, square.x_axis.x, epsilon = 1e-5);
        assert_abs_diff_eq!(wide.y_axis.y, square.y_axis.y, epsilon = 1e-5);
    }
}
