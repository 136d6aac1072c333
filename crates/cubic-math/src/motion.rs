// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use glam::{Mat4, Vec3};

bitflags! {
    /// Movement requested for one tick, collected from held keys.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Motion: u8 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const TURN_LEFT = 1 << 4;
        const TURN_RIGHT = 1 << 5;
    }
}

/// Ground-plane player pose: a position plus a yaw around +Y.
#[derive(Clone, Copy, Debug)]
pub struct Player {
    position: Vec3,
    rotation_degrees: f32,
    forward: Vec3,
}

impl Player {
    /// Units per second.
    pub const MOVE_SPEED: f32 = 5.0;
    /// Degrees per second.
    pub const TURN_SPEED: f32 = 120.0;

    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            rotation_degrees: 0.0,
            forward: forward_from(0.0),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.forward
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn apply(&mut self, motion: Motion, delta: f32) {
        let step = Self::MOVE_SPEED * delta;
        if motion.contains(Motion::FORWARD) {
            self.position -= self.forward * step;
        }
        if motion.contains(Motion::BACKWARD) {
            self.position += self.forward * step;
        }
        if motion.contains(Motion::UP) {
            self.position.y += step;
        }
        if motion.contains(Motion::DOWN) {
            self.position.y -= step;
        }
        if motion.contains(Motion::TURN_LEFT) {
            self.turn(Self::TURN_SPEED * delta);
        }
        if motion.contains(Motion::TURN_RIGHT) {
            self.turn(-Self::TURN_SPEED * delta);
        }
    }

    fn turn(&mut self, degrees: f32) {
        self.rotation_degrees += degrees;
        if self.rotation_degrees > 360.0 {
            self.rotation_degrees -= 360.0;
        } else if self.rotation_degrees < 0.0 {
            self.rotation_degrees += 360.0;
        }
        self.forward = forward_from(self.rotation_degrees);
    }
}

fn forward_from(rotation_degrees: f32) -> Vec3 {
    Mat4::from_rotation_y(rotation_degrees.to_radians())
        .transform_vector3(Vec3::Z)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn forward_moves_against_facing_vector() {
        let mut p = Player::new(Vec3::new(0.0, 0.0, 2.0));
        p.apply(Motion::FORWARD, 1.0);
        assert_abs_diff_eq!(p.position().z, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut p = Player::new(Vec3::ZERO);
        p.apply(Motion::UP | Motion::DOWN | Motion::FORWARD | Motion::BACKWARD, 0.5);
        assert_abs_diff_eq!(p.position().length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn quarter_turn_left_faces_positive_x() {
        let mut p = Player::new(Vec3::ZERO);
        p.apply(Motion::TURN_LEFT, 0.75);
        assert_abs_diff_eq!(p.rotation_degrees(), 90.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p.direction().x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.direction().z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn turning_right_from_zero_wraps_into_range() {
        let mut p = Player::new(Vec3::ZERO);
        p.apply(Motion::TURN_RIGHT, 0.25);
        assert_abs_diff_eq!(p.rotation_degrees(), 330.0, epsilon = 1e-4);
    }
}
