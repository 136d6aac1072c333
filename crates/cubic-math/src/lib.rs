// SPDX-License-Identifier: CEPL-1.0
//! Small math layer shared by the renderer and the app: a `glam` re-export,
//! the perspective camera and keyboard-driven player motion.
#![deny(unsafe_op_in_unsafe_fn)]

mod camera;
mod motion;

pub use camera::PerspectiveCamera;
pub use glam;
pub use glam::{Mat4, Vec2, Vec3, Vec4};
pub use motion::{Motion, Player};
