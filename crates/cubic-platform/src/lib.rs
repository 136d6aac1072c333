// SPDX-License-Identifier: CEPL-1.0
//! Windowing glue. The app reaches `winit` through this re-export so the
//! version is pinned in one place.
#![deny(unsafe_op_in_unsafe_fn)]
use cubic_render::RenderSize;
pub use winit;

use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Size of the window's drawable area in physical pixels. On high-DPI
/// displays this differs from the logical size the window was requested at.
pub fn drawable_size(window: &Window) -> RenderSize {
    from_physical(window.inner_size())
}

pub fn from_physical(size: PhysicalSize<u32>) -> RenderSize {
    RenderSize::new(size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_maps_straight_through() {
        let s = from_physical(PhysicalSize::new(2560, 1440));
        assert_eq!(s, RenderSize::new(2560, 1440));
        assert!(from_physical(PhysicalSize::new(0, 1440)).is_empty());
    }
}
