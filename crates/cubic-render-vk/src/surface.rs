// SPDX-License-Identifier: CEPL-1.0
use crate::instance::VkInstance;
use anyhow::{Context, Result};
use ash::khr::surface;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Presentation surface for one window. Must drop before its instance.
pub struct VkSurface {
    loader: surface::Instance,
    handle: vk::SurfaceKHR,
}

impl VkSurface {
    pub unsafe fn new(
        instance: &VkInstance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Self> {
        let loader = surface::Instance::new(instance.entry(), instance.raw());
        let handle =
            ash_window::create_surface(instance.entry(), instance.raw(), display, window, None)
                .context("ash_window::create_surface")?;
        Ok(Self { loader, handle })
    }

    pub fn loader(&self) -> &surface::Instance {
        &self.loader
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub unsafe fn supports_present(&self, phys: vk::PhysicalDevice, family: u32) -> Result<bool> {
        self.loader
            .get_physical_device_surface_support(phys, family, self.handle)
            .context("get_physical_device_surface_support")
    }
}

impl Drop for VkSurface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}
