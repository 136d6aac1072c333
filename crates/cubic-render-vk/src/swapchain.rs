// SPDX-License-Identifier: CEPL-1.0
use crate::device::DeviceContext;
use crate::image::ImageView;
use crate::physical_device::PhysicalDevice;
use crate::surface::VkSurface;
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use cubic_render::{RenderError, RenderSize};
use tracing::info;

/// Prefers an 8-bit BGRA/RGBA UNORM format. A lone `UNDEFINED` entry means the
/// surface takes anything.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, RenderError> {
    let first = formats.first().ok_or_else(|| {
        RenderError::SurfaceNegotiation("surface reports no formats".into())
    })?;
    if formats.len() == 1 && first.format == vk::Format::UNDEFINED {
        return Ok(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        });
    }
    Ok([vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM]
        .into_iter()
        .find_map(|want| formats.iter().copied().find(|f| f.format == want))
        .unwrap_or(*first))
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
) -> Result<vk::PresentModeKHR, RenderError> {
    [
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::FIFO_RELAXED,
        vk::PresentModeKHR::IMMEDIATE,
    ]
    .into_iter()
    .find(|m| modes.contains(m))
    .ok_or_else(|| RenderError::SurfaceNegotiation("no supported present mode".into()))
}

/// One more than the minimum, capped by the maximum when there is one.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        want
    } else {
        want.min(caps.max_image_count)
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, size: RenderSize) -> vk::Extent2D {
    vk::Extent2D {
        width: size
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: size
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Swapchain plus one color view per image.
pub struct Swapchain {
    loader: swapchain::Device,
    handle: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<ImageView>,
}

impl Swapchain {
    /// `old` is handed to the driver for resource reuse; the caller still
    /// destroys it afterwards.
    pub unsafe fn new(
        surface: &VkSurface,
        physical: &PhysicalDevice,
        device: &DeviceContext,
        size: RenderSize,
        old: vk::SwapchainKHR,
    ) -> Result<Self> {
        let loader = surface.loader();
        let phys = physical.handle();
        let caps = loader
            .get_physical_device_surface_capabilities(phys, surface.handle())
            .context("get_physical_device_surface_capabilities")?;
        let formats = loader
            .get_physical_device_surface_formats(phys, surface.handle())
            .context("get_physical_device_surface_formats")?;
        let modes = loader
            .get_physical_device_surface_present_modes(phys, surface.handle())
            .context("get_physical_device_surface_present_modes")?;

        let surface_format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&modes)?;
        let extent = choose_extent(&caps, size);
        let image_count = choose_image_count(&caps);

        let queues = device.queues();
        let indices = queues.sharing_indices();
        let (sharing_mode, index_count, p_indices) = if queues.has_distinct_presentation_queue() {
            (
                vk::SharingMode::CONCURRENT,
                indices.len() as u32,
                indices.as_ptr(),
            )
        } else {
            (vk::SharingMode::EXCLUSIVE, 0, std::ptr::null())
        };

        let ci = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: surface.handle(),
            min_image_count: image_count,
            image_format: surface_format.format,
            image_color_space: surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: index_count,
            p_queue_family_indices: p_indices,
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };

        let swapchain_loader = device.swapchain_loader().clone();
        let handle = swapchain_loader
            .create_swapchain(&ci, None)
            .context("create_swapchain")?;
        let mut swapchain = Self {
            loader: swapchain_loader,
            handle,
            format: surface_format.format,
            extent,
            images: Vec::new(),
            views: Vec::new(),
        };

        swapchain.images = swapchain
            .loader
            .get_swapchain_images(handle)
            .context("get_swapchain_images")?;
        for &image in &swapchain.images {
            let view = ImageView::new(
                device.raw(),
                image,
                surface_format.format,
                vk::ImageAspectFlags::COLOR,
                1,
            )?;
            swapchain.views.push(view);
        }

        info!(
            "Swapchain: {:?} {:?} {}x{} images={}",
            surface_format.format,
            present_mode,
            extent.width,
            extent.height,
            swapchain.images.len()
        );
        Ok(swapchain)
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn loader(&self) -> &swapchain::Device {
        &self.loader
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn views(&self) -> &[ImageView] {
        &self.views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.views.clear();
        unsafe { self.loader.destroy_swapchain(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        }
    }

    #[test]
    fn format_prefers_bgra_then_rgba() {
        let formats = [
            fmt(vk::Format::R16G16B16A16_SFLOAT),
            fmt(vk::Format::R8G8B8A8_UNORM),
            fmt(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::B8G8R8A8_UNORM
        );
        assert_eq!(
            choose_surface_format(&formats[..2]).unwrap().format,
            vk::Format::R8G8B8A8_UNORM
        );
        assert_eq!(
            choose_surface_format(&formats[..1]).unwrap().format,
            vk::Format::R16G16B16A16_SFLOAT
        );
    }

    #[test]
    fn undefined_format_means_anything_goes() {
        let chosen = choose_surface_format(&[fmt(vk::Format::UNDEFINED)]).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn no_formats_is_a_negotiation_error() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(RenderError::SurfaceNegotiation(_))
        ));
    }

    #[test]
    fn present_mode_preference() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&[P::FIFO, P::MAILBOX]).unwrap(), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::IMMEDIATE, P::FIFO]).unwrap(), P::FIFO);
        assert_eq!(
            choose_present_mode(&[P::IMMEDIATE, P::FIFO_RELAXED]).unwrap(),
            P::FIFO_RELAXED
        );
        assert_eq!(choose_present_mode(&[P::IMMEDIATE]).unwrap(), P::IMMEDIATE);
        assert!(matches!(
            choose_present_mode(&[]),
            Err(RenderError::SurfaceNegotiation(_))
        ));
    }

    #[test]
    fn image_count_respects_maximum() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
    }

    #[test]
    fn extent_is_clamped() {
        let c = caps(2, 3);
        assert_eq!(
            choose_extent(&c, RenderSize::new(800, 600)),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        assert_eq!(
            choose_extent(&c, RenderSize::new(9000, 0)),
            vk::Extent2D {
                width: 4096,
                height: 1
            }
        );
    }
}
