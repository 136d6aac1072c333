// SPDX-License-Identifier: CEPL-1.0
//! Everything that depends on the current surface size: swapchain, render
//! pass, attachments, framebuffers, per-image command buffers and per-slot
//! synchronisation. Rebuilt as one unit whenever the surface goes stale.
use crate::command_pool::CommandPool;
use crate::device::DeviceContext;
use crate::image::{Image, ImageDesc, ImageView};
use crate::physical_device::PhysicalDevice;
use crate::render_pass::RenderPass;
use crate::surface::VkSurface;
use crate::swapchain::Swapchain;
use anyhow::{bail, Context, Result};
use ash::vk;
use cubic_render::frame::{Acquire, Present, SwapTarget};
use cubic_render::{RenderSize, MAX_FRAMES_IN_FLIGHT};
use tracing::{debug, info};

/// Field order is drop order after `Drop::drop` has released the raw handles.
pub struct RenderContext {
    device: ash::Device,
    command_pool: vk::CommandPool,
    graphics_queue: vk::Queue,
    presentation_queue: vk::Queue,

    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
    graphics_semaphores: Vec<vk::Semaphore>,
    presentation_semaphores: Vec<vk::Semaphore>,
    fences: Vec<vk::Fence>,

    depth_view: ImageView,
    _depth_image: Image,
    multisample_view: ImageView,
    _multisample_image: Image,
    render_pass: RenderPass,
    swapchain: Swapchain,

    viewport: vk::Viewport,
    scissor: vk::Rect2D,
    clear_values: [vk::ClearValue; 2],
    active_image: Option<u32>,
}

fn clear_values(color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

impl RenderContext {
    /// STRICT ORDER: swapchain (reusing `old`), render pass, multisample and
    /// depth attachments, framebuffers, command buffers, sync objects.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        surface: &VkSurface,
        physical: &PhysicalDevice,
        device: &DeviceContext,
        pool: &CommandPool,
        size: RenderSize,
        clear_color: [f32; 4],
        old: vk::SwapchainKHR,
    ) -> Result<Self> {
        let raw = device.raw();
        let swapchain = Swapchain::new(surface, physical, device, size, old)?;
        let extent = swapchain.extent();
        let samples = physical.multisample();

        let render_pass =
            RenderPass::new(raw, swapchain.format(), physical.depth_format(), samples)?;

        let multisample_image = Image::new(
            physical,
            raw,
            ImageDesc {
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                samples,
                format: swapchain.format(),
                usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                    | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )
        .context("multisample color image")?;
        let multisample_view = multisample_image.create_view(vk::ImageAspectFlags::COLOR)?;
        multisample_image.transition_layout(
            pool,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )?;

        let depth_image = Image::new(
            physical,
            raw,
            ImageDesc {
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                samples,
                format: physical.depth_format(),
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )
        .context("depth image")?;
        let depth_view = depth_image.create_view(vk::ImageAspectFlags::DEPTH)?;
        depth_image.transition_layout(
            pool,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        let mut ctx = Self {
            device: raw.clone(),
            command_pool: pool.handle(),
            graphics_queue: device.graphics_queue(),
            presentation_queue: device.presentation_queue(),
            framebuffers: Vec::new(),
            command_buffers: Vec::new(),
            graphics_semaphores: Vec::new(),
            presentation_semaphores: Vec::new(),
            fences: Vec::new(),
            depth_view,
            _depth_image: depth_image,
            multisample_view,
            _multisample_image: multisample_image,
            render_pass,
            swapchain,
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_values: clear_values(clear_color),
            active_image: None,
        };

        // Attachment order matches render_pass::{COLOR,DEPTH,RESOLVE}_ATTACHMENT.
        for view in ctx.swapchain.views() {
            let attachments = [
                ctx.multisample_view.handle(),
                ctx.depth_view.handle(),
                view.handle(),
            ];
            let ci = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: ctx.render_pass.handle(),
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: extent.width,
                height: extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = raw.create_framebuffer(&ci, None).context("create_framebuffer")?;
            ctx.framebuffers.push(fb);
        }

        ctx.command_buffers = pool.allocate(ctx.swapchain.image_count() as u32)?;
        ctx.graphics_semaphores = device.create_semaphores(MAX_FRAMES_IN_FLIGHT)?;
        ctx.presentation_semaphores = device.create_semaphores(MAX_FRAMES_IN_FLIGHT)?;
        ctx.fences = device.create_fences(MAX_FRAMES_IN_FLIGHT)?;

        info!(
            "Render context: {}x{} samples={:?} framebuffers={}",
            extent.width,
            extent.height,
            samples,
            ctx.framebuffers.len()
        );
        Ok(ctx)
    }

    pub fn swapchain_handle(&self) -> vk::SwapchainKHR {
        self.swapchain.handle()
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    pub fn viewport(&self) -> vk::Viewport {
        self.viewport
    }

    pub fn scissor(&self) -> vk::Rect2D {
        self.scissor
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_values = clear_values(color);
    }

    /// Command buffer of the image currently inside its render pass.
    pub fn active_command_buffer(&self) -> Option<vk::CommandBuffer> {
        self.active_image
            .and_then(|image| self.command_buffers.get(image as usize).copied())
    }

    fn command_buffer(&self, image: u32) -> Result<vk::CommandBuffer> {
        match self.command_buffers.get(image as usize) {
            Some(&cmd) => Ok(cmd),
            None => bail!("swapchain image {image} out of range"),
        }
    }
}

impl SwapTarget for RenderContext {
    fn acquire(&mut self, slot: usize) -> Result<Acquire> {
        let fence = self.fences[slot];
        unsafe {
            self.device
                .wait_for_fences(std::slice::from_ref(&fence), true, u64::MAX)
                .context("wait_for_fences")?;
            self.device
                .reset_fences(std::slice::from_ref(&fence))
                .context("reset_fences")?;

            match self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                self.graphics_semaphores[slot],
                vk::Fence::null(),
            ) {
                Ok((image, _suboptimal)) => Ok(Acquire::Image(image)),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::Stale),
                Err(e) => Err(e).context("acquire_next_image"),
            }
        }
    }

    fn begin_recording(&mut self, image: u32) -> Result<()> {
        let cmd = self.command_buffer(image)?;
        let framebuffer = self.framebuffers[image as usize];
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::RELEASE_RESOURCES)
                .context("reset_command_buffer")?;
            let bi = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            self.device
                .begin_command_buffer(cmd, &bi)
                .context("begin_command_buffer")?;
            self.device
                .cmd_set_viewport(cmd, 0, std::slice::from_ref(&self.viewport));
            self.device
                .cmd_set_scissor(cmd, 0, std::slice::from_ref(&self.scissor));

            let rpbi = vk::RenderPassBeginInfo {
                s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                render_pass: self.render_pass.handle(),
                framebuffer,
                render_area: self.scissor,
                clear_value_count: self.clear_values.len() as u32,
                p_clear_values: self.clear_values.as_ptr(),
                ..Default::default()
            };
            self.device
                .cmd_begin_render_pass(cmd, &rpbi, vk::SubpassContents::INLINE);
        }
        self.active_image = Some(image);
        Ok(())
    }

    fn submit(&mut self, slot: usize, image: u32) -> Result<()> {
        let cmd = self.command_buffer(image)?;
        self.active_image = None;
        let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        unsafe {
            self.device.cmd_end_render_pass(cmd);
            self.device
                .end_command_buffer(cmd)
                .context("end_command_buffer")?;

            let si = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                wait_semaphore_count: 1,
                p_wait_semaphores: &self.graphics_semaphores[slot],
                p_wait_dst_stage_mask: &wait_stage,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                signal_semaphore_count: 1,
                p_signal_semaphores: &self.presentation_semaphores[slot],
                ..Default::default()
            };
            self.device
                .queue_submit(
                    self.graphics_queue,
                    std::slice::from_ref(&si),
                    self.fences[slot],
                )
                .context("queue_submit")?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image: u32) -> Result<Present> {
        let swapchain = self.swapchain.handle();
        let pi = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.presentation_semaphores[slot],
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image,
            ..Default::default()
        };
        unsafe {
            match self
                .swapchain
                .loader()
                .queue_present(self.presentation_queue, &pi)
            {
                Ok(false) => {}
                Ok(true) => {
                    debug!("present: swapchain suboptimal");
                    return Ok(Present::Stale);
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(Present::Stale),
                Err(e) => return Err(e).context("queue_present"),
            }
            self.device
                .queue_wait_idle(self.presentation_queue)
                .context("queue_wait_idle(present)")?;
        }
        Ok(Present::Presented)
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        unsafe {
            for &fb in &self.framebuffers {
                self.device.destroy_framebuffer(fb, None);
            }
            if !self.command_buffers.is_empty() {
                self.device
                    .free_command_buffers(self.command_pool, &self.command_buffers);
            }
            for &s in self
                .graphics_semaphores
                .iter()
                .chain(&self.presentation_semaphores)
            {
                self.device.destroy_semaphore(s, None);
            }
            for &f in &self.fences {
                self.device.destroy_fence(f, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_values_are_color_then_depth() {
        let values = clear_values([0.25, 0.5, 0.75, 1.0]);
        unsafe {
            assert_eq!(values[0].color.float32, [0.25, 0.5, 0.75, 1.0]);
            assert_eq!(values[1].depth_stencil.depth, 1.0);
            assert_eq!(values[1].depth_stencil.stencil, 0);
        }
    }
}
