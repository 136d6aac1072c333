// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend on `ash`.
//!
//! Object graph, outermost first: instance, surface, physical device, logical
//! device, command pool, then the surface-dependent [`RenderContext`] and the
//! asset cache whose pipelines are built against it. Each wrapper tears itself
//! down on drop; [`VkRenderer`] declares its fields in reverse construction
//! order so the whole graph unwinds correctly.
use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use cubic_render::{
    AssetCache, AssetManifest, FrameLoop, FrameStep, PipelineId, RenderSettings, RenderSize,
    Renderer, StaticMeshInstance,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::path::PathBuf;

use ash::vk;

mod asset_factory;
mod buffer;
mod command_pool;
mod device;
mod image;
mod instance;
mod mesh;
mod physical_device;
mod pipeline;
mod render_context;
mod render_pass;
mod surface;
mod swapchain;
mod texture;

use asset_factory::VkAssetFactory;
use command_pool::CommandPool;
use device::DeviceContext;
use instance::VkInstance;
use mesh::VkMesh;
use physical_device::PhysicalDevice;
use pipeline::Pipeline;
use render_context::RenderContext;
use surface::VkSurface;
use texture::Texture;

pub use device::{resolve_queue_families, QueueFamilyConfig};
pub use image::transition_masks;
pub use physical_device::{find_memory_type, pick_preferred_device, pick_sample_count};
pub use swapchain::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format};
pub use texture::mip_levels;

pub struct VkRenderer {
    // Drop order matters: later fields are created first and destroyed last.
    assets: AssetCache<Pipeline, VkMesh, Texture>,
    render_context: RenderContext,
    frames: FrameLoop,
    command_pool: CommandPool,
    device: DeviceContext,
    physical: PhysicalDevice,
    surface: VkSurface,
    _instance: VkInstance,

    asset_root: PathBuf,
    size: RenderSize,
    clear_color: [f32; 4],
    paused: bool,
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe { self.device.wait_idle().ok() };
    }
}

/// Cheap availability check: can the Vulkan loader be opened at all.
pub fn probe_loader() -> bool {
    match unsafe { ash::Entry::load() } {
        Ok(_) => true,
        Err(e) => {
            warn!("Vulkan loader not available: {e}");
            false
        }
    }
}

unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    settings: &RenderSettings,
) -> Result<VkRenderer> {
    let dh: RawDisplayHandle = display.display_handle()?.as_raw();
    let wh: RawWindowHandle = window.window_handle()?.as_raw();

    // STRICT ORDER: each step borrows everything before it.
    let instance = VkInstance::new(dh)?;
    let surface = VkSurface::new(&instance, dh, wh)?;
    let physical = PhysicalDevice::select(instance.raw())?;
    let device = DeviceContext::new(instance.raw(), &physical, &surface)?;
    let command_pool = CommandPool::new(&device)?;
    let render_context = RenderContext::new(
        &surface,
        &physical,
        &device,
        &command_pool,
        size,
        settings.clear_color,
        vk::SwapchainKHR::null(),
    )?;

    Ok(VkRenderer {
        assets: AssetCache::new(),
        render_context,
        frames: FrameLoop::new(),
        command_pool,
        device,
        physical,
        surface,
        _instance: instance,
        asset_root: settings.asset_root.clone(),
        size,
        clear_color: settings.clear_color,
        paused: size.is_empty(),
    })
}

impl VkRenderer {
    pub fn device_name(&self) -> &str {
        self.physical.name()
    }

    pub fn pipeline_generation(&self) -> u64 {
        self.assets.pipeline_generation()
    }

    /// Runs one half of the frame protocol. A stale surface rebuilds the
    /// whole surface-dependent graph against the current window size, then
    /// every pipeline against the new render pass, and reports `false`.
    fn step(&mut self, step: FrameStep) -> Result<bool> {
        let Self {
            assets,
            render_context,
            frames,
            command_pool,
            device,
            physical,
            surface,
            asset_root,
            size,
            clear_color,
            ..
        } = self;
        let (size, clear_color) = (*size, *clear_color);
        let (device, physical, surface, command_pool) =
            (&*device, &*physical, &*surface, &*command_pool);
        let asset_root = asset_root.as_path();

        frames.drive(
            step,
            render_context,
            assets,
            move |ctx: &mut RenderContext| {
                unsafe { device.wait_idle()? };
                let next = unsafe {
                    RenderContext::new(
                        surface,
                        physical,
                        device,
                        command_pool,
                        size,
                        clear_color,
                        ctx.swapchain_handle(),
                    )
                }
                .context("recreate render context")?;
                // The retired swapchain is destroyed here, after its successor exists.
                *ctx = next;
                let extent = ctx.extent();
                info!("Swapchain recreated ({}x{})", extent.width, extent.height);
                Ok(())
            },
            move |ctx| VkAssetFactory {
                physical,
                device,
                pool: command_pool,
                target: ctx,
                asset_root,
            },
        )
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let r = unsafe { build_renderer(window, display, size, settings)? };
        let extent = r.render_context.extent();
        info!(
            "Vulkan renderer ready on '{}' ({}x{}, {} swapchain images)",
            r.physical.name(),
            extent.width,
            extent.height,
            r.render_context.image_count()
        );
        Ok(r)
    }

    fn load_asset_manifest(&mut self, manifest: &AssetManifest) -> Result<()> {
        let mut factory = VkAssetFactory {
            physical: &self.physical,
            device: &self.device,
            pool: &self.command_pool,
            target: &self.render_context,
            asset_root: &self.asset_root,
        };
        self.assets.load_manifest(&mut factory, manifest)
    }

    fn render_begin(&mut self) -> Result<bool> {
        if self.paused {
            return Ok(false);
        }
        self.step(FrameStep::Begin)
    }

    fn render(&mut self, pipeline: PipelineId, instances: &[StaticMeshInstance]) -> Result<()> {
        let Some(cmd) = self.render_context.active_command_buffer() else {
            bail!("render called outside render_begin/render_end");
        };
        let (pipeline, lookup) = self.assets.pipeline_with_assets(pipeline)?;
        unsafe { pipeline.render(cmd, &lookup, instances) }
    }

    fn render_end(&mut self) -> Result<bool> {
        self.step(FrameStep::End)
    }

    fn current_window_size(&self) -> RenderSize {
        self.size
    }

    fn on_window_resized(&mut self, size: RenderSize) -> Result<()> {
        if size.is_empty() {
            info!("Window minimised; rendering paused");
            self.paused = true;
            return Ok(());
        }
        self.paused = false;
        self.size = size;
        self.frames.invalidate();
        Ok(())
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
        self.render_context.set_clear_color(rgba);
    }
}
