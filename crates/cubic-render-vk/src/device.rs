// SPDX-License-Identifier: CEPL-1.0
//! Logical device, its queues and the small object factories hung off it.
use crate::physical_device::PhysicalDevice;
use crate::surface::VkSurface;
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::util::read_spv;
use ash::vk;
use cubic_render::RenderError;
use std::io::Cursor;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyConfig {
    pub graphics: u32,
    pub presentation: u32,
}

impl QueueFamilyConfig {
    pub fn has_distinct_presentation_queue(&self) -> bool {
        self.graphics != self.presentation
    }

    /// Family indices a swapchain must be shared across when the queues differ.
    pub fn sharing_indices(&self) -> Vec<u32> {
        if self.has_distinct_presentation_queue() {
            vec![self.graphics, self.presentation]
        } else {
            vec![self.graphics]
        }
    }
}

/// Picks the graphics and presentation families.
///
/// The first graphics family is remembered; scanning stops early at the first
/// graphics family that can also present, which then serves both roles.
/// Otherwise a second pass takes the first family that can present at all.
pub fn resolve_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> Result<bool>,
) -> Result<QueueFamilyConfig> {
    let mut graphics = None;
    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 || !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        if graphics.is_none() {
            graphics = Some(i);
        }
        if supports_present(i)? {
            return Ok(QueueFamilyConfig {
                graphics: i,
                presentation: i,
            });
        }
    }

    let graphics = graphics
        .ok_or_else(|| RenderError::DeviceSelection("no graphics queue family".into()))?;

    for i in 0..families.len() as u32 {
        if supports_present(i)? {
            return Ok(QueueFamilyConfig {
                graphics,
                presentation: i,
            });
        }
    }

    Err(RenderError::DeviceSelection("no presentation queue family".into()).into())
}

/// Logical device and its two queues. Everything built from the device holds
/// a clone of its dispatch table and must drop before this.
pub struct DeviceContext {
    device: ash::Device,
    swapchain_loader: swapchain::Device,
    queues: QueueFamilyConfig,
    graphics_queue: vk::Queue,
    presentation_queue: vk::Queue,
}

impl DeviceContext {
    pub unsafe fn new(
        instance: &ash::Instance,
        physical: &PhysicalDevice,
        surface: &VkSurface,
    ) -> Result<Self> {
        let families = instance.get_physical_device_queue_family_properties(physical.handle());
        let queues = resolve_queue_families(&families, |i| {
            surface.supports_present(physical.handle(), i)
        })?;

        let priority = [1.0f32];
        let queue_infos: Vec<_> = queues
            .sharing_indices()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priority.as_ptr(),
                ..Default::default()
            })
            .collect();

        let features = vk::PhysicalDeviceFeatures {
            sample_rate_shading: physical.supports_sample_rate_shading() as vk::Bool32,
            sampler_anisotropy: physical.supports_anisotropy() as vk::Bool32,
            ..Default::default()
        };
        let extensions = [swapchain::NAME.as_ptr()];

        let create_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };

        let device = instance
            .create_device(physical.handle(), &create_info, None)
            .context("create_device")?;
        let graphics_queue = device.get_device_queue(queues.graphics, 0);
        let presentation_queue = device.get_device_queue(queues.presentation, 0);
        let swapchain_loader = swapchain::Device::new(instance, &device);

        info!(
            "device ready: graphics family {}, presentation family {} (distinct={})",
            queues.graphics,
            queues.presentation,
            queues.has_distinct_presentation_queue()
        );

        Ok(Self {
            device,
            swapchain_loader,
            queues,
            graphics_queue,
            presentation_queue,
        })
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }

    pub fn queues(&self) -> QueueFamilyConfig {
        self.queues
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn presentation_queue(&self) -> vk::Queue {
        self.presentation_queue
    }

    pub unsafe fn wait_idle(&self) -> Result<()> {
        self.device.device_wait_idle().context("device_wait_idle")
    }

    pub unsafe fn create_semaphores(&self, count: usize) -> Result<Vec<vk::Semaphore>> {
        let ci = vk::SemaphoreCreateInfo::default();
        (0..count)
            .map(|_| {
                self.device
                    .create_semaphore(&ci, None)
                    .context("create_semaphore")
            })
            .collect()
    }

    /// Fences start signalled so the first wait on each returns immediately.
    pub unsafe fn create_fences(&self, count: usize) -> Result<Vec<vk::Fence>> {
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        (0..count)
            .map(|_| self.device.create_fence(&ci, None).context("create_fence"))
            .collect()
    }

    /// Wraps raw SPIR-V bytes in a shader module.
    pub unsafe fn create_shader_module(&self, bytes: &[u8]) -> Result<vk::ShaderModule> {
        let code = read_spv(&mut Cursor::new(bytes)).map_err(|e| {
            RenderError::ResourceCreation(format!("invalid SPIR-V ({} bytes): {e}", bytes.len()))
        })?;
        let ci = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: code.len() * 4,
            ..Default::default()
        };
        self.device.create_shader_module(&ci, None).map_err(|e| {
            RenderError::ResourceCreation(format!("create_shader_module: {e:?}")).into()
        })
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
        }
    }
}
