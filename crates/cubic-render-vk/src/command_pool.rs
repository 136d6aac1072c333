// SPDX-License-Identifier: CEPL-1.0
use crate::device::DeviceContext;
use anyhow::{anyhow, Context, Result};
use ash::vk;

/// Graphics-family command pool. Per-image buffers are allocated from it by
/// the render context; uploads use short-lived one-shot buffers.
pub struct CommandPool {
    device: ash::Device,
    queue: vk::Queue,
    pool: vk::CommandPool,
}

impl CommandPool {
    pub unsafe fn new(device: &DeviceContext) -> Result<Self> {
        let ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: device.queues().graphics,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        let pool = device
            .raw()
            .create_command_pool(&ci, None)
            .context("create_command_pool")?;
        Ok(Self {
            device: device.raw().clone(),
            queue: device.graphics_queue(),
            pool,
        })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    pub unsafe fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        self.device
            .allocate_command_buffers(&ai)
            .context("allocate_command_buffers")
    }

    pub unsafe fn free(&self, buffers: &[vk::CommandBuffer]) {
        if !buffers.is_empty() {
            self.device.free_command_buffers(self.pool, buffers);
        }
    }

    /// Records `record` into a throwaway command buffer, submits it to the
    /// graphics queue and blocks until the queue is idle.
    pub unsafe fn submit_one_shot(&self, record: impl FnOnce(vk::CommandBuffer)) -> Result<()> {
        let cmd = self
            .allocate(1)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("allocate_command_buffers returned nothing"))?;

        let result = (|| -> Result<()> {
            let bi = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            self.device
                .begin_command_buffer(cmd, &bi)
                .context("begin_command_buffer(one-shot)")?;
            record(cmd);
            self.device
                .end_command_buffer(cmd)
                .context("end_command_buffer(one-shot)")?;

            let si = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                ..Default::default()
            };
            self.device
                .queue_submit(self.queue, std::slice::from_ref(&si), vk::Fence::null())
                .context("queue_submit(one-shot)")?;
            self.device
                .queue_wait_idle(self.queue)
                .context("queue_wait_idle(one-shot)")
        })();

        self.free(std::slice::from_ref(&cmd));
        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_command_pool(self.pool, None) };
    }
}
