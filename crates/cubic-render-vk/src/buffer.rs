// SPDX-License-Identifier: CEPL-1.0
use crate::command_pool::CommandPool;
use crate::physical_device::PhysicalDevice;
use anyhow::{Context, Result};
use ash::vk;
use cubic_render::RenderError;

/// Buffer plus the memory bound to it. Dropping releases both.
pub struct Buffer {
    device: ash::Device,
    handle: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Creates the buffer, allocates memory sized by the driver's
    /// requirements (not `size`) and, when `data` is given, maps, copies and
    /// unmaps it.
    pub unsafe fn new(
        physical: &PhysicalDevice,
        device: &ash::Device,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        if size == 0 {
            return Err(RenderError::ResourceCreation("zero-sized buffer".into()).into());
        }

        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let handle = device.create_buffer(&bci, None).context("create_buffer")?;

        // From here on Drop cleans up whatever has been created.
        let mut buffer = Self {
            device: device.clone(),
            handle,
            memory: vk::DeviceMemory::null(),
            size,
        };

        let req = device.get_buffer_memory_requirements(handle);
        let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: physical.memory_type_index(req.memory_type_bits, properties)?,
            ..Default::default()
        };
        buffer.memory = device
            .allocate_memory(&mai, None)
            .context("allocate_memory(buffer)")?;
        device
            .bind_buffer_memory(handle, buffer.memory, 0)
            .context("bind_buffer_memory")?;

        if let Some(bytes) = data {
            buffer.write(bytes)?;
        }
        Ok(buffer)
    }

    /// Device-local buffer filled through a host-visible staging buffer. The
    /// copy runs on a one-shot command buffer and blocks until it completes;
    /// the staging buffer is released before returning.
    pub unsafe fn device_local(
        physical: &PhysicalDevice,
        device: &ash::Device,
        pool: &CommandPool,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<Self> {
        let size = data.len() as vk::DeviceSize;
        let staging = Self::new(
            physical,
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            Some(data),
        )
        .context("staging buffer")?;
        let target = Self::new(
            physical,
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            None,
        )?;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        pool.submit_one_shot(|cmd| {
            device.cmd_copy_buffer(
                cmd,
                staging.handle,
                target.handle,
                std::slice::from_ref(&region),
            )
        })?;
        Ok(target)
    }

    unsafe fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let len = check_write_len(bytes.len(), self.size)?;
        let ptr = self
            .device
            .map_memory(self.memory, 0, len, vk::MemoryMapFlags::empty())
            .context("map_memory")?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, len as usize);
        self.device.unmap_memory(self.memory);
        Ok(())
    }

    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }
}

/// Initial data must fit the buffer it was created for.
fn check_write_len(len: usize, size: vk::DeviceSize) -> Result<vk::DeviceSize, RenderError> {
    let len = len as vk::DeviceSize;
    if len > size {
        return Err(RenderError::ResourceCreation(format!(
            "{len} bytes do not fit a {size}-byte buffer"
        )));
    }
    Ok(len)
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.handle, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_data_up_to_the_buffer_size_is_written_whole() {
        assert_eq!(check_write_len(0, 64).unwrap(), 0);
        assert_eq!(check_write_len(48, 64).unwrap(), 48);
        assert_eq!(check_write_len(64, 64).unwrap(), 64);
    }

    #[test]
    fn oversized_initial_data_is_rejected() {
        assert!(matches!(
            check_write_len(65, 64),
            Err(RenderError::ResourceCreation(_))
        ));
    }
}
