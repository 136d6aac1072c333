// SPDX-License-Identifier: CEPL-1.0
use crate::buffer::Buffer;
use crate::command_pool::CommandPool;
use crate::physical_device::PhysicalDevice;
use anyhow::{Context, Result};
use ash::vk;
use cubic_render::Mesh;

/// Device-local vertex and index buffers for one static mesh.
pub struct VkMesh {
    vertices: Buffer,
    indices: Buffer,
    index_count: u32,
}

impl VkMesh {
    pub unsafe fn new(
        physical: &PhysicalDevice,
        device: &ash::Device,
        pool: &CommandPool,
        mesh: &Mesh,
    ) -> Result<Self> {
        let vertices = Buffer::device_local(
            physical,
            device,
            pool,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(&mesh.vertices),
        )
        .context("vertex buffer")?;
        let indices = Buffer::device_local(
            physical,
            device,
            pool,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(&mesh.indices),
        )
        .context("index buffer")?;
        Ok(Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
        })
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertices.handle()
    }

    pub fn index_buffer(&self) -> vk::Buffer {
        self.indices.handle()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
