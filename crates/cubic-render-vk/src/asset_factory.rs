// SPDX-License-Identifier: CEPL-1.0
use crate::command_pool::CommandPool;
use crate::device::DeviceContext;
use crate::mesh::VkMesh;
use crate::physical_device::PhysicalDevice;
use crate::pipeline::Pipeline;
use crate::render_context::RenderContext;
use crate::texture::Texture;
use anyhow::Result;
use cubic_render::{loaders, AssetFactory, PipelineId, StaticMeshId, TextureId};
use std::path::Path;

/// Borrowed view of the device objects needed to turn asset ids into GPU
/// resources. Built on demand for a single load or reload.
pub struct VkAssetFactory<'a> {
    pub physical: &'a PhysicalDevice,
    pub device: &'a DeviceContext,
    pub pool: &'a CommandPool,
    pub target: &'a RenderContext,
    pub asset_root: &'a Path,
}

impl AssetFactory for VkAssetFactory<'_> {
    type Pipeline = Pipeline;
    type Mesh = VkMesh;
    type Texture = Texture;

    fn create_pipeline(&mut self, _id: PipelineId, path: &str) -> Result<Pipeline> {
        unsafe { Pipeline::new(self.physical, self.device, self.target, path) }
    }

    fn create_static_mesh(&mut self, _id: StaticMeshId, path: &str) -> Result<VkMesh> {
        let mesh = loaders::load_obj_file(&self.asset_root.join(path))?;
        unsafe { VkMesh::new(self.physical, self.device.raw(), self.pool, &mesh) }
    }

    fn create_texture(&mut self, _id: TextureId, path: &str) -> Result<Texture> {
        let bitmap = loaders::load_bitmap(&self.asset_root.join(path))?;
        unsafe { Texture::new(self.physical, self.device.raw(), self.pool, &bitmap) }
    }
}
