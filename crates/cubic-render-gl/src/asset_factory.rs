// SPDX-License-Identifier: CEPL-1.0
use crate::mesh::GlMesh;
use crate::pipeline::GlPipeline;
use crate::texture::GlTexture;
use anyhow::Result;
use cubic_render::{loaders, AssetFactory, PipelineId, StaticMeshId, TextureId};
use std::path::Path;
use std::rc::Rc;

pub struct GlAssetFactory<'a> {
    pub gl: &'a Rc<glow::Context>,
    pub asset_root: &'a Path,
}

impl AssetFactory for GlAssetFactory<'_> {
    type Pipeline = GlPipeline;
    type Mesh = GlMesh;
    type Texture = GlTexture;

    fn create_pipeline(&mut self, _id: PipelineId, path: &str) -> Result<GlPipeline> {
        GlPipeline::new(self.gl, path)
    }

    fn create_static_mesh(&mut self, _id: StaticMeshId, path: &str) -> Result<GlMesh> {
        let mesh = loaders::load_obj_file(&self.asset_root.join(path))?;
        GlMesh::new(self.gl, &mesh)
    }

    fn create_texture(&mut self, _id: TextureId, path: &str) -> Result<GlTexture> {
        let bitmap = loaders::load_bitmap(&self.asset_root.join(path))?;
        GlTexture::new(self.gl, &bitmap)
    }
}
