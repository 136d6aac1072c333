// SPDX-License-Identifier: CEPL-1.0
//! Identifier-keyed, create-once asset cache shared by the backends.
//!
//! Three partitions: pipelines depend on the render target (render pass,
//! viewport, scissor) and carry a generation counter; meshes and textures do
//! not and are never rebuilt once created.
use crate::{AssetId, AssetManifest, PipelineId, RenderError, StaticMeshId, TextureId};
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// Backend hook that turns an identifier plus its resolved path into a live
/// GPU object.
pub trait AssetFactory {
    type Pipeline;
    type Mesh;
    type Texture;

    fn create_pipeline(&mut self, id: PipelineId, path: &str) -> Result<Self::Pipeline>;
    fn create_static_mesh(&mut self, id: StaticMeshId, path: &str) -> Result<Self::Mesh>;
    fn create_texture(&mut self, id: TextureId, path: &str) -> Result<Self::Texture>;
}

pub struct AssetCache<P, M, T> {
    pipelines: HashMap<PipelineId, P>,
    pipeline_generation: u64,
    static_meshes: HashMap<StaticMeshId, M>,
    textures: HashMap<TextureId, T>,
}

impl<P, M, T> Default for AssetCache<P, M, T> {
    fn default() -> Self {
        Self {
            pipelines: HashMap::new(),
            pipeline_generation: 0,
            static_meshes: HashMap::new(),
            textures: HashMap::new(),
        }
    }
}

fn insert_missing<K: AssetId, V>(
    cache: &mut HashMap<K, V>,
    ids: &[K],
    mut create: impl FnMut(K, &'static str) -> Result<V>,
) -> Result<()> {
    for &id in ids {
        if cache.contains_key(&id) {
            continue;
        }
        let path = id.path();
        let value = create(id, path).with_context(|| format!("create {} {id:?}", K::KIND))?;
        debug!("{} {id:?} created from '{path}'", K::KIND);
        cache.insert(id, value);
    }
    Ok(())
}

impl<P, M, T> AssetCache<P, M, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates every listed asset that is not cached yet. Repeated ids in one
    /// manifest are created once.
    pub fn load_manifest<F>(&mut self, factory: &mut F, manifest: &AssetManifest) -> Result<()>
    where
        F: AssetFactory<Pipeline = P, Mesh = M, Texture = T>,
    {
        insert_missing(&mut self.pipelines, &manifest.pipelines, |id, path| {
            factory.create_pipeline(id, path)
        })?;
        insert_missing(&mut self.static_meshes, &manifest.static_meshes, |id, path| {
            factory.create_static_mesh(id, path)
        })?;
        insert_missing(&mut self.textures, &manifest.textures, |id, path| {
            factory.create_texture(id, path)
        })?;
        Ok(())
    }

    /// Rebuilds every cached pipeline against the current render target and
    /// bumps the pipeline generation. Meshes and textures are untouched.
    ///
    /// Call only after the swapchain and everything derived from it has been
    /// recreated and the device is idle: the previous pipeline objects are
    /// dropped as their replacements are inserted.
    pub fn reload_contextual_assets<F>(&mut self, factory: &mut F) -> Result<()>
    where
        F: AssetFactory<Pipeline = P, Mesh = M, Texture = T>,
    {
        let mut ids: Vec<PipelineId> = self.pipelines.keys().copied().collect();
        ids.sort();
        for id in ids {
            let rebuilt = factory
                .create_pipeline(id, id.path())
                .with_context(|| format!("rebuild pipeline {id:?}"))?;
            self.pipelines.insert(id, rebuilt);
        }
        self.pipeline_generation += 1;
        info!(
            "contextual assets reloaded: {} pipeline(s), generation {}",
            self.pipelines.len(),
            self.pipeline_generation
        );
        Ok(())
    }

    /// Number of completed `reload_contextual_assets` calls.
    pub fn pipeline_generation(&self) -> u64 {
        self.pipeline_generation
    }

    pub fn pipeline(&self, id: PipelineId) -> Option<&P> {
        self.pipelines.get(&id)
    }

    pub fn static_mesh(&self, id: StaticMeshId) -> Option<&M> {
        self.static_meshes.get(&id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&T> {
        self.textures.get(&id)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn static_mesh_count(&self) -> usize {
        self.static_meshes.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Splits the cache for a draw: the pipeline mutably (it owns the
    /// descriptor cache) and read-only lookups for meshes and textures.
    pub fn pipeline_with_assets(
        &mut self,
        id: PipelineId,
    ) -> Result<(&mut P, AssetLookup<'_, M, T>)> {
        let pipeline = self
            .pipelines
            .get_mut(&id)
            .ok_or_else(|| unknown(PipelineId::KIND, id))?;
        Ok((
            pipeline,
            AssetLookup {
                static_meshes: &self.static_meshes,
                textures: &self.textures,
            },
        ))
    }
}

fn unknown(kind: &'static str, id: impl std::fmt::Debug) -> RenderError {
    RenderError::UnknownAsset {
        kind,
        id: format!("{id:?}"),
    }
}

/// Read-only view over the target-independent partitions.
pub struct AssetLookup<'a, M, T> {
    static_meshes: &'a HashMap<StaticMeshId, M>,
    textures: &'a HashMap<TextureId, T>,
}

impl<'a, M, T> AssetLookup<'a, M, T> {
    pub fn static_mesh(&self, id: StaticMeshId) -> Result<&'a M, RenderError> {
        self.static_meshes
            .get(&id)
            .ok_or_else(|| unknown(StaticMeshId::KIND, id))
    }

    pub fn texture(&self, id: TextureId) -> Result<&'a T, RenderError> {
        self.textures
            .get(&id)
            .ok_or_else(|| unknown(TextureId::KIND, id))
    }
}
