// SPDX-License-Identifier: CEPL-1.0
//! Asset identifiers and the fixed mapping from identifier to file path.
use std::fmt;
use std::hash::Hash;

/// Common surface of the three identifier kinds so the cache can treat them
/// uniformly.
pub trait AssetId: Copy + Eq + Hash + fmt::Debug {
    /// Human readable partition name, used in logs and errors.
    const KIND: &'static str;

    /// Pure, total mapping to the path (or shader name) the asset lives at.
    fn path(self) -> &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineId {
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StaticMeshId {
    Crate,
    Torus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureId {
    Crate,
    RedCrossHatch,
}

/// Pipelines resolve to a shader program name, not a file: each backend knows
/// where its compiled stages for that name live.
pub fn resolve_pipeline_path(id: PipelineId) -> &'static str {
    match id {
        PipelineId::Default => "default",
    }
}

pub fn resolve_static_mesh_path(id: StaticMeshId) -> &'static str {
    match id {
        StaticMeshId::Crate => "assets/models/crate.obj",
        StaticMeshId::Torus => "assets/models/torus.obj",
    }
}

pub fn resolve_texture_path(id: TextureId) -> &'static str {
    match id {
        TextureId::Crate => "assets/textures/crate.png",
        TextureId::RedCrossHatch => "assets/textures/red_cross_hatch.png",
    }
}

impl AssetId for PipelineId {
    const KIND: &'static str = "pipeline";
    fn path(self) -> &'static str {
        resolve_pipeline_path(self)
    }
}

impl AssetId for StaticMeshId {
    const KIND: &'static str = "static mesh";
    fn path(self) -> &'static str {
        resolve_static_mesh_path(self)
    }
}

impl AssetId for TextureId {
    const KIND: &'static str = "texture";
    fn path(self) -> &'static str {
        resolve_texture_path(self)
    }
}

/// The three identifier lists a scene needs loaded before it renders.
/// Loading is additive: ids already cached are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetManifest {
    pub pipelines: Vec<PipelineId>,
    pub static_meshes: Vec<StaticMeshId>,
    pub textures: Vec<TextureId>,
}

impl AssetManifest {
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty() && self.static_meshes.is_empty() && self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_identifier_resolves() {
        assert_eq!(PipelineId::Default.path(), "default");
        assert_eq!(StaticMeshId::Crate.path(), "assets/models/crate.obj");
        assert_eq!(StaticMeshId::Torus.path(), "assets/models/torus.obj");
        assert_eq!(TextureId::Crate.path(), "assets/textures/crate.png");
        assert_eq!(
            TextureId::RedCrossHatch.path(),
            "assets/textures/red_cross_hatch.png"
        );
    }

    #[test]
    fn manifest_emptiness() {
        assert!(AssetManifest::default().is_empty());
        let m = AssetManifest {
            textures: vec![TextureId::Crate],
            ..Default::default()
        };
        assert!(!m.is_empty());
    }
}
