// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Result};
use cubic_render::{
    AssetCache, AssetFactory, AssetManifest, PipelineId, RenderError, StaticMeshId, TextureId,
};

/// Every created object gets a fresh serial so tests can tell instances apart.
#[derive(Debug, PartialEq, Eq)]
struct Made {
    serial: u32,
    path: String,
}

#[derive(Default)]
struct CountingFactory {
    next: u32,
    created: Vec<String>,
    fail_textures: bool,
}

impl CountingFactory {
    fn make(&mut self, what: String, path: &str) -> Made {
        self.next += 1;
        self.created.push(what);
        Made {
            serial: self.next,
            path: path.to_owned(),
        }
    }
}

impl AssetFactory for CountingFactory {
    type Pipeline = Made;
    type Mesh = Made;
    type Texture = Made;

    fn create_pipeline(&mut self, id: PipelineId, path: &str) -> Result<Made> {
        Ok(self.make(format!("{id:?}"), path))
    }

    fn create_static_mesh(&mut self, id: StaticMeshId, path: &str) -> Result<Made> {
        Ok(self.make(format!("{id:?}"), path))
    }

    fn create_texture(&mut self, id: TextureId, path: &str) -> Result<Made> {
        if self.fail_textures {
            return Err(anyhow!("decoder exploded"));
        }
        Ok(self.make(format!("{id:?}"), path))
    }
}

type Cache = AssetCache<Made, Made, Made>;

fn scene_manifest() -> AssetManifest {
    AssetManifest {
        pipelines: vec![PipelineId::Default],
        static_meshes: vec![StaticMeshId::Crate, StaticMeshId::Torus],
        textures: vec![TextureId::Crate, TextureId::RedCrossHatch],
    }
}

#[test]
fn duplicate_ids_in_one_manifest_are_created_once() {
    let mut cache = Cache::new();
    let mut factory = CountingFactory::default();
    let manifest = AssetManifest {
        pipelines: vec![PipelineId::Default, PipelineId::Default],
        static_meshes: vec![StaticMeshId::Crate, StaticMeshId::Crate],
        textures: vec![TextureId::Crate, TextureId::Crate, TextureId::Crate],
    };

    cache.load_manifest(&mut factory, &manifest).unwrap();

    assert_eq!(factory.created.len(), 3);
    assert_eq!(cache.pipeline_count(), 1);
    assert_eq!(cache.static_mesh_count(), 1);
    assert_eq!(cache.texture_count(), 1);
}

#[test]
fn loading_is_additive_and_idempotent() {
    let mut cache = Cache::new();
    let mut factory = CountingFactory::default();

    cache
        .load_manifest(
            &mut factory,
            &AssetManifest {
                static_meshes: vec![StaticMeshId::Crate],
                ..Default::default()
            },
        )
        .unwrap();
    cache.load_manifest(&mut factory, &scene_manifest()).unwrap();
    cache.load_manifest(&mut factory, &scene_manifest()).unwrap();

    assert_eq!(factory.created.len(), 5);
    assert_eq!(cache.static_mesh(StaticMeshId::Crate).unwrap().serial, 1);
}

#[test]
fn paths_come_from_the_identifier_mapping() {
    let mut cache = Cache::new();
    let mut factory = CountingFactory::default();
    cache.load_manifest(&mut factory, &scene_manifest()).unwrap();

    assert_eq!(cache.pipeline(PipelineId::Default).unwrap().path, "default");
    assert_eq!(
        cache.static_mesh(StaticMeshId::Torus).unwrap().path,
        "assets/models/torus.obj"
    );
    assert_eq!(
        cache.texture(TextureId::RedCrossHatch).unwrap().path,
        "assets/textures/red_cross_hatch.png"
    );
}

#[test]
fn reload_rebuilds_pipelines_only() {
    let mut cache = Cache::new();
    let mut factory = CountingFactory::default();
    cache.load_manifest(&mut factory, &scene_manifest()).unwrap();

    let pipeline_before = cache.pipeline(PipelineId::Default).unwrap().serial;
    let mesh_before = cache.static_mesh(StaticMeshId::Torus).unwrap().serial;
    let texture_before = cache.texture(TextureId::Crate).unwrap().serial;
    assert_eq!(cache.pipeline_generation(), 0);

    cache.reload_contextual_assets(&mut factory).unwrap();

    assert_eq!(cache.pipeline_generation(), 1);
    assert_ne!(
        cache.pipeline(PipelineId::Default).unwrap().serial,
        pipeline_before
    );
    assert_eq!(cache.static_mesh(StaticMeshId::Torus).unwrap().serial, mesh_before);
    assert_eq!(cache.texture(TextureId::Crate).unwrap().serial, texture_before);
    assert_eq!(factory.created.len(), 6);
}

#[test]
fn reload_of_empty_cache_still_counts_a_generation() {
    let mut cache = Cache::new();
    let mut factory = CountingFactory::default();
    cache.reload_contextual_assets(&mut factory).unwrap();
    assert_eq!(cache.pipeline_generation(), 1);
    assert!(factory.created.is_empty());
}

#[test]
fn factory_failure_propagates_and_keeps_earlier_entries() {
    let mut cache = Cache::new();
    let mut factory = CountingFactory {
        fail_textures: true,
        ..Default::default()
    };

    let err = cache
        .load_manifest(&mut factory, &scene_manifest())
        .unwrap_err();
    assert!(format!("{err:#}").contains("decoder exploded"));
    assert_eq!(cache.pipeline_count(), 1);
    assert_eq!(cache.static_mesh_count(), 2);
    assert_eq!(cache.texture_count(), 0);
}

#[test]
fn draw_lookup_reports_unloaded_assets() {
    let mut cache = Cache::new();
    let mut factory = CountingFactory::default();
    cache
        .load_manifest(
            &mut factory,
            &AssetManifest {
                pipelines: vec![PipelineId::Default],
                static_meshes: vec![StaticMeshId::Crate],
                ..Default::default()
            },
        )
        .unwrap();

    let (pipeline, lookup) = cache.pipeline_with_assets(PipelineId::Default).unwrap();
    pipeline.serial += 100;
    assert!(lookup.static_mesh(StaticMeshId::Crate).is_ok());
    assert!(matches!(
        lookup.texture(TextureId::Crate),
        Err(RenderError::UnknownAsset { kind: "texture", .. })
    ));
}

#[test]
fn unknown_pipeline_is_an_error() {
    let mut cache = Cache::new();
    let err = cache.pipeline_with_assets(PipelineId::Default).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<RenderError>(),
        Some(RenderError::UnknownAsset { .. })
    ));
}
