// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use cubic_math::{Motion, PerspectiveCamera, Player, Vec3};
use cubic_render::{
    AssetManifest, PipelineId, RenderSize, Renderer, StaticMeshId, StaticMeshInstance, TextureId,
};

/// What the app drives each tick.
pub trait Scene {
    fn asset_manifest(&self) -> AssetManifest;
    fn prepare(&mut self) -> Result<()>;
    fn update(&mut self, delta: f32, motion: Motion);
    fn render(&mut self, renderer: &mut dyn Renderer) -> Result<()>;
    fn on_window_resized(&mut self, size: RenderSize);
}

/// Degrees per second every instance spins about its own axis.
const SPIN_SPEED: f32 = 45.0;

/// Two crates and two tori spinning in front of a movable player.
pub struct MainScene {
    camera: PerspectiveCamera,
    player: Player,
    instances: Vec<StaticMeshInstance>,
}

impl MainScene {
    pub fn new(size: RenderSize) -> Self {
        let instances = vec![
            StaticMeshInstance::new(
                StaticMeshId::Crate,
                TextureId::Crate,
                Vec3::new(0.4, 0.6, 0.0),
                Vec3::splat(0.6),
                Vec3::new(0.0, 0.4, 0.9),
                0.0,
            ),
            StaticMeshInstance::new(
                StaticMeshId::Torus,
                TextureId::RedCrossHatch,
                Vec3::new(-0.6, 0.4, 0.0),
                Vec3::splat(0.4),
                Vec3::new(0.2, 1.0, 0.4),
                0.0,
            ),
            StaticMeshInstance::new(
                StaticMeshId::Crate,
                TextureId::Crate,
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.7, 0.3, 0.3),
                Vec3::new(0.2, 0.6, 0.1),
                90.0,
            ),
            StaticMeshInstance::new(
                StaticMeshId::Torus,
                TextureId::RedCrossHatch,
                Vec3::new(0.6, -0.4, 0.0),
                Vec3::splat(0.4),
                Vec3::new(0.6, 0.3, 0.1),
                50.0,
            ),
        ];
        Self {
            camera: PerspectiveCamera::new(size.width as f32, size.height as f32),
            player: Player::new(Vec3::new(0.0, 0.0, 2.0)),
            instances,
        }
    }

    pub fn instances(&self) -> &[StaticMeshInstance] {
        &self.instances
    }

    pub fn player(&self) -> &Player {
        &self.player
    }
}

impl Scene for MainScene {
    fn asset_manifest(&self) -> AssetManifest {
        AssetManifest {
            pipelines: vec![PipelineId::Default],
            static_meshes: vec![StaticMeshId::Crate, StaticMeshId::Torus],
            textures: vec![TextureId::Crate, TextureId::RedCrossHatch],
        }
    }

    fn prepare(&mut self) -> Result<()> {
        self.update(0.0, Motion::empty());
        Ok(())
    }

    fn update(&mut self, delta: f32, motion: Motion) {
        self.player.apply(motion, delta);
        self.camera
            .configure(self.player.position(), self.player.direction());
        let projection_view = self.camera.projection_view();
        for instance in &mut self.instances {
            instance.rotate_by(delta * SPIN_SPEED);
            instance.update(projection_view);
        }
    }

    fn render(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.render(PipelineId::Default, &self.instances)
    }

    fn on_window_resized(&mut self, size: RenderSize) {
        self.camera = PerspectiveCamera::new(size.width as f32, size.height as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubic_math::Mat4;
    use cubic_platform::winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};

    /// Records draw calls instead of talking to a GPU.
    #[derive(Default)]
    struct RecordingRenderer {
        draws: Vec<(PipelineId, Vec<StaticMeshId>)>,
    }

    impl Renderer for RecordingRenderer {
        fn new(
            _window: &dyn HasWindowHandle,
            _display: &dyn HasDisplayHandle,
            _size: RenderSize,
            _settings: &cubic_render::RenderSettings,
        ) -> Result<Self> {
            Ok(Self::default())
        }
        fn load_asset_manifest(&mut self, _manifest: &AssetManifest) -> Result<()> {
            Ok(())
        }
        fn render_begin(&mut self) -> Result<bool> {
            Ok(true)
        }
        fn render(&mut self, pipeline: PipelineId, instances: &[StaticMeshInstance]) -> Result<()> {
            self.draws
                .push((pipeline, instances.iter().map(|i| i.mesh()).collect()));
            Ok(())
        }
        fn render_end(&mut self) -> Result<bool> {
            Ok(true)
        }
        fn current_window_size(&self) -> RenderSize {
            RenderSize::new(1, 1)
        }
        fn on_window_resized(&mut self, _size: RenderSize) -> Result<()> {
            Ok(())
        }
        fn set_clear_color(&mut self, _rgba: [f32; 4]) {}
    }

    #[test]
    fn manifest_covers_every_instance() {
        let scene = MainScene::new(RenderSize::new(800, 600));
        let manifest = scene.asset_manifest();
        for i in scene.instances() {
            assert!(manifest.static_meshes.contains(&i.mesh()));
            assert!(manifest.textures.contains(&i.texture()));
        }
        assert_eq!(manifest.pipelines, vec![PipelineId::Default]);
    }

    #[test]
    fn update_spins_instances_and_sets_transforms() {
        let mut scene = MainScene::new(RenderSize::new(800, 600));
        scene.prepare().unwrap();
        assert!(scene.instances().iter().all(|i| i.transform() != Mat4::IDENTITY));

        scene.update(1.0, Motion::empty());
        let angles: Vec<f32> = scene.instances().iter().map(|i| i.rotation_degrees()).collect();
        assert_eq!(angles, vec![45.0, 45.0, 135.0, 95.0]);
    }

    #[test]
    fn forward_motion_moves_the_player_towards_the_scene() {
        let mut scene = MainScene::new(RenderSize::new(800, 600));
        scene.update(0.1, Motion::FORWARD);
        assert!(scene.player().position().z < 2.0);
    }

    #[test]
    fn render_issues_one_draw_for_all_instances() {
        let mut scene = MainScene::new(RenderSize::new(800, 600));
        let mut renderer = RecordingRenderer::default();
        scene.render(&mut renderer).unwrap();
        assert_eq!(
            renderer.draws,
            vec![(
                PipelineId::Default,
                vec![
                    StaticMeshId::Crate,
                    StaticMeshId::Torus,
                    StaticMeshId::Crate,
                    StaticMeshId::Torus
                ]
            )]
        );
    }
}
