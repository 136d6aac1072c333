// SPDX-License-Identifier: CEPL-1.0
//! Backend-independent render contract: what a scene may ask of a renderer,
//! plus the pieces both backends share (asset cache, frame state machine,
//! CPU-side asset types and loaders).
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::PathBuf;

mod assets;
mod cache;
mod error;
pub mod frame;
mod instance;
pub mod loaders;
mod mesh;

pub use assets::{
    resolve_pipeline_path, resolve_static_mesh_path, resolve_texture_path, AssetId,
    AssetManifest, PipelineId, StaticMeshId, TextureId,
};
pub use cache::{AssetCache, AssetFactory, AssetLookup};
pub use error::RenderError;
pub use frame::{FrameLoop, FrameState, FrameStep, MAX_FRAMES_IN_FLIGHT};
pub use instance::StaticMeshInstance;
pub use mesh::{Bitmap, Mesh, Vertex};

/// Drawable size in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimised window: nothing can be presented.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Clear color used when nothing else is configured.
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [164.0 / 256.0, 30.0 / 256.0, 34.0 / 256.0, 1.0];

/// Construction-time options shared by the backends.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Directory asset paths are resolved against.
    pub asset_root: PathBuf,
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

/// What a scene and the app drive each frame:
/// `render_begin`, any number of `render` calls, then `render_end`.
pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Creates every asset in the manifest that is not loaded yet.
    fn load_asset_manifest(&mut self, manifest: &AssetManifest) -> Result<()>;

    /// `false` means no frame was opened; try again next tick.
    fn render_begin(&mut self) -> Result<bool>;

    fn render(&mut self, pipeline: PipelineId, instances: &[StaticMeshInstance]) -> Result<()>;

    /// Submits and presents. `false` mirrors `render_begin`'s retry meaning.
    fn render_end(&mut self) -> Result<bool>;

    fn current_window_size(&self) -> RenderSize;

    fn on_window_resized(&mut self, size: RenderSize) -> Result<()>;

    fn set_clear_color(&mut self, rgba: [f32; 4]);
}
