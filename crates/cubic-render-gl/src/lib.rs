// SPDX-License-Identifier: CEPL-1.0
//! OpenGL 3.3 compatibility backend on `glutin` + `glow`.
use anyhow::{anyhow, bail, Context, Result};
use cubic_render::{
    AssetCache, AssetManifest, PipelineId, RenderSettings, RenderSize, Renderer,
    StaticMeshInstance,
};
use glow::HasContext as _;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use tracing::{info, warn};

use glutin::{
    config::ConfigTemplateBuilder,
    context::{
        ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext,
        PossiblyCurrentContext, Version,
    },
    display::{Display, DisplayApiPreference},
    prelude::*,
    surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface},
};

use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::rc::Rc;

mod asset_factory;
mod mesh;
mod pipeline;
mod texture;

use asset_factory::GlAssetFactory;
use mesh::GlMesh;
use pipeline::GlPipeline;
use texture::GlTexture;

const DEPTH_BITS: u8 = 24;

pub struct GlRenderer {
    // GL objects are deleted through `gl` while `context` is still current.
    assets: AssetCache<GlPipeline, GlMesh, GlTexture>,
    gl: Rc<glow::Context>,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,

    asset_root: PathBuf,
    size: RenderSize,
    clear: [f32; 4],
    paused: bool,
    in_frame: bool,
}

/// Surfaces cannot be zero-sized; callers pause instead.
fn surface_extent(size: RenderSize) -> (NonZeroU32, NonZeroU32) {
    (
        NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN),
        NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN),
    )
}

impl GlRenderer {
    fn make_current(
        display: &Display,
        window_handle: RawWindowHandle,
        size: RenderSize,
    ) -> Result<(
        PossiblyCurrentContext,
        Surface<WindowSurface>,
        glow::Context,
    )> {
        let template = ConfigTemplateBuilder::new()
            .with_depth_size(DEPTH_BITS)
            .build();
        let mut configs = unsafe { display.find_configs(template) }.context("find_configs")?;
        let config = configs.next().ok_or_else(|| anyhow!("no GL configs"))?;
        let (w, h) = surface_extent(size);

        let sattrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(window_handle, w, h);
        let surface = unsafe { display.create_window_surface(&config, &sattrs) }
            .context("create_window_surface")?;
        let ctx_attrs = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .with_profile(GlProfile::Core)
            .build(Some(window_handle));
        let not_current: NotCurrentContext =
            unsafe { display.create_context(&config, &ctx_attrs) }.context("create_context")?;

        let context = not_current.make_current(&surface).context("make_current")?;

        let gl = unsafe {
            glow::Context::from_loader_function(|s| match CString::new(s) {
                Ok(name) => display.get_proc_address(&name) as *const _,
                Err(_) => std::ptr::null(),
            })
        };

        if let Err(e) = surface.set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN)) {
            warn!("GL vsync unavailable: {e}");
        }

        Ok((context, surface, gl))
    }
}

impl Renderer for GlRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display_handle: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let dh = display_handle
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let display =
            unsafe { Display::new(dh, DisplayApiPreference::Egl) }.context("Display::new")?;

        let (context, surface, gl) = Self::make_current(&display, wh, size)?;

        unsafe {
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);
            gl.enable(glow::CULL_FACE);
            gl.front_face(glow::CCW);
            gl.cull_face(glow::BACK);
            gl.enable(glow::BLEND);
            gl.blend_func_separate(
                glow::SRC_ALPHA,
                glow::ONE_MINUS_SRC_ALPHA,
                glow::ONE,
                glow::ZERO,
            );
        }

        let version = gl.version();
        info!(
            "OpenGL renderer ready ({}.{}, {}x{})",
            version.major, version.minor, size.width, size.height
        );

        Ok(Self {
            assets: AssetCache::new(),
            gl: Rc::new(gl),
            surface,
            context,
            asset_root: settings.asset_root.clone(),
            size,
            clear: settings.clear_color,
            paused: size.is_empty(),
            in_frame: false,
        })
    }

    fn load_asset_manifest(&mut self, manifest: &AssetManifest) -> Result<()> {
        let mut factory = GlAssetFactory {
            gl: &self.gl,
            asset_root: &self.asset_root,
        };
        self.assets.load_manifest(&mut factory, manifest)
    }

    fn render_begin(&mut self) -> Result<bool> {
        if self.paused {
            return Ok(false);
        }
        if self.in_frame {
            bail!("render_begin while a frame is open");
        }
        let [r, g, b, a] = self.clear;
        unsafe {
            self.gl
                .viewport(0, 0, self.size.width as i32, self.size.height as i32);
            self.gl.clear_color(r, g, b, a);
            self.gl
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
        self.in_frame = true;
        Ok(true)
    }

    fn render(&mut self, pipeline: PipelineId, instances: &[StaticMeshInstance]) -> Result<()> {
        if !self.in_frame {
            bail!("render called outside render_begin/render_end");
        }
        let (pipeline, lookup) = self.assets.pipeline_with_assets(pipeline)?;
        pipeline.render(&lookup, instances)
    }

    fn render_end(&mut self) -> Result<bool> {
        if !self.in_frame {
            bail!("render_end without render_begin");
        }
        self.in_frame = false;
        self.surface
            .swap_buffers(&self.context)
            .context("swap_buffers")?;
        Ok(true)
    }

    fn current_window_size(&self) -> RenderSize {
        self.size
    }

    fn on_window_resized(&mut self, size: RenderSize) -> Result<()> {
        if size.is_empty() {
            info!("Window minimised; rendering paused");
            self.paused = true;
            return Ok(());
        }
        self.paused = false;
        self.size = size;
        let (w, h) = surface_extent(size);
        self.surface.resize(&self.context, w, h);
        Ok(())
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear = rgba;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_extent_never_zero() {
        let (w, h) = surface_extent(RenderSize::new(0, 720));
        assert_eq!((w.get(), h.get()), (1, 720));
        let (w, h) = surface_extent(RenderSize::new(1280, 720));
        assert_eq!((w.get(), h.get()), (1280, 720));
    }
}
