// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use cubic_core::init_tracing;
use cubic_platform::drawable_size;
use cubic_render::{RenderSize, Renderer};
use std::time::Instant;
use tracing::{error, info};

use cubic_platform::winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

mod backend;
mod config;
mod input;
mod scene;

use backend::Backend;
use config::{AppCfg, Args};
use input::HeldKeys;
use scene::{MainScene, Scene};

struct App {
    cfg: AppCfg,
    // Dropped before the window it renders into.
    backend: Option<Backend>,
    scene: Option<MainScene>,
    window: Option<Window>,

    keys: HeldKeys,
    last_tick: Instant,
    exiting: bool,
    paused: bool,
    frames: u32,
    last_fps_instant: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        let now = Instant::now();
        Self {
            cfg,
            backend: None,
            scene: None,
            window: None,
            keys: HeldKeys::default(),
            last_tick: now,
            exiting: false,
            paused: false,
            frames: 0,
            last_fps_instant: now,
            error: None,
        }
    }

    /// Window, backend, scene and its assets, in that order.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(LogicalSize::new(
                self.cfg.window.width,
                self.cfg.window.height,
            ));
        let window = event_loop.create_window(attrs).context("create_window")?;
        let size = drawable_size(&window);

        let mut backend = Backend::create(
            self.cfg.render.backend,
            &window,
            &window,
            size,
            &self.cfg.render_settings(),
        )?;
        info!(
            "backend = {} (requested {:?})",
            backend.name(),
            self.cfg.render.backend
        );

        let mut scene = MainScene::new(size);
        let renderer: &mut dyn Renderer = backend.renderer();
        renderer.load_asset_manifest(&scene.asset_manifest())?;
        scene.prepare()?;

        self.paused = size.is_empty();
        self.last_tick = Instant::now();
        self.backend = Some(backend);
        self.scene = Some(scene);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(backend), Some(scene)) = (&mut self.backend, &mut self.scene) else {
            return Ok(());
        };
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        scene.update(delta, self.keys.motion());

        let renderer: &mut dyn Renderer = backend.renderer();
        if renderer.render_begin()? {
            scene.render(renderer)?;
            if renderer.render_end()? {
                self.frames = self.frames.saturating_add(1);
            }
        }
        Ok(())
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        self.paused = size.is_empty();
        info!("Resized → {}x{} (paused={})", size.width, size.height, self.paused);
        if let Some(backend) = &mut self.backend {
            backend.renderer().on_window_resized(size)?;
        }
        if let Some(scene) = &mut self.scene {
            if !self.paused {
                scene.on_window_resized(size);
            }
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        self.error = Some(e);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.backend = None;
        self.scene = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }
        info!("resumed → paused={}", self.paused);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape && state == ElementState::Pressed {
                    self.shutdown(event_loop);
                } else {
                    self.keys.set(code, state == ElementState::Pressed);
                }
            }

            WindowEvent::Focused(false) => self.keys.clear(),

            WindowEvent::Resized(new_size) => {
                let size = cubic_platform::from_physical(new_size);
                if let Err(e) = self.resize(size) {
                    self.fail(event_loop, e);
                    return;
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        if self.paused {
            // Minimised: sleep until the next event.
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = AppCfg::load(&args.config).apply_args(&args);
    info!(
        "assets from '{}', backend {:?}",
        cfg.render.asset_root.display(),
        cfg.render.backend
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
