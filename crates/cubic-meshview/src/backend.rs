// SPDX-License-Identifier: CEPL-1.0
//! Backend chosen once at startup. `auto` probes Vulkan and falls back to
//! OpenGL when the failure is a capability problem rather than a bug.
use crate::config::BackendChoice;
use anyhow::Result;
use cubic_render::{RenderError, RenderSettings, RenderSize, Renderer};
use cubic_render_gl::GlRenderer;
use cubic_render_vk::VkRenderer;
use cubic_platform::winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::warn;

pub enum Backend {
    Gl(Box<GlRenderer>),
    Vk(Box<VkRenderer>),
}

/// Why Vulkan cannot run here, if the error is a capability gap anywhere in
/// its context chain. Other errors are bugs or environment faults and are
/// surfaced instead of masked by the fallback.
pub fn fallback_reason(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|e| e.downcast_ref::<RenderError>())
        .filter(|render| render.is_backend_fatal())
        .map(ToString::to_string)
}

impl Backend {
    pub fn create(
        choice: BackendChoice,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        match choice {
            BackendChoice::Gl => Self::gl(window, display, size, settings),
            BackendChoice::Vk => Ok(Self::Vk(Box::new(VkRenderer::new(
                window, display, size, settings,
            )?))),
            BackendChoice::Auto => {
                if !cubic_render_vk::probe_loader() {
                    return Self::gl(window, display, size, settings);
                }
                match VkRenderer::new(window, display, size, settings) {
                    Ok(vk) => Ok(Self::Vk(Box::new(vk))),
                    Err(e) => match fallback_reason(&e) {
                        Some(reason) => {
                            warn!("Vulkan unavailable ({reason}); falling back to OpenGL");
                            Self::gl(window, display, size, settings)
                        }
                        None => Err(e),
                    },
                }
            }
        }
    }

    fn gl(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        Ok(Self::Gl(Box::new(GlRenderer::new(
            window, display, size, settings,
        )?)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Gl(_) => "gl",
            Backend::Vk(_) => "vk",
        }
    }

    pub fn renderer(&mut self) -> &mut dyn Renderer {
        match self {
            Backend::Gl(r) => r.as_mut(),
            Backend::Vk(r) => r.as_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn capability_errors_fall_back() {
        let e: anyhow::Error = RenderError::DeviceSelection("no GPU".into()).into();
        assert_eq!(fallback_reason(&e).as_deref(), Some("device selection failed: no GPU"));

        let wrapped = Err::<(), _>(RenderError::SurfaceNegotiation("no formats".into()))
            .context("create swapchain")
            .context("build renderer")
            .unwrap_err();
        assert!(fallback_reason(&wrapped).is_some_and(|r| r.contains("no formats")));
    }

    #[test]
    fn other_errors_are_surfaced() {
        assert_eq!(fallback_reason(&anyhow!("window handle unavailable")), None);
        let asset: anyhow::Error = RenderError::AssetLoad {
            path: "crate.obj".into(),
            reason: "missing".into(),
        }
        .into();
        assert_eq!(fallback_reason(&asset), None);
    }
}
