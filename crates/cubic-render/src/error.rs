// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

/// Failure taxonomy shared by every backend.
///
/// Internal code passes these around inside `anyhow::Error`; the app recovers
/// them with `downcast_ref` when deciding whether to fall back to another
/// backend. A stale or suboptimal surface is not an error at all: it is the
/// `false` returned by `render_begin` / `render_end`.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No capable physical device, queue family or required extension.
    #[error("device selection failed: {0}")]
    DeviceSelection(String),

    /// No compatible surface format or present mode.
    #[error("surface negotiation failed: {0}")]
    SurfaceNegotiation(String),

    /// Memory type lookup, shader module creation, descriptor pool
    /// exhaustion or an unsupported layout transition.
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),

    #[error("failed to load asset '{path}': {reason}")]
    AssetLoad { path: String, reason: String },

    #[error("{kind} asset {id} is not loaded")]
    UnknownAsset { kind: &'static str, id: String },
}

impl RenderError {
    /// Errors that disqualify a backend during construction, as opposed to
    /// problems with the content the app asked it to load.
    pub fn is_backend_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::DeviceSelection(_)
                | RenderError::SurfaceNegotiation(_)
                | RenderError::ResourceCreation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_fatal_kinds() {
        assert!(RenderError::DeviceSelection("none".into()).is_backend_fatal());
        assert!(RenderError::SurfaceNegotiation("none".into()).is_backend_fatal());
        assert!(RenderError::ResourceCreation("oom".into()).is_backend_fatal());
        assert!(!RenderError::AssetLoad {
            path: "a.obj".into(),
            reason: "missing".into()
        }
        .is_backend_fatal());
    }

    #[test]
    fn survives_anyhow_round_trip() {
        let err: anyhow::Error = RenderError::DeviceSelection("no GPU".into()).into();
        let err = err.context("VkRenderer::new");
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::DeviceSelection(_))
        ));
    }
}
