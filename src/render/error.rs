use thiserror::Error;

/// Failure of a concrete renderer's core render.
///
/// The only error the pipeline propagates: conditional failures, lock
/// contention and cache misses are outcomes, not errors. The orchestrating
/// host isolates per-widget failures so one broken widget does not abort
/// the page ([`crate::render::RenderPipeline::render_position`] does this
/// for hosts that use it).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer `{renderer}` failed: {message}")]
    Renderer { renderer: String, message: String },
    #[error("render template `{template}` unavailable")]
    TemplateUnavailable { template: String },
}

impl RenderError {
    pub fn renderer(renderer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Renderer {
            renderer: renderer.into(),
            message: message.into(),
        }
    }

    pub fn template_unavailable(template: impl Into<String>) -> Self {
        Self::TemplateUnavailable {
            template: template.into(),
        }
    }
}
