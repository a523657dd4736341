//! The contract every concrete renderer implements.

use crate::ajax::AjaxLoadParams;
use crate::domain::{RendererConfig, WidgetInstance};

use super::context::{RenderContext, SideEffects};
use super::error::RenderError;

/// A renderer produces markup for widget instances of its class.
///
/// Implementations are stateless with respect to individual renders; the
/// configuration is built once at construction and borrowed here. The
/// orchestration around renderers — conditional gating, caching, lock
/// protocol — lives in [`crate::render::RenderPipeline`], so a renderer only
/// supplies its capabilities and its core render.
pub trait WidgetRenderer: Send + Sync {
    /// The merged, immutable configuration for this renderer class.
    fn config(&self) -> &RendererConfig;

    /// Page-level template this renderer draws through, when the host's
    /// template system is involved.
    fn render_template(
        &self,
        _widget: &WidgetInstance,
        _position: &str,
        _ctx: &RenderContext,
    ) -> Option<String> {
        None
    }

    /// Side-effect-free warm-up before a batch of widgets renders. Must not
    /// mutate anything observable by other widgets.
    fn prepare(&self, _widget: &WidgetInstance, _position: &str, _ctx: &RenderContext) {}

    /// The core render. Writes container data and required externals into
    /// `effects`; the pipeline captures, caches and replays them.
    fn render_body(
        &self,
        widget: &WidgetInstance,
        position: &str,
        ctx: &RenderContext,
        effects: &mut SideEffects,
    ) -> Result<String, RenderError>;

    /// Optional "more…" link attached to the widget's wrapper data.
    fn extra_data_link(&self, _widget: &WidgetInstance) -> Option<String> {
        None
    }

    /// Replay parameters for a deferred load of this widget.
    fn ajax_load_params(&self, widget: &WidgetInstance, ctx: &RenderContext) -> AjaxLoadParams {
        widget
            .ajax_load
            .clone()
            .unwrap_or(AjaxLoadParams { is_hook: ctx.is_hook })
    }

    fn name(&self) -> &str {
        &self.config().name
    }

    fn is_hidden(&self) -> bool {
        self.config().hidden
    }

    fn use_wrapper(&self) -> bool {
        self.config().use_wrapper
    }

    fn can_ajax_load(&self) -> bool {
        self.config().can_ajax_load
    }
}

/// Fallback renderer for unknown class identifiers: renders nothing, hidden
/// from the picker, caches nothing.
pub struct NoopRenderer {
    config: RendererConfig,
}

impl Default for NoopRenderer {
    fn default() -> Self {
        Self {
            config: RendererConfig::new("No-op").with_hidden().finish(),
        }
    }
}

impl WidgetRenderer for NoopRenderer {
    fn config(&self) -> &RendererConfig {
        &self.config
    }

    fn render_body(
        &self,
        _widget: &WidgetInstance,
        _position: &str,
        _ctx: &RenderContext,
        _effects: &mut SideEffects,
    ) -> Result<String, RenderError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_renders_nothing() {
        let renderer = NoopRenderer::default();
        let widget = WidgetInstance::new(1, "does_not_exist");
        let ctx = RenderContext::new(0);
        let mut effects = SideEffects::default();
        let html = renderer
            .render_body(&widget, "sidebar", &ctx, &mut effects)
            .expect("noop render");
        assert!(html.is_empty());
        assert!(effects.is_empty());
        assert!(renderer.is_hidden());
        assert!(!renderer.can_ajax_load());
    }
}
