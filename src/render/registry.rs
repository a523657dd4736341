//! Renderer registry: stored class identifiers → renderer implementations.
//!
//! Populated at startup by the host; lookups for unknown identifiers fall
//! back to a shared no-op renderer so a widget whose implementation was
//! uninstalled degrades to empty output instead of failing the page.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::renderer::{NoopRenderer, WidgetRenderer};

pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn WidgetRenderer>>,
    fallback: Arc<dyn WidgetRenderer>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self {
            renderers: HashMap::new(),
            fallback: Arc::new(NoopRenderer::default()),
        }
    }

    pub fn register(&mut self, id: impl Into<String>, renderer: Arc<dyn WidgetRenderer>) {
        self.renderers.insert(id.into(), renderer);
    }

    /// Resolve an identifier, falling back to the no-op renderer.
    pub fn resolve(&self, id: &str) -> Arc<dyn WidgetRenderer> {
        match self.renderers.get(id) {
            Some(renderer) => Arc::clone(renderer),
            None => {
                debug!(renderer = id, "unknown renderer class, using no-op");
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Resolve only registered identifiers.
    pub fn resolve_known(&self, id: &str) -> Option<Arc<dyn WidgetRenderer>> {
        self.renderers.get(id).map(Arc::clone)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.renderers.contains_key(id)
    }

    /// Identifiers offered when creating new widgets, hidden renderers
    /// excluded. Sorted for stable picker output.
    pub fn visible_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .renderers
            .iter()
            .filter(|(_, renderer)| !renderer.is_hidden())
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}
