//! Terminal states of the render pipeline.

/// How a widget's render call concluded. All three are valid outputs;
/// only `Regenerated` produced (and possibly cached) fresh markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The widget produced no output: conditional failed, the mobile gate
    /// fired, or a cold key's lock was contended. Carries diagnostic markup
    /// under debug/editor modes, empty otherwise.
    Suppressed { html: String },
    /// Markup restored from the cache store, possibly stale.
    ServedFromCache { html: String, age: i64 },
    /// Markup rebuilt by the concrete renderer during this call.
    Regenerated { html: String },
}

impl RenderOutcome {
    pub fn suppressed_empty() -> Self {
        Self::Suppressed {
            html: String::new(),
        }
    }

    pub fn html(&self) -> &str {
        match self {
            Self::Suppressed { html }
            | Self::ServedFromCache { html, .. }
            | Self::Regenerated { html } => html,
        }
    }

    pub fn into_html(self) -> String {
        match self {
            Self::Suppressed { html }
            | Self::ServedFromCache { html, .. }
            | Self::Regenerated { html } => html,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed { .. })
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self, Self::ServedFromCache { .. })
    }

    pub fn is_regenerated(&self) -> bool {
        matches!(self, Self::Regenerated { .. })
    }
}
