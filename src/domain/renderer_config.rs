//! Renderer configuration: capability flags and the declared option schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved option key holding a `{raw, parsed}` conditional.
pub const OPTION_CONDITIONAL: &str = "conditional";
/// Reserved option key holding a legacy free-text expression.
pub const OPTION_EXPRESSION: &str = "expression";
/// Reserved option key overriding the renderer's declared TTL. Injected only
/// when the renderer declares caching support.
pub const OPTION_CACHE_SECONDS: &str = "cache_seconds";
/// Legacy flag suppressing a widget for mobile clients. Superseded by a
/// conditional on the `is_mobile` context value, kept for stored data.
pub const OPTION_DEACTIVATE_FOR_MOBILE: &str = "deactivate_for_mobile";

/// Primitive kind expected for a declared renderer option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Uint,
    String,
    Boolean,
    Flag,
    Array,
}

/// Per-renderer configuration, immutable after construction.
///
/// Concrete renderers build one of these once (usually in their constructor)
/// via the `with_*` builders and [`RendererConfig::finish`], which injects
/// the reserved option keys every renderer shares.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Display name for the renderer picker.
    pub name: String,
    /// Hide the renderer when creating new widgets.
    pub hidden: bool,
    /// Declared option schema, name → expected kind.
    pub options: BTreeMap<String, OptionKind>,
    /// The renderer's output may be cached.
    pub use_cache: bool,
    /// Cache per viewer permission segment instead of globally.
    pub use_user_cache: bool,
    /// Declared TTL in seconds; negative means cache forever.
    pub cache_seconds: i64,
    /// The host should wrap the widget's markup in the standard wrapper.
    pub use_wrapper: bool,
    /// The widget may be deferred and fetched in a follow-up request.
    pub can_ajax_load: bool,
}

impl RendererConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hidden: false,
            options: BTreeMap::new(),
            use_cache: false,
            use_user_cache: false,
            cache_seconds: 0,
            use_wrapper: true,
            can_ajax_load: false,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, kind: OptionKind) -> Self {
        self.options.insert(key.into(), kind);
        self
    }

    pub fn with_cache(mut self, cache_seconds: i64) -> Self {
        self.use_cache = true;
        self.cache_seconds = cache_seconds;
        self
    }

    pub fn with_user_cache(mut self) -> Self {
        self.use_user_cache = true;
        self
    }

    pub fn with_ajax_load(mut self) -> Self {
        self.can_ajax_load = true;
        self
    }

    pub fn with_hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn without_wrapper(mut self) -> Self {
        self.use_wrapper = false;
        self
    }

    /// Inject the reserved option keys and seal the configuration.
    pub fn finish(mut self) -> Self {
        if self.use_cache {
            self.options
                .insert(OPTION_CACHE_SECONDS.to_string(), OptionKind::String);
        }
        self.options
            .insert(OPTION_EXPRESSION.to_string(), OptionKind::String);
        self.options
            .insert(OPTION_CONDITIONAL.to_string(), OptionKind::Array);
        self.options
            .insert(OPTION_DEACTIVATE_FOR_MOBILE.to_string(), OptionKind::Uint);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_injected_on_finish() {
        let config = RendererConfig::new("Recent posts").finish();
        assert_eq!(config.options.get(OPTION_CONDITIONAL), Some(&OptionKind::Array));
        assert_eq!(config.options.get(OPTION_EXPRESSION), Some(&OptionKind::String));
        assert_eq!(
            config.options.get(OPTION_DEACTIVATE_FOR_MOBILE),
            Some(&OptionKind::Uint)
        );
        // cache_seconds only appears for cacheable renderers
        assert!(!config.options.contains_key(OPTION_CACHE_SECONDS));
    }

    #[test]
    fn cache_seconds_key_present_for_cacheable() {
        let config = RendererConfig::new("Recent posts").with_cache(300).finish();
        assert_eq!(
            config.options.get(OPTION_CACHE_SECONDS),
            Some(&OptionKind::String)
        );
        assert!(config.use_cache);
        assert_eq!(config.cache_seconds, 300);
    }

    #[test]
    fn declared_options_survive_finish() {
        let config = RendererConfig::new("Threads")
            .with_option("limit", OptionKind::Uint)
            .with_option("forums", OptionKind::Array)
            .finish();
        assert_eq!(config.options.get("limit"), Some(&OptionKind::Uint));
        assert_eq!(config.options.get("forums"), Some(&OptionKind::Array));
    }
}
