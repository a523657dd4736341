//! Runtime configuration for the rendering core.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_LOCK_HOLD_SECS: u64 = 10;

/// Host-supplied switches governing the pipeline.
///
/// Deserializes from the host's configuration file; every field has a
/// default so an empty table is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Debug mode: disables caching and surfaces diagnostic markup for
    /// suppressed widgets.
    pub debug: bool,
    /// Layout editor mode: disables caching, keeps empty children visible
    /// as editable placeholders and pins `random` layouts.
    pub layout_editor: bool,
    /// Administrative switch for the whole cache subsystem.
    pub cache_enabled: bool,
    /// Cache output for privileged viewers. Off by default: their markup
    /// tends to embed controls that must not leak into shared entries.
    pub cache_privileged: bool,
    /// Under per-user caching, cache every permission segment rather than
    /// only shareable group-level segments.
    pub cache_all_segments: bool,
    /// Bound on regeneration lock hold time, in seconds.
    pub lock_hold_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            layout_editor: false,
            cache_enabled: true,
            cache_privileged: false,
            cache_all_segments: false,
            lock_hold_secs: DEFAULT_LOCK_HOLD_SECS,
        }
    }
}

impl RuntimeConfig {
    /// Diagnostic markup is shown instead of silent suppression.
    pub fn diagnostics_enabled(&self) -> bool {
        self.debug || self.layout_editor
    }

    pub fn lock_hold(&self) -> Duration {
        Duration::from_secs(self.lock_hold_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_cache_only() {
        let config = RuntimeConfig::default();
        assert!(config.cache_enabled);
        assert!(!config.debug);
        assert!(!config.layout_editor);
        assert!(!config.cache_privileged);
        assert!(!config.cache_all_segments);
        assert!(!config.diagnostics_enabled());
        assert_eq!(config.lock_hold(), Duration::from_secs(10));
    }

    #[test]
    fn deserializes_partial_table() {
        let config: RuntimeConfig =
            serde_json::from_value(serde_json::json!({"debug": true, "lock_hold_secs": 3}))
                .expect("deserialize");
        assert!(config.debug);
        assert!(config.diagnostics_enabled());
        assert_eq!(config.lock_hold(), Duration::from_secs(3));
        assert!(config.cache_enabled);
    }
}
