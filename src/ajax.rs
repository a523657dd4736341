//! Deferred-load references.
//!
//! A widget deferred by the tabs layout is replaced inline by an opaque
//! reference; a follow-up request decodes the reference and re-enters the
//! render pipeline for that single widget. The reference round-trips the
//! widget id plus the minimal replay parameters and nothing else; callers
//! other than this module treat it as opaque.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::WidgetId;

/// Suffix token distinguishing the deferred variant's cache key from the
/// inline one.
pub const AJAX_KEY_SUFFIX: &str = "ajax";

/// Replay parameters carried through a deferred load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxLoadParams {
    /// The originating placement was a cross-cutting hook context.
    #[serde(rename = "isHook", default)]
    pub is_hook: bool,
}

/// Decoded form of a deferred-load reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxLoadRef {
    #[serde(rename = "widgetId")]
    pub widget_id: WidgetId,
    #[serde(default)]
    pub params: AjaxLoadParams,
}

impl AjaxLoadRef {
    pub fn new(widget_id: WidgetId, params: AjaxLoadParams) -> Self {
        Self { widget_id, params }
    }

    /// Encode as an opaque URL-safe token.
    pub fn encode(&self) -> String {
        let payload = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(payload)
    }

    pub fn decode(reference: &str) -> Result<Self, AjaxRefError> {
        let payload = URL_SAFE_NO_PAD.decode(reference)?;
        Ok(serde_json::from_slice(&payload)?)
    }
}

#[derive(Debug, Error)]
pub enum AjaxRefError {
    #[error("ajax reference is not valid base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("ajax reference payload is malformed")]
    Payload(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_round_trips() {
        let reference = AjaxLoadRef::new(42, AjaxLoadParams { is_hook: true });
        let encoded = reference.encode();
        let decoded = AjaxLoadRef::decode(&encoded).expect("decode");
        assert_eq!(decoded, reference);
    }

    #[test]
    fn default_params_round_trip() {
        let reference = AjaxLoadRef::new(7, AjaxLoadParams::default());
        let decoded = AjaxLoadRef::decode(&reference.encode()).expect("decode");
        assert_eq!(decoded.widget_id, 7);
        assert!(!decoded.params.is_hook);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            AjaxLoadRef::decode("%%%not-base64%%%"),
            Err(AjaxRefError::Encoding(_))
        ));
        let valid_b64_bad_payload = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(matches!(
            AjaxLoadRef::decode(&valid_b64_bad_payload),
            Err(AjaxRefError::Payload(_))
        ));
    }

    #[test]
    fn distinct_widgets_produce_distinct_references() {
        let a = AjaxLoadRef::new(1, AjaxLoadParams::default()).encode();
        let b = AjaxLoadRef::new(2, AjaxLoadParams::default()).encode();
        assert_ne!(a, b);
    }
}
