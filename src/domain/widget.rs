//! Widget instances and their open option map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ajax::AjaxLoadParams;
use crate::conditional::{ConditionalError, ConditionalExpression};

use super::renderer_config::{
    OPTION_CACHE_SECONDS, OPTION_CONDITIONAL, OPTION_DEACTIVATE_FOR_MOBILE, OPTION_EXPRESSION,
};

/// Widget identity. `0` marks a transient instance that has not been
/// persisted, such as a sub-instance synthesized during composition.
pub type WidgetId = u64;

/// Display title of a widget: a literal string or a phrase reference
/// resolved by the host's translation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetTitle {
    Literal(String),
    Phrase(String),
}

impl Default for WidgetTitle {
    fn default() -> Self {
        WidgetTitle::Literal(String::new())
    }
}

impl WidgetTitle {
    pub fn is_empty(&self) -> bool {
        match self {
            WidgetTitle::Literal(s) | WidgetTitle::Phrase(s) => s.is_empty(),
        }
    }
}

/// Open map of renderer-specific options.
///
/// Values are stored as loose JSON; typed accessors below cover the reserved
/// keys shared by every renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetOptions(BTreeMap<String, Value>);

impl WidgetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// TTL override in seconds, when the option holds something numeric.
    /// Accepts both numbers and numeric strings, the form option inputs
    /// arrive in.
    pub fn cache_seconds(&self) -> Option<i64> {
        match self.0.get(OPTION_CACHE_SECONDS)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn conditional(&self) -> Option<ConditionalExpression> {
        let value = self.0.get(OPTION_CONDITIONAL)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set_conditional(&mut self, conditional: &ConditionalExpression) {
        if let Ok(value) = serde_json::to_value(conditional) {
            self.0.insert(OPTION_CONDITIONAL.to_string(), value);
        }
    }

    pub fn expression(&self) -> Option<&str> {
        match self.0.get(OPTION_EXPRESSION)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn deactivate_for_mobile(&self) -> bool {
        self.0
            .get(OPTION_DEACTIVATE_FOR_MOBILE)
            .map(crate::conditional::truthy)
            .unwrap_or(false)
    }

    /// Normalize option input the way the save path does:
    ///
    /// - `cache_seconds`: non-numeric values are dropped, negatives clamp
    ///   to `0`;
    /// - `conditional`: the raw text is parsed and memoized, blank raw text
    ///   removes the option entirely;
    /// - a present conditional discards any legacy `expression`.
    ///
    /// Fails only when a non-blank conditional does not parse, so bad input
    /// is rejected at save time instead of surfacing per render.
    pub fn normalize(&mut self) -> Result<(), ConditionalError> {
        match self.0.get(OPTION_CACHE_SECONDS) {
            None => {}
            Some(value) => {
                let numeric = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                };
                match numeric {
                    Some(seconds) => {
                        let clamped = seconds.max(0);
                        self.0
                            .insert(OPTION_CACHE_SECONDS.to_string(), Value::from(clamped));
                    }
                    None => {
                        self.0.remove(OPTION_CACHE_SECONDS);
                    }
                }
            }
        }

        let raw = self
            .0
            .get(OPTION_CONDITIONAL)
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("raw")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .unwrap_or_default();
        match ConditionalExpression::parse(raw)? {
            Some(conditional) => self.set_conditional(&conditional),
            None => {
                self.0.remove(OPTION_CONDITIONAL);
            }
        }

        if self.0.contains_key(OPTION_CONDITIONAL) {
            self.0.remove(OPTION_EXPRESSION);
        }

        Ok(())
    }
}

impl FromIterator<(String, Value)> for WidgetOptions {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A configured unit of content placed at a position.
///
/// A widget belongs to at most one page and at most one parent group; the
/// two memberships are orthogonal. Child widgets of a group reference the
/// group through `group_id` and are carried inline in `children` for
/// composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetInstance {
    pub id: WidgetId,
    #[serde(default)]
    pub title: WidgetTitle,
    /// Renderer-class identifier resolved through the registry.
    pub renderer: String,
    #[serde(default)]
    pub options: WidgetOptions,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub group_id: Option<WidgetId>,
    #[serde(default)]
    pub page_id: Option<WidgetId>,
    #[serde(default)]
    pub children: Vec<WidgetInstance>,
    /// Present only while this instance renders as a deferred ajax
    /// fragment; never persisted.
    #[serde(skip)]
    pub ajax_load: Option<AjaxLoadParams>,
}

fn default_active() -> bool {
    true
}

impl WidgetInstance {
    pub fn new(id: WidgetId, renderer: impl Into<String>) -> Self {
        Self {
            id,
            title: WidgetTitle::default(),
            renderer: renderer.into(),
            options: WidgetOptions::default(),
            position: String::new(),
            display_order: 0,
            active: true,
            group_id: None,
            page_id: None,
            children: Vec::new(),
            ajax_load: None,
        }
    }

    pub fn with_title(mut self, title: WidgetTitle) -> Self {
        self.title = title;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.set(key, value);
        self
    }

    pub fn with_children(mut self, children: Vec<WidgetInstance>) -> Self {
        self.children = children;
        self
    }

    /// A transient instance has not been persisted.
    pub fn is_transient(&self) -> bool {
        self.id == 0
    }
}
