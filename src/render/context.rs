//! Ambient render context and the side-effect accumulators.
//!
//! The host builds one [`RenderContext`] per request; the pipeline derives
//! child contexts during group composition. Side channels that the original
//! collected through global template state are explicit values here: each
//! regeneration writes into its own fresh [`SideEffects`], and the pipeline
//! merges them into the caller's [`PageAccumulator`]. Nested renders can
//! never leak into unrelated siblings because nothing is shared.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::WidgetId;

/// Context key exposing the mobile flag to conditionals.
pub const PARAM_IS_MOBILE: &str = "is_mobile";
/// Context key exposing the viewer's permission segment to conditionals.
pub const PARAM_PERMISSION_SEGMENT: &str = "permission_segment";
/// Context key exposing the owning group id to nested conditionals.
pub const PARAM_PARENT_GROUP_ID: &str = "parent_group_id";

/// Current wall-clock time as epoch seconds, for hosts that do not carry
/// their own request timestamp.
pub fn now_utc() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// The viewer this request renders for.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    /// Permission/role segment identifier used for per-user cache keys.
    pub permission_segment: u64,
    /// The segment is a pure group-level combination shared by many
    /// viewers, so per-user cached output may be shared under it.
    pub segment_shareable: bool,
    /// Privileged roles bypass the cache unless policy says otherwise.
    pub is_privileged: bool,
    pub style_id: u32,
    pub language_id: u32,
    pub timezone: String,
    pub is_mobile: bool,
}

impl Default for ViewerContext {
    fn default() -> Self {
        Self {
            permission_segment: 1,
            segment_shareable: true,
            is_privileged: false,
            style_id: 1,
            language_id: 1,
            timezone: String::new(),
            is_mobile: false,
        }
    }
}

/// Site-wide defaults the viewer is compared against when building cache
/// keys.
#[derive(Debug, Clone)]
pub struct SiteDefaults {
    pub style_id: u32,
    pub language_id: u32,
    pub guest_timezone: String,
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            style_id: 1,
            language_id: 1,
            guest_timezone: "UTC".to_string(),
        }
    }
}

/// Ambient parameter context supplied by the host for one render pass.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Request timestamp, epoch seconds. Freshness decisions use this so a
    /// whole page observes one consistent time.
    pub now: i64,
    /// Host-supplied named values visible to conditionals and renderers
    /// ("current forum", "current page", ...).
    pub params: Map<String, Value>,
    pub viewer: ViewerContext,
    pub defaults: SiteDefaults,
    /// Set while rendering the children of a group.
    pub parent_group_id: Option<WidgetId>,
    /// The placement is a cross-cutting hook rather than a layout slot.
    pub is_hook: bool,
}

impl RenderContext {
    pub fn new(now: i64) -> Self {
        Self {
            now,
            params: Map::new(),
            viewer: ViewerContext::default(),
            defaults: SiteDefaults::default(),
            parent_group_id: None,
            is_hook: false,
        }
    }

    /// Context stamped with the current wall clock.
    pub fn current() -> Self {
        Self::new(now_utc())
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_viewer(mut self, viewer: ViewerContext) -> Self {
        self.viewer = viewer;
        self
    }

    /// Derive the context a group's children render under.
    pub fn for_child_of(&self, group_id: WidgetId) -> Self {
        let mut child = self.clone();
        child.parent_group_id = Some(group_id);
        child
    }

    /// Flat name → value map the conditional evaluator sees: host params
    /// plus the built-in ambient markers.
    pub fn conditional_params(&self) -> Map<String, Value> {
        let mut map = self.params.clone();
        map.insert(PARAM_IS_MOBILE.to_string(), Value::Bool(self.viewer.is_mobile));
        map.insert(
            PARAM_PERMISSION_SEGMENT.to_string(),
            Value::from(self.viewer.permission_segment),
        );
        if let Some(group_id) = self.parent_group_id {
            map.insert(PARAM_PARENT_GROUP_ID.to_string(), Value::from(group_id));
        }
        map
    }
}

/// Side-channel outputs of one regeneration: container-level page metadata
/// mutations and required external resource declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideEffects {
    pub container_data: Map<String, Value>,
    pub required_externals: BTreeMap<String, Vec<String>>,
}

impl SideEffects {
    pub fn set_container(&mut self, key: impl Into<String>, value: Value) {
        self.container_data.insert(key.into(), value);
    }

    pub fn require_external(&mut self, kind: impl Into<String>, requirement: impl Into<String>) {
        let requirement = requirement.into();
        let list = self.required_externals.entry(kind.into()).or_default();
        if !list.contains(&requirement) {
            list.push(requirement);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.container_data.is_empty() && self.required_externals.is_empty()
    }
}

impl From<SideEffects> for crate::cache::CacheExtra {
    fn from(effects: SideEffects) -> Self {
        Self {
            container_data: effects.container_data,
            required_externals: effects.required_externals,
        }
    }
}

impl From<crate::cache::CacheExtra> for SideEffects {
    fn from(extra: crate::cache::CacheExtra) -> Self {
        Self {
            container_data: extra.container_data,
            required_externals: extra.required_externals,
        }
    }
}

/// Request-scoped accumulator the host drains after a page's widgets have
/// rendered. Collects the replayed side effects of every widget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageAccumulator {
    pub container_data: Map<String, Value>,
    pub required_externals: BTreeMap<String, Vec<String>>,
}

impl PageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one widget's side effects: container data by key (later
    /// writes win), externals as a deduplicated union in first-seen order.
    pub fn merge(&mut self, effects: &SideEffects) {
        for (key, value) in &effects.container_data {
            self.container_data.insert(key.clone(), value.clone());
        }
        for (kind, requirements) in &effects.required_externals {
            let list = self.required_externals.entry(kind.clone()).or_default();
            for requirement in requirements {
                if !list.contains(requirement) {
                    list.push(requirement.clone());
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.container_data.is_empty() && self.required_externals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn conditional_params_carry_ambient_markers() {
        let mut viewer = ViewerContext::default();
        viewer.is_mobile = true;
        viewer.permission_segment = 9;
        let ctx = RenderContext::new(100)
            .with_param("forum_id", json!(4))
            .with_viewer(viewer);

        let params = ctx.conditional_params();
        assert_eq!(params.get("forum_id"), Some(&json!(4)));
        assert_eq!(params.get(PARAM_IS_MOBILE), Some(&json!(true)));
        assert_eq!(params.get(PARAM_PERMISSION_SEGMENT), Some(&json!(9)));
        assert!(!params.contains_key(PARAM_PARENT_GROUP_ID));

        let child = ctx.for_child_of(42);
        assert_eq!(
            child.conditional_params().get(PARAM_PARENT_GROUP_ID),
            Some(&json!(42))
        );
    }

    #[test]
    fn accumulator_merges_and_dedupes() {
        let mut acc = PageAccumulator::new();

        let mut first = SideEffects::default();
        first.set_container("page_title", json!("A"));
        first.require_external("css", "widget.css");
        acc.merge(&first);

        let mut second = SideEffects::default();
        second.set_container("page_title", json!("B"));
        second.require_external("css", "widget.css");
        second.require_external("js", "tabs.js");
        acc.merge(&second);

        assert_eq!(acc.container_data.get("page_title"), Some(&json!("B")));
        assert_eq!(
            acc.required_externals.get("css"),
            Some(&vec!["widget.css".to_string()])
        );
        assert_eq!(
            acc.required_externals.get("js"),
            Some(&vec!["tabs.js".to_string()])
        );
    }

    #[test]
    fn side_effects_convert_to_cache_extra() {
        let mut effects = SideEffects::default();
        effects.set_container("a", json!(1));
        effects.require_external("css", "x");

        let extra: crate::cache::CacheExtra = effects.clone().into();
        assert_eq!(extra.container_data.get("a"), Some(&json!(1)));
        let back: SideEffects = extra.into();
        assert_eq!(back, effects);
    }
}
