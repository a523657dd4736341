//! Widget groups: container widgets composing their children into one
//! fragment.
//!
//! A group is itself a widget whose renderer identifier is
//! [`GROUP_RENDERER_ID`]; the pipeline routes it here instead of through a
//! concrete renderer. Composition skips the conditional and cache stages —
//! children run the full pipeline individually, so each child keeps its own
//! gating and its own cache entry, and the group only assembles markup.

use rand::Rng;
use tracing::warn;

use crate::domain::{WidgetInstance, WidgetOptions};
use crate::render::context::{PageAccumulator, RenderContext};
use crate::render::error::RenderError;
use crate::render::outcome::RenderOutcome;
use crate::render::pipeline::RenderPipeline;

/// Renderer identifier reserved for groups.
pub const GROUP_RENDERER_ID: &str = "group";

/// Option key selecting the group layout.
pub const OPTION_LAYOUT: &str = "layout";
/// Option key for the column count under the columns layout.
pub const OPTION_COLUMNS: &str = "columns";

const DEFAULT_COLUMNS: u32 = 2;

/// How a group arranges its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Children stacked vertically. The default, and the fallback for
    /// unrecognized layout values.
    Rows,
    /// Children distributed across a fixed number of columns.
    Columns(u32),
    /// Exactly one child, picked at random per render.
    Random,
    /// First child shown, later children behind tabs; ajax-capable tabs
    /// defer their render to a follow-up request.
    Tabs,
}

impl Layout {
    pub fn from_options(options: &WidgetOptions) -> Self {
        let name = options
            .get(OPTION_LAYOUT)
            .and_then(|value| value.as_str())
            .unwrap_or("");
        match name {
            "columns" => {
                let columns = options
                    .get(OPTION_COLUMNS)
                    .and_then(|value| value.as_u64())
                    .map(|n| n.clamp(1, 16) as u32)
                    .unwrap_or(DEFAULT_COLUMNS);
                Layout::Columns(columns)
            }
            "random" => Layout::Random,
            "tabs" => Layout::Tabs,
            _ => Layout::Rows,
        }
    }

    fn class_token(&self) -> &'static str {
        match self {
            Layout::Rows => "rows",
            Layout::Columns(_) => "columns",
            Layout::Random => "random",
            Layout::Tabs => "tabs",
        }
    }
}

/// Whether the pipeline should route this widget through group composition.
pub fn is_group(widget: &WidgetInstance) -> bool {
    widget.renderer == GROUP_RENDERER_ID
}

/// Warm-up recursion into the group's children.
pub(crate) fn prepare(
    pipeline: &RenderPipeline,
    widget: &WidgetInstance,
    position: &str,
    ctx: &RenderContext,
) {
    let child_ctx = ctx.for_child_of(widget.id);
    for child in ordered_children(widget) {
        pipeline.prepare(child, position, &child_ctx);
    }
}

/// Compose the group's children into one fragment.
pub(crate) fn compose(
    pipeline: &RenderPipeline,
    widget: &WidgetInstance,
    position: &str,
    ctx: &RenderContext,
    acc: &mut PageAccumulator,
) -> Result<RenderOutcome, RenderError> {
    let children = ordered_children(widget);
    let layout = Layout::from_options(&widget.options);
    let editing = pipeline.config().layout_editor;
    let child_ctx = ctx.for_child_of(widget.id);

    let html = match layout {
        Layout::Rows | Layout::Columns(_) => {
            let cells = render_cells(pipeline, &children, position, &child_ctx, acc, editing);
            if cells.is_empty() && !editing {
                return Ok(RenderOutcome::suppressed_empty());
            }
            wrap(widget, layout, &cells.join(""))
        }
        Layout::Random => {
            // the editor pins random groups so every child stays editable
            let picked: Vec<&WidgetInstance> = if editing || children.len() <= 1 {
                children
            } else {
                let index = rand::rng().random_range(0..children.len());
                vec![children[index]]
            };
            let cells = render_cells(pipeline, &picked, position, &child_ctx, acc, editing);
            if cells.is_empty() && !editing {
                return Ok(RenderOutcome::suppressed_empty());
            }
            wrap(widget, layout, &cells.join(""))
        }
        Layout::Tabs => {
            let body = render_tabs(pipeline, &children, position, &child_ctx, acc)?;
            match body {
                Some(body) => wrap(widget, layout, &body),
                None if editing => wrap(widget, layout, ""),
                None => return Ok(RenderOutcome::suppressed_empty()),
            }
        }
    };

    Ok(RenderOutcome::Regenerated { html })
}

fn ordered_children(widget: &WidgetInstance) -> Vec<&WidgetInstance> {
    let mut children: Vec<&WidgetInstance> =
        widget.children.iter().filter(|child| child.active).collect();
    children.sort_by_key(|child| child.display_order);
    children
}

/// Render children into cell markup, dropping children that produced
/// nothing. The editor keeps empty children visible as placeholders. A
/// failed child is logged and dropped so its siblings still compose.
fn render_cells(
    pipeline: &RenderPipeline,
    children: &[&WidgetInstance],
    position: &str,
    ctx: &RenderContext,
    acc: &mut PageAccumulator,
    editing: bool,
) -> Vec<String> {
    let mut cells = Vec::with_capacity(children.len());
    for child in children {
        let html = match pipeline.render(child, position, ctx, acc) {
            Ok(outcome) => outcome.into_html(),
            Err(error) => {
                warn!(
                    widget_id = child.id,
                    renderer = %child.renderer,
                    error = %error,
                    "group child failed, dropping from composition"
                );
                continue;
            }
        };
        if html.is_empty() && !editing {
            continue;
        }
        cells.push(format!(
            r#"<div class="widget-group__cell" data-widget-id="{id}">{html}</div>"#,
            id = child.id,
            html = html
        ));
    }
    cells
}

/// Tab composition: every child contributes a nav entry; the first child
/// renders inline and later ajax-capable children defer behind an opaque
/// reference. Returns `None` when nothing rendered and nothing deferred.
fn render_tabs(
    pipeline: &RenderPipeline,
    children: &[&WidgetInstance],
    position: &str,
    ctx: &RenderContext,
    acc: &mut PageAccumulator,
) -> Result<Option<String>, RenderError> {
    let editing = pipeline.config().layout_editor;
    let mut nav = Vec::new();
    let mut panels = Vec::new();

    for (index, child) in children.iter().enumerate() {
        let deferrable =
            index > 0 && pipeline.registry().resolve(&child.renderer).can_ajax_load();
        if deferrable {
            let reference = pipeline.ajax_load_url(child, ctx);
            nav.push(tab_nav_item(pipeline, child));
            panels.push(format!(
                r#"<div class="widget-group__panel" data-widget-id="{id}" data-ajax-ref="{reference}"></div>"#,
                id = child.id,
                reference = reference
            ));
            continue;
        }

        let html = match pipeline.render(child, position, ctx, acc) {
            Ok(outcome) => outcome.into_html(),
            Err(error) => {
                warn!(
                    widget_id = child.id,
                    renderer = %child.renderer,
                    error = %error,
                    "tab child failed, dropping from composition"
                );
                continue;
            }
        };
        if html.is_empty() && !editing {
            continue;
        }
        nav.push(tab_nav_item(pipeline, child));
        panels.push(format!(
            r#"<div class="widget-group__panel" data-widget-id="{id}">{html}</div>"#,
            id = child.id,
            html = html
        ));
    }

    if panels.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        r#"<ul class="widget-group__tabs">{nav}</ul>{panels}"#,
        nav = nav.join(""),
        panels = panels.join("")
    )))
}

fn tab_nav_item(pipeline: &RenderPipeline, child: &WidgetInstance) -> String {
    format!(
        r#"<li class="widget-group__tab" data-widget-id="{id}">{title}</li>"#,
        id = child.id,
        title = pipeline.title(child)
    )
}

fn wrap(widget: &WidgetInstance, layout: Layout, body: &str) -> String {
    let columns_attr = match layout {
        Layout::Columns(columns) => format!(r#" data-columns="{columns}""#),
        _ => String::new(),
    };
    format!(
        r#"<div class="widget-group widget-group--{token}" data-group-id="{id}"{columns_attr}>{body}</div>"#,
        token = layout.class_token(),
        id = widget.id,
        columns_attr = columns_attr,
        body = body
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::ajax::AjaxLoadRef;
    use crate::cache::MemoryCacheStore;
    use crate::config::RuntimeConfig;
    use crate::domain::{RendererConfig, WidgetTitle};
    use crate::render::context::SideEffects;
    use crate::render::registry::RendererRegistry;
    use crate::render::renderer::WidgetRenderer;

    use super::*;

    struct StaticRenderer {
        config: RendererConfig,
        html: &'static str,
    }

    impl StaticRenderer {
        fn new(name: &str, html: &'static str) -> Self {
            Self {
                config: RendererConfig::new(name).finish(),
                html,
            }
        }

        fn ajax(name: &str, html: &'static str) -> Self {
            Self {
                config: RendererConfig::new(name).with_ajax_load().finish(),
                html,
            }
        }
    }

    impl WidgetRenderer for StaticRenderer {
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
            Ok(self.html.to_string())
        }
    }

    fn pipeline(config: RuntimeConfig) -> RenderPipeline {
        let mut registry = RendererRegistry::new();
        registry.register("a", Arc::new(StaticRenderer::new("A", "<p>a</p>")));
        registry.register("b", Arc::new(StaticRenderer::new("B", "<p>b</p>")));
        registry.register("blank", Arc::new(StaticRenderer::new("Blank", "")));
        registry.register("feed", Arc::new(StaticRenderer::ajax("Feed", "<p>feed</p>")));
        RenderPipeline::new(config, registry, Arc::new(MemoryCacheStore::new()))
    }

    fn group_with(layout: &str, children: Vec<WidgetInstance>) -> WidgetInstance {
        WidgetInstance::new(10, GROUP_RENDERER_ID)
            .with_option(OPTION_LAYOUT, json!(layout))
            .with_children(children)
    }

    fn child(id: u64, renderer: &str, order: i32) -> WidgetInstance {
        let mut widget = WidgetInstance::new(id, renderer);
        widget.display_order = order;
        widget
    }

    #[test]
    fn unrecognized_layout_falls_back_to_rows() {
        let mut options = WidgetOptions::new();
        options.set(OPTION_LAYOUT, json!("diagonal"));
        assert_eq!(Layout::from_options(&options), Layout::Rows);
        assert_eq!(Layout::from_options(&WidgetOptions::new()), Layout::Rows);
    }

    #[test]
    fn columns_layout_reads_count() {
        let mut options = WidgetOptions::new();
        options.set(OPTION_LAYOUT, json!("columns"));
        assert_eq!(Layout::from_options(&options), Layout::Columns(2));
        options.set(OPTION_COLUMNS, json!(3));
        assert_eq!(Layout::from_options(&options), Layout::Columns(3));
    }

    #[test]
    fn rows_compose_in_display_order() {
        let pipeline = pipeline(RuntimeConfig::default());
        let group = group_with("rows", vec![child(2, "b", 20), child(1, "a", 10)]);
        let mut acc = PageAccumulator::new();
        let outcome = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose");

        let html = outcome.into_html();
        assert!(html.contains("widget-group--rows"));
        let a_at = html.find("<p>a</p>").expect("child a");
        let b_at = html.find("<p>b</p>").expect("child b");
        assert!(a_at < b_at, "display order must win over child order");
    }

    #[test]
    fn empty_and_inactive_children_are_dropped() {
        let pipeline = pipeline(RuntimeConfig::default());
        let mut inactive = child(3, "b", 30);
        inactive.active = false;
        let group = group_with(
            "rows",
            vec![child(1, "a", 10), child(2, "blank", 20), inactive],
        );
        let mut acc = PageAccumulator::new();
        let html = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose")
            .into_html();

        assert!(html.contains("<p>a</p>"));
        assert!(!html.contains(r#"data-widget-id="2""#));
        assert!(!html.contains("<p>b</p>"));
    }

    #[test]
    fn editor_keeps_empty_children_visible() {
        let mut config = RuntimeConfig::default();
        config.layout_editor = true;
        let pipeline = pipeline(config);
        let group = group_with("rows", vec![child(2, "blank", 20)]);
        let mut acc = PageAccumulator::new();
        let html = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose")
            .into_html();
        assert!(html.contains(r#"data-widget-id="2""#));
    }

    #[test]
    fn all_children_empty_suppresses_group() {
        let pipeline = pipeline(RuntimeConfig::default());
        let group = group_with("rows", vec![child(1, "blank", 10)]);
        let mut acc = PageAccumulator::new();
        let outcome = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose");
        assert!(outcome.is_suppressed());
        assert!(outcome.html().is_empty());
    }

    #[test]
    fn random_layout_renders_exactly_one_child() {
        let pipeline = pipeline(RuntimeConfig::default());
        let group = group_with("random", vec![child(1, "a", 10), child(2, "b", 20)]);
        let mut acc = PageAccumulator::new();
        let html = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose")
            .into_html();
        let picked_a = html.contains("<p>a</p>");
        let picked_b = html.contains("<p>b</p>");
        assert!(picked_a ^ picked_b, "exactly one child must render: {html}");
    }

    #[test]
    fn random_layout_eventually_picks_every_child() {
        let pipeline = pipeline(RuntimeConfig::default());
        let group = group_with(
            "random",
            vec![child(1, "a", 10), child(2, "b", 20), child(3, "feed", 30)],
        );
        let ctx = RenderContext::new(0);

        let mut seen = [false; 3];
        for _ in 0..200 {
            let mut acc = PageAccumulator::new();
            let html = pipeline
                .render(&group, "sidebar", &ctx, &mut acc)
                .expect("compose")
                .into_html();
            let hits = [
                html.contains("<p>a</p>"),
                html.contains("<p>b</p>"),
                html.contains("<p>feed</p>"),
            ];
            assert_eq!(hits.iter().filter(|h| **h).count(), 1);
            for (slot, hit) in seen.iter_mut().zip(hits) {
                *slot |= hit;
            }
        }
        assert_eq!(seen, [true; 3], "every child must be picked eventually");
    }

    #[test]
    fn tabs_defer_ajax_capable_children_after_first() {
        let pipeline = pipeline(RuntimeConfig::default());
        let group = group_with(
            "tabs",
            vec![child(1, "feed", 10), child(2, "feed", 20), child(3, "feed", 30)],
        );
        let mut acc = PageAccumulator::new();
        let html = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose")
            .into_html();

        // first tab renders inline even though its renderer could defer
        assert!(html.contains("<p>feed</p>"));

        let marker = r#"data-ajax-ref=""#;
        let mut deferred_ids = Vec::new();
        let mut rest = html.as_str();
        while let Some(at) = rest.find(marker) {
            let start = at + marker.len();
            let end = start + rest[start..].find('"').expect("attr close");
            let reference = AjaxLoadRef::decode(&rest[start..end]).expect("decode");
            deferred_ids.push(reference.widget_id);
            rest = &rest[end..];
        }
        assert_eq!(deferred_ids, vec![2, 3]);
    }

    #[test]
    fn tabs_render_non_deferrable_children_inline() {
        let pipeline = pipeline(RuntimeConfig::default());
        let group = group_with("tabs", vec![child(1, "a", 10), child(2, "b", 20)]);
        let mut acc = PageAccumulator::new();
        let html = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose")
            .into_html();
        assert!(html.contains("<p>a</p>"));
        assert!(html.contains("<p>b</p>"));
        assert!(!html.contains("data-ajax-ref"));
    }

    #[test]
    fn tab_nav_uses_titles_with_renderer_fallback() {
        let pipeline = pipeline(RuntimeConfig::default());
        let titled =
            child(1, "a", 10).with_title(WidgetTitle::Literal("News".to_string()));
        let group = group_with("tabs", vec![titled, child(2, "b", 20)]);
        let mut acc = PageAccumulator::new();
        let html = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose")
            .into_html();
        assert!(html.contains(">News</li>"));
        assert!(html.contains(">B</li>"), "untitled tab falls back to renderer name");
    }

    #[test]
    fn child_conditionals_see_parent_group_id() {
        let pipeline = pipeline(RuntimeConfig::default());
        let gated = child(1, "a", 10)
            .with_option(
                "conditional",
                json!({"raw": "parent_group_id == 10"}),
            );
        let group = group_with("rows", vec![gated]);
        let mut acc = PageAccumulator::new();
        let html = pipeline
            .render(&group, "sidebar", &RenderContext::new(0), &mut acc)
            .expect("compose")
            .into_html();
        assert!(html.contains("<p>a</p>"));
    }
}
