//! The render pipeline shared by every renderer.
//!
//! One pipeline instance serves a whole host process; renders against it are
//! logically parallel. Per render call the pipeline runs: conditional gate →
//! mobile gate → cache lookup (with the regeneration-lock protocol) →
//! regenerate → unconditional lock release → side-effect replay. See
//! [`RenderOutcome`] for the terminal states.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::ajax::{AJAX_KEY_SUFFIX, AjaxLoadRef, AjaxRefError};
use crate::cache::{CacheEntry, CacheKeyBuilder, CacheStore, LockGuard};
use crate::conditional::{self, ConditionalError};
use crate::config::RuntimeConfig;
use crate::domain::{RendererConfig, WidgetId, WidgetInstance, WidgetTitle};
use crate::group;

use super::context::{PageAccumulator, RenderContext, SideEffects};
use super::error::RenderError;
use super::outcome::RenderOutcome;
use super::registry::RendererRegistry;
use super::renderer::WidgetRenderer;

/// Placeholder markup shown in the layout editor where a widget's
/// conditional failed.
pub const CONDITIONAL_FAILED_PLACEHOLDER: &str =
    r#"<div class="widget-placeholder widget-placeholder--conditional"></div>"#;

/// Host seam for localized-phrase lookup; widget titles may reference a
/// phrase instead of carrying a literal.
pub trait PhraseResolver: Send + Sync {
    fn resolve(&self, key: &str) -> Option<String>;
}

pub struct RenderPipeline {
    config: RuntimeConfig,
    registry: RendererRegistry,
    store: Arc<dyn CacheStore>,
    phrases: Option<Arc<dyn PhraseResolver>>,
}

impl RenderPipeline {
    pub fn new(config: RuntimeConfig, registry: RendererRegistry, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            registry,
            store,
            phrases: None,
        }
    }

    pub fn with_phrase_resolver(mut self, phrases: Arc<dyn PhraseResolver>) -> Self {
        self.phrases = Some(phrases);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Warm-up pass before a batch of widgets renders: recurses into
    /// groups, hints the store about upcoming cache reads and lets the
    /// renderer preload template assets. Mutates nothing observable.
    pub fn prepare(&self, widget: &WidgetInstance, position: &str, ctx: &RenderContext) {
        if group::is_group(widget) {
            group::prepare(self, widget, position, ctx);
            return;
        }
        let renderer = self.registry.resolve(&widget.renderer);
        if self.use_cache(widget, ctx) {
            let key = self.cache_key(widget, position, ctx, &[]);
            self.store.preload(widget.id, &key);
        }
        renderer.prepare(widget, position, ctx);
    }

    /// Render one widget through the full pipeline.
    ///
    /// Returns `Err` only when the concrete renderer's core render fails;
    /// expected conditions (failed conditional, lock contention, cache
    /// miss) come back as [`RenderOutcome::Suppressed`] or served markup.
    pub fn render(
        &self,
        widget: &WidgetInstance,
        position: &str,
        ctx: &RenderContext,
        acc: &mut PageAccumulator,
    ) -> Result<RenderOutcome, RenderError> {
        if group::is_group(widget) {
            return group::compose(self, widget, position, ctx, acc);
        }
        let renderer = self.registry.resolve(&widget.renderer);
        self.render_with(renderer.as_ref(), widget, position, ctx, acc)
    }

    /// Render an ordered placement of widgets, isolating per-widget
    /// failures the way the original page assembly does: a renderer error
    /// suppresses that widget and the rest of the placement still renders.
    pub fn render_position(
        &self,
        widgets: &[WidgetInstance],
        position: &str,
        ctx: &RenderContext,
        acc: &mut PageAccumulator,
    ) -> Vec<(WidgetId, RenderOutcome)> {
        let mut ordered: Vec<&WidgetInstance> =
            widgets.iter().filter(|widget| widget.active).collect();
        ordered.sort_by_key(|widget| widget.display_order);

        for widget in &ordered {
            self.prepare(widget, position, ctx);
        }

        let mut outcomes = Vec::with_capacity(ordered.len());
        for widget in ordered {
            match self.render(widget, position, ctx, acc) {
                Ok(outcome) => outcomes.push((widget.id, outcome)),
                Err(error) => {
                    warn!(
                        widget_id = widget.id,
                        renderer = %widget.renderer,
                        error = %error,
                        "widget render failed, suppressing"
                    );
                    outcomes.push((widget.id, RenderOutcome::suppressed_empty()));
                }
            }
        }
        outcomes
    }

    /// Decode a deferred-load reference built by [`Self::ajax_load_url`].
    pub fn resolve_ajax(&self, reference: &str) -> Result<AjaxLoadRef, AjaxRefError> {
        AjaxLoadRef::decode(reference)
    }

    /// Build the opaque reference a deferred child is fetched through.
    pub fn ajax_load_url(&self, widget: &WidgetInstance, ctx: &RenderContext) -> String {
        let renderer = self.registry.resolve(&widget.renderer);
        let params = renderer.ajax_load_params(widget, ctx);
        AjaxLoadRef::new(widget.id, params).encode()
    }

    /// Re-enter the pipeline for a single widget on a follow-up request.
    ///
    /// The conditional gate is bypassed — it was satisfied when the parent
    /// rendered the deferring placeholder — and the instance renders as a
    /// deferred fragment, which keeps it out of the cache (the parent's
    /// entry already carries the surrounding state).
    pub fn render_deferred(
        &self,
        widget: &WidgetInstance,
        reference: &AjaxLoadRef,
        position: &str,
        ctx: &RenderContext,
        acc: &mut PageAccumulator,
    ) -> Result<RenderOutcome, RenderError> {
        let mut deferred = widget.clone();
        deferred.ajax_load = Some(reference.params.clone());
        let mut ctx = ctx.clone();
        ctx.is_hook = reference.params.is_hook;
        self.render(&deferred, position, &ctx, acc)
    }

    /// Whether this render call may use the cache at all.
    pub fn use_cache(&self, widget: &WidgetInstance, ctx: &RenderContext) -> bool {
        let renderer = self.registry.resolve(&widget.renderer);
        self.use_cache_with(renderer.config(), widget, ctx)
    }

    /// A regeneration lock is only meaningful when caching is in effect.
    pub fn require_lock(&self, widget: &WidgetInstance, ctx: &RenderContext) -> bool {
        self.use_cache(widget, ctx)
    }

    fn use_cache_with(
        &self,
        config: &RendererConfig,
        widget: &WidgetInstance,
        ctx: &RenderContext,
    ) -> bool {
        if self.config.debug || self.config.layout_editor || !self.config.cache_enabled {
            return false;
        }
        if widget.options.cache_seconds() == Some(0) {
            return false;
        }
        // deferred fragments are never independently cached; their parent
        // already is, and a separate entry would fragment incorrectly
        if widget.ajax_load.is_some() {
            return false;
        }
        if !config.use_cache {
            return false;
        }
        if ctx.viewer.is_privileged && !self.config.cache_privileged {
            return false;
        }
        if config.use_user_cache
            && !self.config.cache_all_segments
            && !ctx.viewer.segment_shareable
        {
            return false;
        }
        true
    }

    /// Compute the deterministic cache key for this widget and context.
    pub fn cache_key(
        &self,
        widget: &WidgetInstance,
        position: &str,
        ctx: &RenderContext,
        suffix: &[String],
    ) -> String {
        let renderer = self.registry.resolve(&widget.renderer);
        self.cache_key_with(renderer.config(), position, ctx, suffix)
    }

    fn cache_key_with(
        &self,
        config: &RendererConfig,
        position: &str,
        ctx: &RenderContext,
        suffix: &[String],
    ) -> String {
        let mut builder = CacheKeyBuilder::new(position);
        if config.use_user_cache {
            builder = builder.user_segment(ctx.viewer.permission_segment);
        }
        if ctx.viewer.style_id != ctx.defaults.style_id {
            builder = builder.style(ctx.viewer.style_id);
        }
        if ctx.viewer.language_id != ctx.defaults.language_id {
            builder = builder.language(ctx.viewer.language_id);
        }
        if !ctx.viewer.timezone.is_empty() && ctx.viewer.timezone != ctx.defaults.guest_timezone {
            builder = builder.timezone(&ctx.viewer.timezone);
        }
        if ctx.viewer.is_mobile {
            builder = builder.mobile();
        }
        if !suffix.is_empty() {
            builder = builder.suffix(suffix);
        }
        builder.build()
    }

    /// Freshness policy: instance TTL override, else the renderer's
    /// declared TTL; negative means forever; otherwise usable while
    /// `now - time <= ttl`.
    pub fn is_cache_usable(
        &self,
        widget: &WidgetInstance,
        entry: &CacheEntry,
        now: i64,
    ) -> bool {
        let renderer = self.registry.resolve(&widget.renderer);
        self.is_cache_usable_with(renderer.config(), widget, entry, now)
    }

    fn is_cache_usable_with(
        &self,
        config: &RendererConfig,
        widget: &WidgetInstance,
        entry: &CacheEntry,
        now: i64,
    ) -> bool {
        if !config.use_cache {
            return false;
        }
        let ttl = widget
            .options
            .cache_seconds()
            .unwrap_or(config.cache_seconds);
        if ttl < 0 {
            return true;
        }
        entry.age(now) <= ttl
    }

    /// Display title for a widget: literal, resolved phrase, or the
    /// renderer's display name when the widget has none.
    pub fn title(&self, widget: &WidgetInstance) -> String {
        match &widget.title {
            WidgetTitle::Literal(text) if !text.is_empty() => text.clone(),
            WidgetTitle::Phrase(key) if !key.is_empty() => self
                .phrases
                .as_ref()
                .and_then(|resolver| resolver.resolve(key))
                .unwrap_or_else(|| key.clone()),
            _ => self.registry.resolve(&widget.renderer).name().to_string(),
        }
    }

    /// Wrapper data the host's presentation layer attaches to the widget.
    pub fn extra_data(&self, widget: &WidgetInstance) -> Vec<(String, String)> {
        let renderer = self.registry.resolve(&widget.renderer);
        let mut extra = Vec::new();
        if let Some(link) = renderer.extra_data_link(widget) {
            extra.push(("link".to_string(), link));
        }
        extra
    }

    fn render_with(
        &self,
        renderer: &dyn WidgetRenderer,
        widget: &WidgetInstance,
        position: &str,
        ctx: &RenderContext,
        acc: &mut PageAccumulator,
    ) -> Result<RenderOutcome, RenderError> {
        // 1. conditional gate
        match self.test_conditional(widget, ctx) {
            Ok(true) => {}
            Ok(false) => {
                let html = if self.config.layout_editor {
                    CONDITIONAL_FAILED_PLACEHOLDER.to_string()
                } else {
                    String::new()
                };
                return Ok(RenderOutcome::Suppressed { html });
            }
            Err(error) => {
                warn!(
                    widget_id = widget.id,
                    error = %error,
                    "widget conditional failed to evaluate, suppressing"
                );
                let html = if self.config.diagnostics_enabled() {
                    escape_html(&error.to_string())
                } else {
                    String::new()
                };
                return Ok(RenderOutcome::Suppressed { html });
            }
        }

        // 2. mobile gate (legacy flag)
        if widget.options.deactivate_for_mobile() && ctx.viewer.is_mobile {
            return Ok(RenderOutcome::suppressed_empty());
        }

        // 3. cache lookup
        let mut cache_key = None;
        let mut lock: Option<LockGuard> = None;
        if self.use_cache_with(renderer.config(), widget, ctx) {
            let key = self.cache_key_with(renderer.config(), position, ctx, &[]);
            match self.store.get(widget.id, &key) {
                Some(entry) => {
                    if self.is_cache_usable_with(renderer.config(), widget, &entry, ctx.now) {
                        if !entry.html.is_empty() {
                            debug!(widget_id = widget.id, cache_key = %key, "fresh cache hit");
                            return Ok(self.serve_from_cache(entry, ctx, acc));
                        }
                        // a cached empty fragment carries nothing worth
                        // serving; rebuild it in place without a lock
                        cache_key = Some(key);
                    } else {
                        match LockGuard::acquire(
                            &self.store,
                            widget.id,
                            &key,
                            self.config.lock_hold(),
                        ) {
                            Some(guard) => {
                                lock = Some(guard);
                                cache_key = Some(key);
                            }
                            None => {
                                // a rebuild is underway elsewhere; the
                                // expired copy is the second-best choice
                                if entry.html.is_empty() {
                                    return Ok(RenderOutcome::suppressed_empty());
                                }
                                debug!(
                                    widget_id = widget.id,
                                    cache_key = %key,
                                    "lock contended, serving stale"
                                );
                                return Ok(self.serve_from_cache(entry, ctx, acc));
                            }
                        }
                    }
                }
                None => match LockGuard::acquire(
                    &self.store,
                    widget.id,
                    &key,
                    self.config.lock_hold(),
                ) {
                    Some(guard) => {
                        lock = Some(guard);
                        cache_key = Some(key);
                    }
                    None => {
                        // no entry and no lock: nothing usable to output
                        debug!(
                            widget_id = widget.id,
                            cache_key = %key,
                            "cold key contended, suppressing"
                        );
                        return Ok(RenderOutcome::suppressed_empty());
                    }
                },
            }
        }

        // 4. regenerate; the guard releases the lock on every exit path,
        //    including the `?` below
        let mut effects = SideEffects::default();
        let html = renderer.render_body(widget, position, ctx, &mut effects)?;
        let html = html.trim().to_string();

        if let Some(key) = cache_key {
            let entry =
                CacheEntry::new(html.clone(), ctx.now).with_extra(effects.clone().into());
            let token = lock.as_ref().and_then(LockGuard::token);
            self.store.set(widget.id, &key, entry, token);
        }

        // 5. lock release
        drop(lock);

        // 6. side-effect replay
        acc.merge(&effects);

        Ok(RenderOutcome::Regenerated { html })
    }

    fn serve_from_cache(
        &self,
        entry: CacheEntry,
        ctx: &RenderContext,
        acc: &mut PageAccumulator,
    ) -> RenderOutcome {
        let age = entry.age(ctx.now);
        acc.merge(&SideEffects::from(entry.extra));
        RenderOutcome::ServedFromCache {
            html: entry.html,
            age,
        }
    }

    fn test_conditional(
        &self,
        widget: &WidgetInstance,
        ctx: &RenderContext,
    ) -> Result<bool, ConditionalError> {
        // deferred fragments were gated when the deferring parent rendered
        if widget.ajax_load.is_some() {
            return Ok(true);
        }
        if let Some(expr) = widget.options.conditional() {
            return expr.test(&ctx.conditional_params());
        }
        if let Some(expression) = widget.options.expression() {
            if self.config.debug {
                warn!(
                    widget_id = widget.id,
                    "widget expression option is deprecated, migrate to conditional"
                );
            }
            return conditional::test_legacy(expression, &ctx.conditional_params());
        }
        Ok(true)
    }
}

/// Diagnostic messages may quote widget-supplied conditional text; escape
/// before injecting into page markup.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// suffix helper used by deferred variants that do cache under a derived key
impl RenderPipeline {
    /// Cache key for the deferred variant of a widget, distinguished from
    /// the inline key by the ajax suffix token.
    pub fn ajax_cache_key(
        &self,
        widget: &WidgetInstance,
        position: &str,
        ctx: &RenderContext,
    ) -> String {
        self.cache_key(widget, position, ctx, &[AJAX_KEY_SUFFIX.to_string()])
    }
}
