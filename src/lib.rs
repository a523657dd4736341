//! mosaico — widget-tree fragment rendering with cached, lock-protected
//! regeneration.
//!
//! The crate renders configured widget instances into HTML fragments. Every
//! render call runs the same pipeline: a sandboxed conditional gate, a
//! mobile gate, a context-derived cache lookup, regeneration under an
//! advisory lock with a bound hold time, and explicit replay of the render's
//! side effects into the caller's page accumulator. Groups compose their
//! children through the same pipeline under rows, columns, random or tabs
//! layouts; tabs may defer children behind opaque ajax references.
//!
//! The host supplies the renderer implementations ([`WidgetRenderer`]), the
//! fragment store ([`cache::CacheStore`]) and the per-request context
//! ([`RenderContext`]); the crate owns everything between.

pub mod ajax;
pub mod cache;
pub mod conditional;
pub mod config;
pub mod domain;
pub mod group;
pub mod render;

pub use ajax::{AjaxLoadParams, AjaxLoadRef, AjaxRefError};
pub use cache::{CacheEntry, CacheKeyBuilder, CacheStore, MemoryCacheStore};
pub use conditional::{ConditionalError, ConditionalExpression};
pub use config::RuntimeConfig;
pub use domain::{RendererConfig, WidgetId, WidgetInstance, WidgetOptions, WidgetTitle};
pub use render::{
    PageAccumulator, RenderContext, RenderError, RenderOutcome, RenderPipeline, RendererRegistry,
    SideEffects, SiteDefaults, ViewerContext, WidgetRenderer,
};
