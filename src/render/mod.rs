//! Rendering: the pipeline, renderer contract, registry and ambient context.

pub mod context;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod renderer;

pub use context::{
    PARAM_IS_MOBILE, PARAM_PARENT_GROUP_ID, PARAM_PERMISSION_SEGMENT, PageAccumulator,
    RenderContext, SideEffects, SiteDefaults, ViewerContext, now_utc,
};
pub use error::RenderError;
pub use outcome::RenderOutcome;
pub use pipeline::{CONDITIONAL_FAILED_PLACEHOLDER, PhraseResolver, RenderPipeline};
pub use registry::RendererRegistry;
pub use renderer::{NoopRenderer, WidgetRenderer};
