//! Domain layer types and invariants.

pub mod renderer_config;
pub mod widget;

pub use renderer_config::{
    OPTION_CACHE_SECONDS, OPTION_CONDITIONAL, OPTION_DEACTIVATE_FOR_MOBILE, OPTION_EXPRESSION,
    OptionKind, RendererConfig,
};
pub use widget::{WidgetId, WidgetInstance, WidgetOptions, WidgetTitle};
