//! Conditional gating for widgets.
//!
//! A widget may carry a boolean expression deciding whether it renders at
//! all. The expression is parsed once at save time; the raw text and the
//! parsed tree are stored together so render time never re-parses.
//!
//! The legacy free-text `expression` option is supported as data only: it
//! runs through the same sandboxed grammar, never through generated code.
//! Text the grammar cannot parse fails the gate instead of executing.

mod ast;
mod error;
mod parser;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub use ast::{CompareOp, Expr, truthy};
pub use error::ConditionalError;
pub use parser::parse;

/// A stored conditional: raw source plus its memoized parsed form.
///
/// Invariant: when `raw` is non-empty, `parsed` is present. An empty raw
/// text means "no conditional" and always passes; [`ConditionalExpression::parse`]
/// returns `None` for it so callers drop the option entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpression {
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Expr>,
}

impl ConditionalExpression {
    /// Parse a raw conditional at save time.
    ///
    /// Returns `Ok(None)` for blank input.
    pub fn parse(raw: impl Into<String>) -> Result<Option<Self>, ConditionalError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let parsed = parser::parse(trimmed)?;
        Ok(Some(Self {
            raw,
            parsed: Some(parsed),
        }))
    }

    /// Evaluate against a flat name → value context.
    ///
    /// Stored data that predates memoization may lack the parsed form; it is
    /// parsed here once rather than rejected.
    pub fn test(&self, ctx: &Map<String, Value>) -> Result<bool, ConditionalError> {
        let trimmed = self.raw.trim();
        if trimmed.is_empty() {
            return Ok(true);
        }
        match &self.parsed {
            Some(expr) => expr.test(ctx),
            None => parser::parse(trimmed)?.test(ctx),
        }
    }
}

/// Evaluate a legacy free-text expression.
///
/// The original evaluated these as generated host code; here they are fed
/// through the fixed grammar. Anything the grammar rejects is an error the
/// caller turns into suppression.
pub fn test_legacy(expression: &str, ctx: &Map<String, Value>) -> Result<bool, ConditionalError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Ok(true);
    }
    debug!(expression = trimmed, "evaluating legacy widget expression");
    parser::parse(trimmed)?.test(ctx)
}
