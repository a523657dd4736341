//! Expression tree for widget conditionals.
//!
//! The parsed form is stored next to the raw text at save time, so render
//! time only walks the tree. The tree serializes with `serde` so stored
//! widgets round-trip without re-parsing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ConditionalError;

/// Comparison operators supported by the conditional grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A parsed conditional expression.
///
/// Variables resolve against a flat name → value context supplied by the
/// host; an unknown name evaluates to `null` rather than failing, so a
/// conditional written against an optional ambient parameter degrades to
/// "false" instead of breaking the widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    Var(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate the expression against a context of named values.
    pub fn eval(&self, ctx: &Map<String, Value>) -> Result<Value, ConditionalError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => Ok(ctx.get(name).cloned().unwrap_or(Value::Null)),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(ctx)?))),
            Expr::And(lhs, rhs) => {
                if !truthy(&lhs.eval(ctx)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&rhs.eval(ctx)?)))
            }
            Expr::Or(lhs, rhs) => {
                if truthy(&lhs.eval(ctx)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&rhs.eval(ctx)?)))
            }
            Expr::Compare { op, lhs, rhs } => {
                let lhs = lhs.eval(ctx)?;
                let rhs = rhs.eval(ctx)?;
                compare(*op, &lhs, &rhs).map(Value::Bool)
            }
        }
    }

    /// Evaluate and coerce the result to a boolean.
    pub fn test(&self, ctx: &Map<String, Value>) -> Result<bool, ConditionalError> {
        Ok(truthy(&self.eval(ctx)?))
    }
}

/// Boolean coercion for context values.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, ConditionalError> {
    match op {
        CompareOp::Eq => Ok(loose_eq(lhs, rhs)),
        CompareOp::Ne => Ok(!loose_eq(lhs, rhs)),
        CompareOp::Lt => Ok(ordering(lhs, rhs)? == Ordering::Less),
        CompareOp::Le => Ok(ordering(lhs, rhs)? != Ordering::Greater),
        CompareOp::Gt => Ok(ordering(lhs, rhs)? == Ordering::Greater),
        CompareOp::Ge => Ok(ordering(lhs, rhs)? != Ordering::Less),
    }
}

/// Equality with numeric coercion: `1 == 1.0` holds, everything else uses
/// structural equality.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    if let (Value::Number(a), Value::Number(b)) = (lhs, rhs) {
        if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
            return a == b;
        }
    }
    lhs == rhs
}

fn ordering(lhs: &Value, rhs: &Value) -> Result<Ordering, ConditionalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(ConditionalError::eval("number out of comparable range")),
            };
            a.partial_cmp(&b)
                .ok_or_else(|| ConditionalError::eval("numbers are not comparable"))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ConditionalError::eval(format!(
            "cannot order {} against {}",
            kind_name(lhs),
            kind_name(rhs)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
