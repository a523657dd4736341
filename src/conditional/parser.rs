//! Lexer and recursive-descent parser for the conditional grammar.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and ( ("||" | "or") and )*
//! and     := cmp ( ("&&" | "and") cmp )*
//! cmp     := unary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") unary )?
//! unary   := ("!" | "not") unary | primary
//! primary := ident | number | string | "true" | "false" | "null" | "(" or ")"
//! ```
//!
//! Identifiers may contain dots (`forum.node_id`) so hosts can expose nested
//! ambient values under flattened names.

use serde_json::Value;

use super::ast::{CompareOp, Expr};
use super::error::ConditionalError;

pub fn parse(input: &str) -> Result<Expr, ConditionalError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, cursor: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ConditionalError::parse(
            token.position,
            format!("unexpected trailing `{}`", token.kind.describe()),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    Not,
    And,
    Or,
    Compare(CompareOp),
    LParen,
    RParen,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::True => "true".to_string(),
            TokenKind::False => "false".to_string(),
            TokenKind::Null => "null".to_string(),
            TokenKind::Not => "!".to_string(),
            TokenKind::And => "&&".to_string(),
            TokenKind::Or => "||".to_string(),
            TokenKind::Compare(op) => match op {
                CompareOp::Eq => "==",
                CompareOp::Ne => "!=",
                CompareOp::Lt => "<",
                CompareOp::Le => "<=",
                CompareOp::Gt => ">",
                CompareOp::Ge => ">=",
            }
            .to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn lex(input: &str) -> Result<Vec<Token>, ConditionalError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    position: i,
                });
                i += 1;
            }
            b')' => {
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    position: i,
                });
                i += 1;
            }
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token {
                        kind: TokenKind::And,
                        position: i,
                    });
                    i += 2;
                } else {
                    return Err(ConditionalError::parse(i, "expected `&&`"));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token {
                        kind: TokenKind::Or,
                        position: i,
                    });
                    i += 2;
                } else {
                    return Err(ConditionalError::parse(i, "expected `||`"));
                }
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::Compare(CompareOp::Eq),
                        position: i,
                    });
                    i += 2;
                } else {
                    return Err(ConditionalError::parse(i, "expected `==`, assignment is not supported"));
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::Compare(CompareOp::Ne),
                        position: i,
                    });
                    i += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Not,
                        position: i,
                    });
                    i += 1;
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::Compare(CompareOp::Le),
                        position: i,
                    });
                    i += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Compare(CompareOp::Lt),
                        position: i,
                    });
                    i += 1;
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::Compare(CompareOp::Ge),
                        position: i,
                    });
                    i += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Compare(CompareOp::Gt),
                        position: i,
                    });
                    i += 1;
                }
            }
            b'\'' | b'"' => {
                let quote = b;
                let start = i;
                i += 1;
                let mut value = String::new();
                loop {
                    match bytes.get(i) {
                        None => {
                            return Err(ConditionalError::parse(start, "unterminated string"));
                        }
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(&b'\\') => match bytes.get(i + 1) {
                            Some(&escaped) if matches!(escaped, b'\\' | b'\'' | b'"') => {
                                value.push(escaped as char);
                                i += 2;
                            }
                            _ => {
                                return Err(ConditionalError::parse(i, "invalid escape"));
                            }
                        },
                        Some(_) => {
                            // consume one full UTF-8 character
                            let rest = &input[i..];
                            let ch = rest.chars().next().unwrap_or('\u{fffd}');
                            value.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    position: start,
                });
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &input[start..i];
                let number: f64 = text
                    .parse()
                    .map_err(|_| ConditionalError::parse(start, format!("invalid number `{text}`")))?;
                tokens.push(Token {
                    kind: TokenKind::Number(number),
                    position: start,
                });
            }
            _ if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {
                let start = i;
                // `$` prefix tolerated for conditionals migrated from the
                // legacy expression syntax
                if b == b'$' {
                    i += 1;
                }
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                let word = input[start..i].trim_start_matches('$');
                if word.is_empty() {
                    return Err(ConditionalError::parse(start, "dangling `$`"));
                }
                let kind = match word {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    _ => TokenKind::Ident(word.to_string()),
                };
                tokens.push(Token {
                    kind,
                    position: start,
                });
            }
            _ => {
                return Err(ConditionalError::parse(
                    i,
                    format!("unexpected character `{}`", input[i..].chars().next().unwrap_or('?')),
                ));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.cursor += 1;
            return true;
        }
        false
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionalError> {
        let mut expr = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionalError> {
        let mut expr = self.parse_cmp()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_cmp()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_cmp(&mut self) -> Result<Expr, ConditionalError> {
        let lhs = self.parse_unary()?;
        if let Some(Token {
            kind: TokenKind::Compare(op),
            ..
        }) = self.peek().cloned()
        {
            self.cursor += 1;
            let rhs = self.parse_unary()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionalError> {
        if self.eat(&TokenKind::Not) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionalError> {
        let Some(token) = self.bump() else {
            return Err(ConditionalError::parse(0, "unexpected end of expression"));
        };
        match token.kind {
            TokenKind::Ident(name) => Ok(Expr::Var(name)),
            TokenKind::Number(n) => {
                // keep integers as integers so equality against typed
                // context values behaves predictably
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Ok(Expr::Literal(Value::from(n as i64)))
                } else {
                    Ok(Expr::Literal(Value::from(n)))
                }
            }
            TokenKind::Str(s) => Ok(Expr::Literal(Value::from(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::LParen => {
                let expr = self.parse_or()?;
                if !self.eat(&TokenKind::RParen) {
                    return Err(ConditionalError::parse(token.position, "unclosed `(`"));
                }
                Ok(expr)
            }
            other => Err(ConditionalError::parse(
                token.position,
                format!("unexpected `{}`", other.describe()),
            )),
        }
    }
}
