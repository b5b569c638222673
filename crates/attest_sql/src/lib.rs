//! SQL emitter utilities (spec §4.4).
//!
//! These are the only three primitives in the workspace allowed to compose
//! SQL text. Every other crate that needs a literal, an identifier, or an
//! interval in emitted SQL goes through here — mirroring the teacher's
//! `casparian_db::sql_guard`, which is likewise the single chokepoint for
//! anything SQL-shaped leaving that crate.

use attest_protocol::Scalar;
use thiserror::Error;

/// Errors raised while rendering SQL fragments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("identifier '{0}' is not a safe bare identifier")]
    UnsafeIdentifier(String),
    #[error("null values must be rewritten to IS NULL / IS NOT NULL before reaching the literal emitter")]
    NullLiteral,
}

/// Render a scalar as a SQL literal.
///
/// Strings are single-quoted with embedded apostrophes doubled. Numerics
/// and booleans use their canonical SQL form. Dates and timestamps render
/// as `DATE '...'` / `TIMESTAMP '...'`. `Scalar::Null` is rejected — the
/// compiler must rewrite null comparisons to `IS NULL` / `IS NOT NULL`
/// before any literal is rendered (spec §4.4).
pub fn render_literal(value: &Scalar) -> Result<String, EmitError> {
    match value {
        Scalar::Null => Err(EmitError::NullLiteral),
        Scalar::String(s) => Ok(quote_string(s)),
        Scalar::Integer(i) => Ok(i.to_string()),
        Scalar::Float(f) => Ok(render_float(*f)),
        Scalar::Boolean(b) => Ok(if *b { "TRUE".to_string() } else { "FALSE".to_string() }),
        Scalar::Date(d) => Ok(format!("DATE '{d}'")),
        Scalar::Timestamp(t) => Ok(format!("TIMESTAMP '{t}'")),
    }
}

fn render_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Render a bare identifier, rejecting anything that doesn't match
/// `[A-Za-z_][A-Za-z0-9_]*`. This is the sole defense against injection via
/// alias or column names (spec §4.4).
pub fn render_identifier(name: &str) -> Result<String, EmitError> {
    if is_safe_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(EmitError::UnsafeIdentifier(name.to_string()))
    }
}

/// Render a possibly-qualified identifier (`dataset.column`) by validating
/// and rendering each dotted segment independently.
pub fn render_qualified_identifier(raw: &str) -> Result<String, EmitError> {
    let segments: Vec<&str> = raw.split('.').collect();
    let mut rendered = Vec::with_capacity(segments.len());
    for segment in segments {
        rendered.push(render_identifier(segment)?);
    }
    Ok(rendered.join("."))
}

fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Render a signed day interval as `INTERVAL <n> DAY` (spec §4.4).
pub fn render_day_interval(offset_days: i64) -> String {
    format!("INTERVAL {offset_days} DAY")
}
