//! The one place where values become SQL text.
//!
//! Every literal the writer emits goes through [`encode`]. Identifiers never
//! do: they come from a validated [`crate::layout::BlockLayout`] and are
//! quoted with [`Dialect::quote_ident`].

use crate::{backend::Dialect, value::Value};

/// Render `value` as a SQL literal for `dialect`.
///
/// Non-finite floats have no SQL literal and are written as `NULL`, which
/// reads back as the column default.
pub fn encode(value: &Value, dialect: &Dialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) if v.is_finite() => format!("{v:?}"),
        Value::Float(_) => "NULL".to_string(),
        Value::Text(s) => encode_text(s, dialect),
    }
}

/// Render a string literal for `dialect`.
pub fn encode_text(s: &str, dialect: &Dialect) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            // MySQL treats backslash as an escape inside string literals.
            '\\' if *dialect == Dialect::MySql => out.push_str("\\\\"),
            '\0' => {}
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
