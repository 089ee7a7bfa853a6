//! SQL text generation.
//!
//! Statements are serialized depth-first. Literal values become ordered
//! placeholders, except in DDL where they are inlined.

mod ddl;
mod keywords;
mod writer;

use std::{fmt, str::FromStr};

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DbError, Result},
    expr::Expr,
    query::{Compiled, StatementRef},
};

pub(crate) use writer::Renderer;

/// Placeholder style for bound parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placeholder {
    /// `?`
    #[default]
    #[serde(rename = "?")]
    Question,
    /// `?1`, `?2`, ...
    #[serde(rename = "?NNN")]
    Numbered,
}

impl FromStr for Placeholder {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "?" => Ok(Placeholder::Question),
            "?NNN" | "?nnn" => Ok(Placeholder::Numbered),
            other => Err(DbError::Construction(format!(
                "unknown placeholder style `{other}`"
            ))),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Question => f.write_str("?"),
            Placeholder::Numbered => f.write_str("?NNN"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub placeholder: Placeholder,
}

impl RenderOptions {
    pub fn numbered() -> Self {
        Self {
            placeholder: Placeholder::Numbered,
        }
    }
}

pub(crate) fn render(statement: &StatementRef<'_>, options: &RenderOptions) -> Result<Compiled> {
    let mut renderer = Renderer::new(options, false);
    match statement {
        StatementRef::Query(query) => renderer.query(query)?,
        StatementRef::Select(select) => renderer.select(select, false)?,
        StatementRef::Compound(compound) => renderer.compound(compound, false)?,
        StatementRef::Insert(insert) => renderer.insert(insert)?,
        StatementRef::Update(update) => renderer.update(update)?,
        StatementRef::Delete(delete) => renderer.delete(delete)?,
        StatementRef::CreateTable(create) => renderer.create_table(create)?,
    }
    Ok(renderer.finish())
}

/// Renders an expression with every literal inlined, as DDL needs.
pub(crate) fn inline_expr(expr: &Expr) -> Result<String> {
    let options = RenderOptions::default();
    let mut renderer = Renderer::new(&options, true);
    renderer.expr(expr)?;
    Ok(renderer.finish().sql)
}

/// Writes `name` bare, or double-quoted when it is a keyword or contains
/// special characters.
pub fn quote_ident(name: &str) -> String {
    if needs_quoting(name) {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

fn needs_quoting(name: &str) -> bool {
    let Some(first) = name.bytes().next() else {
        return true;
    };
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return true;
    }
    name.bytes().any(|b| !(b.is_ascii_alphanumeric() || b == b'_')) || keywords::is_keyword(name)
}

/// Bracket quoting used for column names in CREATE TABLE.
pub fn bracket_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// A value as an SQL literal.
pub fn inline_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) if f.is_nan() => "NULL".to_string(),
        Value::Real(f) if f.is_infinite() => {
            if *f > 0.0 {
                "9e999".to_string()
            } else {
                "-9e999".to_string()
            }
        }
        Value::Real(f) => format!("{f:?}"),
        Value::Text(s) => quote_text(s),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Person"), "Person");
        assert_eq!(quote_ident("_age"), "_age");
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("Group"), "\"Group\"");
        assert_eq!(quote_ident("first name"), "\"first name\"");
        assert_eq!(quote_ident("1st"), "\"1st\"");
        assert_eq!(quote_ident("say\"hi"), "\"say\"\"hi\"");
    }

    #[test]
    fn test_inline_value() {
        assert_eq!(inline_value(&Value::Null), "NULL");
        assert_eq!(inline_value(&Value::Integer(-3)), "-3");
        assert_eq!(inline_value(&Value::Real(1.0)), "1.0");
        assert_eq!(inline_value(&Value::Real(0.25)), "0.25");
        assert_eq!(inline_value(&Value::Text("it's".into())), "'it''s'");
        assert_eq!(inline_value(&Value::Blob(vec![0xca, 0xfe])), "X'CAFE'");
    }

    #[test]
    fn test_placeholder_parse() {
        assert_eq!("?".parse::<Placeholder>().unwrap(), Placeholder::Question);
        assert_eq!("?NNN".parse::<Placeholder>().unwrap(), Placeholder::Numbered);
        assert!("$1".parse::<Placeholder>().is_err());
    }
}
