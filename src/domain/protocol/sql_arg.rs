//! Bind parameters for fall-through SQL statements.

use std::borrow::Cow;

use serde_json::Value;

/// A positional statement argument taken from an inbound message.
///
/// Arguments are sent to the server as text so PostgreSQL infers and
/// casts the parameter types itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Arrays, objects and integers outside the `i64` range, bound as
    /// their JSON text.
    Json(Value),
}

impl SqlArg {
    /// Text representation sent to the server; `None` for SQL `NULL`.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            SqlArg::Null => None,
            SqlArg::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            SqlArg::Int(n) => Some(Cow::Owned(n.to_string())),
            SqlArg::Float(f) => Some(Cow::Owned(f.to_string())),
            SqlArg::Text(s) => Some(Cow::Borrowed(s)),
            SqlArg::Json(v) => Some(Cow::Owned(v.to_string())),
        }
    }

    /// Converts a whole argument list.
    pub fn from_values(values: &[Value]) -> Vec<SqlArg> {
        values.iter().map(SqlArg::from).collect()
    }
}

impl From<&Value> for SqlArg {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlArg::Null,
            Value::Bool(b) => SqlArg::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlArg::Int(i)
                } else if n.is_f64() {
                    n.as_f64().map(SqlArg::Float).unwrap_or_else(|| SqlArg::Json(value.clone()))
                } else {
                    SqlArg::Json(value.clone())
                }
            }
            Value::String(s) => SqlArg::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlArg::Json(value.clone()),
        }
    }
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        SqlArg::Text(value.to_string())
    }
}
