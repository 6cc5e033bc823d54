use serde::{Deserialize, Serialize};

/// Dynamic value carried on node ports and config fields.
///
/// Each variant maps to one semantic port type. Media variants hold a URL or
/// data URI; the engine never dereferences them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Text(String),
    Image(String),
    Video(String),
    Images(Vec<String>),
    Json(serde_json::Value),
    Array(Vec<Value>),
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Image(s) | Value::Video(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Semantic type of this value; `None` for `Null`
    pub fn port_type(&self) -> Option<PortType> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(PortType::Text),
            Value::Image(_) => Some(PortType::Image),
            Value::Video(_) => Some(PortType::Video),
            Value::Images(_) => Some(PortType::Images),
            Value::Json(_) => Some(PortType::Json),
            Value::Array(_) => Some(PortType::Array),
            Value::Number(_) => Some(PortType::Number),
            Value::Boolean(_) => Some(PortType::Boolean),
        }
    }

    /// Lossy conversion used when handing values to JSON-speaking collaborators
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) | Value::Image(s) | Value::Video(s) => {
                serde_json::Value::String(s.clone())
            }
            Value::Images(urls) => serde_json::Value::from(urls.clone()),
            Value::Json(j) => j.clone(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }

    /// Map plain JSON onto the closest semantic variant
    pub fn from_plain_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_plain_json).collect())
            }
            obj @ serde_json::Value::Object(_) => Value::Json(obj),
        }
    }
}

/// Semantic port types, checked by the editor when wiring ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Text,
    Image,
    Video,
    Images,
    Json,
    Array,
    Number,
    Boolean,
    Any,
}

impl PortType {
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value.port_type()) {
            (PortType::Any, _) | (_, None) => true,
            (expected, Some(actual)) => *expected == actual,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}
