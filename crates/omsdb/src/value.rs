//! Bindable values and parameter lists.

use crate::error::{OmsError, OmsResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A literal value that is bound to a placeholder at execution time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Rendered with the grammar's datetime format.
    DateTime(NaiveDateTime),
    /// Serialized to a JSON string.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Json(_) => "json",
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Native parameter type a value is bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Str,
}

impl ParamType {
    /// Infer the bind type from a value's scalar kind.
    ///
    /// Integers bind as `Int`, strings and floats as `Str`. Everything else is rejected.
    pub fn of(value: &Value) -> OmsResult<Self> {
        match value {
            Value::Int(_) => Ok(ParamType::Int),
            Value::Str(_) | Value::Float(_) => Ok(ParamType::Str),
            other => Err(OmsError::BindType(other.kind().to_string())),
        }
    }
}

/// Parameters collected while compiling a query: positional ones in
/// placeholder order, plus named ones from raw statements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList {
    params: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter and return its 1-based index.
    pub fn push(&mut self, value: Value) -> usize {
        self.params.push(value);
        self.params.len()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.params
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.params
    }

    /// Add a named parameter; the first value bound to a name wins.
    pub fn push_named(&mut self, name: &str, value: Value) {
        if !self.named.iter().any(|(n, _)| n == name) {
            self.named.push((name.to_string(), value));
        }
    }

    pub fn named(&self) -> &[(String, Value)] {
        &self.named
    }

    /// Split into positional and named parameters.
    pub fn into_parts(self) -> (Vec<Value>, Vec<(String, Value)>) {
        (self.params, self.named)
    }
}

/// One explicitly bound value.
#[derive(Clone, Debug, PartialEq)]
pub enum Bind {
    Positional(Value),
    Named(String, Value),
}
