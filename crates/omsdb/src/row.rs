//! Dialect-neutral result rows and row mapping traits

use crate::error::{OmsError, OmsResult};
use crate::value::Value;

/// One result row, column names in select order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value by column name (first match).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value by 0-based index.
    pub fn get_idx(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Typed column access.
    pub fn try_get_column<T: FromValue>(&self, column: &str) -> OmsResult<T> {
        let value = self.get(column).ok_or_else(|| {
            OmsError::Serialization(format!("column '{column}' not in result row"))
        })?;
        T::from_value(value).ok_or_else(|| {
            OmsError::Serialization(format!(
                "column '{column}': cannot decode {} value",
                value.kind()
            ))
        })
    }
}

/// Outcome of executing a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Affected row count for statements without a result set.
    pub affected: u64,
}

impl QueryResult {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Map all rows into `T`.
    pub fn fetch_all<T: FromRow>(&self) -> OmsResult<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }

    /// Map the first row into `T`, if any.
    pub fn fetch_opt<T: FromRow>(&self) -> OmsResult<Option<T>> {
        self.rows.first().map(T::from_row).transpose()
    }
}

/// Trait for converting a result row into a Rust struct.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> OmsResult<Self>;
}

/// Conversion from a single column value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => s.parse().ok(),
            other => other.as_f64(),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Json(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account {
        id: i64,
        login: String,
        email: Option<String>,
    }

    impl FromRow for Account {
        fn from_row(row: &Row) -> OmsResult<Self> {
            Ok(Self {
                id: row.try_get_column("id")?,
                login: row.try_get_column("login")?,
                email: row.try_get_column("email")?,
            })
        }
    }

    fn sample() -> Row {
        Row::new(
            vec!["id".into(), "login".into(), "email".into()],
            vec![Value::Int(7), Value::from("admin"), Value::Null],
        )
    }

    #[test]
    fn maps_row_into_struct() {
        let result = QueryResult {
            rows: vec![sample()],
            affected: 0,
        };
        let account: Account = result.fetch_opt().unwrap().unwrap();
        assert_eq!(account.id, 7);
        assert_eq!(account.login, "admin");
        assert_eq!(account.email, None);
    }

    #[test]
    fn missing_column_is_an_error() {
        assert!(sample().try_get_column::<i64>("nope").is_err());
        assert!(sample().try_get_column::<i64>("login").is_err());
    }
}
