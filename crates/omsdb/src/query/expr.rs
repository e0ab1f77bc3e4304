//! Clause fragments stored by the query builder.
//!
//! Builders never render SQL themselves: they only collect these fragments and the
//! grammar decides how each one is quoted, prefixed and parameterised.

use crate::error::{OmsError, OmsResult};
use crate::query::Builder;
use crate::value::Value;
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;

/// Comparison operators accepted by `where` and `on`, lower-case.
pub const OPERATORS: &[&str] = &[
    "=",
    "<",
    ">",
    "<=",
    ">=",
    "<>",
    "!=",
    "like",
    "like binary",
    "not like",
    "between",
    "ilike",
    "&",
    "|",
    "^",
    "<<",
    ">>",
    "rlike",
    "regexp",
    "not regexp",
    "~",
    "~*",
    "!~",
    "!~*",
    "similar to",
    "not similar to",
    "in",
];

/// A column, table or select expression.
#[derive(Clone)]
pub enum Expression {
    /// Identifier, quoted and prefixed by the grammar.
    Column(String),
    /// SQL fragment emitted verbatim.
    Raw(String),
    /// Parenthesised sub-query.
    Query(Box<Builder>),
    /// Identifier produced at compile time.
    Deferred(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(name.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expression::Raw(sql.into())
    }

    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Expression::Deferred(Arc::new(f))
    }

    /// Name used to group where conditions by column.
    pub fn public_name(&self) -> String {
        match self {
            Expression::Column(name) | Expression::Raw(name) => name.clone(),
            Expression::Deferred(f) => f(),
            Expression::Query(query) => query.to_sql().unwrap_or_default(),
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column(name) => f.debug_tuple("Column").field(name).finish(),
            Expression::Raw(sql) => f.debug_tuple("Raw").field(sql).finish(),
            Expression::Query(query) => f.debug_tuple("Query").field(query).finish(),
            Expression::Deferred(_) => f.debug_tuple("Deferred").field(&"<fn>").finish(),
        }
    }
}

impl From<&str> for Expression {
    fn from(name: &str) -> Self {
        Expression::Column(name.to_string())
    }
}

impl From<String> for Expression {
    fn from(name: String) -> Self {
        Expression::Column(name)
    }
}

impl From<&String> for Expression {
    fn from(name: &String) -> Self {
        Expression::Column(name.clone())
    }
}

impl From<Builder> for Expression {
    fn from(query: Builder) -> Self {
        Expression::Query(Box::new(query))
    }
}

/// Right-hand side of a where condition.
#[derive(Clone, Debug)]
pub enum WhereValue {
    /// Single bound value (`NULL` turns `=`/`!=` into `IS [NOT] NULL`).
    Value(Value),
    /// Bound list, used by `in` and `between`.
    List(Vec<Value>),
    /// Another column.
    Column(String),
    /// Sub-query.
    Query(Box<Builder>),
}

impl WhereValue {
    pub fn column(name: impl Into<String>) -> Self {
        WhereValue::Column(name.into())
    }

    pub fn list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        WhereValue::List(values.into_iter().map(Into::into).collect())
    }

    pub fn null() -> Self {
        WhereValue::Value(Value::Null)
    }
}

macro_rules! impl_where_value_from {
    ($($t:ty),*) => {
        $(impl From<$t> for WhereValue {
            fn from(v: $t) -> Self {
                WhereValue::Value(Value::from(v))
            }
        })*
    };
}

impl_where_value_from!(
    i8, i16, i32, i64, u8, u16, u32, f32, f64, bool, &str, String, NaiveDateTime, serde_json::Value
);

impl From<Value> for WhereValue {
    fn from(v: Value) -> Self {
        WhereValue::Value(v)
    }
}

impl From<Vec<Value>> for WhereValue {
    fn from(values: Vec<Value>) -> Self {
        WhereValue::List(values)
    }
}

macro_rules! impl_where_list_from {
    ($($t:ty),*) => {
        $(impl From<Vec<$t>> for WhereValue {
            fn from(values: Vec<$t>) -> Self {
                WhereValue::list(values)
            }
        })*
    };
}

impl_where_list_from!(i32, i64, u32, f64, &str, String);

impl From<Builder> for WhereValue {
    fn from(query: Builder) -> Self {
        WhereValue::Query(Box::new(query))
    }
}

/// An operator from [`OPERATORS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operator(&'static str);

impl Operator {
    /// Look up an operator case-insensitively.
    pub fn parse(op: &str) -> OmsResult<Self> {
        let lower = op.trim().to_lowercase();
        OPERATORS
            .iter()
            .find(|known| **known == lower)
            .map(|known| Operator(known))
            .ok_or_else(|| OmsError::InvalidOperator(op.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Upper-cased form used in SQL.
    pub fn to_sql(&self) -> String {
        self.0.to_uppercase()
    }

    pub fn is_in(&self) -> bool {
        self.0 == "in"
    }

    pub fn is_between(&self) -> bool {
        self.0 == "between"
    }

    pub fn is_equality(&self) -> bool {
        self.0 == "="
    }

    pub fn is_inequality(&self) -> bool {
        self.0 == "!=" || self.0 == "<>"
    }
}

/// Connector placed before a condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

impl Boolean {
    pub fn parse(boolean: &str) -> OmsResult<Self> {
        match boolean.trim().to_lowercase().as_str() {
            "and" => Ok(Boolean::And),
            "or" => Ok(Boolean::Or),
            other => Err(OmsError::invalid_argument(format!(
                "unknown boolean connector '{other}'"
            ))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Boolean::And => "AND",
            Boolean::Or => "OR",
        }
    }
}

/// One stored where condition.
#[derive(Clone, Debug)]
pub struct WhereCondition {
    pub column: Expression,
    pub operator: Operator,
    pub value: WhereValue,
    pub boolean: Boolean,
}

impl WhereCondition {
    pub(crate) fn new(
        column: Expression,
        operator: &str,
        value: WhereValue,
        boolean: &str,
    ) -> OmsResult<Self> {
        let operator = Operator::parse(operator)?;
        let boolean = Boolean::parse(boolean)?;

        if operator.is_between() {
            match &value {
                WhereValue::List(values) if values.len() == 2 => {}
                _ => {
                    return Err(OmsError::invalid_argument(
                        "between requires exactly two values",
                    ));
                }
            }
        }
        if operator.is_in() && !matches!(value, WhereValue::List(_) | WhereValue::Query(_)) {
            return Err(OmsError::invalid_argument(
                "in requires a value list or a sub-query",
            ));
        }

        Ok(Self {
            column,
            operator,
            value,
            boolean,
        })
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn parse(order: &str) -> OmsResult<Self> {
        match order.trim().to_uppercase().as_str() {
            "ASC" => Ok(OrderDirection::Asc),
            "DESC" => Ok(OrderDirection::Desc),
            other => Err(OmsError::invalid_argument(format!(
                "unknown order direction '{other}'"
            ))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

/// `ON left op right` part of a join.
#[derive(Clone, Debug)]
pub struct JoinOn {
    pub left: Expression,
    pub operator: Operator,
    pub right: Expression,
    pub boolean: Boolean,
}

#[derive(Clone, Debug)]
pub struct Join {
    pub kind: JoinType,
    pub table: Expression,
    pub on: Vec<JoinOn>,
}
