//! SQL grammars.
//!
//! [`Grammar`] carries the whole compilation skeleton as default methods. Dialects
//! override only the pieces that differ (quote character, placeholders, limit
//! syntax, random ordering, row locks).
//!
//! Identifier rules shared by every dialect:
//!
//! - dotted names quote each part, `*` stays bare (`t.*` → `"t".*`);
//! - a trailing `AS alias` is split off and both sides are rendered;
//! - anything else containing `(` or whitespace is emitted verbatim;
//! - the quote character inside a name is doubled;
//! - table names and the table qualifier of dotted columns get the connection prefix.

mod microsoft;
mod mysql;
mod postgres;
mod sqlite;

pub use microsoft::MicrosoftGrammar;
pub use mysql::MysqlGrammar;
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;

use crate::error::{OmsError, OmsResult};
use crate::query::compiled::CompiledQuery;
use crate::query::expr::{Expression, Join, WhereCondition, WhereValue};
use crate::query::{Builder, QueryType};
use crate::value::{Bind, ParamList, Value};
use std::fmt::Debug;

/// Default format for datetime binds.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Dialect compiler for [`Builder`] state.
///
/// Implementations must be pure: compiling the same builder twice yields the
/// same SQL and binds.
pub trait Grammar: Debug + Send + Sync {
    /// Identifier quote character.
    fn system_identifier(&self) -> char {
        '"'
    }

    /// `chrono` format used for datetime binds.
    fn datetime_format(&self) -> &str {
        DEFAULT_DATETIME_FORMAT
    }

    /// Placeholder for the 1-based parameter `idx`.
    fn placeholder(&self, _idx: usize) -> String {
        "?".to_string()
    }

    /// Expression used by `random` to shuffle rows.
    fn random_order(&self) -> &'static str {
        "RANDOM()"
    }

    /// Row lock appended by `lock_update`; empty when unsupported.
    fn lock_clause(&self) -> &'static str {
        "FOR UPDATE"
    }

    // ==================== Entry point ====================

    /// Compile a builder into SQL plus ordered binds.
    fn compile_query(&self, query: &Builder) -> OmsResult<CompiledQuery> {
        let mut params = ParamList::new();
        let sql = self.compile_statement(query, &mut params)?;
        let (params, named) = params.into_parts();
        Ok(CompiledQuery { sql, params, named })
    }

    /// Compile one statement, appending its binds to `params`.
    ///
    /// Explicit binds of the statement follow the values of its own clauses, so
    /// nested sub-queries and unions carry theirs into the outer list.
    fn compile_statement(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let sql = match query.query_type {
            QueryType::Select => self.compile_select(query, params),
            QueryType::Random => self.compile_random(query, params),
            QueryType::Insert => self.compile_insert(query, params),
            QueryType::Update => self.compile_update(query, params),
            QueryType::Delete => self.compile_delete(query, params),
            QueryType::Raw => self.compile_raw(query),
            QueryType::Undefined => Err(OmsError::compile(
                "query type is undefined; call select, insert, update, delete, random or raw first",
            )),
        }?;

        for bind in query.binds() {
            match bind {
                Bind::Positional(value) => {
                    params.push(self.bind_value(value));
                }
                Bind::Named(name, value) => params.push_named(name, self.bind_value(value)),
            }
        }
        Ok(sql)
    }

    // ==================== Statements ====================

    fn compile_select(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let mut parts = vec![self.compile_selects(query, params)?];
        push_non_empty(&mut parts, self.compile_from(query, params)?);
        push_non_empty(&mut parts, self.compile_joins(query, params)?);
        push_non_empty(&mut parts, self.compile_wheres(query, params)?);
        push_non_empty(&mut parts, self.compile_groups(query, params)?);
        let orders = self.compile_orders(query, params)?;
        let has_order = !orders.is_empty();
        push_non_empty(&mut parts, orders);
        push_non_empty(&mut parts, self.compile_limit(query.limit, query.offset, has_order));
        push_non_empty(&mut parts, self.compile_unions(query, params)?);
        if query.lock {
            push_non_empty(&mut parts, self.lock_clause().to_string());
        }
        Ok(parts.join(" "))
    }

    /// `SELECT cols FROM t ... ORDER BY <random>`, limited when a limit is set.
    fn compile_random(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let mut parts = vec![self.compile_selects(query, params)?];
        push_non_empty(&mut parts, self.compile_from(query, params)?);
        push_non_empty(&mut parts, self.compile_joins(query, params)?);
        push_non_empty(&mut parts, self.compile_wheres(query, params)?);
        parts.push(format!("ORDER BY {}", self.random_order()));
        push_non_empty(&mut parts, self.compile_limit(query.limit, None, true));
        Ok(parts.join(" "))
    }

    fn compile_insert(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let table = query
            .into
            .as_ref()
            .ok_or_else(|| OmsError::compile("insert without a target table"))?;
        if query.values.is_empty() {
            return Err(OmsError::compile("insert without values"));
        }

        let mut sql = format!(
            "INSERT INTO {}",
            self.compile_expression(table, query.prefix(), true, params)?
        );
        if !query.inserts.is_empty() {
            let columns = self.compile_list(&query.inserts, query.prefix(), false, params)?;
            sql.push_str(&format!(" ({columns})"));
        }

        let rows = query
            .values
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(|v| self.compile_value(v, params)).collect();
                format!("({})", values.join(", "))
            })
            .collect::<Vec<_>>();
        sql.push_str(" VALUES ");
        sql.push_str(&rows.join(", "));
        Ok(sql)
    }

    fn compile_update(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        if query.updates.is_empty() {
            return Err(OmsError::compile("update without a table"));
        }
        if query.sets.is_empty() {
            return Err(OmsError::compile("update without set() values"));
        }

        let tables = self.compile_list(&query.updates, query.prefix(), true, params)?;
        let mut assignments = Vec::with_capacity(query.sets.len());
        for (column, value) in &query.sets {
            let column = self.compile_expression(column, query.prefix(), false, params)?;
            assignments.push(format!("{column} = {}", self.compile_value(value, params)));
        }

        let mut parts = vec![format!("UPDATE {tables} SET {}", assignments.join(", "))];
        push_non_empty(&mut parts, self.compile_wheres(query, params)?);
        Ok(parts.join(" "))
    }

    fn compile_delete(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        if query.from.is_empty() {
            return Err(OmsError::compile("delete without from() table"));
        }
        let mut parts = vec![format!(
            "DELETE FROM {}",
            self.compile_list(&query.from, query.prefix(), true, params)?
        )];
        push_non_empty(&mut parts, self.compile_wheres(query, params)?);
        Ok(parts.join(" "))
    }

    fn compile_raw(&self, query: &Builder) -> OmsResult<String> {
        query
            .raw
            .clone()
            .ok_or_else(|| OmsError::compile("raw query without statement"))
    }

    // ==================== Clauses ====================

    fn compile_selects(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let keyword = if query.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        };
        if query.selects.is_empty() {
            return Ok(format!("{keyword} *"));
        }
        let columns = self.compile_list(&query.selects, query.prefix(), false, params)?;
        Ok(format!("{keyword} {columns}"))
    }

    fn compile_from(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        if query.from.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "FROM {}",
            self.compile_list(&query.from, query.prefix(), true, params)?
        ))
    }

    fn compile_joins(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let mut joins = Vec::with_capacity(query.joins.len());
        for join in &query.joins {
            joins.push(self.compile_join(join, query.prefix(), params)?);
        }
        Ok(joins.join(" "))
    }

    fn compile_join(&self, join: &Join, prefix: &str, params: &mut ParamList) -> OmsResult<String> {
        let mut sql = format!(
            "{} {}",
            join.kind.as_sql(),
            self.compile_expression(&join.table, prefix, true, params)?
        );
        for (i, on) in join.on.iter().enumerate() {
            let keyword = if i == 0 { "ON" } else { on.boolean.as_sql() };
            sql.push_str(&format!(
                " {keyword} {} {} {}",
                self.compile_expression(&on.left, prefix, false, params)?,
                on.operator.to_sql(),
                self.compile_expression(&on.right, prefix, false, params)?
            ));
        }
        Ok(sql)
    }

    /// `WHERE ...`; the connector of the very first condition is dropped.
    fn compile_wheres(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let mut sql = String::new();
        for condition in query.wheres.iter().flat_map(|(_, conditions)| conditions) {
            let element = self.compile_where_element(condition, query.prefix(), params)?;
            if sql.is_empty() {
                sql.push_str("WHERE ");
            } else {
                sql.push(' ');
                sql.push_str(condition.boolean.as_sql());
                sql.push(' ');
            }
            sql.push_str(&element);
        }
        Ok(sql)
    }

    fn compile_where_element(
        &self,
        condition: &WhereCondition,
        prefix: &str,
        params: &mut ParamList,
    ) -> OmsResult<String> {
        let column = self.compile_expression(&condition.column, prefix, false, params)?;
        let operator = &condition.operator;

        let rhs = match &condition.value {
            WhereValue::Value(Value::Null) if operator.is_equality() => {
                return Ok(format!("{column} IS NULL"));
            }
            WhereValue::Value(Value::Null) if operator.is_inequality() => {
                return Ok(format!("{column} IS NOT NULL"));
            }
            WhereValue::Value(value) => self.compile_value(value, params),
            WhereValue::List(values) if operator.is_between() => {
                let low = values.first().map(|v| self.compile_value(v, params));
                let high = values.get(1).map(|v| self.compile_value(v, params));
                match (low, high) {
                    (Some(low), Some(high)) => format!("{low} AND {high}"),
                    _ => return Err(OmsError::compile("between requires exactly two values")),
                }
            }
            WhereValue::List(values) if values.is_empty() && operator.is_in() => {
                return Ok("1 = 0".to_string());
            }
            WhereValue::List(values) => {
                let values: Vec<String> = values.iter().map(|v| self.compile_value(v, params)).collect();
                format!("({})", values.join(", "))
            }
            WhereValue::Column(name) => self.compile_system(name, prefix),
            WhereValue::Query(sub) => format!("({})", self.compile_statement(sub, params)?),
        };

        Ok(format!("{column} {} {rhs}", operator.to_sql()))
    }

    fn compile_groups(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        if query.groups.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "GROUP BY {}",
            self.compile_list(&query.groups, query.prefix(), false, params)?
        ))
    }

    /// `ORDER BY a, b DESC, c ASC`: one direction suffix per direction group.
    fn compile_orders(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        if query.orders.is_empty() {
            return Ok(String::new());
        }
        let mut groups = Vec::with_capacity(query.orders.len());
        for (direction, columns) in &query.orders {
            let columns = self.compile_list(columns, query.prefix(), false, params)?;
            groups.push(format!("{columns} {}", direction.as_sql()));
        }
        Ok(format!("ORDER BY {}", groups.join(", ")))
    }

    fn compile_limit(&self, limit: Option<u64>, offset: Option<u64>, _has_order: bool) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (None, Some(offset)) => format!("OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    fn compile_unions(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let mut unions = Vec::with_capacity(query.unions.len());
        for union in &query.unions {
            unions.push(format!("UNION {}", self.compile_statement(union, params)?));
        }
        Ok(unions.join(" "))
    }

    // ==================== Expressions & values ====================

    fn compile_list(
        &self,
        expressions: &[Expression],
        prefix: &str,
        is_table: bool,
        params: &mut ParamList,
    ) -> OmsResult<String> {
        let mut compiled = Vec::with_capacity(expressions.len());
        for expression in expressions {
            compiled.push(self.compile_expression(expression, prefix, is_table, params)?);
        }
        Ok(compiled.join(", "))
    }

    fn compile_expression(
        &self,
        expression: &Expression,
        prefix: &str,
        is_table: bool,
        params: &mut ParamList,
    ) -> OmsResult<String> {
        Ok(match expression {
            Expression::Column(name) if is_table => self.compile_table(name, prefix),
            Expression::Column(name) => self.compile_system(name, prefix),
            Expression::Raw(sql) => sql.clone(),
            Expression::Deferred(f) if is_table => self.compile_table(&f(), prefix),
            Expression::Deferred(f) => self.compile_system(&f(), prefix),
            Expression::Query(sub) => format!("({})", self.compile_statement(sub, params)?),
        })
    }

    /// Placeholder for `value`, or `NULL`.
    fn compile_value(&self, value: &Value, params: &mut ParamList) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        let idx = params.push(self.bind_value(value));
        self.placeholder(idx)
    }

    /// Driver-facing form of a bind: datetimes and JSON become strings.
    fn bind_value(&self, value: &Value) -> Value {
        match value {
            Value::DateTime(dt) => Value::Str(dt.format(self.datetime_format()).to_string()),
            Value::Json(json) => Value::Str(json.to_string()),
            other => other.clone(),
        }
    }

    /// Quote a single identifier part.
    fn quote_part(&self, part: &str) -> String {
        if part == "*" {
            return part.to_string();
        }
        let q = self.system_identifier();
        let escaped = part.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Column-like identifier; the table qualifier of a dotted name is prefixed.
    fn compile_system(&self, name: &str, prefix: &str) -> String {
        self.compile_identifier(name, prefix, false)
    }

    /// Table identifier; the table part is prefixed.
    fn compile_table(&self, name: &str, prefix: &str) -> String {
        self.compile_identifier(name, prefix, true)
    }

    fn compile_identifier(&self, name: &str, prefix: &str, is_table: bool) -> String {
        let name = name.trim();
        if let Some((expr, alias)) = split_alias(name) {
            return format!(
                "{} AS {}",
                self.compile_identifier(expr, prefix, is_table),
                self.quote_part(alias)
            );
        }
        if name.is_empty() || name.contains('(') || name.contains(char::is_whitespace) {
            return name.to_string();
        }

        let parts: Vec<&str> = name.split('.').collect();
        // Index of the part that names a table.
        let table_idx = if is_table {
            Some(parts.len() - 1)
        } else {
            parts.len().checked_sub(2)
        };
        parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if Some(i) == table_idx {
                    self.quote_part(&format!("{prefix}{part}"))
                } else {
                    self.quote_part(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn push_non_empty(parts: &mut Vec<String>, part: String) {
    if !part.is_empty() {
        parts.push(part);
    }
}

/// Split `expr AS alias` (case-insensitive) when the alias is a plain word.
fn split_alias(name: &str) -> Option<(&str, &str)> {
    let lower = name.to_ascii_lowercase();
    let pos = lower.rfind(" as ")?;
    let (expr, alias) = (name[..pos].trim(), name[pos + 4..].trim());
    if expr.is_empty() || alias.is_empty() || alias.contains(char::is_whitespace) {
        return None;
    }
    Some((expr, alias))
}

/// Base ANSI grammar: `"` identifiers, `?` placeholders, `LIMIT`/`OFFSET`.
#[derive(Clone, Debug)]
pub struct AnsiGrammar {
    datetime_format: String,
}

impl AnsiGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datetime_format(format: impl Into<String>) -> Self {
        Self {
            datetime_format: format.into(),
        }
    }
}

impl Default for AnsiGrammar {
    fn default() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }
}

impl Grammar for AnsiGrammar {
    fn datetime_format(&self) -> &str {
        &self.datetime_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rendering() {
        let g = AnsiGrammar::new();
        assert_eq!(g.compile_system("id", "oms_"), "\"id\"");
        assert_eq!(g.compile_system("users.id", "oms_"), "\"oms_users\".\"id\"");
        assert_eq!(g.compile_system("users.*", ""), "\"users\".*");
        assert_eq!(g.compile_system("*", ""), "*");
        assert_eq!(g.compile_system("COUNT(id)", "oms_"), "COUNT(id)");
        assert_eq!(g.compile_system("a\"b", ""), "\"a\"\"b\"");
        assert_eq!(g.compile_table("users", "oms_"), "\"oms_users\"");
        assert_eq!(g.compile_table("public.users", "oms_"), "\"public\".\"oms_users\"");
    }

    #[test]
    fn alias_is_split() {
        let g = AnsiGrammar::new();
        assert_eq!(g.compile_system("users.name as n", ""), "\"users\".\"name\" AS \"n\"");
        assert_eq!(g.compile_table("accounts AS a", "p_"), "\"p_accounts\" AS \"a\"");
        assert_eq!(g.compile_system("MAX(id) AS top", ""), "MAX(id) AS \"top\"");
    }

    #[test]
    fn datetime_and_json_bind_as_strings() {
        let g = AnsiGrammar::with_datetime_format("%Y/%m/%d");
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(g.bind_value(&Value::DateTime(dt)), Value::from("2024/03/01"));
        assert_eq!(
            g.bind_value(&Value::Json(serde_json::json!({"a": 1}))),
            Value::from("{\"a\":1}")
        );
    }
}
