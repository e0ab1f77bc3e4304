//! Fluent statement builder.
//!
//! A [`Builder`] accumulates the clauses of one statement and hands itself to the
//! grammar of its connection for compilation. Mutators validate their own input
//! and leave the builder untouched when they fail.

use crate::connection::{Connection, DatabaseStatus};
use crate::error::{OmsError, OmsResult};
use crate::log::trace_sql;
use crate::query::compiled::CompiledQuery;
use crate::query::expr::{
    Boolean, Expression, Join, JoinOn, JoinType, Operator, OrderDirection, WhereCondition,
    WhereValue,
};
use crate::query::grammar::Grammar;
use crate::query::QueryType;
use crate::row::QueryResult;
use crate::value::{Bind, Value};
use std::sync::Arc;

/// Keywords that make a raw statement a write on read-only builders.
const WRITE_KEYWORDS: &[&str] = &["insert", "update", "drop", "delete", "create", "alter"];

/// Mutable accumulator for one SQL statement.
#[derive(Clone, Debug)]
pub struct Builder {
    connection: Arc<dyn Connection>,
    grammar: Arc<dyn Grammar>,
    read_only: bool,
    prefix: String,
    pub(crate) query_type: QueryType,
    pub(crate) selects: Vec<Expression>,
    pub(crate) distinct: bool,
    pub(crate) from: Vec<Expression>,
    pub(crate) joins: Vec<Join>,
    pub(crate) wheres: Vec<(String, Vec<WhereCondition>)>,
    pub(crate) groups: Vec<Expression>,
    pub(crate) orders: Vec<(OrderDirection, Vec<Expression>)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) unions: Vec<Builder>,
    pub(crate) lock: bool,
    pub(crate) into: Option<Expression>,
    pub(crate) inserts: Vec<Expression>,
    pub(crate) values: Vec<Vec<Value>>,
    pub(crate) updates: Vec<Expression>,
    pub(crate) sets: Vec<(Expression, Value)>,
    pub(crate) raw: Option<String>,
    binds: Vec<Bind>,
}

impl Builder {
    /// Create a builder bound to `connection`, using its grammar and table prefix.
    pub fn new(connection: Arc<dyn Connection>, read_only: bool) -> Self {
        let grammar = connection.grammar();
        let prefix = connection.prefix();
        Self {
            connection,
            grammar,
            read_only,
            prefix,
            query_type: QueryType::Undefined,
            selects: Vec::new(),
            distinct: false,
            from: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            unions: Vec::new(),
            lock: false,
            into: None,
            inserts: Vec::new(),
            values: Vec::new(),
            updates: Vec::new(),
            sets: Vec::new(),
            raw: None,
            binds: Vec::new(),
        }
    }

    /// Empty builder on the same connection with the same read-only flag.
    pub fn new_query(&self) -> Builder {
        Builder::new(Arc::clone(&self.connection), self.read_only)
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn binds(&self) -> &[Bind] {
        &self.binds
    }

    pub fn values_rows(&self) -> &[Vec<Value>] {
        &self.values
    }

    /// Set the statement type, rejecting transitions between different kinds.
    fn set_type(&mut self, kind: QueryType) -> OmsResult<()> {
        match (self.query_type, kind) {
            (QueryType::Random, QueryType::Select) => return Ok(()),
            (QueryType::Undefined, _) | (QueryType::Select, QueryType::Random) => {}
            (current, next) if current == next => {}
            (current, next) => {
                return Err(OmsError::QueryType(format!(
                    "cannot turn a {current} query into {next}"
                )));
            }
        }
        self.query_type = kind;
        Ok(())
    }

    fn ensure_writable(&self, what: &str) -> OmsResult<()> {
        if self.read_only {
            return Err(OmsError::ReadOnly(format!("{what} on a read-only builder")));
        }
        Ok(())
    }

    // ==================== SELECT ====================

    /// Select columns or expressions.
    pub fn select<I, E>(&mut self, columns: I) -> OmsResult<&mut Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        self.set_type(QueryType::Select)?;
        self.selects.extend(columns.into_iter().map(Into::into));
        Ok(self)
    }

    /// Select rows in random order.
    ///
    /// Without a `limit` every matching row is returned, except on SQL Server
    /// where `TOP 1` is implied.
    pub fn random<I, E>(&mut self, columns: I) -> OmsResult<&mut Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        self.set_type(QueryType::Random)?;
        self.selects.extend(columns.into_iter().map(Into::into));
        Ok(self)
    }

    /// Append a verbatim select expression.
    pub fn select_raw(&mut self, expression: &str) -> &mut Self {
        self.selects.push(Expression::raw(expression));
        self
    }

    /// `SELECT COUNT(table)`.
    pub fn count(&mut self, table: &str) -> OmsResult<&mut Self> {
        let inner = if table == "*" {
            "*".to_string()
        } else {
            self.grammar.compile_system(table, &self.prefix)
        };
        self.select([Expression::raw(format!("COUNT({inner})"))])
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    pub fn from<I, E>(&mut self, tables: I) -> &mut Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        self.from.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn from_raw(&mut self, expression: &str) -> &mut Self {
        self.from.push(Expression::raw(expression));
        self
    }

    // ==================== WHERE ====================

    /// Add `column operator value` joined with `and`.
    pub fn where_(
        &mut self,
        column: impl Into<Expression>,
        operator: &str,
        value: impl Into<WhereValue>,
    ) -> OmsResult<&mut Self> {
        self.where_with(column, operator, value, "and")
    }

    /// Add a condition with an explicit boolean connector (`and` / `or`).
    pub fn where_with(
        &mut self,
        column: impl Into<Expression>,
        operator: &str,
        value: impl Into<WhereValue>,
        boolean: &str,
    ) -> OmsResult<&mut Self> {
        let condition = WhereCondition::new(column.into(), operator, value.into(), boolean)?;
        self.push_where(condition);
        Ok(self)
    }

    /// Add several conditions; nothing is added if any of them is invalid.
    pub fn where_many<I, E>(&mut self, conditions: I) -> OmsResult<&mut Self>
    where
        I: IntoIterator<Item = (E, &'static str, WhereValue, &'static str)>,
        E: Into<Expression>,
    {
        let parsed = conditions
            .into_iter()
            .map(|(column, operator, value, boolean)| {
                WhereCondition::new(column.into(), operator, value, boolean)
            })
            .collect::<OmsResult<Vec<_>>>()?;
        for condition in parsed {
            self.push_where(condition);
        }
        Ok(self)
    }

    pub fn and_where(
        &mut self,
        column: impl Into<Expression>,
        operator: &str,
        value: impl Into<WhereValue>,
    ) -> OmsResult<&mut Self> {
        self.where_with(column, operator, value, "and")
    }

    pub fn or_where(
        &mut self,
        column: impl Into<Expression>,
        operator: &str,
        value: impl Into<WhereValue>,
    ) -> OmsResult<&mut Self> {
        self.where_with(column, operator, value, "or")
    }

    pub fn where_in(
        &mut self,
        column: impl Into<Expression>,
        values: impl Into<WhereValue>,
    ) -> OmsResult<&mut Self> {
        self.where_with(column, "in", values, "and")
    }

    pub fn where_null(&mut self, column: impl Into<Expression>) -> &mut Self {
        self.push_null_check(column.into(), "=")
    }

    pub fn where_not_null(&mut self, column: impl Into<Expression>) -> &mut Self {
        self.push_null_check(column.into(), "!=")
    }

    fn push_null_check(&mut self, column: Expression, operator: &'static str) -> &mut Self {
        // Both operators are in the allow-list, so this cannot fail.
        if let Ok(condition) = WhereCondition::new(column, operator, WhereValue::null(), "and") {
            self.push_where(condition);
        }
        self
    }

    fn push_where(&mut self, condition: WhereCondition) {
        let key = condition.column.public_name();
        match self.wheres.iter_mut().find(|(name, _)| *name == key) {
            Some((_, conditions)) => conditions.push(condition),
            None => self.wheres.push((key, vec![condition])),
        }
    }

    /// All conditions stored for one column.
    pub fn get_where_by_column(&self, column: impl Into<Expression>) -> Option<&[WhereCondition]> {
        let key = column.into().public_name();
        self.wheres
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, conditions)| conditions.as_slice())
    }

    /// Table part of a `"table"."column"` style expression.
    pub fn get_table_of_system(expression: &str, system_identifier: char) -> Option<String> {
        let marker = format!("{system_identifier}.{system_identifier}");
        if !expression.contains(&marker) {
            return None;
        }
        expression.split('.').next().map(str::to_string)
    }

    // ==================== JOIN ====================

    pub fn join(&mut self, kind: JoinType, table: impl Into<Expression>) -> &mut Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on: Vec::new(),
        });
        self
    }

    pub fn inner_join(&mut self, table: impl Into<Expression>) -> &mut Self {
        self.join(JoinType::Inner, table)
    }

    pub fn left_join(&mut self, table: impl Into<Expression>) -> &mut Self {
        self.join(JoinType::Left, table)
    }

    pub fn right_join(&mut self, table: impl Into<Expression>) -> &mut Self {
        self.join(JoinType::Right, table)
    }

    pub fn full_join(&mut self, table: impl Into<Expression>) -> &mut Self {
        self.join(JoinType::Full, table)
    }

    pub fn cross_join(&mut self, table: impl Into<Expression>) -> &mut Self {
        self.join(JoinType::Cross, table)
    }

    /// Add an `ON` condition to the most recent join.
    pub fn on(
        &mut self,
        left: impl Into<Expression>,
        operator: &str,
        right: impl Into<Expression>,
        boolean: &str,
    ) -> OmsResult<&mut Self> {
        let operator = Operator::parse(operator)?;
        let boolean = Boolean::parse(boolean)?;
        let join = self
            .joins
            .last_mut()
            .ok_or_else(|| OmsError::invalid_argument("on() called before join()"))?;
        join.on.push(JoinOn {
            left: left.into(),
            operator,
            right: right.into(),
            boolean,
        });
        Ok(self)
    }

    // ==================== GROUP / ORDER / LIMIT ====================

    pub fn group_by<I, E>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Order by one column; `order` is `ASC` or `DESC` (case-insensitive).
    pub fn order_by(&mut self, column: impl Into<Expression>, order: &str) -> OmsResult<&mut Self> {
        let direction = OrderDirection::parse(order)?;
        self.push_order(direction, column.into());
        Ok(self)
    }

    /// Order by several columns with one direction each.
    pub fn order_by_many<E: Into<Expression>>(
        &mut self,
        columns: Vec<E>,
        orders: &[&str],
    ) -> OmsResult<&mut Self> {
        if columns.len() != orders.len() {
            return Err(OmsError::invalid_argument(format!(
                "{} order columns but {} directions",
                columns.len(),
                orders.len()
            )));
        }
        let directions = orders
            .iter()
            .map(|order| OrderDirection::parse(order))
            .collect::<OmsResult<Vec<_>>>()?;
        for (column, direction) in columns.into_iter().zip(directions) {
            self.push_order(direction, column.into());
        }
        Ok(self)
    }

    pub fn newest(&mut self, column: impl Into<Expression>) -> &mut Self {
        self.push_order(OrderDirection::Desc, column.into());
        self
    }

    pub fn oldest(&mut self, column: impl Into<Expression>) -> &mut Self {
        self.push_order(OrderDirection::Asc, column.into());
        self
    }

    fn push_order(&mut self, direction: OrderDirection, column: Expression) {
        match self.orders.iter_mut().find(|(dir, _)| *dir == direction) {
            Some((_, columns)) => columns.push(column),
            None => self.orders.push((direction, vec![column])),
        }
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn union(&mut self, query: Builder) -> &mut Self {
        self.unions.push(query);
        self
    }

    /// Lock selected rows for update.
    pub fn lock_update(&mut self) -> &mut Self {
        self.lock = true;
        self
    }

    // ==================== INSERT ====================

    /// Insert into the given columns.
    pub fn insert<I, E>(&mut self, columns: I) -> OmsResult<&mut Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        self.ensure_writable("insert")?;
        self.set_type(QueryType::Insert)?;
        self.inserts.extend(columns.into_iter().map(Into::into));
        Ok(self)
    }

    /// Target table of an insert.
    pub fn into_table(&mut self, table: impl Into<Expression>) -> &mut Self {
        self.into = Some(table.into());
        self
    }

    /// Append one row of values.
    pub fn values<I, V>(&mut self, row: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values.push(row.into_iter().map(Into::into).collect());
        self
    }

    /// Append one value to the last row.
    pub fn value(&mut self, value: impl Into<Value>) -> &mut Self {
        match self.values.last_mut() {
            Some(row) => row.push(value.into()),
            None => self.values.push(vec![value.into()]),
        }
        self
    }

    // ==================== UPDATE ====================

    /// Update the given tables.
    pub fn update<I, E>(&mut self, tables: I) -> OmsResult<&mut Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        self.ensure_writable("update")?;
        self.set_type(QueryType::Update)?;
        self.updates.extend(tables.into_iter().map(Into::into));
        Ok(self)
    }

    /// Set one column; setting the same column again replaces its value.
    pub fn set(&mut self, column: impl Into<Expression>, value: impl Into<Value>) -> &mut Self {
        let column = column.into();
        let key = column.public_name();
        let value = value.into();
        match self.sets.iter_mut().find(|(c, _)| c.public_name() == key) {
            Some((_, existing)) => *existing = value,
            None => self.sets.push((column, value)),
        }
        self
    }

    pub fn sets<I, E, V>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (E, V)>,
        E: Into<Expression>,
        V: Into<Value>,
    {
        for (column, value) in pairs {
            self.set(column, value);
        }
        self
    }

    // ==================== DELETE / RAW ====================

    pub fn delete(&mut self) -> OmsResult<&mut Self> {
        self.ensure_writable("delete")?;
        self.set_type(QueryType::Delete)?;
        Ok(self)
    }

    /// Use a hand-written statement; a trailing `;` is removed.
    pub fn raw(&mut self, raw: &str) -> OmsResult<&mut Self> {
        if self.read_only {
            let lower = raw.to_lowercase();
            if let Some(keyword) = WRITE_KEYWORDS.iter().find(|k| lower.contains(*k)) {
                return Err(OmsError::ReadOnly(format!(
                    "raw statement contains '{keyword}'"
                )));
            }
        }
        self.set_type(QueryType::Raw)?;
        self.raw = Some(raw.trim_end_matches(';').to_string());
        Ok(self)
    }

    // ==================== Binds ====================

    /// Bind a positional value for a placeholder written by hand.
    pub fn bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.binds.push(Bind::Positional(value.into()));
        self
    }

    /// Bind named values; names that are already bound keep their value.
    pub fn bind_named<I, K, V>(&mut self, binds: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in binds {
            let name = name.into();
            let exists = self
                .binds
                .iter()
                .any(|b| matches!(b, Bind::Named(n, _) if *n == name));
            if !exists {
                self.binds.push(Bind::Named(name, value.into()));
            }
        }
        self
    }

    // ==================== Branching ====================

    /// Clone of this builder with the clauses of `other` appended.
    pub fn merge(&self, other: &Builder) -> Builder {
        let mut merged = self.clone();
        merged.selects.extend(other.selects.iter().cloned());
        merged.from.extend(other.from.iter().cloned());
        merged.joins.extend(other.joins.iter().cloned());
        for (_, conditions) in &other.wheres {
            for condition in conditions {
                merged.push_where(condition.clone());
            }
        }
        merged.groups.extend(other.groups.iter().cloned());
        for (direction, columns) in &other.orders {
            for column in columns {
                merged.push_order(*direction, column.clone());
            }
        }
        merged.unions.extend(other.unions.iter().cloned());
        merged.binds.extend(other.binds.iter().cloned());
        merged.limit = merged.limit.or(other.limit);
        merged.offset = merged.offset.or(other.offset);
        merged.distinct |= other.distinct;
        merged
    }

    // ==================== Compilation & execution ====================

    /// Compile to SQL text; pure and repeatable.
    pub fn to_sql(&self) -> OmsResult<String> {
        Ok(self.compile()?.sql)
    }

    /// Compile to SQL text plus the ordered bind list.
    pub fn compile(&self) -> OmsResult<CompiledQuery> {
        self.grammar.compile_query(self)
    }

    /// Compile, bind and run the statement on the connection.
    pub async fn execute(&self) -> OmsResult<QueryResult> {
        let prepared = self.compile()?.prepare()?;

        let status = self.connection.status();
        if status != DatabaseStatus::Ok {
            return Err(OmsError::connection(format!(
                "cannot execute on a connection with status {status:?}"
            )));
        }

        trace_sql(self.connection.db_type(), &prepared.sql, prepared.params.len());
        self.connection.run(&prepared).await
    }
}
