//! Query builder and dialect grammars.
//!
//! A [`Builder`] collects clauses; a [`Grammar`] turns them into SQL text and an
//! ordered bind list. Placeholders are numbered across sub-queries, so the
//! compiled binds always follow the order they appear in the SQL.

mod builder;
mod compiled;
pub mod expr;
pub mod grammar;

#[cfg(test)]
mod tests;

pub use builder::Builder;
pub use compiled::{CompiledQuery, PreparedQuery};
pub use expr::{
    Boolean, Expression, Join, JoinOn, JoinType, OPERATORS, Operator, OrderDirection,
    WhereCondition, WhereValue,
};
pub use grammar::{AnsiGrammar, Grammar, MicrosoftGrammar, MysqlGrammar, PostgresGrammar, SqliteGrammar};

use std::fmt;

/// Statement kind, set by the first terminal builder call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueryType {
    #[default]
    Undefined,
    Select,
    Insert,
    Update,
    Delete,
    Random,
    Raw,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Undefined => "undefined",
            QueryType::Select => "select",
            QueryType::Insert => "insert",
            QueryType::Update => "update",
            QueryType::Delete => "delete",
            QueryType::Random => "random",
            QueryType::Raw => "raw",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
