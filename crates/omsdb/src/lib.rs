//! # omsdb
//!
//! Data storage layer: a fluent query builder compiled by per-dialect grammars,
//! connections with a uniform status model, and named pools of connections and
//! caches.
//!
//! ## Features
//!
//! - **One builder, many dialects**: MySQL, PostgreSQL, SQLite and SQL Server grammars and drivers
//! - **Bound parameters**: values never end up in SQL text; placeholders are numbered per dialect
//! - **Read-only builders**: write statements are rejected before anything is compiled
//! - **Schema builder**: table and field listing, `CREATE TABLE`, `DROP TABLE`
//! - **Pools**: named connections and caches built from a TOML config file
//! - **Caches**: file records with per-entry expiry, or a memcached server
//!
//! ## Query builder
//!
//! ```ignore
//! use omsdb::prelude::*;
//!
//! let connection = ConnectionFactory::connect(&DbConfig::new("sqlite", "oms.sqlite")).await?;
//!
//! let mut query = Builder::new(connection.clone(), true);
//! query
//!     .select(["id", "login"])?
//!     .from(["accounts"])
//!     .where_("status", "=", 1)?
//!     .newest("created_at")
//!     .limit(10);
//! let result = query.execute().await?;
//!
//! let mut insert = Builder::new(connection, false);
//! insert
//!     .insert(["login", "status"])?
//!     .into_table("accounts")
//!     .values(vec![Value::from("admin"), Value::from(1)]);
//! insert.execute().await?;
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod log;
pub mod pool;
pub mod query;
pub mod row;
pub mod schema;
pub mod value;

pub use cache::{
    Cache, CacheFactory, CachePool, CacheStats, CacheStatus, CacheValue, FileCache, MemCache,
    NullCache,
};
pub use config::{AppConfig, CacheConfig, CacheType, DbConfig};
pub use connection::{
    Connection, ConnectionFactory, DatabaseStatus, DatabaseType, MysqlConnection, NullConnection,
    PostgresConnection, SqlServerConnection, SqliteConnection,
};
pub use error::{OmsError, OmsResult};
pub use pool::{DatabasePool, Registry};
pub use query::{
    AnsiGrammar, Builder, CompiledQuery, Expression, Grammar, JoinType, MicrosoftGrammar,
    MysqlGrammar, PostgresGrammar, PreparedQuery, QueryType, SqliteGrammar, WhereValue,
};
pub use row::{FromRow, FromValue, QueryResult, Row};
pub use schema::{FieldDefinition, SchemaBuilder, SchemaGrammar, SchemaQueryType};
pub use value::{ParamType, Value};

/// Common imports.
pub mod prelude {
    pub use crate::cache::{Cache, CacheValue, NEVER};
    pub use crate::config::{AppConfig, DbConfig};
    pub use crate::connection::{Connection, ConnectionFactory, DatabaseStatus};
    pub use crate::error::{OmsError, OmsResult};
    pub use crate::pool::DatabasePool;
    pub use crate::query::{Builder, Expression, WhereValue};
    pub use crate::row::{FromRow, QueryResult, Row};
    pub use crate::schema::{FieldDefinition, SchemaBuilder};
    pub use crate::value::Value;
}
