//! Error types for omsdb

use crate::cache::CacheStatus;
use thiserror::Error;

/// Result type alias for omsdb operations
pub type OmsResult<T> = Result<T, OmsError>;

/// Error types for query building, connections and caches
#[derive(Debug, Error)]
pub enum OmsError {
    /// Comparison operator outside of the allow-list
    #[error("Unknown operator: {0}")]
    InvalidOperator(String),

    /// Argument rejected by a builder, factory or pool
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutation attempted on a read-only builder
    #[error("Read-only query: {0}")]
    ReadOnly(String),

    /// Terminal call conflicts with the query type already set
    #[error("Query type conflict: {0}")]
    QueryType(String),

    /// Builder state cannot be compiled
    #[error("Compile error: {0}")]
    Compile(String),

    /// Bound value has no parameter type
    #[error("Unsupported bind type: {0}")]
    BindType(String),

    /// Required config value is missing or invalid
    #[error("Missing config value for \"{0}\"")]
    InvalidConfig(String),

    /// Config file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Feature not available for this dialect/backend
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Connection is not usable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database (file) does not exist
    #[error("Missing database: {0}")]
    MissingDatabase(String),

    /// Table does not exist
    #[error("The table \"{0}\" doesn't exist.")]
    MissingTable(String),

    /// PostgreSQL query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// SQLite query execution error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// SQL Server driver error
    #[error("SQL Server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// memcached client error
    #[error("Memcache error: {0}")]
    Memcache(#[from] memcache::MemcacheError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cache is not in the `Active` state
    #[error("Cache unavailable (status {0:?})")]
    CacheUnavailable(CacheStatus),
}

impl OmsError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a missing table error from a driver message.
    ///
    /// The table name is the first `'quoted'` part of the message, or the whole
    /// message if it has no quoted part.
    pub fn missing_table(message: &str) -> Self {
        Self::MissingTable(find_table(message).to_string())
    }

    /// Check if this is a read-only violation
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly(_))
    }

    /// Check if this is an unknown operator error
    pub fn is_invalid_operator(&self) -> bool {
        matches!(self, Self::InvalidOperator(_))
    }

    /// Check if this is a missing database error
    pub fn is_missing_database(&self) -> bool {
        matches!(self, Self::MissingDatabase(_))
    }

    /// Parse a tokio_postgres error into a more specific OmsError
    pub fn from_pg_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            match db_err.code().code() {
                "3D000" => return Self::MissingDatabase(db_err.message().to_string()),
                "42P01" => return Self::missing_table(db_err.message()),
                _ => {}
            }
        }
        Self::Query(err)
    }

    /// Parse a mysql_async error into a more specific OmsError
    pub fn from_mysql_error(err: mysql_async::Error) -> Self {
        if let mysql_async::Error::Server(server) = &err {
            match server.code {
                // ER_BAD_DB_ERROR
                1049 => return Self::MissingDatabase(server.message.clone()),
                // ER_NO_SUCH_TABLE
                1146 => return Self::missing_table(&server.message),
                _ => {}
            }
        }
        Self::Mysql(err)
    }

    /// Parse a tiberius error into a more specific OmsError
    pub fn from_mssql_error(err: tiberius::error::Error) -> Self {
        if let tiberius::error::Error::Server(token) = &err {
            match token.code() {
                // Cannot open database requested by the login.
                4060 => return Self::MissingDatabase(token.message().to_string()),
                // Invalid object name.
                208 => return Self::missing_table(token.message()),
                _ => {}
            }
        }
        Self::SqlServer(err)
    }
}

impl From<serde_json::Error> for OmsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extract the table name from messages like `Table 'users' doesn't exist` or
/// `relation "users" does not exist`.
pub fn find_table(message: &str) -> &str {
    let Some(start) = message.find(['\'', '"']) else {
        return message;
    };
    let quote = message.as_bytes()[start] as char;
    match message[start + 1..].find(quote) {
        Some(len) => &message[start + 1..start + 1 + len],
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_table_extracts_quoted_name() {
        assert_eq!(find_table("Table 'oms.accounts' doesn't exist"), "oms.accounts");
        assert_eq!(find_table("relation \"users\" does not exist"), "users");
        assert_eq!(find_table("no quotes here"), "no quotes here");
        assert_eq!(find_table("unterminated 'quote"), "unterminated 'quote");
    }

    #[test]
    fn missing_table_message() {
        let err = OmsError::missing_table("Table 'users' doesn't exist");
        assert_eq!(err.to_string(), "The table \"users\" doesn't exist.");
    }
}
