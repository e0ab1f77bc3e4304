//! Database connections.
//!
//! Every dialect implements [`Connection`]: it owns the native handle, reports a
//! [`DatabaseStatus`] and hands out the grammars matching its dialect. Use
//! [`ConnectionFactory`] to create one from a [`DbConfig`].

mod factory;
mod mysql;
mod null;
mod postgres;
mod sqlite;
mod sqlserver;

pub use factory::ConnectionFactory;
pub use mysql::MysqlConnection;
pub use null::NullConnection;
pub use postgres::PostgresConnection;
pub use sqlite::SqliteConnection;
pub use sqlserver::SqlServerConnection;

use crate::config::DbConfig;
use crate::error::{OmsError, OmsResult};
use crate::query::{Grammar, PreparedQuery};
use crate::row::QueryResult;
use crate::schema::SchemaGrammar;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// SQL dialect of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    #[default]
    Undefined,
    Mysql,
    Pgsql,
    Sqlsrv,
    Sqlite,
}

impl DatabaseType {
    /// Config discriminator (`db` key).
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::Undefined => "undefined",
            DatabaseType::Mysql => "mysql",
            DatabaseType::Pgsql => "pgsql",
            DatabaseType::Sqlsrv => "sqlsrv",
            DatabaseType::Sqlite => "sqlite",
        }
    }
}

impl FromStr for DatabaseType {
    type Err = OmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DatabaseType::Mysql),
            "pgsql" => Ok(DatabaseType::Pgsql),
            "sqlsrv" => Ok(DatabaseType::Sqlsrv),
            "sqlite" => Ok(DatabaseType::Sqlite),
            other => Err(OmsError::invalid_argument(format!(
                "unknown database type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DatabaseStatus {
    Ok = 0,
    MissingDatabase = 1,
    MissingTable = 2,
    Failure = 3,
    ReadOnly = 4,
    #[default]
    Closed = 5,
}

/// A database connection of one dialect.
///
/// Connections are shared as `Arc<dyn Connection>`; all methods take `&self` and
/// synchronise access to the native handle internally.
#[async_trait]
pub trait Connection: fmt::Debug + Send + Sync {
    /// Open the native handle.
    ///
    /// `config` replaces the stored config when given. On failure the status is
    /// set to the matching failure state and the error is returned.
    async fn connect(&self, config: Option<DbConfig>) -> OmsResult<()>;

    /// Drop the native handle; calling it again is a no-op.
    async fn close(&self);

    /// Run a prepared statement.
    async fn run(&self, query: &PreparedQuery) -> OmsResult<QueryResult>;

    fn db_type(&self) -> DatabaseType;

    fn status(&self) -> DatabaseStatus;

    fn grammar(&self) -> Arc<dyn Grammar>;

    fn schema_grammar(&self) -> Arc<dyn SchemaGrammar>;

    /// Config with the password redacted.
    fn config(&self) -> DbConfig;

    fn prefix(&self) -> String {
        self.config().prefix.unwrap_or_default()
    }

    fn database(&self) -> String {
        self.config().database
    }

    fn host(&self) -> String {
        self.config().host.unwrap_or_default()
    }

    fn port(&self) -> u16 {
        self.config().port.unwrap_or_default()
    }
}

#[derive(Debug)]
struct BaseState {
    config: DbConfig,
    password: Option<String>,
    status: DatabaseStatus,
}

/// Config and status shared by every connection type.
///
/// The password is kept apart from the stored config so reconnecting works while
/// [`Connection::config`] only ever exposes the redacted form.
#[derive(Debug)]
pub(crate) struct ConnectionBase {
    state: Mutex<BaseState>,
}

impl ConnectionBase {
    pub(crate) fn new(config: DbConfig) -> Self {
        let password = config.password.clone();
        Self {
            state: Mutex::new(BaseState {
                config: config.redacted(),
                password,
                status: DatabaseStatus::Closed,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored config (when given) and return it with the real password.
    pub(crate) fn prepare_connect(&self, config: Option<DbConfig>) -> OmsResult<DbConfig> {
        let mut state = self.lock();
        if let Some(config) = config {
            state.password = config.password.clone();
            state.config = config.redacted();
        }
        if let Err(err) = state.config.validate() {
            state.status = DatabaseStatus::Failure;
            return Err(err);
        }
        let mut config = state.config.clone();
        config.password = state.password.clone();
        Ok(config)
    }

    pub(crate) fn config(&self) -> DbConfig {
        self.lock().config.clone()
    }

    pub(crate) fn status(&self) -> DatabaseStatus {
        self.lock().status
    }

    pub(crate) fn set_status(&self, status: DatabaseStatus) {
        self.lock().status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_type_round_trips_wire_names() {
        for ty in [
            DatabaseType::Mysql,
            DatabaseType::Pgsql,
            DatabaseType::Sqlsrv,
            DatabaseType::Sqlite,
        ] {
            assert_eq!(ty.as_str().parse::<DatabaseType>().unwrap(), ty);
        }
        assert!("oracle".parse::<DatabaseType>().is_err());
        assert!("undefined".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn status_codes() {
        assert_eq!(DatabaseStatus::Ok as u8, 0);
        assert_eq!(DatabaseStatus::MissingDatabase as u8, 1);
        assert_eq!(DatabaseStatus::Closed as u8, 5);
    }

    #[test]
    fn base_redacts_but_keeps_password_for_connect() {
        let base = ConnectionBase::new(DbConfig::new("pgsql", "oms").password("secret"));
        assert_eq!(base.config().password.as_deref(), Some("****"));
        let config = base.prepare_connect(None).unwrap();
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn base_validation_sets_failure() {
        let base = ConnectionBase::new(DbConfig::new("pgsql", ""));
        let err = base.prepare_connect(None).unwrap_err();
        assert!(matches!(err, OmsError::InvalidConfig(ref key) if key == "database"));
        assert_eq!(base.status(), DatabaseStatus::Failure);
    }
}
