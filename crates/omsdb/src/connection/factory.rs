use super::{
    Connection, DatabaseType, MysqlConnection, PostgresConnection, SqlServerConnection,
    SqliteConnection,
};
use crate::config::DbConfig;
use crate::error::{OmsError, OmsResult};
use std::sync::Arc;

/// Builds connections from config maps.
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Create an unopened connection for `config.db`.
    ///
    /// Unknown dialects are rejected with [`OmsError::InvalidArgument`].
    pub fn create(config: &DbConfig) -> OmsResult<Arc<dyn Connection>> {
        let db_type: DatabaseType = config.db.parse()?;
        let connection: Arc<dyn Connection> = match db_type {
            DatabaseType::Mysql => Arc::new(MysqlConnection::new(config.clone())),
            DatabaseType::Pgsql => Arc::new(PostgresConnection::new(config.clone())),
            DatabaseType::Sqlsrv => Arc::new(SqlServerConnection::new(config.clone())),
            DatabaseType::Sqlite => Arc::new(SqliteConnection::new(config.clone())),
            DatabaseType::Undefined => {
                return Err(OmsError::invalid_argument("database type is undefined"));
            }
        };
        Ok(connection)
    }

    /// Create a connection and open it.
    pub async fn connect(config: &DbConfig) -> OmsResult<Arc<dyn Connection>> {
        let connection = Self::create(config)?;
        connection.connect(None).await?;
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseStatus;

    #[test]
    fn dispatches_on_db_discriminator() {
        for (db, ty) in [
            ("mysql", DatabaseType::Mysql),
            ("pgsql", DatabaseType::Pgsql),
            ("sqlsrv", DatabaseType::Sqlsrv),
            ("sqlite", DatabaseType::Sqlite),
        ] {
            let con = ConnectionFactory::create(&DbConfig::new(db, "oms")).unwrap();
            assert_eq!(con.db_type(), ty);
            assert_eq!(con.status(), DatabaseStatus::Closed);
        }
    }

    #[test]
    fn unknown_discriminator_is_invalid_argument() {
        let err = ConnectionFactory::create(&DbConfig::new("oracle", "oms")).unwrap_err();
        assert!(matches!(err, OmsError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unreachable_server_reports_failure() {
        for db in ["mysql", "pgsql", "sqlsrv"] {
            let config = DbConfig::new(db, "oms").host("127.0.0.1").port(1).login("oms");
            let con = ConnectionFactory::create(&config).unwrap();
            assert!(con.connect(None).await.is_err(), "{db} connected to port 1");
            assert_eq!(con.status(), DatabaseStatus::Failure);
            con.close().await;
            assert_eq!(con.status(), DatabaseStatus::Closed);
        }
    }

    #[tokio::test]
    async fn missing_keys_fail_before_connecting() {
        let con = ConnectionFactory::create(&DbConfig::new("sqlsrv", "")).unwrap();
        let err = con.connect(None).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing config value for \"database\"");
        assert_eq!(con.status(), DatabaseStatus::Failure);
    }
}
