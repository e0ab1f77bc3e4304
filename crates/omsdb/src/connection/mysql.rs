use super::{Connection, ConnectionBase, DatabaseStatus, DatabaseType};
use crate::config::DbConfig;
use crate::error::{OmsError, OmsResult};
use crate::log::TARGET_CONNECTION;
use crate::query::{Grammar, MysqlGrammar, PreparedQuery};
use crate::row::{QueryResult, Row};
use crate::schema::SchemaGrammar;
use crate::value::{ParamType, Value};
use async_trait::async_trait;
use chrono::NaiveDate;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Params};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;

/// MySQL connection over `mysql_async`.
///
/// Statements run through the binary protocol. Named binds (`:name`) are passed
/// to the driver as named params and cannot be mixed with positional ones.
pub struct MysqlConnection {
    base: ConnectionBase,
    grammar: Arc<MysqlGrammar>,
    con: Mutex<Option<Conn>>,
}

impl MysqlConnection {
    pub fn new(config: DbConfig) -> Self {
        let grammar = match &config.datetimeformat {
            Some(format) => MysqlGrammar::with_datetime_format(format),
            None => MysqlGrammar::new(),
        };
        Self {
            base: ConnectionBase::new(config),
            grammar: Arc::new(grammar),
            con: Mutex::new(None),
        }
    }
}

impl fmt::Debug for MysqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlConnection")
            .field("config", &self.base.config())
            .field("status", &self.base.status())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn connect(&self, config: Option<DbConfig>) -> OmsResult<()> {
        let config = self.base.prepare_connect(config)?;
        let mut con = self.con.lock().await;
        if let Some(old) = con.take() {
            let _ = old.disconnect().await;
        }

        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.as_deref().unwrap_or(DEFAULT_HOST))
            .tcp_port(config.port.unwrap_or(DEFAULT_PORT))
            .user(config.login.as_deref())
            .pass(config.password.as_deref())
            .db_name(Some(config.database.as_str()));

        match Conn::new(opts).await {
            Ok(native) => {
                *con = Some(native);
                self.base.set_status(DatabaseStatus::Ok);
                tracing::info!(
                    target: TARGET_CONNECTION,
                    db = "mysql",
                    database = %config.database,
                    "connected"
                );
                Ok(())
            }
            Err(err) => {
                let err = OmsError::from_mysql_error(err);
                let status = if err.is_missing_database() {
                    DatabaseStatus::MissingDatabase
                } else {
                    DatabaseStatus::Failure
                };
                self.base.set_status(status);
                tracing::warn!(target: TARGET_CONNECTION, db = "mysql", error = %err, "connect failed");
                Err(err)
            }
        }
    }

    async fn close(&self) {
        if let Some(con) = self.con.lock().await.take() {
            if let Err(err) = con.disconnect().await {
                tracing::warn!(target: TARGET_CONNECTION, db = "mysql", error = %err, "disconnect failed");
            }
            tracing::info!(target: TARGET_CONNECTION, db = "mysql", "closed");
        }
        self.base.set_status(DatabaseStatus::Closed);
    }

    async fn run(&self, query: &PreparedQuery) -> OmsResult<QueryResult> {
        let params = to_params(query)?;

        let mut guard = self.con.lock().await;
        let con = guard
            .as_mut()
            .ok_or_else(|| OmsError::connection("mysql connection is not open"))?;

        let my_rows: Vec<mysql_async::Row> = con
            .exec(query.sql.as_str(), params)
            .await
            .map_err(OmsError::from_mysql_error)?;
        if my_rows.is_empty() {
            return Ok(QueryResult {
                rows: Vec::new(),
                affected: con.affected_rows(),
            });
        }

        let columns: Vec<String> = my_rows[0]
            .columns_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        let rows = my_rows
            .iter()
            .map(|row| {
                let values = row
                    .columns_ref()
                    .iter()
                    .enumerate()
                    .map(|(idx, column)| {
                        let value = row.as_ref(idx).unwrap_or(&mysql_async::Value::NULL);
                        from_mysql(value, column.column_type(), &columns[idx])
                    })
                    .collect::<OmsResult<Vec<_>>>()?;
                Ok(Row::new(columns.clone(), values))
            })
            .collect::<OmsResult<Vec<_>>>()?;
        Ok(QueryResult { rows, affected: 0 })
    }

    fn db_type(&self) -> DatabaseType {
        DatabaseType::Mysql
    }

    fn status(&self) -> DatabaseStatus {
        self.base.status()
    }

    fn grammar(&self) -> Arc<dyn Grammar> {
        self.grammar.clone()
    }

    fn schema_grammar(&self) -> Arc<dyn SchemaGrammar> {
        self.grammar.clone()
    }

    fn config(&self) -> DbConfig {
        self.base.config()
    }
}

fn to_params(query: &PreparedQuery) -> OmsResult<Params> {
    match (query.params.is_empty(), query.named.is_empty()) {
        (true, true) => Ok(Params::Empty),
        (false, true) => Ok(Params::Positional(
            query
                .params
                .iter()
                .map(|(value, ty)| to_mysql(value, *ty))
                .collect::<OmsResult<_>>()?,
        )),
        (true, false) => Ok(Params::Named(
            query
                .named
                .iter()
                .map(|(name, value, ty)| {
                    let name = name.trim_start_matches(':').as_bytes().to_vec();
                    to_mysql(value, *ty).map(|value| (name, value))
                })
                .collect::<OmsResult<_>>()?,
        )),
        (false, false) => Err(OmsError::Unsupported(
            "MySQL statements cannot mix positional and named binds".to_string(),
        )),
    }
}

/// Integers bind natively, everything else as text.
fn to_mysql(value: &Value, ty: ParamType) -> OmsResult<mysql_async::Value> {
    match (ty, value) {
        (ParamType::Int, Value::Int(v)) => Ok(mysql_async::Value::Int(*v)),
        (ParamType::Str, Value::Str(s)) => Ok(mysql_async::Value::Bytes(s.as_bytes().to_vec())),
        (ParamType::Str, Value::Float(f)) => {
            Ok(mysql_async::Value::Bytes(f.to_string().into_bytes()))
        }
        (_, other) => Err(OmsError::BindType(other.kind().to_string())),
    }
}

/// Decode one binary-protocol value; zero dates decode as `Null`.
fn from_mysql(value: &mysql_async::Value, ty: ColumnType, column: &str) -> OmsResult<Value> {
    use mysql_async::Value as My;

    Ok(match value {
        My::NULL => Value::Null,
        My::Int(v) => Value::Int(*v),
        My::UInt(v) => i64::try_from(*v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Str(v.to_string())),
        My::Float(v) => Value::from(*v),
        My::Double(v) => Value::Float(*v),
        My::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .and_then(|d| {
                    d.and_hms_micro_opt(
                        u32::from(*hour),
                        u32::from(*minute),
                        u32::from(*second),
                        *micros,
                    )
                })
                .map_or(Value::Null, Value::DateTime)
        }
        My::Time(negative, days, hours, minutes, seconds, _) => {
            let hours = u64::from(*days) * 24 + u64::from(*hours);
            let sign = if *negative { "-" } else { "" };
            Value::Str(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"))
        }
        My::Bytes(bytes) if ty == ColumnType::MYSQL_TYPE_JSON => {
            Value::Json(serde_json::from_slice(bytes)?)
        }
        My::Bytes(bytes) => Value::Str(String::from_utf8(bytes.clone()).map_err(|_| {
            OmsError::Serialization(format!("column '{column}' holds binary data"))
        })?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CompiledQuery;

    fn prepared(params: Vec<Value>, named: Vec<(&str, Value)>) -> PreparedQuery {
        let mut compiled = CompiledQuery::new("SELECT 1");
        compiled.params = params;
        compiled.named = named.into_iter().map(|(n, v)| (n.to_string(), v)).collect();
        compiled.prepare().unwrap()
    }

    #[test]
    fn params_are_positional_or_named() {
        assert!(matches!(to_params(&prepared(vec![], vec![])), Ok(Params::Empty)));

        let Params::Positional(values) =
            to_params(&prepared(vec![Value::Int(3), Value::Float(1.5)], vec![])).unwrap()
        else {
            panic!("expected positional params");
        };
        assert_eq!(
            values,
            vec![mysql_async::Value::Int(3), mysql_async::Value::Bytes(b"1.5".to_vec())]
        );

        let Params::Named(named) =
            to_params(&prepared(vec![], vec![(":login", Value::from("admin"))])).unwrap()
        else {
            panic!("expected named params");
        };
        assert_eq!(
            named.get(b"login".as_slice()),
            Some(&mysql_async::Value::Bytes(b"admin".to_vec()))
        );

        let mixed = prepared(vec![Value::Int(1)], vec![("login", Value::from("a"))]);
        assert!(matches!(to_params(&mixed), Err(OmsError::Unsupported(_))));
    }

    #[test]
    fn decodes_binary_protocol_values() {
        use mysql_async::Value as My;
        let text = ColumnType::MYSQL_TYPE_VAR_STRING;

        assert_eq!(from_mysql(&My::NULL, text, "c").unwrap(), Value::Null);
        assert_eq!(from_mysql(&My::UInt(7), text, "c").unwrap(), Value::Int(7));
        assert_eq!(
            from_mysql(&My::UInt(u64::MAX), text, "c").unwrap(),
            Value::from(u64::MAX.to_string())
        );
        assert_eq!(
            from_mysql(&My::Bytes(b"abc".to_vec()), text, "c").unwrap(),
            Value::from("abc")
        );
        assert!(from_mysql(&My::Bytes(vec![0xff, 0xfe]), text, "c").is_err());
        assert_eq!(
            from_mysql(&My::Bytes(b"{\"a\":1}".to_vec()), ColumnType::MYSQL_TYPE_JSON, "c").unwrap(),
            Value::Json(serde_json::json!({"a": 1}))
        );

        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        assert_eq!(
            from_mysql(&My::Date(2024, 1, 2, 3, 4, 5, 0), ColumnType::MYSQL_TYPE_DATETIME, "c")
                .unwrap(),
            Value::DateTime(dt)
        );
        assert_eq!(
            from_mysql(&My::Date(0, 0, 0, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATETIME, "c")
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            from_mysql(&My::Time(true, 1, 2, 3, 4, 0), ColumnType::MYSQL_TYPE_TIME, "c").unwrap(),
            Value::from("-26:03:04")
        );
    }

    #[tokio::test]
    async fn closed_connection_rejects_statements() {
        let con = MysqlConnection::new(DbConfig::new("mysql", "oms").password("pw"));
        assert_eq!(con.config().password.as_deref(), Some("****"));
        assert_eq!(con.status(), DatabaseStatus::Closed);
        let err = con.run(&prepared(vec![], vec![])).await.unwrap_err();
        assert!(matches!(err, OmsError::Connection(_)));
    }
}
