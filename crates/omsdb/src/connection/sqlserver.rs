use super::{Connection, ConnectionBase, DatabaseStatus, DatabaseType};
use crate::config::DbConfig;
use crate::error::{OmsError, OmsResult};
use crate::log::TARGET_CONNECTION;
use crate::query::{Grammar, MicrosoftGrammar, PreparedQuery};
use crate::row::{QueryResult, Row};
use crate::schema::SchemaGrammar;
use crate::value::{ParamType, Value};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::sync::Arc;
use tiberius::{AuthMethod, Client, ColumnData, FromSql, Query};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 1433;

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server connection over `tiberius`.
///
/// Statements starting with `SELECT` or `WITH` are read as row sets; anything
/// else reports the affected row count. Named binds are not supported.
pub struct SqlServerConnection {
    base: ConnectionBase,
    grammar: Arc<MicrosoftGrammar>,
    client: Mutex<Option<TdsClient>>,
}

impl SqlServerConnection {
    pub fn new(config: DbConfig) -> Self {
        let grammar = match &config.datetimeformat {
            Some(format) => MicrosoftGrammar::with_datetime_format(format),
            None => MicrosoftGrammar::new(),
        };
        Self {
            base: ConnectionBase::new(config),
            grammar: Arc::new(grammar),
            client: Mutex::new(None),
        }
    }

    async fn open(config: &DbConfig) -> OmsResult<TdsClient> {
        let login = config
            .login
            .as_deref()
            .ok_or_else(|| OmsError::InvalidConfig("login".to_string()))?;

        let mut tds = tiberius::Config::new();
        tds.host(config.host.as_deref().unwrap_or(DEFAULT_HOST));
        tds.port(config.port.unwrap_or(DEFAULT_PORT));
        tds.database(&config.database);
        tds.authentication(AuthMethod::sql_server(
            login,
            config.password.as_deref().unwrap_or_default(),
        ));
        tds.trust_cert();

        let tcp = TcpStream::connect(tds.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Client::connect(tds, tcp.compat_write())
            .await
            .map_err(OmsError::from_mssql_error)
    }
}

impl fmt::Debug for SqlServerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlServerConnection")
            .field("config", &self.base.config())
            .field("status", &self.base.status())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SqlServerConnection {
    async fn connect(&self, config: Option<DbConfig>) -> OmsResult<()> {
        let config = self.base.prepare_connect(config)?;
        let mut client = self.client.lock().await;
        *client = None;

        match Self::open(&config).await {
            Ok(tds) => {
                *client = Some(tds);
                self.base.set_status(DatabaseStatus::Ok);
                tracing::info!(
                    target: TARGET_CONNECTION,
                    db = "sqlsrv",
                    database = %config.database,
                    "connected"
                );
                Ok(())
            }
            Err(err) => {
                let status = if err.is_missing_database() {
                    DatabaseStatus::MissingDatabase
                } else {
                    DatabaseStatus::Failure
                };
                self.base.set_status(status);
                tracing::warn!(target: TARGET_CONNECTION, db = "sqlsrv", error = %err, "connect failed");
                Err(err)
            }
        }
    }

    async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(err) = client.close().await {
                tracing::warn!(target: TARGET_CONNECTION, db = "sqlsrv", error = %err, "close failed");
            }
            tracing::info!(target: TARGET_CONNECTION, db = "sqlsrv", "closed");
        }
        self.base.set_status(DatabaseStatus::Closed);
    }

    async fn run(&self, query: &PreparedQuery) -> OmsResult<QueryResult> {
        if !query.named.is_empty() {
            return Err(OmsError::Unsupported(
                "named binds are not supported by SQL Server; use positional binds".to_string(),
            ));
        }

        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| OmsError::connection("sqlsrv connection is not open"))?;

        let mut statement = Query::new(query.sql.as_str());
        for (value, ty) in &query.params {
            match (ty, value) {
                (ParamType::Int, Value::Int(v)) => statement.bind(*v),
                (ParamType::Str, Value::Str(s)) => statement.bind(s.as_str()),
                (ParamType::Str, Value::Float(f)) => statement.bind(f.to_string()),
                (_, other) => return Err(OmsError::BindType(other.kind().to_string())),
            }
        }

        if !returns_rows(&query.sql) {
            let result = statement
                .execute(client)
                .await
                .map_err(OmsError::from_mssql_error)?;
            return Ok(QueryResult {
                rows: Vec::new(),
                affected: result.total(),
            });
        }

        let tds_rows = statement
            .query(client)
            .await
            .map_err(OmsError::from_mssql_error)?
            .into_first_result()
            .await
            .map_err(OmsError::from_mssql_error)?;
        let rows = tds_rows
            .into_iter()
            .map(|row| {
                let columns: Vec<String> =
                    row.columns().iter().map(|c| c.name().to_string()).collect();
                let values = row
                    .into_iter()
                    .zip(&columns)
                    .map(|(data, column)| from_mssql(data, column))
                    .collect::<OmsResult<Vec<_>>>()?;
                Ok(Row::new(columns, values))
            })
            .collect::<OmsResult<Vec<_>>>()?;
        Ok(QueryResult { rows, affected: 0 })
    }

    fn db_type(&self) -> DatabaseType {
        DatabaseType::Sqlsrv
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

/// Whether `sql` yields a row set.
fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    keyword.eq_ignore_ascii_case("select") || keyword.eq_ignore_ascii_case("with")
}

fn from_mssql(data: ColumnData<'static>, column: &str) -> OmsResult<Value> {
    let value = match data {
        ColumnData::U8(v) => v.map(Value::from),
        ColumnData::I16(v) => v.map(Value::from),
        ColumnData::I32(v) => v.map(Value::from),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(Value::from),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.map(|s| Value::Str(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::Str(g.to_string())),
        ColumnData::Numeric(v) => v.map(|n| Value::Str(n.to_string())),
        other => decode_temporal(&other).ok_or_else(|| {
            OmsError::Serialization(format!("column '{column}' has an unsupported type"))
        })?,
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Date and time columns as [`Value::DateTime`]; `None` for other types.
fn decode_temporal(data: &ColumnData<'static>) -> Option<Option<Value>> {
    if let Ok(dt) = NaiveDateTime::from_sql(data) {
        return Some(dt.map(Value::DateTime));
    }
    let date = NaiveDate::from_sql(data).ok()?;
    Some(date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(Value::DateTime))
}
