use super::{Connection, ConnectionBase, DatabaseStatus, DatabaseType};
use crate::config::DbConfig;
use crate::error::{OmsError, OmsResult};
use crate::log::TARGET_CONNECTION;
use crate::query::{Grammar, PostgresGrammar, PreparedQuery};
use crate::row::{QueryResult, Row};
use crate::schema::SchemaGrammar;
use crate::value::{ParamType, Value};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// PostgreSQL connection over `tokio-postgres`.
///
/// The driver's connection future is spawned on the current tokio runtime.
pub struct PostgresConnection {
    base: ConnectionBase,
    grammar: Arc<PostgresGrammar>,
    client: Mutex<Option<Client>>,
}

impl PostgresConnection {
    pub fn new(config: DbConfig) -> Self {
        let grammar = match &config.datetimeformat {
            Some(format) => PostgresGrammar::with_datetime_format(format),
            None => PostgresGrammar::new(),
        };
        Self {
            base: ConnectionBase::new(config),
            grammar: Arc::new(grammar),
            client: Mutex::new(None),
        }
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("config", &self.base.config())
            .field("status", &self.base.status())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn connect(&self, config: Option<DbConfig>) -> OmsResult<()> {
        let config = self.base.prepare_connect(config)?;
        let mut client = self.client.lock().await;
        *client = None;

        let mut pg = tokio_postgres::Config::new();
        pg.host(config.host.as_deref().unwrap_or(DEFAULT_HOST))
            .port(config.port.unwrap_or(DEFAULT_PORT))
            .dbname(&config.database);
        if let Some(login) = &config.login {
            pg.user(login);
        }
        if let Some(password) = &config.password {
            pg.password(password);
        }

        match pg.connect(NoTls).await {
            Ok((pg_client, connection)) => {
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        tracing::error!(target: TARGET_CONNECTION, db = "pgsql", error = %err, "connection task failed");
                    }
                });
                *client = Some(pg_client);
                self.base.set_status(DatabaseStatus::Ok);
                tracing::info!(
                    target: TARGET_CONNECTION,
                    db = "pgsql",
                    database = %config.database,
                    "connected"
                );
                Ok(())
            }
            Err(err) => {
                let err = OmsError::from_pg_error(err);
                let status = if err.is_missing_database() {
                    DatabaseStatus::MissingDatabase
                } else {
                    DatabaseStatus::Failure
                };
                self.base.set_status(status);
                tracing::warn!(target: TARGET_CONNECTION, db = "pgsql", error = %err, "connect failed");
                Err(err)
            }
        }
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            tracing::info!(target: TARGET_CONNECTION, db = "pgsql", "closed");
        }
        self.base.set_status(DatabaseStatus::Closed);
    }

    async fn run(&self, query: &PreparedQuery) -> OmsResult<QueryResult> {
        if !query.named.is_empty() {
            return Err(OmsError::Unsupported(
                "named binds are not supported by PostgreSQL; use positional binds".to_string(),
            ));
        }

        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| OmsError::connection("postgres connection is not open"))?;

        let stmt = client
            .prepare(&query.sql)
            .await
            .map_err(OmsError::from_pg_error)?;
        let params: Vec<PgParam<'_>> = query
            .params
            .iter()
            .map(|(value, ty)| PgParam { value, ty: *ty })
            .collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        if stmt.columns().is_empty() {
            let affected = client
                .execute(&stmt, &refs)
                .await
                .map_err(OmsError::from_pg_error)?;
            return Ok(QueryResult {
                rows: Vec::new(),
                affected,
            });
        }

        let pg_rows = client
            .query(&stmt, &refs)
            .await
            .map_err(OmsError::from_pg_error)?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = pg_rows
            .iter()
            .map(|row| {
                let values = (0..columns.len())
                    .map(|idx| from_pg(row, idx))
                    .collect::<OmsResult<Vec<_>>>()?;
                Ok(Row::new(columns.clone(), values))
            })
            .collect::<OmsResult<Vec<_>>>()?;
        Ok(QueryResult { rows, affected: 0 })
    }

    fn db_type(&self) -> DatabaseType {
        DatabaseType::Pgsql
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

/// Positional parameter adapted to the type the server inferred for it.
///
/// Integers are written as the integer width the statement expects; strings
/// (and floats, which bind as strings) are parsed into numeric, boolean, JSON or
/// date types when the placeholder has one of those types.
#[derive(Debug)]
struct PgParam<'a> {
    value: &'a Value,
    ty: ParamType,
}

impl PgParam<'_> {
    fn text(&self) -> Result<String, Box<dyn Error + Sync + Send>> {
        match self.value {
            Value::Str(s) => Ok(s.clone()),
            Value::Float(f) => Ok(f.to_string()),
            other => Err(format!("cannot bind {} value as string", other.kind()).into()),
        }
    }
}

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.ty {
            ParamType::Int => {
                let v = self
                    .value
                    .as_i64()
                    .ok_or_else(|| format!("cannot bind {} value as int", self.value.kind()))?;
                match *ty {
                    Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
                    Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
                    Type::INT8 => v.to_sql(ty, out),
                    Type::FLOAT4 => (v as f32).to_sql(ty, out),
                    Type::FLOAT8 => (v as f64).to_sql(ty, out),
                    Type::BOOL => (v != 0).to_sql(ty, out),
                    Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                        v.to_string().to_sql(ty, out)
                    }
                    _ => Err(format!("cannot bind int to parameter of type {ty}").into()),
                }
            }
            ParamType::Str => {
                let text = self.text()?;
                match *ty {
                    Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                        text.to_sql(ty, out)
                    }
                    Type::INT2 => text.trim().parse::<i16>()?.to_sql(ty, out),
                    Type::INT4 => text.trim().parse::<i32>()?.to_sql(ty, out),
                    Type::INT8 => text.trim().parse::<i64>()?.to_sql(ty, out),
                    Type::FLOAT4 => text.trim().parse::<f32>()?.to_sql(ty, out),
                    Type::FLOAT8 => text.trim().parse::<f64>()?.to_sql(ty, out),
                    Type::BOOL => matches!(text.trim(), "1" | "t" | "true" | "TRUE").to_sql(ty, out),
                    Type::JSON | Type::JSONB => {
                        serde_json::from_str::<serde_json::Value>(&text)?.to_sql(ty, out)
                    }
                    Type::TIMESTAMP => parse_timestamp(&text)?.to_sql(ty, out),
                    Type::TIMESTAMPTZ => parse_timestamp(&text)?.and_utc().to_sql(ty, out),
                    Type::DATE => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")?.to_sql(ty, out),
                    _ => Err(format!("cannot bind string to parameter of type {ty}").into()),
                }
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
}

/// Decode one column into a [`Value`].
fn from_pg(row: &tokio_postgres::Row, idx: usize) -> OmsResult<Value> {
    let ty = row.columns()[idx].type_().clone();
    let value = match ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Value::DateTime),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|dt| Value::DateTime(dt.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::DateTime),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(Value::Json),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map_err(|_| {
                OmsError::Serialization(format!(
                    "column '{}' has unsupported type {ty}",
                    row.columns()[idx].name()
                ))
            })?
            .map(Value::Str),
    };
    Ok(value.unwrap_or(Value::Null))
}
