use super::{Connection, ConnectionBase, DatabaseStatus, DatabaseType};
use crate::config::DbConfig;
use crate::error::{OmsError, OmsResult};
use crate::log::TARGET_CONNECTION;
use crate::query::{Grammar, PreparedQuery, SqliteGrammar};
use crate::row::{QueryResult, Row};
use crate::schema::SchemaGrammar;
use crate::value::{ParamType, Value};
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory database name accepted without a file check.
const MEMORY: &str = ":memory:";

/// SQLite connection over `rusqlite`.
///
/// `database` is the file path. A missing file is not created: the status
/// becomes [`DatabaseStatus::MissingDatabase`] and no handle is opened.
pub struct SqliteConnection {
    base: ConnectionBase,
    grammar: Arc<SqliteGrammar>,
    con: Mutex<Option<rusqlite::Connection>>,
}

impl SqliteConnection {
    pub fn new(config: DbConfig) -> Self {
        let grammar = match &config.datetimeformat {
            Some(format) => SqliteGrammar::with_datetime_format(format),
            None => SqliteGrammar::new(),
        };
        Self {
            base: ConnectionBase::new(config),
            grammar: Arc::new(grammar),
            con: Mutex::new(None),
        }
    }

    fn handle(&self) -> MutexGuard<'_, Option<rusqlite::Connection>> {
        self.con.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("config", &self.base.config())
            .field("status", &self.base.status())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn connect(&self, config: Option<DbConfig>) -> OmsResult<()> {
        let config = self.base.prepare_connect(config)?;
        let mut handle = self.handle();
        *handle = None;

        if config.database != MEMORY && !Path::new(&config.database).exists() {
            self.base.set_status(DatabaseStatus::MissingDatabase);
            tracing::warn!(
                target: TARGET_CONNECTION,
                db = "sqlite",
                database = %config.database,
                "database file does not exist"
            );
            return Err(OmsError::MissingDatabase(config.database));
        }

        match rusqlite::Connection::open(&config.database) {
            Ok(con) => {
                *handle = Some(con);
                self.base.set_status(DatabaseStatus::Ok);
                tracing::info!(
                    target: TARGET_CONNECTION,
                    db = "sqlite",
                    database = %config.database,
                    "connected"
                );
                Ok(())
            }
            Err(err) => {
                self.base.set_status(DatabaseStatus::Failure);
                tracing::warn!(target: TARGET_CONNECTION, db = "sqlite", error = %err, "connect failed");
                Err(err.into())
            }
        }
    }

    async fn close(&self) {
        if self.handle().take().is_some() {
            tracing::info!(target: TARGET_CONNECTION, db = "sqlite", "closed");
        }
        self.base.set_status(DatabaseStatus::Closed);
    }

    async fn run(&self, query: &PreparedQuery) -> OmsResult<QueryResult> {
        let handle = self.handle();
        let con = handle
            .as_ref()
            .ok_or_else(|| OmsError::connection("sqlite connection is not open"))?;
        execute(con, query)
    }

    fn db_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
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

fn execute(con: &rusqlite::Connection, query: &PreparedQuery) -> OmsResult<QueryResult> {
    let mut stmt = con.prepare(&query.sql)?;

    for (i, (value, ty)) in query.params.iter().enumerate() {
        stmt.raw_bind_parameter(i + 1, to_sqlite(value, *ty)?)?;
    }
    for (name, value, ty) in &query.named {
        let key = if name.starts_with([':', '@', '$']) {
            name.clone()
        } else {
            format!(":{name}")
        };
        let idx = stmt
            .parameter_index(&key)?
            .ok_or_else(|| OmsError::invalid_argument(format!("unknown bind name '{name}'")))?;
        stmt.raw_bind_parameter(idx, to_sqlite(value, *ty)?)?;
    }

    if stmt.column_count() == 0 {
        let affected = stmt.raw_execute()?;
        return Ok(QueryResult {
            rows: Vec::new(),
            affected: affected as u64,
        });
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    let mut raw = stmt.raw_query();
    while let Some(row) = raw.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(from_sqlite(row.get_ref(idx)?));
        }
        rows.push(Row::new(columns.clone(), values));
    }
    Ok(QueryResult { rows, affected: 0 })
}

/// Bind integers natively and everything else as text.
fn to_sqlite(value: &Value, ty: ParamType) -> OmsResult<ToSqlOutput<'_>> {
    match (ty, value) {
        (ParamType::Int, Value::Int(v)) => Ok(ToSqlOutput::from(*v)),
        (ParamType::Str, Value::Str(s)) => Ok(ToSqlOutput::from(s.as_str())),
        (ParamType::Str, Value::Float(f)) => Ok(ToSqlOutput::from(f.to_string())),
        (_, other) => Err(OmsError::BindType(other.kind().to_string())),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Str(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
