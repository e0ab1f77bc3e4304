use super::{Connection, DatabaseStatus, DatabaseType};
use crate::config::DbConfig;
use crate::error::{OmsError, OmsResult};
use crate::query::{AnsiGrammar, Grammar, PreparedQuery};
use crate::row::QueryResult;
use crate::schema::SchemaGrammar;
use async_trait::async_trait;
use std::sync::Arc;

/// Stand-in returned for unknown pool keys.
///
/// Always closed; builders on it still compile with the base grammar.
#[derive(Debug, Default)]
pub struct NullConnection {
    grammar: Arc<AnsiGrammar>,
}

impl NullConnection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connection for NullConnection {
    async fn connect(&self, _config: Option<DbConfig>) -> OmsResult<()> {
        Err(OmsError::connection("null connection cannot connect"))
    }

    async fn close(&self) {}

    async fn run(&self, _query: &PreparedQuery) -> OmsResult<QueryResult> {
        Err(OmsError::connection("null connection cannot run queries"))
    }

    fn db_type(&self) -> DatabaseType {
        DatabaseType::Undefined
    }

    fn status(&self) -> DatabaseStatus {
        DatabaseStatus::Closed
    }

    fn grammar(&self) -> Arc<dyn Grammar> {
        self.grammar.clone()
    }

    fn schema_grammar(&self) -> Arc<dyn SchemaGrammar> {
        self.grammar.clone()
    }

    fn config(&self) -> DbConfig {
        DbConfig::default()
    }
}
