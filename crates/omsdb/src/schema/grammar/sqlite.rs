use super::SchemaGrammar;
use crate::error::{OmsError, OmsResult};
use crate::query::{Grammar, SqliteGrammar};
use crate::value::ParamList;

impl SchemaGrammar for SqliteGrammar {
    fn auto_increment_clause(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    // AUTOINCREMENT is only valid on an `INTEGER PRIMARY KEY` column.
    fn inline_auto_increment_key(&self) -> bool {
        true
    }

    fn compile_drop_database(&self, _database: &str) -> OmsResult<String> {
        Err(OmsError::Unsupported(
            "sqlite databases are files and cannot be dropped with SQL".to_string(),
        ))
    }

    fn compile_tables(&self, _database: &str, _params: &mut ParamList) -> String {
        "SELECT name AS table_name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name".to_string()
    }

    fn compile_fields(&self, _database: &str, table: &str, _params: &mut ParamList) -> String {
        format!("PRAGMA table_info({})", self.quote_part(table))
    }
}
