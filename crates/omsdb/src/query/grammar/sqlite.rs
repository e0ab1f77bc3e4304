use super::{DEFAULT_DATETIME_FORMAT, Grammar};

/// SQLite grammar.
#[derive(Clone, Debug)]
pub struct SqliteGrammar {
    datetime_format: String,
}

impl SqliteGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datetime_format(format: impl Into<String>) -> Self {
        Self {
            datetime_format: format.into(),
        }
    }
}

impl Default for SqliteGrammar {
    fn default() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }
}

impl Grammar for SqliteGrammar {
    fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    // SQLite locks the whole database file; there is no row lock syntax.
    fn lock_clause(&self) -> &'static str {
        ""
    }

    fn compile_limit(&self, limit: Option<u64>, offset: Option<u64>, _has_order: bool) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (None, Some(offset)) => format!("LIMIT -1 OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }
}
