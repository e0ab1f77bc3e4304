use super::{DEFAULT_DATETIME_FORMAT, Grammar};

/// MySQL / MariaDB grammar.
#[derive(Clone, Debug)]
pub struct MysqlGrammar {
    datetime_format: String,
}

impl MysqlGrammar {
    /// Largest row count MySQL accepts; used for offset-only queries.
    pub const MAX_ROWS: u64 = u64::MAX;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datetime_format(format: impl Into<String>) -> Self {
        Self {
            datetime_format: format.into(),
        }
    }
}

impl Default for MysqlGrammar {
    fn default() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }
}

impl Grammar for MysqlGrammar {
    fn system_identifier(&self) -> char {
        '`'
    }

    fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    fn random_order(&self) -> &'static str {
        "RAND()"
    }

    // MySQL has no bare OFFSET.
    fn compile_limit(&self, limit: Option<u64>, offset: Option<u64>, _has_order: bool) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (None, Some(offset)) => format!("LIMIT {} OFFSET {offset}", Self::MAX_ROWS),
            (None, None) => String::new(),
        }
    }
}
