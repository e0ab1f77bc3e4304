use super::{DEFAULT_DATETIME_FORMAT, Grammar};

/// PostgreSQL grammar: numbered `$n` placeholders.
#[derive(Clone, Debug)]
pub struct PostgresGrammar {
    datetime_format: String,
}

impl PostgresGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datetime_format(format: impl Into<String>) -> Self {
        Self {
            datetime_format: format.into(),
        }
    }
}

impl Default for PostgresGrammar {
    fn default() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }
}

impl Grammar for PostgresGrammar {
    fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    fn placeholder(&self, idx: usize) -> String {
        format!("${idx}")
    }
}
