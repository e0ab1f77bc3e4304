use super::{DEFAULT_DATETIME_FORMAT, Grammar, push_non_empty};
use crate::error::OmsResult;
use crate::query::Builder;
use crate::value::ParamList;

/// Microsoft SQL Server grammar.
///
/// Uses `@Pn` placeholders and `OFFSET ... FETCH` paging. `random` selects with
/// `TOP n` (one row unless a limit is set) ordered by `NEWID()`.
#[derive(Clone, Debug)]
pub struct MicrosoftGrammar {
    datetime_format: String,
}

impl MicrosoftGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datetime_format(format: impl Into<String>) -> Self {
        Self {
            datetime_format: format.into(),
        }
    }
}

impl Default for MicrosoftGrammar {
    fn default() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }
}

impl Grammar for MicrosoftGrammar {
    fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    fn placeholder(&self, idx: usize) -> String {
        format!("@P{idx}")
    }

    fn random_order(&self) -> &'static str {
        "NEWID()"
    }

    // Row locks are table hints in T-SQL.
    fn lock_clause(&self) -> &'static str {
        ""
    }

    fn compile_random(&self, query: &Builder, params: &mut ParamList) -> OmsResult<String> {
        let top = query.limit.unwrap_or(1);
        let selects = self.compile_selects(query, params)?;
        let columns = selects
            .strip_prefix("SELECT DISTINCT ")
            .map(|cols| format!("SELECT DISTINCT TOP {top} {cols}"))
            .or_else(|| {
                selects
                    .strip_prefix("SELECT ")
                    .map(|cols| format!("SELECT TOP {top} {cols}"))
            })
            .unwrap_or(selects);

        let mut parts = vec![columns];
        push_non_empty(&mut parts, self.compile_from(query, params)?);
        push_non_empty(&mut parts, self.compile_joins(query, params)?);
        push_non_empty(&mut parts, self.compile_wheres(query, params)?);
        parts.push(format!("ORDER BY {}", self.random_order()));
        Ok(parts.join(" "))
    }

    // OFFSET/FETCH is only valid after ORDER BY.
    fn compile_limit(&self, limit: Option<u64>, offset: Option<u64>, has_order: bool) -> String {
        if limit.is_none() && offset.is_none() {
            return String::new();
        }
        let mut sql = String::new();
        if !has_order {
            sql.push_str("ORDER BY (SELECT NULL) ");
        }
        sql.push_str(&format!("OFFSET {} ROWS", offset.unwrap_or(0)));
        if let Some(limit) = limit {
            sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
        }
        sql
    }
}
