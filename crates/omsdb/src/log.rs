//! `tracing` helpers.
//!
//! Events use the targets below so applications can filter them, e.g.
//! `RUST_LOG=omsdb.sql=debug`.

use crate::connection::DatabaseType;

/// Target for executed statements.
pub const TARGET_SQL: &str = "omsdb.sql";
/// Target for connect/close events.
pub const TARGET_CONNECTION: &str = "omsdb.connection";
/// Target for cache events.
pub const TARGET_CACHE: &str = "omsdb.cache";

/// Longest SQL text (in bytes) written to a log field.
pub const MAX_SQL_LOG_LENGTH: usize = 200;

/// Truncate to at most `max_bytes`, respecting UTF-8 boundaries.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

pub(crate) fn truncate_sql(sql: &str) -> String {
    if sql.len() > MAX_SQL_LOG_LENGTH {
        format!("{}...", truncate_sql_bytes(sql, MAX_SQL_LOG_LENGTH))
    } else {
        sql.to_string()
    }
}

/// Emit the statement about to be executed.
pub(crate) fn trace_sql(db_type: DatabaseType, sql: &str, param_count: usize) {
    tracing::debug!(
        target: TARGET_SQL,
        db = db_type.as_str(),
        param_count,
        sql = %truncate_sql(sql),
        "executing statement"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql_bytes("short", 200), "short");
    }

    #[test]
    fn long_sql_gets_ellipsis() {
        let sql = "x".repeat(MAX_SQL_LOG_LENGTH + 10);
        let logged = truncate_sql(&sql);
        assert!(logged.ends_with("..."));
        assert_eq!(logged.len(), MAX_SQL_LOG_LENGTH + 3);
    }
}
