//! Named single-assignment registries for connections.

use crate::config::{AppConfig, DbConfig};
use crate::connection::{Connection, ConnectionFactory, NullConnection};
use crate::error::OmsResult;
use std::sync::Arc;

/// Insertion-ordered map that never overwrites an existing key.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value`; returns `false` and keeps the old entry if `key` exists.
    pub fn add(&mut self, key: &str, value: T) -> bool {
        if self.contains(key) {
            return false;
        }
        self.entries.push((key.to_string(), value));
        true
    }

    /// Remove and return the entry for `key`.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Entry for `key`; the empty key returns the first-inserted entry.
    pub fn get(&self, key: &str) -> Option<&T> {
        if key.is_empty() {
            return self.entries.first().map(|(_, v)| v);
        }
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Named database connections, e.g. `"core"`, `"select"`, `"schema"`.
#[derive(Debug, Default)]
pub struct DatabasePool {
    pool: Registry<Arc<dyn Connection>>,
}

impl DatabasePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing connection; `false` if `key` is taken.
    pub fn add(&mut self, key: &str, connection: Arc<dyn Connection>) -> bool {
        self.pool.add(key, connection)
    }

    /// Create (without opening) a connection from `config` and register it.
    ///
    /// Returns `Ok(false)` if `key` is taken; nothing is created in that case.
    pub fn create(&mut self, key: &str, config: &DbConfig) -> OmsResult<bool> {
        if self.pool.contains(key) {
            return Ok(false);
        }
        let connection = ConnectionFactory::create(config)?;
        Ok(self.pool.add(key, connection))
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.pool.remove(key).is_some()
    }

    /// Connection for `key` (first one for `""`), or a [`NullConnection`].
    pub fn get(&self, key: &str) -> Arc<dyn Connection> {
        match self.pool.get(key) {
            Some(connection) => Arc::clone(connection),
            None => Arc::new(NullConnection::new()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pool.contains(key)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Build a pool from the `[db.*]` sections of an app config (in key order).
    pub fn from_config(config: &AppConfig) -> OmsResult<Self> {
        let mut pool = Self::new();
        for (key, db) in &config.db {
            pool.create(key, db)?;
        }
        Ok(pool)
    }

    /// Open every registered connection, stopping at the first failure.
    pub async fn connect_all(&self) -> OmsResult<()> {
        for connection in self.pool.entries.iter().map(|(_, c)| c) {
            connection.connect(None).await?;
        }
        Ok(())
    }

    /// Close every registered connection.
    pub async fn close_all(&self) {
        for connection in self.pool.entries.iter().map(|(_, c)| c) {
            connection.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{DatabaseType, SqliteConnection};

    fn sqlite(database: &str) -> Arc<dyn Connection> {
        Arc::new(SqliteConnection::new(DbConfig::new("sqlite", database)))
    }

    #[test]
    fn add_never_overwrites() {
        let mut pool = DatabasePool::new();
        assert!(pool.add("core", sqlite("first.sqlite")));
        assert!(!pool.add("core", sqlite("second.sqlite")));
        assert_eq!(pool.get("core").database(), "first.sqlite");

        assert!(pool.remove("core"));
        assert!(!pool.remove("core"));
        assert!(pool.add("core", sqlite("second.sqlite")));
        assert_eq!(pool.get("core").database(), "second.sqlite");
    }

    #[test]
    fn empty_key_returns_first_entry() {
        let mut pool = DatabasePool::new();
        pool.add("a", sqlite("a.sqlite"));
        pool.add("b", sqlite("b.sqlite"));
        assert_eq!(pool.get("").database(), "a.sqlite");
    }

    #[test]
    fn unknown_key_returns_null_connection() {
        let pool = DatabasePool::new();
        let connection = pool.get("missing");
        assert_eq!(connection.db_type(), DatabaseType::Undefined);
        assert!(pool.is_empty());
    }

    #[test]
    fn create_rejects_unknown_dialect_and_taken_keys() {
        let mut pool = DatabasePool::new();
        assert!(pool.create("core", &DbConfig::new("sqlite", "oms.sqlite")).unwrap());
        assert!(!pool.create("core", &DbConfig::new("oracle", "oms")).unwrap());
        assert!(pool.create("other", &DbConfig::new("oracle", "oms")).is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn registry_keeps_insertion_order() {
        let mut registry = Registry::new();
        registry.add("z", 1);
        registry.add("a", 2);
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(registry.remove("z"), Some(1));
        assert_eq!(registry.get(""), Some(&2));
    }
}
