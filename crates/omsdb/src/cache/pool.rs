use super::{Cache, DEFAULT_MEMCACHE_PORT, FileCache, MemCache, NullCache};
use crate::config::{AppConfig, CacheConfig, CacheType};
use crate::error::{OmsError, OmsResult};
use crate::log::TARGET_CACHE;
use crate::pool::Registry;
use std::sync::Arc;

/// Builds cache backends from configuration.
pub struct CacheFactory;

impl CacheFactory {
    pub fn create(config: &CacheConfig) -> OmsResult<Arc<dyn Cache>> {
        config.validate()?;
        match config.kind {
            CacheType::File => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or_else(|| OmsError::InvalidConfig("path".to_string()))?;
                let cache = FileCache::new(path)?;
                tracing::info!(target: TARGET_CACHE, path = %cache.path().display(), "file cache ready");
                Ok(Arc::new(cache))
            }
            CacheType::Memcache => {
                let host = config
                    .host
                    .as_deref()
                    .ok_or_else(|| OmsError::InvalidConfig("host".to_string()))?;
                let port = config.port.unwrap_or(DEFAULT_MEMCACHE_PORT);
                let cache = MemCache::connect(host, port, config.timeout)?;
                tracing::info!(target: TARGET_CACHE, server = %cache.server(), "memcache ready");
                Ok(Arc::new(cache))
            }
            CacheType::Null => Ok(Arc::new(NullCache::new())),
        }
    }
}

/// Named caches.
#[derive(Debug, Default)]
pub struct CachePool {
    pool: Registry<Arc<dyn Cache>>,
}

impl CachePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing cache; `false` if `key` is taken.
    pub fn add(&mut self, key: &str, cache: Arc<dyn Cache>) -> bool {
        self.pool.add(key, cache)
    }

    /// Create a cache from `config` and register it; `Ok(false)` if `key` is taken.
    pub fn create(&mut self, key: &str, config: &CacheConfig) -> OmsResult<bool> {
        if self.pool.contains(key) {
            return Ok(false);
        }
        let cache = CacheFactory::create(config)?;
        Ok(self.pool.add(key, cache))
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.pool.remove(key).is_some()
    }

    /// Cache for `key` (first one for `""`).
    pub fn get(&self, key: &str) -> Option<Arc<dyn Cache>> {
        self.pool.get(key).map(Arc::clone)
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

    /// Build a pool from the `[cache.*]` sections of an app config.
    pub fn from_config(config: &AppConfig) -> OmsResult<Self> {
        let mut pool = Self::new();
        for (key, cache) in &config.cache {
            pool.create(key, cache)?;
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStatus, CacheValue, NEVER};

    #[test]
    fn file_cache_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = CachePool::new();
        let config = CacheConfig::file(dir.path().join("c").to_string_lossy());
        assert!(pool.create("file", &config).unwrap());
        assert!(!pool.create("file", &CacheConfig::null()).unwrap());

        let cache = pool.get("file").unwrap();
        cache.set("k", CacheValue::from("v"), NEVER).unwrap();
        assert_eq!(pool.get("").unwrap().get("k").unwrap(), Some(CacheValue::from("v")));
    }

    #[test]
    fn null_cache_never_hits() {
        let mut pool = CachePool::new();
        pool.add("none", Arc::new(NullCache::new()));
        let cache = pool.get("none").unwrap();
        cache.set("k", CacheValue::from(1), NEVER).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
        assert_eq!(cache.status(), CacheStatus::Active);
        assert!(pool.get("other").is_none());
        assert!(pool.remove("none"));
        assert!(pool.is_empty());
    }

    #[test]
    fn file_cache_requires_path() {
        let mut config = CacheConfig::null();
        config.kind = CacheType::File;
        assert!(CacheFactory::create(&config).is_err());
    }

    #[test]
    fn memcache_requires_host_before_connecting() {
        let mut config = CacheConfig::memcache(" ", 11211);
        assert!(matches!(
            CacheFactory::create(&config),
            Err(OmsError::InvalidConfig(ref key)) if key == "host"
        ));
        config.host = None;
        assert!(CacheFactory::create(&config).is_err());
    }

    #[test]
    fn pool_from_app_config() {
        let dir = tempfile::tempdir().unwrap();
        let raw = format!(
            "[cache.main]\ntype = \"file\"\npath = {:?}\n\n[cache.off]\ntype = \"null\"\n",
            dir.path().join("main").to_string_lossy()
        );
        let config = AppConfig::parse(&raw).unwrap();
        let pool = CachePool::from_config(&config).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.contains("main"));
        assert!(pool.contains("off"));
    }
}
