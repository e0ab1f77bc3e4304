use super::{Cache, CacheStats, CacheStatus, CacheValue};
use crate::error::OmsResult;

/// Cache that stores nothing.
///
/// Writes succeed, reads always miss. Used when caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Cache for NullCache {
    fn set(&self, _key: &str, _value: CacheValue, _expire: i64) -> OmsResult<()> {
        Ok(())
    }

    fn add(&self, _key: &str, _value: CacheValue, _expire: i64) -> OmsResult<bool> {
        Ok(true)
    }

    fn get(&self, _key: &str) -> OmsResult<Option<CacheValue>> {
        Ok(None)
    }

    fn delete(&self, _key: &str) -> OmsResult<bool> {
        Ok(true)
    }

    fn replace(&self, _key: &str, _value: CacheValue, _expire: i64) -> OmsResult<bool> {
        Ok(true)
    }

    fn flush(&self, _expire: i64) -> OmsResult<usize> {
        Ok(0)
    }

    fn flush_all(&self) -> OmsResult<()> {
        Ok(())
    }

    fn stats(&self) -> OmsResult<CacheStats> {
        Ok(CacheStats {
            status: CacheStatus::Active,
            count: 0,
            size: 0,
            changed: None,
        })
    }

    fn threshold(&self) -> usize {
        0
    }

    fn status(&self) -> CacheStatus {
        CacheStatus::Active
    }

    fn set_status(&self, _status: CacheStatus) {}
}
