use super::record::{build_record, parse_record, sanitize_key};
use super::{Cache, CacheStats, CacheStatus, CacheValue};
use crate::error::{OmsError, OmsResult};
use crate::log::TARGET_CACHE;
use memcache::{CommandError, MemcacheError};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_MEMCACHE_PORT: u16 = 11211;

const DEFAULT_THRESHOLD: usize = 10;

/// Longest expiry memcached treats as relative; larger values are timestamps.
const MAX_RELATIVE_EXPIRE: i64 = 60 * 60 * 24 * 30;

/// Cache on a memcached server.
///
/// Values are stored in the same `type$expire$payload` form as [`FileCache`](super::FileCache)
/// records; expiry is enforced by the server.
pub struct MemCache {
    client: memcache::Client,
    server: String,
    threshold: usize,
    status: AtomicU8,
}

impl MemCache {
    /// Connect to `host:port`; `timeout` is the socket timeout in seconds.
    pub fn connect(host: &str, port: u16, timeout: Option<u64>) -> OmsResult<Self> {
        let url = server_url(host, port, timeout);
        let client = memcache::Client::connect(url.as_str())?;
        Ok(Self {
            client,
            server: format!("{host}:{port}"),
            threshold: DEFAULT_THRESHOLD,
            status: AtomicU8::new(CacheStatus::Active as u8),
        })
    }

    /// `host:port` of the server.
    pub fn server(&self) -> &str {
        &self.server
    }

    fn ensure_active(&self) -> OmsResult<()> {
        match self.status() {
            CacheStatus::Active => Ok(()),
            status => Err(OmsError::CacheUnavailable(status)),
        }
    }

    fn key(key: &str) -> OmsResult<String> {
        if key.is_empty() {
            return Err(OmsError::invalid_argument("cache key must not be empty"));
        }
        Ok(sanitize_key(key))
    }
}

impl fmt::Debug for MemCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemCache")
            .field("server", &self.server)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Cache for MemCache {
    fn set(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<()> {
        self.ensure_active()?;
        let key = Self::key(key)?;
        let record = build_record(&value, expire);
        self.client
            .set(&key, record.as_str(), expiration(expire, unix_now()))?;
        tracing::debug!(target: TARGET_CACHE, key, tag = value.tag(), expire, "set");
        Ok(())
    }

    fn add(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<bool> {
        self.ensure_active()?;
        let key = Self::key(key)?;
        let record = build_record(&value, expire);
        match self
            .client
            .add(&key, record.as_str(), expiration(expire, unix_now()))
        {
            Ok(()) => Ok(true),
            Err(MemcacheError::CommandError(
                CommandError::KeyExists,
            )) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, key: &str) -> OmsResult<Option<CacheValue>> {
        self.ensure_active()?;
        let key = Self::key(key)?;
        let raw: Option<String> = self.client.get(&key)?;
        raw.map(|raw| parse_record(&raw).map(|(_, value)| value))
            .transpose()
    }

    fn delete(&self, key: &str) -> OmsResult<bool> {
        self.ensure_active()?;
        let key = Self::key(key)?;
        Ok(self.client.delete(&key)?)
    }

    fn replace(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<bool> {
        self.ensure_active()?;
        let key = Self::key(key)?;
        let record = build_record(&value, expire);
        match self
            .client
            .replace(&key, record.as_str(), expiration(expire, unix_now()))
        {
            Ok(()) => Ok(true),
            Err(MemcacheError::CommandError(
                CommandError::KeyNotFound,
            )) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// The server drops expired entries itself, so `flush(NEVER)` removes
    /// nothing. Age-based flushing is not available.
    fn flush(&self, expire: i64) -> OmsResult<usize> {
        self.ensure_active()?;
        if expire >= 0 {
            return Err(OmsError::Unsupported(
                "memcached cannot select entries by age; use flush_all".to_string(),
            ));
        }
        Ok(0)
    }

    fn flush_all(&self) -> OmsResult<()> {
        self.ensure_active()?;
        self.client.flush()?;
        tracing::debug!(target: TARGET_CACHE, server = %self.server, "flush all");
        Ok(())
    }

    fn stats(&self) -> OmsResult<CacheStats> {
        let mut count = 0;
        let mut size = 0;
        for (_, stats) in self.client.stats()? {
            count += stat(&stats, "curr_items") as usize;
            size += stat(&stats, "bytes");
        }
        Ok(CacheStats {
            status: self.status(),
            count,
            size,
            changed: None,
        })
    }

    fn threshold(&self) -> usize {
        self.threshold
    }

    fn status(&self) -> CacheStatus {
        CacheStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: CacheStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}

fn server_url(host: &str, port: u16, timeout: Option<u64>) -> String {
    match timeout {
        Some(secs) => format!("memcache://{host}:{port}?timeout={secs}"),
        None => format!("memcache://{host}:{port}"),
    }
}

/// Server expiration for `expire` seconds from `now` (unix seconds).
///
/// memcached reads `0` as "never" and values above thirty days as absolute
/// timestamps.
fn expiration(expire: i64, now: i64) -> u32 {
    match expire {
        e if e < 0 => 0,
        0 => 1,
        e if e > MAX_RELATIVE_EXPIRE => u32::try_from(now.saturating_add(e)).unwrap_or(u32::MAX),
        e => e as u32,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn stat(stats: &HashMap<String, String>, name: &str) -> u64 {
    stats
        .get(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}
