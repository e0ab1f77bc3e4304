use super::record::{build_record, parse_record, sanitize_key};
use super::{Cache, CacheStats, CacheStatus, CacheValue};
use crate::error::{OmsError, OmsResult};
use crate::log::TARGET_CACHE;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::SystemTime;

const DEFAULT_THRESHOLD: usize = 50;

/// Cache storing one `type$expire$payload` file per key.
///
/// Keys are sanitised into file names (anything outside `[A-Za-z0-9_.-]` becomes
/// `~`). Expiry is measured from the file's modification time.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    threshold: usize,
    status: AtomicU8,
}

impl FileCache {
    /// Open the cache directory, creating it if needed.
    pub fn new(path: impl AsRef<Path>) -> OmsResult<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        Ok(Self {
            path: path.canonicalize()?,
            threshold: DEFAULT_THRESHOLD,
            status: AtomicU8::new(CacheStatus::Active as u8),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_active(&self) -> OmsResult<()> {
        match self.status() {
            CacheStatus::Active => Ok(()),
            status => Err(OmsError::CacheUnavailable(status)),
        }
    }

    fn entry_path(&self, key: &str) -> OmsResult<PathBuf> {
        if key.is_empty() {
            return Err(OmsError::invalid_argument("cache key must not be empty"));
        }
        Ok(self.path.join(sanitize_key(key)))
    }

    fn write(&self, path: &Path, value: &CacheValue, expire: i64) -> OmsResult<()> {
        fs::write(path, build_record(value, expire))?;
        Ok(())
    }

    /// Read a record, `None` if the file does not exist.
    fn read(&self, path: &Path) -> OmsResult<Option<(SystemTime, String)>> {
        let modified = match fs::metadata(path) {
            Ok(meta) => meta.modified()?,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match fs::read(path) {
            Ok(bytes) => {
                let raw = String::from_utf8(bytes).map_err(|_| {
                    OmsError::Serialization("malformed cache record: not UTF-8".to_string())
                })?;
                Ok(Some((modified, raw)))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Files in the cache directory; entries removed while listing are skipped.
    fn entries(&self) -> OmsResult<Vec<(PathBuf, fs::Metadata)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            if meta.is_file() {
                entries.push((entry.path(), meta));
            }
        }
        Ok(entries)
    }

    /// Whether the record at `path` is past its own expiry at `now`.
    ///
    /// Records that cannot be read or parsed are stale; `None` if the file is gone.
    fn is_stale(&self, path: &Path, modified: SystemTime, now: SystemTime) -> Option<bool> {
        match self.read(path) {
            Ok(Some((_, raw))) => Some(
                parse_record(&raw).map_or(true, |(own, _)| is_expired(modified, own, now)),
            ),
            Ok(None) => None,
            Err(_) => Some(true),
        }
    }

    fn get_with(&self, key: &str, min_age: Option<u64>) -> OmsResult<Option<CacheValue>> {
        self.ensure_active()?;
        let path = self.entry_path(key)?;
        let Some((modified, raw)) = self.read(&path)? else {
            return Ok(None);
        };

        let now = SystemTime::now();
        let (expire, value) = parse_record(&raw)?;
        if is_expired(modified, expire, now) {
            remove_if_exists(&path)?;
            tracing::debug!(target: TARGET_CACHE, key, "expired");
            return Ok(None);
        }
        if min_age.is_some_and(|age| age_secs(modified, now) < age) {
            return Ok(None);
        }
        Ok(Some(value))
    }

    /// Fetch `key` only if its entry was written at least `age` seconds ago.
    ///
    /// Entries past their own expiry are removed, as with [`Cache::get`].
    pub fn get_if_older(&self, key: &str, age: u64) -> OmsResult<Option<CacheValue>> {
        self.get_with(key, Some(age))
    }

    /// Delete `key` only if its entry was written at least `age` seconds ago.
    pub fn delete_if_older(&self, key: &str, age: u64) -> OmsResult<bool> {
        self.ensure_active()?;
        let path = self.entry_path(key)?;
        let modified = match fs::metadata(&path) {
            Ok(meta) => meta.modified()?,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if age_secs(modified, SystemTime::now()) < age {
            return Ok(false);
        }
        let removed = remove_if_exists(&path)?;
        if removed {
            tracing::debug!(target: TARGET_CACHE, key, age, "delete");
        }
        Ok(removed)
    }
}

impl Cache for FileCache {
    fn set(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<()> {
        self.ensure_active()?;
        let path = self.entry_path(key)?;
        self.write(&path, &value, expire)?;
        tracing::debug!(target: TARGET_CACHE, key, tag = value.tag(), expire, "set");
        Ok(())
    }

    fn add(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<bool> {
        self.ensure_active()?;
        let path = self.entry_path(key)?;
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        file.write_all(build_record(&value, expire).as_bytes())?;
        tracing::debug!(target: TARGET_CACHE, key, tag = value.tag(), expire, "add");
        Ok(true)
    }

    fn get(&self, key: &str) -> OmsResult<Option<CacheValue>> {
        self.get_with(key, None)
    }

    fn delete(&self, key: &str) -> OmsResult<bool> {
        self.ensure_active()?;
        let removed = remove_if_exists(&self.entry_path(key)?)?;
        if removed {
            tracing::debug!(target: TARGET_CACHE, key, "delete");
        }
        Ok(removed)
    }

    fn replace(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<bool> {
        self.ensure_active()?;
        let path = self.entry_path(key)?;
        if !path.exists() {
            return Ok(false);
        }
        self.write(&path, &value, expire)?;
        tracing::debug!(target: TARGET_CACHE, key, tag = value.tag(), expire, "replace");
        Ok(true)
    }

    fn flush(&self, expire: i64) -> OmsResult<usize> {
        self.ensure_active()?;
        let now = SystemTime::now();
        let mut removed = 0;
        for (path, meta) in self.entries()? {
            let modified = meta.modified()?;
            let stale = if expire >= 0 {
                is_expired(modified, expire, now)
            } else {
                self.is_stale(&path, modified, now).unwrap_or(false)
            };
            if stale && remove_if_exists(&path)? {
                removed += 1;
            }
        }
        tracing::debug!(target: TARGET_CACHE, expire, removed, "flush");
        Ok(removed)
    }

    fn flush_all(&self) -> OmsResult<()> {
        self.ensure_active()?;
        for (path, _) in self.entries()? {
            remove_if_exists(&path)?;
        }
        tracing::debug!(target: TARGET_CACHE, path = %self.path.display(), "flush all");
        Ok(())
    }

    fn stats(&self) -> OmsResult<CacheStats> {
        let entries = self.entries()?;
        let mut changed: Option<SystemTime> = None;
        let mut size = 0;
        for (_, meta) in &entries {
            size += meta.len();
            let modified = meta.modified()?;
            changed = Some(changed.map_or(modified, |c| c.max(modified)));
        }
        Ok(CacheStats {
            status: self.status(),
            count: entries.len(),
            size,
            changed: changed.map(DateTime::<Utc>::from),
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

/// Whether an entry written at `modified` with `expire` seconds is stale at `now`.
fn is_expired(modified: SystemTime, expire: i64, now: SystemTime) -> bool {
    expire >= 0 && age_secs(modified, now) > expire as u64
}

/// Whole seconds between `modified` and `now`, zero for future timestamps.
fn age_secs(modified: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(modified)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn remove_if_exists(path: &Path) -> OmsResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}
