//! Key-value caches.
//!
//! [`FileCache`] stores one file per key, [`MemCache`] talks to a memcached
//! server and [`NullCache`] accepts everything and stores nothing. All are
//! reachable by name through a [`CachePool`].

mod file;
mod memcached;
mod null;
mod pool;
mod record;

pub use file::FileCache;
pub use memcached::{DEFAULT_MEMCACHE_PORT, MemCache};
pub use null::NullCache;
pub use pool::{CacheFactory, CachePool};

use crate::error::{OmsError, OmsResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Expiry value for entries that never expire.
pub const NEVER: i64 = -1;

/// Cache availability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CacheStatus {
    #[default]
    Active = 0,
    Inactive = 1,
    Error = 2,
    Undefined = 3,
}

impl CacheStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CacheStatus::Active,
            1 => CacheStatus::Inactive,
            2 => CacheStatus::Error,
            _ => CacheStatus::Undefined,
        }
    }
}

/// A cached value together with its stored type.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheValue {
    Int(i64),
    Str(String),
    /// JSON array or object.
    Array(serde_json::Value),
    /// Opaque payload tagged with the name of the type that produced it.
    Serializable { type_name: String, payload: String },
    Float(f64),
    Bool(bool),
    /// JSON payload tagged with the name of the type that produced it.
    JsonSerializable {
        type_name: String,
        payload: serde_json::Value,
    },
}

impl CacheValue {
    /// Single-digit tag written in front of the record.
    pub fn tag(&self) -> u8 {
        match self {
            CacheValue::Int(_) => 0,
            CacheValue::Str(_) => 1,
            CacheValue::Array(_) => 2,
            CacheValue::Serializable { .. } => 3,
            CacheValue::Float(_) => 4,
            CacheValue::Bool(_) => 5,
            CacheValue::JsonSerializable { .. } => 6,
        }
    }

    /// Serialize `value` to an opaque string payload tagged with its type name.
    pub fn serializable<T: Serialize>(value: &T) -> OmsResult<Self> {
        Ok(CacheValue::Serializable {
            type_name: std::any::type_name::<T>().to_string(),
            payload: serde_json::to_string(value)?,
        })
    }

    /// Serialize `value` to a JSON payload tagged with its type name.
    pub fn json_serializable<T: Serialize>(value: &T) -> OmsResult<Self> {
        Ok(CacheValue::JsonSerializable {
            type_name: std::any::type_name::<T>().to_string(),
            payload: serde_json::to_value(value)?,
        })
    }

    /// Restore a value stored with [`serializable`](Self::serializable) or
    /// [`json_serializable`](Self::json_serializable).
    ///
    /// Fails if the stored type name differs from `T`'s.
    pub fn restore<T: DeserializeOwned>(&self) -> OmsResult<T> {
        let expected = std::any::type_name::<T>();
        match self {
            CacheValue::Serializable { type_name, payload } if type_name == expected => {
                Ok(serde_json::from_str(payload)?)
            }
            CacheValue::JsonSerializable { type_name, payload } if type_name == expected => {
                Ok(serde_json::from_value(payload.clone())?)
            }
            CacheValue::Serializable { type_name, .. }
            | CacheValue::JsonSerializable { type_name, .. } => Err(OmsError::Serialization(
                format!("cached value is a {type_name}, not a {expected}"),
            )),
            other => Err(OmsError::Serialization(format!(
                "cached value with tag {} is not a serialized object",
                other.tag()
            ))),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CacheValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        CacheValue::Int(v)
    }
}

impl From<i32> for CacheValue {
    fn from(v: i32) -> Self {
        CacheValue::Int(i64::from(v))
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        CacheValue::Float(v)
    }
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        CacheValue::Bool(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        CacheValue::Str(v.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        CacheValue::Str(v)
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(v: serde_json::Value) -> Self {
        CacheValue::Array(v)
    }
}

/// Snapshot returned by [`Cache::stats`].
#[derive(Clone, Debug, PartialEq)]
pub struct CacheStats {
    pub status: CacheStatus,
    /// Number of stored entries.
    pub count: usize,
    /// Total size of stored entries in bytes.
    pub size: u64,
    /// Last modification of any entry.
    pub changed: Option<DateTime<Utc>>,
}

/// Cache backend.
///
/// Every operation except [`stats`](Cache::stats), [`status`](Cache::status) and
/// [`set_status`](Cache::set_status) fails with [`OmsError::CacheUnavailable`]
/// while the cache is not [`CacheStatus::Active`]. `expire` is in seconds;
/// [`NEVER`] keeps the entry until it is deleted.
pub trait Cache: fmt::Debug + Send + Sync {
    /// Store `value`, overwriting any existing entry.
    fn set(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<()>;

    /// Store `value` only if `key` is not present.
    fn add(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<bool>;

    /// Fetch a live entry; expired entries are removed and reported as missing.
    fn get(&self, key: &str) -> OmsResult<Option<CacheValue>>;

    fn delete(&self, key: &str) -> OmsResult<bool>;

    /// Overwrite `key` only if it is present.
    fn replace(&self, key: &str, value: CacheValue, expire: i64) -> OmsResult<bool>;

    /// Remove stale entries and return how many were removed.
    ///
    /// With `expire >= 0` every entry older than `expire` seconds is stale;
    /// otherwise each entry's own expiry decides.
    fn flush(&self, expire: i64) -> OmsResult<usize>;

    /// Remove every entry.
    fn flush_all(&self) -> OmsResult<()>;

    fn stats(&self) -> OmsResult<CacheStats>;

    fn threshold(&self) -> usize;

    fn status(&self) -> CacheStatus;

    fn set_status(&self, status: CacheStatus);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        id: u32,
        user: String,
    }

    #[test]
    fn tags_match_record_format() {
        assert_eq!(CacheValue::from(1).tag(), 0);
        assert_eq!(CacheValue::from("a").tag(), 1);
        assert_eq!(CacheValue::from(serde_json::json!([1])).tag(), 2);
        assert_eq!(CacheValue::from(1.5).tag(), 4);
        assert_eq!(CacheValue::from(true).tag(), 5);
    }

    #[test]
    fn restore_checks_type_name() {
        let session = Session {
            id: 1,
            user: "admin".into(),
        };
        let value = CacheValue::serializable(&session).unwrap();
        assert_eq!(value.tag(), 3);
        assert_eq!(value.restore::<Session>().unwrap(), session);
        assert!(value.restore::<Vec<u8>>().is_err());

        let value = CacheValue::json_serializable(&session).unwrap();
        assert_eq!(value.tag(), 6);
        assert_eq!(value.restore::<Session>().unwrap(), session);
        assert!(CacheValue::Int(1).restore::<Session>().is_err());
    }
}
