//! Connection and cache configuration.
//!
//! Configs can be built in code or loaded from a TOML file:
//!
//! ```toml
//! [db.core]
//! db = "pgsql"
//! database = "oms"
//! host = "127.0.0.1"
//! login = "oms"
//! password = "${OMS_DB_PASSWORD}"
//! prefix = "oms_"
//!
//! [cache.file]
//! type = "file"
//! path = "/var/cache/oms"
//!
//! [cache.shared]
//! type = "memcache"
//! host = "127.0.0.1"
//! port = 11211
//! ```
//!
//! `${NAME}` references in string values are expanded from the environment.

use crate::error::{OmsError, OmsResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Placeholder stored instead of a password once a connection has used it.
pub const REDACTED_PASSWORD: &str = "****";

/// Settings for one database connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Dialect discriminator: `mysql`, `pgsql`, `sqlsrv` or `sqlite`.
    #[serde(default)]
    pub db: String,
    /// Database name, or file path for SQLite.
    #[serde(default)]
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Table name prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// `chrono` format for datetime binds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetimeformat: Option<String>,
}

impl DbConfig {
    pub fn new(db: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetimeformat = Some(format.into());
        self
    }

    /// Check the keys every dialect needs.
    pub fn validate(&self) -> OmsResult<()> {
        if self.db.trim().is_empty() {
            return Err(OmsError::InvalidConfig("db".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(OmsError::InvalidConfig("database".to_string()));
        }
        Ok(())
    }

    /// Copy with the password replaced by [`REDACTED_PASSWORD`].
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.password.is_some() {
            config.password = Some(REDACTED_PASSWORD.to_string());
        }
        config
    }

    fn expand_env(&mut self) -> OmsResult<()> {
        self.db = expand_env_vars(&self.db)?;
        self.database = expand_env_vars(&self.database)?;
        for value in [
            &mut self.host,
            &mut self.login,
            &mut self.password,
            &mut self.prefix,
        ]
        .into_iter()
        .flatten()
        {
            *value = expand_env_vars(value)?;
        }
        Ok(())
    }
}

/// Cache backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    File,
    Memcache,
    Null,
}

/// Settings for one cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub kind: CacheType,
    /// Cache directory, required for `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Server host, required for `memcache`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Socket timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl CacheConfig {
    fn of(kind: CacheType) -> Self {
        Self {
            kind,
            path: None,
            host: None,
            port: None,
            timeout: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::of(CacheType::File)
        }
    }

    pub fn memcache(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::of(CacheType::Memcache)
        }
    }

    pub fn null() -> Self {
        Self::of(CacheType::Null)
    }

    pub fn validate(&self) -> OmsResult<()> {
        let blank = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());
        match self.kind {
            CacheType::File if blank(&self.path) => Err(OmsError::InvalidConfig("path".to_string())),
            CacheType::Memcache if blank(&self.host) => {
                Err(OmsError::InvalidConfig("host".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Named connection and cache settings loaded from one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub db: BTreeMap<String, DbConfig>,
    #[serde(default)]
    pub cache: BTreeMap<String, CacheConfig>,
}

impl AppConfig {
    /// Read, expand and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> OmsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OmsError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::parse(&raw).map_err(|e| match e {
            OmsError::Config(msg) => {
                OmsError::Config(format!("{msg} (config file {})", path.display()))
            }
            other => other,
        })
    }

    /// Parse, expand and validate TOML text.
    pub fn parse(raw: &str) -> OmsResult<Self> {
        let mut config: AppConfig = toml::from_str(raw)
            .map_err(|e| OmsError::Config(format!("failed to parse config: {e}")))?;
        config.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    fn expand_env(&mut self) -> OmsResult<()> {
        for db in self.db.values_mut() {
            db.expand_env()?;
        }
        for cache in self.cache.values_mut() {
            for value in [&mut cache.path, &mut cache.host].into_iter().flatten() {
                *value = expand_env_vars(value)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> OmsResult<()> {
        for db in self.db.values() {
            db.validate()?;
        }
        for cache in self.cache.values() {
            cache.validate()?;
        }
        Ok(())
    }
}

/// Replace `${NAME}` with the value of the environment variable `NAME`.
fn expand_env_vars(input: &str) -> OmsResult<String> {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    let re = REFERENCE
        .get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("invalid built-in env reference regex"));

    let mut out = String::with_capacity(input.len());
    let mut tail = 0;
    for caps in re.captures_iter(input) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        if name.is_empty() {
            return Err(OmsError::Config(format!("empty env reference in '{input}'")));
        }
        let value = std::env::var(name)
            .map_err(|_| OmsError::Config(format!("env var {name} is not set")))?;
        out.push_str(&input[tail..whole.start()]);
        out.push_str(&value);
        tail = whole.end();
    }

    let rest = &input[tail..];
    if rest.contains("${") {
        return Err(OmsError::Config(format!("unterminated env reference in '{input}'")));
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_db_and_cache_sections() {
        let config = AppConfig::parse(
            r#"
            [db.core]
            db = "sqlite"
            database = "/tmp/oms.sqlite"
            prefix = "oms_"

            [db.report]
            db = "pgsql"
            database = "oms"
            host = "127.0.0.1"
            port = 5432

            [cache.file]
            type = "file"
            path = "/tmp/cache"
            "#,
        )
        .unwrap();

        assert_eq!(config.db["core"].prefix.as_deref(), Some("oms_"));
        assert_eq!(config.db["report"].port, Some(5432));
        assert_eq!(config.cache["file"].kind, CacheType::File);
    }

    #[test]
    fn missing_database_is_reported_by_key() {
        let err = AppConfig::parse("[db.core]\ndb = \"mysql\"\n").unwrap_err();
        assert_eq!(err.to_string(), "Missing config value for \"database\"");
    }

    #[test]
    fn file_cache_requires_path() {
        assert!(AppConfig::parse("[cache.c]\ntype = \"file\"\n").is_err());
        assert!(AppConfig::parse("[cache.c]\ntype = \"null\"\n").is_ok());
        assert!(AppConfig::parse("[cache.c]\ntype = \"redis\"\n").is_err());
    }

    #[test]
    fn memcache_section() {
        let config = AppConfig::parse(
            "[cache.shared]\ntype = \"memcache\"\nhost = \"10.0.0.5\"\nport = 11212\ntimeout = 2\n",
        )
        .unwrap();
        let cache = &config.cache["shared"];
        assert_eq!(cache.kind, CacheType::Memcache);
        assert_eq!(cache.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(cache.port, Some(11212));
        assert_eq!(cache.timeout, Some(2));

        let err = AppConfig::parse("[cache.shared]\ntype = \"memcache\"\n").unwrap_err();
        assert!(matches!(err, OmsError::InvalidConfig(ref key) if key == "host"));
    }

    #[test]
    fn expands_env_vars() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("OMSDB_TEST_EXPAND_PW", "s3cret") };
        assert_eq!(
            expand_env_vars("pw=${OMSDB_TEST_EXPAND_PW}").unwrap(),
            "pw=s3cret"
        );
        assert!(expand_env_vars("${OMSDB_TEST_UNSET_VAR_X}").is_err());
        assert!(expand_env_vars("${unterminated").is_err());
        assert!(expand_env_vars("a${}b").is_err());
        assert_eq!(expand_env_vars("$plain").unwrap(), "$plain");
        assert_eq!(
            expand_env_vars("${OMSDB_TEST_EXPAND_PW}/${OMSDB_TEST_EXPAND_PW}").unwrap(),
            "s3cret/s3cret"
        );
    }

    #[test]
    fn redacts_password() {
        let config = DbConfig::new("pgsql", "oms").password("hunter2");
        assert_eq!(config.redacted().password.as_deref(), Some(REDACTED_PASSWORD));
        assert_eq!(DbConfig::new("pgsql", "oms").redacted().password, None);
    }
}
