use omsdb::prelude::*;
use omsdb::{CachePool, DatabaseType};
use std::io::Write;

fn write_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let db = dir.path().join("core.sqlite");
    std::fs::File::create(&db).unwrap();
    let cache = dir.path().join("cache");

    let path = dir.path().join("omsdb.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"
[db.core]
db = "sqlite"
database = {db:?}
prefix = "oms_"

[db.reports]
db = "mysql"
database = "reports"
host = "127.0.0.1"
port = 3306
login = "report"
password = "secret"

[cache.file]
type = "file"
path = {cache:?}

[cache.none]
type = "null"
"#,
        db = db.to_string_lossy(),
        cache = cache.to_string_lossy(),
    )
    .unwrap();
    path
}

#[tokio::test]
async fn pools_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load(write_config(&dir)).unwrap();

    let pool = DatabasePool::from_config(&config).unwrap();
    assert_eq!(pool.len(), 2);

    let core = pool.get("core");
    assert_eq!(core.db_type(), DatabaseType::Sqlite);
    assert_eq!(core.prefix(), "oms_");
    assert_eq!(core.status(), DatabaseStatus::Closed);
    assert_eq!(pool.get("").db_type(), DatabaseType::Sqlite);

    let reports = pool.get("reports");
    assert_eq!(reports.db_type(), DatabaseType::Mysql);
    assert_eq!(reports.port(), 3306);
    assert_eq!(reports.config().password.as_deref(), Some("****"));

    core.connect(None).await.unwrap();
    assert_eq!(core.status(), DatabaseStatus::Ok);
    assert!(pool.connect_all().await.is_err());
    pool.close_all().await;
    assert_eq!(core.status(), DatabaseStatus::Closed);

    let caches = CachePool::from_config(&config).unwrap();
    let cache = caches.get("file").unwrap();
    cache.set("greeting", CacheValue::from("hello"), NEVER).unwrap();
    assert_eq!(
        cache.get("greeting").unwrap().as_ref().and_then(CacheValue::as_str),
        Some("hello")
    );
    assert!(dir.path().join("cache").join("greeting").exists());
    assert_eq!(caches.get("none").unwrap().get("greeting").unwrap(), None);
}

#[test]
fn missing_database_name_is_rejected() {
    let err = AppConfig::parse("[db.core]\ndb = \"sqlite\"\ndatabase = \"\"\n").unwrap_err();
    assert!(matches!(err, OmsError::InvalidConfig(ref key) if key == "database"));
}
