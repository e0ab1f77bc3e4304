use omsdb::prelude::*;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_postgres::config::Host;

/// Connection settings from `DATABASE_URL`, or `None` when it is not set.
fn config_from_env() -> Option<DbConfig> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    let pg = tokio_postgres::Config::from_str(&url).expect("invalid DATABASE_URL");

    let mut config = DbConfig::new("pgsql", pg.get_dbname().unwrap_or("postgres"));
    if let Some(Host::Tcp(host)) = pg.get_hosts().first() {
        config = config.host(host.clone());
    }
    if let Some(port) = pg.get_ports().first() {
        config = config.port(*port);
    }
    if let Some(user) = pg.get_user() {
        config = config.login(user);
    }
    if let Some(password) = pg.get_password() {
        config = config.password(String::from_utf8_lossy(password));
    }
    Some(config)
}

fn unique_table(name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    format!("omsdb_test_{name}_{}_{nanos}", std::process::id())
}

#[tokio::test]
async fn postgres_round_trip() -> OmsResult<()> {
    let Some(config) = config_from_env() else {
        eprintln!("DATABASE_URL is not set; skipping postgres_round_trip");
        return Ok(());
    };

    let connection = ConnectionFactory::connect(&config).await?;
    assert_eq!(connection.status(), DatabaseStatus::Ok);
    assert_eq!(
        connection.config().password,
        config.password.as_ref().map(|_| "****".to_string())
    );

    let table = unique_table("accounts");
    let mut create = SchemaBuilder::new(connection.clone());
    create
        .create_table(&table)?
        .field(FieldDefinition::new("id", "INTEGER").primary().auto_increment())
        .field(FieldDefinition::new("login", "TEXT").unique())
        .field(FieldDefinition::new("score", "DOUBLE PRECISION").default_value(0))
        .field(FieldDefinition::new("changed", "TIMESTAMP").nullable());
    create.execute().await?;

    let result = run_round_trip(&connection, &table).await;

    let mut drop = SchemaBuilder::new(connection.clone());
    drop.drop_table(&table)?;
    drop.execute().await?;
    connection.close().await;
    result
}

async fn run_round_trip(connection: &Arc<dyn Connection>, table: &str) -> OmsResult<()> {
    let changed = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .expect("valid date");

    let mut insert = Builder::new(connection.clone(), false);
    insert
        .insert(["login", "score", "changed"])?
        .into_table(table)
        .values(vec![Value::from("alice"), Value::from(1.5), Value::from(changed)])
        .values(vec![Value::from("bob"), Value::from(7), Value::Null]);
    assert_eq!(insert.execute().await?.affected, 2);

    let mut select = Builder::new(connection.clone(), true);
    select
        .select(["login", "score", "changed"])?
        .from([table])
        .where_("score", ">=", 1)?
        .oldest("login");
    let result = select.execute().await?;
    assert_eq!(result.rows.len(), 2);

    let alice = &result.rows[0];
    assert_eq!(alice.try_get_column::<String>("login")?, "alice");
    assert_eq!(alice.try_get_column::<f64>("score")?, 1.5);
    assert_eq!(alice.get("changed"), Some(&Value::DateTime(changed)));
    assert_eq!(result.rows[1].get("changed"), Some(&Value::Null));

    let mut fields = SchemaBuilder::new(connection.clone());
    fields.select_fields(table)?;
    assert_eq!(fields.execute().await?.rows.len(), 4);

    let mut named = Builder::new(connection.clone(), true);
    named.raw(&format!("SELECT * FROM {table} WHERE login = :login"))?
        .bind_named([("login", "alice")]);
    assert!(matches!(named.execute().await, Err(OmsError::Unsupported(_))));
    Ok(())
}

#[tokio::test]
async fn missing_database_sets_status() -> OmsResult<()> {
    let Some(config) = config_from_env() else {
        eprintln!("DATABASE_URL is not set; skipping missing_database_sets_status");
        return Ok(());
    };

    let mut missing = config.clone();
    missing.database = unique_table("missing_db");
    let connection = ConnectionFactory::create(&missing)?;
    let err = connection.connect(None).await.unwrap_err();
    assert!(err.is_missing_database(), "unexpected error: {err}");
    assert_eq!(connection.status(), DatabaseStatus::MissingDatabase);
    Ok(())
}
