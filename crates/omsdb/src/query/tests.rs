use super::*;
use crate::config::DbConfig;
use crate::connection::{Connection, ConnectionFactory, NullConnection};
use crate::error::OmsError;
use crate::value::Value;
use std::sync::Arc;

fn connection(db: &str) -> Arc<dyn Connection> {
    ConnectionFactory::create(&DbConfig::new(db, "oms")).unwrap()
}

fn builder(db: &str) -> Builder {
    Builder::new(connection(db), false)
}

fn read_only(db: &str) -> Builder {
    Builder::new(connection(db), true)
}

// ==================== SELECT ====================

#[test]
fn mysql_select_with_where_and_limit() {
    let mut q = builder("mysql");
    q.select(["a", "b"])
        .unwrap()
        .from(["users"])
        .where_("id", "=", 5)
        .unwrap()
        .limit(10);

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT `a`, `b` FROM `users` WHERE `id` = ? LIMIT 10"
    );
    assert_eq!(compiled.params, vec![Value::Int(5)]);
}

#[test]
fn compiling_twice_is_identical() {
    let mut q = builder("pgsql");
    q.select(["id"])
        .unwrap()
        .from(["users"])
        .where_("name", "like", "a%")
        .unwrap()
        .order_by("id", "desc")
        .unwrap();

    let first = q.compile().unwrap();
    let second = q.compile().unwrap();
    assert_eq!(first, second);
    assert_eq!(q.to_sql().unwrap(), first.sql);
}

#[test]
fn select_without_columns_is_star() {
    let mut q = builder("sqlite");
    q.select(Vec::<&str>::new()).unwrap().distinct().from(["users"]);
    assert_eq!(q.to_sql().unwrap(), "SELECT DISTINCT * FROM \"users\"");
}

#[test]
fn aliases_and_qualified_columns() {
    let config = DbConfig::new("mysql", "oms").prefix("oms_");
    let mut q = Builder::new(ConnectionFactory::create(&config).unwrap(), false);
    q.select(["users.id", "users.login as name"])
        .unwrap()
        .from(["users as u"]);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT `oms_users`.`id`, `oms_users`.`login` AS `name` FROM `oms_users` AS `u`"
    );
}

#[test]
fn count_and_raw_selects() {
    let mut q = builder("mysql");
    q.count("*").unwrap().from(["users"]);
    assert_eq!(q.to_sql().unwrap(), "SELECT COUNT(*) FROM `users`");

    let mut q = builder("mysql");
    q.select(["id"]).unwrap().select_raw("NOW() AS now").from(["users"]);
    assert_eq!(q.to_sql().unwrap(), "SELECT `id`, NOW() AS now FROM `users`");
}

#[test]
fn deferred_columns_resolve_at_compile_time() {
    let mut q = builder("sqlite");
    q.select([Expression::deferred(|| "login".to_string())])
        .unwrap()
        .from(["users"]);
    assert_eq!(q.to_sql().unwrap(), "SELECT \"login\" FROM \"users\"");
}

// ==================== WHERE ====================

#[test]
fn conditions_are_grouped_by_column() {
    let mut q = builder("sqlite");
    q.select(["id"])
        .unwrap()
        .from(["t"])
        .where_("a", "=", 1)
        .unwrap()
        .where_("b", "=", 2)
        .unwrap()
        .or_where("a", "=", 3)
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"id\" FROM \"t\" WHERE \"a\" = ? OR \"a\" = ? AND \"b\" = ?"
    );
    assert_eq!(compiled.params, vec![Value::Int(1), Value::Int(3), Value::Int(2)]);
    assert_eq!(q.get_where_by_column("a").map(<[_]>::len), Some(2));
    assert!(q.get_where_by_column("c").is_none());
}

#[test]
fn invalid_operator_leaves_wheres_unchanged() {
    let mut q = builder("mysql");
    q.select(["id"]).unwrap().from(["t"]).where_("a", "=", 1).unwrap();

    let err = q.where_("b", "===", 2).unwrap_err();
    assert!(err.is_invalid_operator());
    assert!(q.get_where_by_column("b").is_none());

    let many = vec![
        ("c", "=", WhereValue::from(1), "and"),
        ("d", "nope", WhereValue::from(2), "and"),
    ];
    assert!(q.where_many(many).is_err());
    assert!(q.get_where_by_column("c").is_none());
    assert_eq!(q.to_sql().unwrap(), "SELECT `id` FROM `t` WHERE `a` = ?");
}

#[test]
fn operators_are_case_insensitive() {
    let mut q = builder("pgsql");
    q.select(["id"])
        .unwrap()
        .from(["t"])
        .where_("name", "NOT LIKE", "x%")
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT \"id\" FROM \"t\" WHERE \"name\" NOT LIKE $1"
    );
}

#[test]
fn null_in_and_between() {
    let mut q = builder("mysql");
    q.select(["id"])
        .unwrap()
        .from(["t"])
        .where_null("deleted")
        .where_not_null("login")
        .where_in("id", vec![1, 2, 3])
        .unwrap()
        .where_("age", "between", vec![18, 65])
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT `id` FROM `t` WHERE `deleted` IS NULL AND `login` IS NOT NULL \
         AND `id` IN (?, ?, ?) AND `age` BETWEEN ? AND ?"
    );
    assert_eq!(compiled.params.len(), 5);
}

#[test]
fn empty_in_list_matches_nothing() {
    let mut q = builder("sqlite");
    q.select(["id"])
        .unwrap()
        .from(["t"])
        .where_in("id", Vec::<i64>::new())
        .unwrap();
    let compiled = q.compile().unwrap();
    assert_eq!(compiled.sql, "SELECT \"id\" FROM \"t\" WHERE 1 = 0");
    assert!(compiled.params.is_empty());
}

#[test]
fn between_and_in_validate_their_values() {
    let mut q = builder("sqlite");
    assert!(q.where_("age", "between", 18).is_err());
    assert!(q.where_("age", "between", vec![1, 2, 3]).is_err());
    assert!(q.where_("id", "in", 1).is_err());
    assert!(q.where_with("id", "=", 1, "xor").is_err());
}

#[test]
fn column_comparison_is_not_bound() {
    let mut q = builder("mysql");
    q.select(["id"])
        .unwrap()
        .from(["t"])
        .where_("created", "<", WhereValue::column("updated"))
        .unwrap();
    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT `id` FROM `t` WHERE `created` < `updated`"
    );
    assert!(compiled.params.is_empty());
}

#[test]
fn postgres_numbers_placeholders_across_sub_queries() {
    let mut sub = builder("pgsql");
    sub.select(["user_id"])
        .unwrap()
        .from(["groups"])
        .where_("gid", "=", 7)
        .unwrap();

    let mut q = builder("pgsql");
    q.select(["id"])
        .unwrap()
        .from(["users"])
        .where_("status", "=", 1)
        .unwrap()
        .where_in("id", sub)
        .unwrap()
        .where_("login", "!=", "root")
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"id\" FROM \"users\" WHERE \"status\" = $1 \
         AND \"id\" IN (SELECT \"user_id\" FROM \"groups\" WHERE \"gid\" = $2) \
         AND \"login\" != $3"
    );
    assert_eq!(
        compiled.params,
        vec![Value::Int(1), Value::Int(7), Value::from("root")]
    );
}

#[test]
fn table_of_system_expression() {
    assert_eq!(
        Builder::get_table_of_system("\"users\".\"id\"", '"'),
        Some("\"users\"".to_string())
    );
    assert_eq!(Builder::get_table_of_system("users.id", '"'), None);
}

// ==================== JOIN / ORDER / UNION ====================

#[test]
fn joins_with_on_conditions() {
    let mut q = builder("mysql");
    q.select(["users.id", "groups.name"])
        .unwrap()
        .from(["users"])
        .left_join("groups")
        .on("users.group", "=", "groups.id", "and")
        .unwrap()
        .on("groups.active", "=", Expression::raw("1"), "and")
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT `users`.`id`, `groups`.`name` FROM `users` LEFT JOIN `groups` \
         ON `users`.`group` = `groups`.`id` AND `groups`.`active` = 1"
    );
}

#[test]
fn on_without_join_fails() {
    let mut q = builder("mysql");
    assert!(q.on("a", "=", "b", "and").is_err());
}

#[test]
fn orders_are_grouped_by_direction() {
    let mut q = builder("sqlite");
    q.select(["id"])
        .unwrap()
        .from(["t"])
        .order_by("a", "asc")
        .unwrap()
        .newest("b")
        .oldest("c");
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT \"id\" FROM \"t\" ORDER BY \"a\", \"c\" ASC, \"b\" DESC"
    );

    assert!(q.order_by("d", "sideways").is_err());
    assert!(q.order_by_many(vec!["d", "e"], &["ASC"]).is_err());
}

#[test]
fn group_by_and_union() {
    let mut other = builder("sqlite");
    other.select(["id"]).unwrap().from(["archive"]);

    let mut q = builder("sqlite");
    q.select(["id"])
        .unwrap()
        .from(["current"])
        .group_by(["id"])
        .union(other);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT \"id\" FROM \"current\" GROUP BY \"id\" UNION SELECT \"id\" FROM \"archive\""
    );
}

#[test]
fn lock_update_per_dialect() {
    let build = |db: &str| {
        let mut q = builder(db);
        q.select(["id"]).unwrap().from(["t"]).lock_update();
        q.to_sql().unwrap()
    };
    assert_eq!(build("mysql"), "SELECT `id` FROM `t` FOR UPDATE");
    assert_eq!(build("sqlite"), "SELECT \"id\" FROM \"t\"");
}

// ==================== LIMIT per dialect ====================

#[test]
fn offset_only_paging_per_dialect() {
    let build = |db: &str| {
        let mut q = builder(db);
        q.select(["id"]).unwrap().from(["t"]).offset(20);
        q.to_sql().unwrap()
    };
    assert_eq!(
        build("mysql"),
        "SELECT `id` FROM `t` LIMIT 18446744073709551615 OFFSET 20"
    );
    assert_eq!(build("sqlite"), "SELECT \"id\" FROM \"t\" LIMIT -1 OFFSET 20");
    assert_eq!(build("pgsql"), "SELECT \"id\" FROM \"t\" OFFSET 20");
    assert_eq!(
        build("sqlsrv"),
        "SELECT \"id\" FROM \"t\" ORDER BY (SELECT NULL) OFFSET 20 ROWS"
    );
}

#[test]
fn microsoft_paging_keeps_existing_order() {
    let mut q = builder("sqlsrv");
    q.select(["id"])
        .unwrap()
        .from(["t"])
        .where_("a", "=", 1)
        .unwrap()
        .oldest("id")
        .limit(10)
        .offset(5);
    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"id\" FROM \"t\" WHERE \"a\" = @P1 ORDER BY \"id\" ASC \
         OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

// ==================== RANDOM ====================

#[test]
fn random_per_dialect() {
    let build = |db: &str, limit: Option<u64>| {
        let mut q = builder(db);
        q.random(["id"]).unwrap().from(["quotes"]);
        if let Some(limit) = limit {
            q.limit(limit);
        }
        q.to_sql().unwrap()
    };
    assert_eq!(
        build("mysql", Some(3)),
        "SELECT `id` FROM `quotes` ORDER BY RAND() LIMIT 3"
    );
    assert_eq!(
        build("pgsql", None),
        "SELECT \"id\" FROM \"quotes\" ORDER BY RANDOM()"
    );
    assert_eq!(
        build("sqlsrv", None),
        "SELECT TOP 1 \"id\" FROM \"quotes\" ORDER BY NEWID()"
    );
    assert_eq!(
        build("sqlsrv", Some(5)),
        "SELECT TOP 5 \"id\" FROM \"quotes\" ORDER BY NEWID()"
    );
}

#[test]
fn random_then_select_stays_random() {
    let mut q = builder("sqlite");
    q.random(["id"]).unwrap().select(["name"]).unwrap();
    assert_eq!(q.query_type(), QueryType::Random);
}

// ==================== INSERT / UPDATE / DELETE ====================

#[test]
fn insert_multiple_rows() {
    let mut q = builder("pgsql");
    q.insert(["login", "status"])
        .unwrap()
        .into_table("users")
        .values(vec![Value::from("a"), Value::from(1)])
        .values(vec![Value::from("b"), Value::Null]);

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "INSERT INTO \"users\" (\"login\", \"status\") VALUES ($1, $2), ($3, NULL)"
    );
    assert_eq!(
        compiled.params,
        vec![Value::from("a"), Value::Int(1), Value::from("b")]
    );
}

#[test]
fn value_appends_to_last_row() {
    let mut q = builder("mysql");
    q.insert(["a", "b"]).unwrap().into_table("t").value(1).value(2);
    assert_eq!(q.values_rows(), &[vec![Value::Int(1), Value::Int(2)]]);
}

#[test]
fn insert_without_table_or_values_fails_to_compile() {
    let mut q = builder("mysql");
    q.insert(["a"]).unwrap();
    assert!(matches!(q.compile(), Err(OmsError::Compile(_))));
    q.into_table("t");
    assert!(matches!(q.compile(), Err(OmsError::Compile(_))));
}

#[test]
fn update_with_where() {
    let mut q = builder("mysql");
    q.update(["users"])
        .unwrap()
        .set("status", 2)
        .set("login", "x")
        .set("status", 3)
        .where_("id", "=", 9)
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "UPDATE `users` SET `status` = ?, `login` = ? WHERE `id` = ?"
    );
    assert_eq!(
        compiled.params,
        vec![Value::Int(3), Value::from("x"), Value::Int(9)]
    );
}

#[test]
fn delete_from_table() {
    let mut q = builder("sqlite");
    q.delete().unwrap().from(["sessions"]).where_("expired", "=", 1).unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        "DELETE FROM \"sessions\" WHERE \"expired\" = ?"
    );
}

#[test]
fn datetime_binds_use_grammar_format() {
    let dt = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap();
    let config = DbConfig::new("mysql", "oms").datetime_format("%d.%m.%Y %H:%M");
    let mut q = Builder::new(ConnectionFactory::create(&config).unwrap(), false);
    q.update(["t"]).unwrap().set("changed", dt);
    assert_eq!(q.compile().unwrap().params, vec![Value::from("01.05.2024 08:30")]);
}

// ==================== Read-only ====================

#[test]
fn read_only_rejects_writes_without_state_change() {
    let mut q = read_only("mysql");
    assert!(q.insert(["a"]).unwrap_err().is_read_only());
    assert!(q.update(["t"]).unwrap_err().is_read_only());
    assert!(q.delete().unwrap_err().is_read_only());
    assert!(q.raw("DELETE FROM t").unwrap_err().is_read_only());
    assert!(q.raw("select * from t; drop table t").unwrap_err().is_read_only());
    assert_eq!(q.query_type(), QueryType::Undefined);
    assert!(q.compile().is_err());

    q.raw("SELECT 1;").unwrap();
    assert_eq!(q.to_sql().unwrap(), "SELECT 1");
}

#[test]
fn new_query_keeps_connection_and_flag() {
    let mut q = read_only("pgsql");
    q.select(["id"]).unwrap().from(["t"]);

    let fresh = q.new_query();
    assert!(fresh.is_read_only());
    assert!(Arc::ptr_eq(fresh.connection(), q.connection()));
    assert_eq!(fresh.query_type(), QueryType::Undefined);
}

// ==================== Types and binds ====================

#[test]
fn conflicting_types_fail() {
    let mut q = builder("mysql");
    q.select(["id"]).unwrap();
    assert!(matches!(q.insert(["a"]), Err(OmsError::QueryType(_))));
    assert!(matches!(q.raw("SELECT 1"), Err(OmsError::QueryType(_))));
    assert_eq!(q.query_type(), QueryType::Select);
}

#[test]
fn undefined_query_fails_to_compile() {
    let q = builder("sqlite");
    assert!(matches!(q.compile(), Err(OmsError::Compile(_))));
}

#[test]
fn explicit_binds_follow_generated_params() {
    let mut q = builder("sqlite");
    q.raw("SELECT * FROM t WHERE a = ? AND b = :b")
        .unwrap()
        .bind(1)
        .bind_named([("b", "x")])
        .bind_named([("b", "ignored")]);

    let compiled = q.compile().unwrap();
    assert_eq!(compiled.params, vec![Value::Int(1)]);
    assert_eq!(compiled.named, vec![("b".to_string(), Value::from("x"))]);
}

#[test]
fn sub_query_binds_stay_in_place() {
    let mut sub = read_only("mysql");
    sub.raw("SELECT user_id FROM groups WHERE gid = ? AND kind = :kind")
        .unwrap()
        .bind(7)
        .bind_named([("kind", "admin")]);

    let mut q = builder("mysql");
    q.select(["id"])
        .unwrap()
        .from(["users"])
        .where_in("id", sub)
        .unwrap()
        .where_("status", "=", 1)
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT `id` FROM `users` WHERE `id` IN (SELECT user_id FROM groups WHERE gid = ? AND kind = :kind) \
         AND `status` = ?"
    );
    assert_eq!(compiled.params, vec![Value::Int(7), Value::Int(1)]);
    assert_eq!(compiled.named, vec![("kind".to_string(), Value::from("admin"))]);
}

#[test]
fn union_binds_are_carried() {
    let mut archive = read_only("sqlite");
    archive.raw("SELECT id FROM archive WHERE k = ?").unwrap().bind("x");

    let mut q = builder("sqlite");
    q.select(["id"])
        .unwrap()
        .from(["current"])
        .where_("k", "=", "y")
        .unwrap()
        .union(archive)
        .bind(3);

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"id\" FROM \"current\" WHERE \"k\" = ? UNION SELECT id FROM archive WHERE k = ?"
    );
    assert_eq!(
        compiled.params,
        vec![Value::from("y"), Value::from("x"), Value::Int(3)]
    );
}

#[test]
fn merge_combines_clauses() {
    let mut base = builder("mysql");
    base.select(["id"]).unwrap().from(["t"]).where_("a", "=", 1).unwrap();

    let mut extra = base.new_query();
    extra.where_("b", "=", 2).unwrap().limit(5);

    let merged = base.merge(&extra);
    assert_eq!(
        merged.to_sql().unwrap(),
        "SELECT `id` FROM `t` WHERE `a` = ? AND `b` = ? LIMIT 5"
    );
    assert_eq!(base.limit_value(), None);
}

#[test]
fn null_connection_uses_ansi_grammar() {
    let mut q = Builder::new(Arc::new(NullConnection::new()), false);
    q.select(["id"]).unwrap().from(["t"]).limit(1);
    assert_eq!(q.to_sql().unwrap(), "SELECT \"id\" FROM \"t\" LIMIT 1");
}

#[tokio::test]
async fn execute_on_closed_connection_fails() {
    let mut q = builder("sqlite");
    q.select(["id"]).unwrap().from(["t"]);
    assert!(matches!(q.execute().await, Err(OmsError::Connection(_))));
}

#[tokio::test]
async fn unsupported_bind_types_fail_before_status_check() {
    let mut q = builder("sqlite");
    q.select(["id"]).unwrap().from(["t"]).where_("flag", "=", true).unwrap();
    assert!(matches!(q.execute().await, Err(OmsError::BindType(_))));
}
