#![cfg(feature = "sqlite")]

use chrono::{FixedOffset, NaiveDate, TimeZone};
use sql_template::prelude::*;

const CREATE_DOCS: &str = r#"
create table docs (
    id {{id}} primary key,
    body {{text}},
    payload {{bytes}},
    active {{bool}} not null default {{TRUE}},
    rank {{int}},
    due {{datetime}},
    created {{datetime}} not null default {{NOW}},
    archived {{datetime}} not null default {{default_datetime}}
)"#;

const INSERT_DOC: &str = r#"
insert into docs (id, body, payload, active, rank, due)
values ({{arg "id"}}, {{arg "body"}}, {{arg "payload"}}, {{arg "active"}}, {{arg "rank"}}, {{arg "due"}})"#;

struct Fixture {
    insert: Query,
    by_id: Query,
    by_ids: Query,
}

async fn fixture() -> Result<Fixture, SqlTemplateError> {
    let db = Database::new();
    let create = db.declare(CREATE_DOCS)?;
    let insert = db.declare(INSERT_DOC)?;
    let by_id = db.declare(
        r#"select id, body, payload, active, rank, due, created from docs where id = {{arg "id"}}"#,
    )?;
    let by_ids = db.declare(
        r#"select id, rank from docs where id in ({{arg "...ids"}}) {{if sqlite}}order by rank{{end}}"#,
    )?;
    assert_eq!(db.pending(), 4);

    let driver = SqliteOptions::new(":memory:".into()).build().await?;
    db.connect(driver)?;
    assert_eq!(db.dialect(), Some(Dialect::Sqlite));
    assert_eq!(db.pending(), 0);

    create.execute(&[]).await?;
    Ok(Fixture {
        insert,
        by_id,
        by_ids,
    })
}

fn doc(id: &str, rank: i64) -> Vec<Arg> {
    vec![
        Arg::new("id", id),
        Arg::new("body", format!("body of {id}")),
        Arg::new("payload", vec![1_u8, 2, 3]),
        Arg::new("active", rank % 2 == 0),
        Arg::new("rank", rank),
        Arg::new("due", None::<chrono::NaiveDateTime>),
    ]
}

#[tokio::test]
async fn round_trips_column_types() -> Result<(), SqlTemplateError> {
    let fx = fixture().await?;

    let offset = FixedOffset::east_opt(2 * 3600).unwrap();
    let due = offset.with_ymd_and_hms(2024, 5, 6, 9, 30, 0).unwrap();
    // argument order differs from the insert's column order
    let args = [
        Arg::new("due", due),
        Arg::new("rank", 42),
        Arg::new("active", true),
        Arg::new("payload", vec![0xde_u8, 0xad]),
        Arg::new("body", "hello"),
        Arg::new("id", "doc-1"),
    ];
    assert_eq!(fx.insert.execute(&args).await?, 1);

    let row = fx.by_id.query_one(&[Arg::new("id", "doc-1")]).await?;
    assert_eq!(row.get("body").and_then(Value::as_text), Some("hello"));
    assert_eq!(row.get("payload").and_then(Value::as_blob), Some(&[0xde_u8, 0xad][..]));
    assert_eq!(row.get("active").and_then(Value::as_bool), Some(true));
    assert_eq!(row.get("rank").and_then(Value::as_int), Some(&42));
    assert_eq!(
        row.get("due").and_then(Value::as_timestamp),
        Some(
            NaiveDate::from_ymd_opt(2024, 5, 6)
                .unwrap()
                .and_hms_opt(7, 30, 0)
                .unwrap()
        )
    );
    assert!(row.get("created").and_then(Value::as_timestamp).is_some());
    Ok(())
}

#[tokio::test]
async fn null_arguments_store_null() -> Result<(), SqlTemplateError> {
    let fx = fixture().await?;
    fx.insert.execute(&doc("doc-1", 1)).await?;
    let row = fx.by_id.query_one(&[Arg::new("id", "doc-1")]).await?;
    assert!(row.get("due").is_some_and(Value::is_null));
    Ok(())
}

#[tokio::test]
async fn query_one_reports_not_found_unwrapped() -> Result<(), SqlTemplateError> {
    let fx = fixture().await?;
    let err = fx
        .by_id
        .query_one(&[Arg::new("id", "missing")])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlTemplateError::NotFound));
    assert!(
        fx.by_id
            .query_optional(&[Arg::new("id", "missing")])
            .await?
            .is_none()
    );
    Ok(())
}

#[tokio::test]
async fn list_arguments_expand_per_call() -> Result<(), SqlTemplateError> {
    let fx = fixture().await?;
    for (id, rank) in [("a", 3), ("b", 1), ("c", 2), ("d", 4)] {
        fx.insert.execute(&doc(id, rank)).await?;
    }

    let rs = fx.by_ids.query_many(&Arg::list("ids", ["c", "a", "b"])).await?;
    let ids: Vec<_> = rs
        .results
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_text))
        .collect();
    assert_eq!(ids, ["b", "c", "a"]);

    let rs = fx.by_ids.query_many(&Arg::list("ids", ["d"])).await?;
    assert_eq!(rs.len(), 1);

    // sqlite accepts an empty in-list
    let rs = fx.by_ids.query_many(&[]).await?;
    assert!(rs.is_empty());

    // the declared statement keeps its list marker
    assert!(fx.by_ids.statement().contains(r#"{{list "ids"}}"#));
    Ok(())
}

#[tokio::test]
async fn debug_renders_a_table() -> Result<(), SqlTemplateError> {
    let fx = fixture().await?;
    fx.insert.execute(&doc("a", 1)).await?;
    fx.insert.execute(&doc("b", 2)).await?;

    let table = fx.by_ids.debug(&Arg::list("ids", ["a", "b"])).await?;
    let lines: Vec<&str> = table.lines().collect();
    assert!(lines[1].starts_with("id"));
    assert!(lines[1].contains("rank"));
    assert!(lines[3].starts_with("a "));
    assert_eq!(lines.last(), Some(&"(2 rows)"));
    Ok(())
}

#[tokio::test]
async fn builder_opens_a_file_database() -> Result<(), SqlTemplateError> {
    let dir = tempfile::tempdir().map_err(|e| SqlTemplateError::Other(e.to_string()))?;
    let path = dir.path().join("docs.db").to_string_lossy().into_owned();

    let driver = SqliteDriver::builder(path.clone())
        .wal(true)
        .busy_timeout(std::time::Duration::from_secs(5))
        .build()
        .await?;
    assert_eq!(driver.db_path(), path);
    driver
        .execute_batch("create table t (a INTEGER); insert into t values (1), (2);")
        .await?;

    let db = Database::new();
    db.connect(driver)?;
    let count = db.declare("select count(*) as n from t")?;
    let row = count.query_one(&[]).await?;
    assert_eq!(row.get("n").and_then(Value::as_int), Some(&2));
    Ok(())
}

