mod common;

use std::sync::Arc;

use common::{RecordingDriver, init_tracing};
use sql_template::prelude::*;

const BY_OWNER: &str = r#"select * from docs
where owner = {{arg "owner"}} and id in ({{arg "...ids"}}) and kind = {{arg "kind"}}"#;

#[tokio::test]
async fn argument_order_does_not_change_binding() -> Result<(), SqlTemplateError> {
    init_tracing();
    let driver = RecordingDriver::new(Dialect::Postgres);
    let db = Database::new();
    let q = db.declare(r#"update t set a = {{arg "a"}}, b = {{arg "b"}} where c = {{arg "c"}}"#)?;
    db.connect(driver.clone())?;

    q.execute(&[Arg::new("a", 1), Arg::new("b", "two"), Arg::new("c", true)])
        .await?;
    q.execute(&[Arg::new("c", true), Arg::new("a", 1), Arg::new("b", "two")])
        .await?;

    let calls = driver.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    assert_eq!(calls[0].statement, "update t set a = $1, b = $2 where c = $3");
    assert_eq!(
        calls[0].params,
        BoundParams::Positional(vec![
            Value::Int(1),
            Value::Text("two".into()),
            Value::Bool(true)
        ])
    );
    Ok(())
}

#[tokio::test]
async fn sqlserver_binds_by_name() -> Result<(), SqlTemplateError> {
    let driver = RecordingDriver::new(Dialect::Sqlserver);
    let db = Database::new();
    let q = db.declare(BY_OWNER)?;
    db.connect(driver.clone())?;

    let mut args = vec![Arg::new("kind", "memo"), Arg::new("owner", 9)];
    args.extend(Arg::list("ids", [4, 5]));
    q.query_many(&args).await?;

    let call = &driver.calls()[0];
    assert_eq!(
        call.statement,
        "select * from docs\nwhere owner = @owner and id in (@ids_0, @ids_1) and kind = @kind"
    );
    assert_eq!(
        call.params,
        BoundParams::Named(vec![
            ("owner".into(), Value::Int(9)),
            ("ids_0".into(), Value::Int(4)),
            ("ids_1".into(), Value::Int(5)),
            ("kind".into(), Value::Text("memo".into())),
        ])
    );
    Ok(())
}

#[tokio::test]
async fn lists_of_three_and_zero() -> Result<(), SqlTemplateError> {
    let driver = RecordingDriver::new(Dialect::Postgres);
    let db = Database::new();
    db.connect(driver.clone())?;
    let q = db.declare(BY_OWNER)?;

    let mut args = vec![Arg::new("owner", 1), Arg::new("kind", "memo")];
    args.extend(Arg::list("ids", ["x", "y", "z"]));
    q.query_many(&args).await?;
    q.query_many(&[Arg::new("owner", 1), Arg::new("kind", "memo")])
        .await?;

    let calls = driver.calls();
    assert_eq!(
        calls[0].statement,
        "select * from docs\nwhere owner = $1 and id in ($2, $3, $4) and kind = $5"
    );
    assert_eq!(calls[0].params.len(), 5);
    assert_eq!(
        calls[1].statement,
        "select * from docs\nwhere owner = $1 and id in () and kind = $2"
    );
    assert_eq!(calls[1].params.len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_expand_independently() -> Result<(), SqlTemplateError> {
    init_tracing();
    let driver = RecordingDriver::new(Dialect::Mysql);
    let db = Database::new();
    let q = db.declare(BY_OWNER)?;
    db.connect(driver.clone())?;

    let mut handles = Vec::new();
    for n in 0..32_i64 {
        let q = q.clone();
        handles.push(tokio::spawn(async move {
            let mut args = vec![Arg::new("owner", n), Arg::new("kind", "k")];
            args.extend(Arg::list("ids", 0..n));
            let bound = q.bind(&args);
            assert_eq!(bound.statement.matches('?').count(), usize::try_from(n).unwrap() + 2);
            assert_eq!(bound.params.len(), usize::try_from(n).unwrap() + 2);
            q.execute(&args).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| SqlTemplateError::Other(e.to_string()))??;
    }

    let calls = driver.calls();
    assert_eq!(calls.len(), 32);
    for call in &calls {
        // owner is bound first and equals the list length
        let owner = call.params.values()[0].clone();
        let Value::Int(n) = owner else {
            panic!("owner should bind first");
        };
        assert_eq!(call.params.len(), usize::try_from(n).unwrap() + 2);
    }
    assert!(q.statement().contains(r#"{{list "ids"}}"#));
    Ok(())
}

#[tokio::test]
async fn transaction_binding_routes_statements() -> Result<(), SqlTemplateError> {
    let driver = RecordingDriver::new(Dialect::Cockroachdb);
    let db = Database::new();
    db.connect_shared(Arc::new(driver.clone()))?;
    let q = db.declare(r#"delete from t where id = {{arg "id"}}"#)?;

    let tx = db.begin().await?;
    let in_tx = q.with_transaction(Some(&tx));
    in_tx.execute(&[Arg::new("id", 1)]).await?;
    q.execute(&[Arg::new("id", 2)]).await?;
    assert!(in_tx.require_transaction().is_ok());
    assert!(q.require_transaction().is_err());
    assert!(q.with_transaction(None).transaction().is_none());
    tx.commit().await?;

    let calls = driver.calls();
    assert!(calls[0].in_tx);
    assert!(!calls[1].in_tx);
    assert_eq!(driver.events(), ["begin", "commit"]);
    Ok(())
}

#[test]
fn dialect_conditionals_pick_one_branch() -> Result<(), SqlTemplateError> {
    let src = r#"select {{if sqlserver}}top({{arg "n"}}) *{{else}}*{{end}} from t{{if not sqlserver}} limit {{arg "n"}}{{end}}"#;
    let expected = [
        (Dialect::Sqlserver, "select top(@n) * from t"),
        (Dialect::Postgres, "select * from t limit $1"),
        (Dialect::Sqlite, "select * from t limit ?"),
    ];
    for (dialect, statement) in expected {
        let db = Database::with_dialect(dialect);
        let q = db.declare(src)?;
        assert_eq!(q.statement(), statement);
        assert_eq!(q.arg_names(), ["n"]);
    }
    Ok(())
}

#[test]
fn sqlserver_rejects_names_that_collide_once_sanitised() {
    let src = r#"select * from t where a = {{arg "ids_0"}} and id in ({{arg "...ids"}})"#;
    let err = Database::with_dialect(Dialect::Sqlserver)
        .declare(src)
        .unwrap_err();
    assert!(err.is_config_fault());
    assert!(err.to_string().contains("would both bind as @ids_0"));

    // the same template is fine where placeholders are positional
    let q = Database::with_dialect(Dialect::Postgres).declare(src).unwrap();
    let mut args = vec![Arg::new("ids_0", "plain")];
    args.extend(Arg::list("ids", ["member"]));
    assert_eq!(
        q.bind(&args).params,
        BoundParams::Positional(vec![
            Value::Text("plain".into()),
            Value::Text("member".into())
        ])
    );
}
