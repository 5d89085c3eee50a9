mod common;

use common::FakeExecutor;
use pretty_assertions::assert_eq;
use sqlweave::prelude::*;

#[tokio::test]
async fn test_query_row_forces_limit_one() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new().from("users").filter(Condition::field("id >=", 1));

    let row = q.query_row(&db).await.unwrap().unwrap();

    assert_eq!(row.get("id"), Some("1"));
    assert_eq!(row.get("name"), Some("user1"));
    assert_eq!(
        db.sql_log(),
        vec!["SELECT * FROM `users` WHERE `id` >= 1 LIMIT 0, 1".to_string()]
    );
}

#[tokio::test]
async fn test_query_row_on_empty_result() {
    let db = FakeExecutor::with_rows(0);
    let mut q = Querier::new().from("users");

    assert_eq!(q.query_row(&db).await.unwrap(), None);
    assert_eq!(q.query_scalar(&db).await.unwrap(), "");
    assert!(q.query_all(&db).await.unwrap().is_empty());
    assert!(q.query_assoc(&db, "id").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_query_scalar_reads_first_cell() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new().select("id, name").from("users").offset(4).limit(2);

    assert_eq!(q.query_scalar(&db).await.unwrap(), "5");
}

#[tokio::test]
async fn test_query_all_and_assoc() {
    let db = FakeExecutor::with_rows(3);
    let mut q = Querier::new().from("users");

    let rows = q.query_all(&db).await.unwrap();
    assert_eq!(rows.len(), 3);

    let by_name = q.query_assoc(&db, "name").await.unwrap();
    assert_eq!(by_name.len(), 3);
    assert_eq!(by_name["user2"].get("id"), Some("2"));

    let missing = q.query_assoc(&db, "email").await.unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
async fn test_cached_statement_is_reused() {
    let db = FakeExecutor::with_rows(5);
    let mut q = Querier::new()
        .from("users")
        .filter(Fields::new().add("name", "O'Brien").add("id in", vec![1, 2]));

    q.query(&db).await.unwrap();
    q.query(&db).await.unwrap();

    let log = db.sql_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], log[1]);
    assert_eq!(
        log[0],
        r"SELECT * FROM `users` WHERE `name` = 'O\'Brien' AND `id` IN (1, 2)"
    );
}

#[tokio::test]
async fn test_compile_error_reaches_no_executor() {
    let db = FakeExecutor::with_rows(5);
    let mut q = Querier::new()
        .from("users")
        .filter(Condition::field("id in", Vec::<i64>::new()));

    let err = q.query(&db).await.unwrap_err();

    assert!(matches!(err, WeaveError::MalformedOperandCount { .. }));
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn test_mutations_execute() {
    let db = FakeExecutor::with_rows(25);
    let users = Mutation::new("users").parameterized();

    let insert = users
        .insert(&Record::new().set("name", "new").set("active", true))
        .unwrap();
    let done = db.execute(&insert).await.unwrap();
    assert_eq!(done.last_insert_id, 26);

    let delete = users.delete(&Condition::field("id", 26)).unwrap();
    db.execute(&delete).await.unwrap();

    let log = db.statements();
    assert_eq!(log[0].sql, "INSERT INTO `users` (`name`, `active`) VALUES (?, ?)");
    assert_eq!(log[0].params, vec![SqlValue::Text("new".into()), SqlValue::Int(1)]);
    assert_eq!(log[1].sql, "DELETE FROM `users` WHERE `id` = ?");
}
