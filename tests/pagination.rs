mod common;

use std::sync::Arc;

use common::FakeExecutor;
use pretty_assertions::assert_eq;
use sqlweave::prelude::*;

fn ids(result: &QueryResult) -> Vec<String> {
    result
        .rows
        .iter()
        .map(|r| r.get("id").unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_second_page_of_twenty_five() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new().from("users").order_by("id");

    let page = q.query_page(&db, 2, 10).await.unwrap();

    assert_eq!(page.total_count, 25);
    assert_eq!(page.rows_count, 10);
    assert_eq!(page.offset, 10);
    assert_eq!(page.columns, vec!["id", "name"]);
    assert_eq!(ids(&page), (11..=20).map(|i| i.to_string()).collect::<Vec<_>>());

    assert_eq!(
        db.sql_log(),
        vec![
            "SELECT COUNT(0) FROM ( SELECT * FROM `users` ) a".to_string(),
            "SELECT * FROM `users` ORDER BY id LIMIT 10, 10".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_last_partial_page() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new().from("users");

    let page = q.query_page(&db, 3, 10).await.unwrap();

    assert_eq!(page.total_count, 25);
    assert_eq!(page.rows_count, 5);
    assert_eq!(ids(&page), vec!["21", "22", "23", "24", "25"]);
}

#[tokio::test]
async fn test_page_zero_is_first_page() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new().from("users");

    let page = q.query_page(&db, 0, 10).await.unwrap();

    assert_eq!(page.offset, 0);
    assert_eq!(ids(&page).first().map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_page_past_the_end_keeps_total() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new().from("users");

    let page = q.query_page(&db, 9, 10).await.unwrap();

    assert_eq!(page.total_count, 25);
    assert_eq!(page.rows_count, 0);
    assert!(page.rows.is_empty());
}

#[tokio::test]
async fn test_page_with_parameterized_filter() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new()
        .from("users")
        .filter(Condition::field("name like", "user%"))
        .parameterized();

    q.query_page(&db, 1, 5).await.unwrap();

    let log = db.statements();
    assert_eq!(log.len(), 2);
    assert_eq!(
        log[0].sql,
        "SELECT COUNT(0) FROM ( SELECT * FROM `users` WHERE `name` LIKE ? ) a"
    );
    assert_eq!(log[0].params, vec![SqlValue::Text("user%".into())]);
    assert_eq!(log[1].sql, "SELECT * FROM `users` WHERE `name` LIKE ? LIMIT 0, 5");
    assert_eq!(log[1].params, log[0].params);
}

#[tokio::test]
async fn test_raw_page_counts_by_truncation() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::raw("SELECT * FROM users WHERE id > ? limit 10, 10").bind(0);

    let page = q.query_page(&db, 2, 10).await.unwrap();

    assert_eq!(page.total_count, 25);
    assert_eq!(page.offset, 0);
    let log = db.statements();
    assert_eq!(
        log[0].sql,
        "SELECT COUNT(0) FROM ( SELECT * FROM users WHERE id > ? ) a"
    );
    assert_eq!(log[0].params, vec![SqlValue::Int(0)]);
    assert_eq!(log[1].sql, "SELECT * FROM users WHERE id > ? limit 10, 10");
}

#[tokio::test]
async fn test_count() {
    let db = FakeExecutor::with_rows(25);
    let q = Querier::new()
        .from("users")
        .filter(Condition::field("id >", 0))
        .limit(3);

    assert_eq!(q.count(&db).await.unwrap(), 25);
    assert_eq!(
        db.sql_log(),
        vec!["SELECT COUNT(0) FROM ( SELECT * FROM `users` WHERE `id` > 0 ) a".to_string()]
    );
}

#[tokio::test]
async fn test_empty_table_fails_before_execution() {
    let db = FakeExecutor::with_rows(25);
    let mut q = Querier::new().select("id");

    let err = q.query_page(&db, 1, 10).await.unwrap_err();

    assert!(matches!(err, WeaveError::EmptyTableName));
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn test_page_through_registry() {
    let mut registry = Registry::new();
    let db = Arc::new(FakeExecutor::with_rows(25));
    registry.register_executor("main", db.clone());

    let executor = registry.get("main").unwrap();
    let mut q = Querier::new().from("users");
    let page = q.query_page(executor.as_ref(), 1, 10).await.unwrap();

    assert_eq!(page.total_count, 25);
    assert_eq!(page.rows_count, 10);
    assert_eq!(db.statements().len(), 2);
    assert!(matches!(registry.get("other"), Err(WeaveError::UnknownDatabase(_))));
}
