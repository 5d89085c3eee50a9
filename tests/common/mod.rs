//! In-memory executor used by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use sqlweave::prelude::*;

/// Serves a fixed table of `rows` users (`id`, `name`), honouring only
/// `SELECT COUNT(0)` and a trailing `LIMIT offset, count`.
pub struct FakeExecutor {
    rows: u64,
    pub log: Mutex<Vec<Statement>>,
}

impl FakeExecutor {
    pub fn with_rows(rows: u64) -> Self {
        Self {
            rows,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.log.lock().unwrap().clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    fn window(sql: &str) -> Option<(u64, u64)> {
        let pos = sql.rfind(" LIMIT ")?;
        let (offset, count) = sql[pos + 7..].split_once(',')?;
        Some((offset.trim().parse().ok()?, count.trim().parse().ok()?))
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn query(&self, statement: &Statement) -> WeaveResult<QueryResult> {
        self.log.lock().unwrap().push(statement.clone());

        if statement.sql.starts_with("SELECT COUNT(0)") {
            return Ok(QueryResult::new(
                vec!["COUNT(0)".to_string()],
                vec![vec![self.rows.to_string()]],
            ));
        }

        let (offset, count) = Self::window(&statement.sql).unwrap_or((0, self.rows));
        let end = offset.saturating_add(count).min(self.rows);
        let rows = (offset..end)
            .map(|i| vec![(i + 1).to_string(), format!("user{}", i + 1)])
            .collect();
        Ok(QueryResult::new(vec!["id".to_string(), "name".to_string()], rows))
    }

    async fn execute(&self, statement: &Statement) -> WeaveResult<ExecResult> {
        self.log.lock().unwrap().push(statement.clone());
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: self.rows + 1,
        })
    }
}
