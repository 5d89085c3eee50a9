//! Statement execution.
//!
//! The compiler and assembler never touch a connection. Everything that
//! does goes through the [`Executor`] capability: [`MySqlExecutor`] backs it
//! with a sqlx pool, tests back it with an in-memory fake. The
//! [`Querier`] terminals (`query`, `query_page`, ...) live here because
//! they are the only part of the query API that performs I/O.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Executor as _, Row as _, TypeInfo, ValueRef};

use crate::error::{WeaveError, WeaveResult};
use crate::query::{Querier, Statement};
use crate::value::SqlValue;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

/// One result row: ordered column → text.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// `values` must be aligned with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// Value of the first column.
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Tabular result. `columns` keeps the select order even when no row came back.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct QueryResult {
    /// Rows in the full result; for pages, the independently counted total.
    pub total_count: u64,
    pub offset: u64,
    /// Rows in this result.
    pub rows_count: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let shared: Arc<[String]> = columns.clone().into();
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&shared), values))
            .collect();
        Self {
            total_count: rows.len() as u64,
            offset: 0,
            rows_count: rows.len(),
            columns,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Something that runs statements.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn query(&self, statement: &Statement) -> WeaveResult<QueryResult>;

    async fn execute(&self, statement: &Statement) -> WeaveResult<ExecResult>;

    /// Run a `SELECT COUNT(..)` and read the first cell.
    async fn count(&self, statement: &Statement) -> WeaveResult<u64> {
        let result = self.query(statement).await?;
        parse_count(result.rows.first().and_then(Row::first))
    }

    /// Count then fetch. Implementations with connection affinity should
    /// run both on one connection.
    async fn query_page(&self, count: &Statement, data: &Statement) -> WeaveResult<(u64, QueryResult)> {
        let total = self.count(count).await?;
        let result = self.query(data).await?;
        Ok((total, result))
    }
}

fn parse_count(cell: Option<&str>) -> WeaveResult<u64> {
    match cell {
        None => Ok(0),
        Some(text) => text
            .trim()
            .parse()
            .map_err(|_| WeaveError::InvalidValue(format!("count result '{}' is not a number", text))),
    }
}

/// Render a raw cell as text.
///
/// Cells made only of control bytes (< 32) are treated as binary and
/// rendered as the concatenated base-2 form of each byte; anything else is
/// lossy UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| *b < 32) {
        let mut out = String::with_capacity(bytes.len() * 5);
        for b in bytes {
            let _ = write!(out, "{:b}", b);
        }
        return out;
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Pool-backed MySQL executor.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

/// Pool sizing for [`MySqlExecutor::connect_lazy`].
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_conns: u32,
    pub min_idle: u32,
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_conns: 5,
            min_idle: 0,
            max_lifetime: None,
        }
    }
}

impl MySqlExecutor {
    /// Connect eagerly using a `mysql://` URL.
    pub async fn connect(dsn: &str) -> WeaveResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(PoolSettings::default().max_conns)
            .connect(dsn)
            .await
            .map_err(|e| WeaveError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Build a pool that connects on first use.
    pub fn connect_lazy(dsn: &str, settings: PoolSettings) -> WeaveResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_conns.max(1))
            .min_connections(settings.min_idle)
            .max_lifetime(settings.max_lifetime)
            .connect_lazy(dsn)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param.to_param() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::UInt(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn log_outcome<T>(statement: &Statement, started: Instant, outcome: &Result<T, sqlx::Error>) {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(_) => tracing::debug!(
            sql = %statement.sql,
            params = statement.params.len(),
            elapsed_ms,
            "statement ok"
        ),
        Err(err) => tracing::warn!(
            sql = %statement.sql,
            params = statement.params.len(),
            elapsed_ms,
            error = %err,
            "statement failed"
        ),
    }
}

async fn fetch_rows<'c, E>(conn: E, statement: &Statement) -> WeaveResult<Vec<MySqlRow>>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let started = Instant::now();
    let outcome = bind_params(sqlx::query(&statement.sql), &statement.params)
        .fetch_all(conn)
        .await;
    log_outcome(statement, started, &outcome);
    Ok(outcome?)
}

fn decode_cell(row: &MySqlRow, index: usize) -> WeaveResult<String> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(String::new());
    }
    let type_name = row.columns()[index].type_info().name();
    let text = match type_name {
        "BOOLEAN" => if row.try_get::<bool, _>(index)? { "1" } else { "0" }.to_string(),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get_unchecked::<i64, _>(index)?.to_string()
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get_unchecked::<u64, _>(index)?.to_string(),
        "FLOAT" => row.try_get::<f32, _>(index)?.to_string(),
        "DOUBLE" => row.try_get::<f64, _>(index)?.to_string(),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)?
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)?
            .format("%Y-%m-%d")
            .to_string(),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)?
            .format("%H:%M:%S")
            .to_string(),
        _ => decode_text(&row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };
    Ok(text)
}

fn decode_rows(columns: Vec<String>, rows: &[MySqlRow]) -> WeaveResult<QueryResult> {
    let decoded = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect::<WeaveResult<Vec<_>>>())
        .collect::<WeaveResult<Vec<_>>>()?;
    Ok(QueryResult::new(columns, decoded))
}

impl MySqlExecutor {
    async fn column_names(&self, rows: &[MySqlRow], sql: &str) -> Vec<String> {
        if let Some(row) = rows.first() {
            return row.columns().iter().map(|c| c.name().to_string()).collect();
        }
        // No rows to read names from; ask the server for the shape.
        match self.pool.describe(sql).await {
            Ok(describe) => describe.columns().iter().map(|c| c.name().to_string()).collect(),
            Err(err) => {
                tracing::debug!(error = %err, "could not describe empty result");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Executor for MySqlExecutor {
    async fn query(&self, statement: &Statement) -> WeaveResult<QueryResult> {
        let rows = fetch_rows(&self.pool, statement).await?;
        let columns = self.column_names(&rows, &statement.sql).await;
        decode_rows(columns, &rows)
    }

    async fn execute(&self, statement: &Statement) -> WeaveResult<ExecResult> {
        let started = Instant::now();
        let outcome = bind_params(sqlx::query(&statement.sql), &statement.params)
            .execute(&self.pool)
            .await;
        log_outcome(statement, started, &outcome);
        let done = outcome?;
        Ok(ExecResult {
            rows_affected: done.rows_affected(),
            last_insert_id: done.last_insert_id(),
        })
    }

    async fn query_page(&self, count: &Statement, data: &Statement) -> WeaveResult<(u64, QueryResult)> {
        let mut conn = self.pool.acquire().await?;
        let count_rows = fetch_rows(&mut *conn, count).await?;
        let total = match count_rows.first() {
            Some(row) => row.try_get::<i64, _>(0)?.max(0) as u64,
            None => 0,
        };
        let rows = fetch_rows(&mut *conn, data).await?;
        drop(conn);
        let columns = self.column_names(&rows, &data.sql).await;
        Ok((total, decode_rows(columns, &rows)?))
    }
}

/// Execution terminals.
impl Querier {
    /// Run the assembled statement.
    pub async fn query(&mut self, executor: &dyn Executor) -> WeaveResult<QueryResult> {
        let statement = self.build()?.clone();
        executor.query(&statement).await
    }

    /// First row, with the limit forced to 1. `None` when nothing matched.
    pub async fn query_row(&mut self, executor: &dyn Executor) -> WeaveResult<Option<Row>> {
        self.set_limit(1);
        let result = self.query(executor).await?;
        Ok(result.rows.into_iter().next())
    }

    /// First column of the first row; `""` when nothing matched.
    pub async fn query_scalar(&mut self, executor: &dyn Executor) -> WeaveResult<String> {
        let result = self.query(executor).await?;
        Ok(result
            .rows
            .first()
            .and_then(Row::first)
            .unwrap_or_default()
            .to_string())
    }

    pub async fn query_all(&mut self, executor: &dyn Executor) -> WeaveResult<Vec<Row>> {
        Ok(self.query(executor).await?.rows)
    }

    /// Rows keyed by the text of `field`. Rows lacking the column are
    /// skipped; on duplicate keys the later row wins.
    pub async fn query_assoc(&mut self, executor: &dyn Executor, field: &str) -> WeaveResult<HashMap<String, Row>> {
        let result = self.query(executor).await?;
        let mut out = HashMap::with_capacity(result.rows.len());
        for row in result.rows {
            if let Some(key) = row.get(field) {
                out.insert(key.to_string(), row);
            }
        }
        Ok(out)
    }

    /// Total number of rows the query matches, ignoring LIMIT.
    pub async fn count(&self, executor: &dyn Executor) -> WeaveResult<u64> {
        let statement = self.count_statement()?;
        executor.count(&statement).await
    }

    /// Count-then-fetch one page.
    ///
    /// `total_count` comes from the COUNT statement, the rows from the data
    /// statement. The two run back to back without snapshot isolation, so a
    /// concurrent write can make them disagree. Raw SQL keeps its own LIMIT,
    /// so a raw page reports offset 0.
    pub async fn query_page(&mut self, executor: &dyn Executor, page: u64, page_size: u64) -> WeaveResult<QueryResult> {
        self.paginate(page, page_size);
        let count = self.count_statement()?;
        let data = self.build()?.clone();
        let (total, mut result) = executor.query_page(&count, &data).await?;
        result.total_count = total;
        result.offset = if self.is_raw() {
            0
        } else {
            page.max(1).saturating_sub(1).saturating_mul(page_size)
        };
        result.rows_count = result.rows.len();
        Ok(result)
    }
}

/// Executors are shared between callers through the registry.
pub type SharedExecutor = Arc<dyn Executor>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"hello"), "hello");
        assert_eq!(decode_text(&[1, 0, 3]), "1011");
        assert_eq!(decode_text(&[b'a', 0xff]), "a\u{fffd}");
        assert_eq!(decode_text(&[]), "");
    }

    #[test]
    fn test_row_access() {
        let result = QueryResult::new(cols(&["id", "name"]), vec![vec!["1".into(), "ann".into()]]);
        let row = &result.rows[0];
        assert_eq!(row.get("name"), Some("ann"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.first(), Some("1"));
        assert_eq!(result.rows_count, 1);
        assert_eq!(result.total_count, 1);
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let result = QueryResult::new(cols(&["z", "a"]), vec![vec!["1".into(), "2".into()]]);
        let json = serde_json::to_string(&result.rows[0]).unwrap();
        assert_eq!(json, r#"{"z":"1","a":"2"}"#);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(None).unwrap(), 0);
        assert_eq!(parse_count(Some("25")).unwrap(), 25);
        assert!(parse_count(Some("x")).is_err());
    }
}
