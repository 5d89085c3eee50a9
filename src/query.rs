//! Query assembler.
//!
//! [`Querier`] collects the pieces of a SELECT through fluent setters and
//! assembles them on first [`Querier::build`]. The result is cached until
//! the next setter call. Validation happens at assembly, never at call time.

use std::fmt;

use serde::Serialize;

use crate::ast::{Condition, Logic};
use crate::error::{WeaveError, WeaveResult};
use crate::transpiler::{quote_identifier, CoercionHooks, CompileMode, ConditionBuilder, Fragment, PLACEHOLDER};
use crate::value::SqlValue;

/// A finished statement ready for an executor.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl From<Fragment> for Statement {
    fn from(f: Fragment) -> Self {
        Self {
            sql: f.sql,
            params: f.params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Join flavour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    /// Caller-supplied keyword(s) placed before `JOIN`, e.g. `LEFT OUTER`.
    Custom(String),
}

impl JoinKind {
    pub fn as_sql(&self) -> &str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Custom(kind) => kind.trim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    /// Raw ON condition, emitted verbatim.
    pub on: String,
}

/// Fluent SELECT builder.
///
/// ```
/// use sqlweave::ast::Condition;
/// use sqlweave::query::Querier;
///
/// let mut q = Querier::new()
///     .select("id, name")
///     .from("users")
///     .filter(Condition::field("age >", 18))
///     .order_by("id DESC")
///     .limit(10);
/// assert_eq!(
///     q.build().unwrap().sql,
///     "SELECT id, name FROM `users` WHERE `age` > 18 ORDER BY id DESC LIMIT 0, 10"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Querier {
    fields: String,
    table: String,
    joins: Vec<Join>,
    filter: Option<Condition>,
    group_by: String,
    having: Option<Condition>,
    order_by: String,
    offset: u64,
    limit: u64,
    raw: Option<Statement>,
    mode: CompileMode,
    hooks: CoercionHooks,
    cached: Option<Statement>,
}

impl Querier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use caller SQL verbatim; assembly is skipped entirely.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            raw: Some(Statement::new(sql)),
            ..Self::default()
        }
    }

    /// Bind a positional argument to the raw SQL. Ignored for assembled queries.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        if let Some(raw) = self.raw.as_mut() {
            raw.params.push(value.into());
        }
        self.touch()
    }

    /// Selected fields, emitted verbatim. Defaults to `*`.
    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self.touch()
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self.touch()
    }

    pub fn join(mut self, kind: JoinKind, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on: on.into(),
        });
        self.touch()
    }

    pub fn inner_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.join(JoinKind::Inner, table, on)
    }

    pub fn left_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.join(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.join(JoinKind::Right, table, on)
    }

    /// WHERE condition, compiled with AND.
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.filter = Some(condition.into());
        self.touch()
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = group_by.into();
        self.touch()
    }

    /// HAVING condition; only emitted together with GROUP BY.
    pub fn having(mut self, condition: impl Into<Condition>) -> Self {
        self.having = Some(condition.into());
        self.touch()
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self.touch()
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.set_offset(offset);
        self
    }

    /// Row limit; `0` means no LIMIT clause.
    pub fn limit(mut self, limit: u64) -> Self {
        self.set_limit(limit);
        self
    }

    /// Compile WHERE/HAVING with `?` placeholders.
    pub fn parameterized(mut self) -> Self {
        self.mode = CompileMode::Parameterized;
        self.touch()
    }

    pub fn with_hooks(mut self, hooks: CoercionHooks) -> Self {
        self.hooks = hooks;
        self.touch()
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
        self.cached = None;
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
        self.cached = None;
    }

    /// Point the querier at one page. Pages start at 1; lower values are clamped.
    pub fn paginate(&mut self, page: u64, page_size: u64) {
        let page = page.max(1);
        self.set_offset((page - 1).saturating_mul(page_size));
        self.set_limit(page_size);
    }

    pub fn is_raw(&self) -> bool {
        self.raw.is_some()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    fn touch(mut self) -> Self {
        self.cached = None;
        self
    }

    /// Assemble the statement, or return the cached one.
    pub fn build(&mut self) -> WeaveResult<&Statement> {
        let statement = match self.cached.take() {
            Some(statement) => statement,
            None => self.assemble()?,
        };
        Ok(self.cached.insert(statement))
    }

    fn assemble(&self) -> WeaveResult<Statement> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        let mut statement = self.assemble_unbounded(true)?;
        if self.limit > 0 {
            statement
                .sql
                .push_str(&format!(" LIMIT {}, {}", self.offset, self.limit));
        }
        tracing::trace!(sql = %statement.sql, params = statement.params.len(), "assembled query");
        Ok(statement)
    }

    /// Everything except LIMIT; ORDER BY only when asked for.
    fn assemble_unbounded(&self, with_order: bool) -> WeaveResult<Statement> {
        let table = self.table.trim();
        if table.is_empty() {
            return Err(WeaveError::EmptyTableName);
        }

        let mut out = Fragment::new();
        let fields = self.fields.trim();
        out.sql.push_str("SELECT ");
        out.sql.push_str(if fields.is_empty() { "*" } else { fields });
        out.sql.push_str(" FROM ");
        out.sql.push_str(&quote_table(table));

        for join in &self.joins {
            let (join_table, on) = (join.table.trim(), join.on.trim());
            if join_table.is_empty() || on.is_empty() {
                return Err(WeaveError::EmptyJoinTableOrCondition);
            }
            out.sql.push(' ');
            let kind = join.kind.as_sql();
            if !kind.is_empty() {
                out.sql.push_str(kind);
                out.sql.push(' ');
            }
            out.sql.push_str("JOIN ");
            out.sql.push_str(&quote_table(join_table));
            out.sql.push_str(" ON ");
            out.sql.push_str(on);
        }

        let compiler = ConditionBuilder::with_hooks(self.hooks.clone());
        if let Some(filter) = &self.filter {
            let clause = compiler.compile(filter, Logic::And, self.mode)?;
            if !clause.is_empty() {
                out.sql.push_str(" WHERE ");
                out.append(clause);
            }
        }

        let group_by = self.group_by.trim();
        if !group_by.is_empty() {
            out.sql.push_str(" GROUP BY ");
            out.sql.push_str(group_by);
            if let Some(having) = &self.having {
                let clause = compiler.compile(having, Logic::And, self.mode)?;
                if !clause.is_empty() {
                    out.sql.push_str(" HAVING ");
                    out.append(clause);
                }
            }
        }

        let order_by = self.order_by.trim();
        if with_order && !order_by.is_empty() {
            out.sql.push_str(" ORDER BY ");
            out.sql.push_str(order_by);
        }

        Ok(out.into())
    }

    /// COUNT statement for pagination.
    ///
    /// Raw SQL without a structured WHERE is counted by text truncation;
    /// everything else is counted from the assembled clauses.
    pub fn count_statement(&self) -> WeaveResult<Statement> {
        if self.is_raw() && !self.has_filter() {
            RawTextCount.count_statement(self)
        } else {
            StructuredCount.count_statement(self)
        }
    }
}

/// Quote a table reference, keeping a trailing alias unquoted: `users u`
/// becomes `` `users` u ``.
pub fn quote_table(table: &str) -> String {
    match table.trim().split_once(char::is_whitespace) {
        Some((name, alias)) => format!("{} {}", quote_identifier(name), alias.trim()),
        None => quote_identifier(table),
    }
}

fn wrap_count(inner: Statement) -> Statement {
    Statement {
        sql: format!("SELECT COUNT(0) FROM ( {} ) a", inner.sql),
        params: inner.params,
    }
}

/// Derives the total-count statement of a [`Querier`].
pub trait CountStrategy {
    fn count_statement(&self, querier: &Querier) -> WeaveResult<Statement>;
}

/// Wraps every assembled clause except ORDER BY and LIMIT.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredCount;

impl CountStrategy for StructuredCount {
    fn count_statement(&self, querier: &Querier) -> WeaveResult<Statement> {
        Ok(wrap_count(querier.assemble_unbounded(false)?))
    }
}

/// Truncates raw SQL at its last ` limit ` (any case) and wraps the rest.
///
/// A textual search, not a tokenizer: a ` limit ` inside a string literal
/// or a subquery will be cut as well. Bound params whose placeholders fall
/// in the dropped tail are dropped with it; placeholders are counted as bare
/// `?` characters, so a `?` inside a string literal misaligns the kept params.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTextCount;

impl CountStrategy for RawTextCount {
    fn count_statement(&self, querier: &Querier) -> WeaveResult<Statement> {
        let raw = match &querier.raw {
            Some(raw) if !raw.sql.trim().is_empty() => raw,
            _ => return Err(WeaveError::EmptyQueryText),
        };

        let lowered = raw.sql.to_ascii_lowercase();
        let inner = match lowered.rfind(" limit ") {
            Some(pos) if pos > 0 => &raw.sql[..pos],
            _ => raw.sql.as_str(),
        };
        let kept = inner.matches(PLACEHOLDER).count().min(raw.params.len());

        Ok(wrap_count(Statement {
            sql: inner.to_string(),
            params: raw.params[..kept].to_vec(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Fields, Group};
    use pretty_assertions::assert_eq;

    fn sql(q: &mut Querier) -> String {
        q.build().unwrap().sql.clone()
    }

    #[test]
    fn test_minimal_select() {
        let mut q = Querier::new().from("users");
        assert_eq!(sql(&mut q), "SELECT * FROM `users`");
    }

    #[test]
    fn test_full_select() {
        let mut q = Querier::new()
            .select("u.id, COUNT(o.id) AS n")
            .from("users u")
            .left_join("orders o", "o.user_id = u.id")
            .filter(Fields::new().add("u.status", "active").add("u.age >=", 18))
            .group_by("u.id")
            .having(Condition::raw("n > 2"))
            .order_by("n DESC")
            .offset(20)
            .limit(10);
        assert_eq!(
            sql(&mut q),
            "SELECT u.id, COUNT(o.id) AS n FROM `users` u LEFT JOIN `orders` o ON o.user_id = u.id \
             WHERE `u`.`status` = 'active' AND `u`.`age` >= 18 GROUP BY u.id HAVING n > 2 \
             ORDER BY n DESC LIMIT 20, 10"
        );
    }

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table("users"), "`users`");
        assert_eq!(quote_table("app.users AS u"), "`app`.`users` AS u");
    }

    #[test]
    fn test_having_requires_group_by() {
        let mut q = Querier::new().from("t").having(Condition::raw("n > 1"));
        assert_eq!(sql(&mut q), "SELECT * FROM `t`");
    }

    #[test]
    fn test_empty_where_is_omitted() {
        let mut q = Querier::new().from("t").filter(Condition::Sequence(vec![]));
        assert_eq!(sql(&mut q), "SELECT * FROM `t`");
    }

    #[test]
    fn test_custom_join() {
        let mut q = Querier::new()
            .from("a")
            .join(JoinKind::Custom("LEFT OUTER".into()), "b", "a.id = b.a_id")
            .inner_join("c", "c.id = a.c_id");
        assert_eq!(
            sql(&mut q),
            "SELECT * FROM `a` LEFT OUTER JOIN `b` ON a.id = b.a_id INNER JOIN `c` ON c.id = a.c_id"
        );
    }

    #[test]
    fn test_empty_table_fails() {
        let mut q = Querier::new().select("id");
        assert!(matches!(q.build(), Err(WeaveError::EmptyTableName)));
        assert!(matches!(q.count_statement(), Err(WeaveError::EmptyTableName)));
    }

    #[test]
    fn test_incomplete_join_fails() {
        let mut q = Querier::new().from("a").left_join("b", " ");
        assert!(matches!(q.build(), Err(WeaveError::EmptyJoinTableOrCondition)));
        let mut q = Querier::new().from("a").right_join("", "x = y");
        assert!(matches!(q.build(), Err(WeaveError::EmptyJoinTableOrCondition)));
    }

    #[test]
    fn test_compile_error_aborts_build() {
        let mut q = Querier::new()
            .from("a")
            .filter(Condition::field("id between", vec![1]));
        assert!(matches!(
            q.build(),
            Err(WeaveError::MalformedOperandCount { .. })
        ));
    }

    #[test]
    fn test_build_is_cached_until_mutated() {
        let mut q = Querier::new().from("t").filter(Condition::field("a", 1));
        let first = sql(&mut q);
        let second = sql(&mut q);
        assert_eq!(first, second);

        let mut q = q.limit(5);
        assert_eq!(sql(&mut q), "SELECT * FROM `t` WHERE `a` = 1 LIMIT 0, 5");
    }

    #[test]
    fn test_parameterized_where_and_having() {
        let mut q = Querier::new()
            .from("t")
            .filter(Group::or().add("a", 1).add("b in", vec!["x", "y"]))
            .group_by("a")
            .having(Condition::field("cnt >", 3))
            .parameterized();
        let statement = q.build().unwrap();
        assert_eq!(
            statement.sql,
            "SELECT * FROM `t` WHERE (`a` = ? OR `b` IN (?, ?)) GROUP BY a HAVING `cnt` > ?"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Int(1),
                SqlValue::Text("x".into()),
                SqlValue::Text("y".into()),
                SqlValue::Int(3),
            ]
        );
    }

    #[test]
    fn test_raw_bypasses_assembly() {
        let mut q = Querier::raw("select * from t where a = ?").bind(1).limit(10);
        let statement = q.build().unwrap();
        assert_eq!(statement.sql, "select * from t where a = ?");
        assert_eq!(statement.params, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_structured_count_drops_order_and_limit() {
        let q = Querier::new()
            .from("t")
            .filter(Condition::field("a", 1))
            .order_by("a")
            .limit(10);
        assert_eq!(
            q.count_statement().unwrap().sql,
            "SELECT COUNT(0) FROM ( SELECT * FROM `t` WHERE `a` = 1 ) a"
        );
    }

    #[test]
    fn test_raw_count_truncates_last_limit() {
        let q = Querier::raw("SELECT * FROM t WHERE a > ? ORDER BY id LiMiT ?, ?")
            .bind(1)
            .bind(0)
            .bind(10);
        let count = q.count_statement().unwrap();
        assert_eq!(
            count.sql,
            "SELECT COUNT(0) FROM ( SELECT * FROM t WHERE a > ? ORDER BY id ) a"
        );
        assert_eq!(count.params, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_raw_count_counts_question_marks_in_literals() {
        let q = Querier::raw("SELECT * FROM t WHERE note = '?' LIMIT ?").bind(10);
        let count = q.count_statement().unwrap();
        assert_eq!(
            count.sql,
            "SELECT COUNT(0) FROM ( SELECT * FROM t WHERE note = '?' ) a"
        );
        // The literal `?` is taken for a placeholder, so the LIMIT param survives.
        assert_eq!(count.params, vec![SqlValue::Int(10)]);
    }

    #[test]
    fn test_raw_count_without_limit() {
        let q = Querier::raw("SELECT id FROM t");
        assert_eq!(
            q.count_statement().unwrap().sql,
            "SELECT COUNT(0) FROM ( SELECT id FROM t ) a"
        );
    }

    #[test]
    fn test_raw_count_requires_text() {
        let q = Querier::raw("   ");
        assert!(matches!(q.count_statement(), Err(WeaveError::EmptyQueryText)));
        assert!(matches!(
            RawTextCount.count_statement(&Querier::new().from("t")),
            Err(WeaveError::EmptyQueryText)
        ));
    }

    #[test]
    fn test_raw_with_filter_counts_structurally() {
        let q = Querier::raw("SELECT * FROM t LIMIT 5")
            .from("t")
            .filter(Condition::field("a", 1));
        assert_eq!(
            q.count_statement().unwrap().sql,
            "SELECT COUNT(0) FROM ( SELECT * FROM `t` WHERE `a` = 1 ) a"
        );
    }

    #[test]
    fn test_paginate_clamps_page() {
        let mut q = Querier::new().from("t");
        q.paginate(0, 10);
        assert_eq!(sql(&mut q), "SELECT * FROM `t` LIMIT 0, 10");
        q.paginate(3, 10);
        assert_eq!(sql(&mut q), "SELECT * FROM `t` LIMIT 20, 10");
    }
}
