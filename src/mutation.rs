//! INSERT / REPLACE / UPDATE / DELETE statement builders.
//!
//! Rows are written from a [`Record`], an ordered column → value list.
//! UPDATE and DELETE refuse to run without a condition.

use serde::Serialize;

use crate::ast::{Condition, Logic};
use crate::error::{WeaveError, WeaveResult};
use crate::query::Statement;
use crate::transpiler::{quote_identifier, CoercionHooks, CompileMode, ConditionBuilder, Fragment, PLACEHOLDER};
use crate::value::SqlValue;

/// Ordered column values of one row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record(Vec<(String, SqlValue)>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column. Setting the same column twice keeps the last value in
    /// its original position.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.0.push((column, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Record::new(), |r, (k, v)| r.set(k, v))
    }
}

/// Write-statement builder bound to one table.
#[derive(Debug, Clone)]
pub struct Mutation {
    table: String,
    mode: CompileMode,
    hooks: CoercionHooks,
}

impl Mutation {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            mode: CompileMode::Inline,
            hooks: CoercionHooks::default(),
        }
    }

    /// Render values and conditions with `?` placeholders.
    pub fn parameterized(mut self) -> Self {
        self.mode = CompileMode::Parameterized;
        self
    }

    /// Per-column overrides applied to written values and condition values.
    pub fn with_hooks(mut self, hooks: CoercionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    fn table(&self) -> WeaveResult<String> {
        let table = self.table.trim();
        if table.is_empty() {
            return Err(WeaveError::EmptyTableName);
        }
        Ok(quote_identifier(table))
    }

    fn push_value(&self, out: &mut Fragment, column: &str, value: &SqlValue) {
        let value = self.hooks.apply(column, value);
        match self.mode {
            CompileMode::Inline => out.sql.push_str(&value.to_literal()),
            CompileMode::Parameterized => {
                out.sql.push_str(PLACEHOLDER);
                out.params.push(value.to_param());
            }
        }
    }

    fn condition(&self, condition: &Condition) -> WeaveResult<Fragment> {
        let clause = ConditionBuilder::with_hooks(self.hooks.clone()).compile(condition, Logic::And, self.mode)?;
        if clause.sql.trim().is_empty() {
            return Err(WeaveError::EmptyMutationCondition);
        }
        Ok(clause)
    }

    pub fn insert(&self, record: &Record) -> WeaveResult<Statement> {
        self.write_rows("INSERT INTO", std::slice::from_ref(record))
    }

    pub fn insert_batch(&self, records: &[Record]) -> WeaveResult<Statement> {
        self.write_rows("INSERT INTO", records)
    }

    pub fn replace_into(&self, records: &[Record]) -> WeaveResult<Statement> {
        self.write_rows("REPLACE INTO", records)
    }

    /// All records must carry the columns of the first, in the same order.
    fn write_rows(&self, verb: &str, records: &[Record]) -> WeaveResult<Statement> {
        let table = self.table()?;
        let first = records
            .first()
            .ok_or(WeaveError::EmptyAssignment("no records to write"))?;
        if first.is_empty() {
            return Err(WeaveError::EmptyAssignment("no columns to write"));
        }
        let columns: Vec<&str> = first.columns().collect();

        let mut out = Fragment::text(format!(
            "{} {} ({}) VALUES ",
            verb,
            table,
            columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        ));

        for (i, record) in records.iter().enumerate() {
            if !record.columns().eq(columns.iter().copied()) {
                return Err(WeaveError::InvalidValue(format!(
                    "record {} does not match the columns of the first record",
                    i
                )));
            }
            if i > 0 {
                out.sql.push_str(", ");
            }
            out.sql.push('(');
            for (j, (column, value)) in record.iter().enumerate() {
                if j > 0 {
                    out.sql.push_str(", ");
                }
                self.push_value(&mut out, column, value);
            }
            out.sql.push(')');
        }
        Ok(out.into())
    }

    /// `UPDATE t SET ... WHERE cond`. An empty condition is refused.
    pub fn update(&self, set: &Record, condition: &Condition) -> WeaveResult<Statement> {
        if set.is_empty() {
            return Err(WeaveError::EmptyAssignment("nothing to update"));
        }
        let table = self.table()?;
        let clause = self.condition(condition)?;

        let mut out = Fragment::text(format!("UPDATE {} SET ", table));
        for (i, (column, value)) in set.iter().enumerate() {
            if i > 0 {
                out.sql.push_str(", ");
            }
            out.sql.push_str(&quote_identifier(column));
            out.sql.push_str(" = ");
            self.push_value(&mut out, column, value);
        }
        out.sql.push_str(" WHERE ");
        out.append(clause);
        Ok(out.into())
    }

    /// `DELETE FROM t WHERE cond`. An empty condition is refused.
    pub fn delete(&self, condition: &Condition) -> WeaveResult<Statement> {
        let table = self.table()?;
        let mut out = Fragment::text(format!("DELETE FROM {} WHERE ", table));
        out.append(self.condition(condition)?);
        Ok(out.into())
    }
}
