//! Condition compiler.
//!
//! Turns a [`Condition`] tree into SQL predicate text. Inline mode renders
//! escaped literals directly; parameterized mode renders `?` and collects
//! the bound values in emission order, so a [`Fragment`]'s params always
//! line up with the placeholders in its text.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::ast::{Condition, Field, Fields, Logic, MatchOp, Operand, OperandShape};
use crate::error::{WeaveError, WeaveResult};
use crate::parser::parse_field_key;
use crate::value::SqlValue;

/// Positional placeholder of the MySQL dialect.
pub const PLACEHOLDER: &str = "?";

/// How literals reach the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CompileMode {
    /// Escaped literals rendered into the text.
    #[default]
    Inline,
    /// `?` placeholders with values returned separately.
    Parameterized,
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Append another fragment's text and params at the current position.
    pub fn append(&mut self, other: Fragment) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
    }

    fn wrapped(self) -> Fragment {
        if self.is_empty() {
            return self;
        }
        Fragment {
            sql: format!("({})", self.sql),
            params: self.params,
        }
    }

    /// Join non-empty parts with `" LOGIC "` and wrap once in parentheses.
    fn join_wrapped(parts: Vec<Fragment>, logic: Logic) -> Fragment {
        Fragment::join(parts, logic).wrapped()
    }

    fn join(parts: Vec<Fragment>, logic: Logic) -> Fragment {
        let sep = format!(" {} ", logic.as_sql());
        let mut out = Fragment::new();
        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            if !out.is_empty() {
                out.sql.push_str(&sep);
            }
            out.append(part);
        }
        out
    }
}

/// Quote an identifier with backticks. Dotted names quote each part:
/// `users.id` becomes `` `users`.`id` ``. Stray backticks are dropped.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| {
            let part: String = part.trim().chars().filter(|c| *c != '`').collect();
            if part == "*" {
                part
            } else {
                format!("`{}`", part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Per-field value override.
pub type CoercionHook = Arc<dyn Fn(&SqlValue) -> SqlValue + Send + Sync>;

/// Field name → value override, consulted before default coercion.
#[derive(Clone, Default)]
pub struct CoercionHooks {
    hooks: HashMap<String, CoercionHook>,
}

impl CoercionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override for `field`. A later registration replaces an earlier one.
    pub fn register<F>(mut self, field: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&SqlValue) -> SqlValue + Send + Sync + 'static,
    {
        self.hooks.insert(field.into(), Arc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Value to render for `field`: the hook's output, or the value itself.
    pub fn apply(&self, field: &str, value: &SqlValue) -> SqlValue {
        match self.hooks.get(field) {
            Some(hook) => hook(value),
            None => value.clone(),
        }
    }
}

impl fmt::Debug for CoercionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<_> = self.hooks.keys().collect();
        fields.sort();
        f.debug_struct("CoercionHooks").field("fields", &fields).finish()
    }
}

/// Recursive condition compiler.
#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    hooks: CoercionHooks,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hooks(hooks: CoercionHooks) -> Self {
        Self { hooks }
    }

    /// Inline compilation. An empty tree yields `""`.
    pub fn build(&self, tree: &Condition, logic: Logic) -> WeaveResult<String> {
        Ok(self.compile(tree, logic, CompileMode::Inline)?.sql)
    }

    /// Parameterized compilation. An empty tree yields an empty fragment.
    pub fn build_params(&self, tree: &Condition, logic: Logic) -> WeaveResult<Fragment> {
        self.compile(tree, logic, CompileMode::Parameterized)
    }

    pub fn compile(&self, tree: &Condition, logic: Logic, mode: CompileMode) -> WeaveResult<Fragment> {
        match tree {
            Condition::Raw(sql) => Ok(Fragment::text(sql.trim())),
            Condition::Sequence(items) => self.compile_members(items, logic, mode),
            Condition::Fields(fields) => self.compile_fields(fields, logic, mode),
            Condition::Group(group) => self.compile_members(&group.members, group.logic, mode),
        }
    }

    /// Raw members carry their own operators, so each one is parenthesised
    /// whenever it has siblings: `a = 1 OR b = 2` next to `c = 3` must stay
    /// `(a = 1 OR b = 2) AND c = 3`.
    fn compile_members(&self, items: &[Condition], logic: Logic, mode: CompileMode) -> WeaveResult<Fragment> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let part = self.compile(item, logic, mode)?;
            if !part.is_empty() {
                parts.push((matches!(item, Condition::Raw(_)), part));
            }
        }
        let guard_raw = parts.len() > 1;
        let parts = parts
            .into_iter()
            .map(|(raw, part)| if raw && guard_raw { part.wrapped() } else { part })
            .collect();
        Ok(Fragment::join_wrapped(parts, logic))
    }

    fn compile_fields(&self, fields: &Fields, logic: Logic, mode: CompileMode) -> WeaveResult<Fragment> {
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            parts.push(self.compile_field(field, mode)?);
        }
        Ok(Fragment::join(parts, logic))
    }

    fn compile_field(&self, field: &Field, mode: CompileMode) -> WeaveResult<Fragment> {
        if let Some(group_logic) = Logic::from_key(&field.key) {
            return match &field.operand {
                Operand::Nested(Condition::Sequence(items)) => {
                    self.compile_members(items, group_logic, mode)
                }
                // A group already wraps itself under its own logic.
                Operand::Nested(group @ Condition::Group(_)) => self.compile(group, group_logic, mode),
                Operand::Nested(inner) => {
                    self.compile_members(std::slice::from_ref(inner), group_logic, mode)
                }
                Operand::Value(SqlValue::Text(sql)) => {
                    let raw = Condition::Raw(sql.clone());
                    self.compile_members(std::slice::from_ref(&raw), group_logic, mode)
                }
                Operand::Value(v) => Err(WeaveError::UnsupportedConditionShape(format!(
                    "{} value under logic key '{}'",
                    v.kind(),
                    field.key.trim()
                ))),
            };
        }

        let key = parse_field_key(&field.key)?;
        let value = match &field.operand {
            Operand::Value(v) => self.hooks.apply(&key.field, v),
            Operand::Nested(_) => {
                return Err(WeaveError::UnsupportedConditionShape(format!(
                    "nested condition under field '{}'",
                    key.field
                )));
            }
        };
        match_clause(&key.field, key.op, &value, mode)
    }
}

/// One `field OP value` clause.
fn match_clause(field: &str, op: MatchOp, value: &SqlValue, mode: CompileMode) -> WeaveResult<Fragment> {
    let mut out = Fragment::text(format!("{} {} ", quote_identifier(field), op.sql_symbol()));
    match op.shape() {
        OperandShape::Scalar => {
            // IS only accepts keywords, never a placeholder.
            let mode = if op == MatchOp::Is { CompileMode::Inline } else { mode };
            push_value(&mut out, value, mode);
        }
        OperandShape::Set => {
            let items = value.decompose()?;
            if items.is_empty() {
                return Err(WeaveError::operand_count(op.sql_symbol(), "at least 1", 0));
            }
            out.sql.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.sql.push_str(", ");
                }
                push_value(&mut out, item, mode);
            }
            out.sql.push(')');
        }
        OperandShape::Range => {
            let items = value.decompose()?;
            if items.len() != 2 {
                return Err(WeaveError::operand_count(op.sql_symbol(), "exactly 2", items.len()));
            }
            push_value(&mut out, &items[0], mode);
            out.sql.push_str(" AND ");
            push_value(&mut out, &items[1], mode);
        }
    }
    Ok(out)
}

fn push_value(out: &mut Fragment, value: &SqlValue, mode: CompileMode) {
    match mode {
        CompileMode::Inline => out.sql.push_str(&value.to_literal()),
        CompileMode::Parameterized => {
            out.sql.push_str(PLACEHOLDER);
            out.params.push(value.to_param());
        }
    }
}

/// Compile inline with AND.
pub fn build_condition(tree: &Condition) -> WeaveResult<String> {
    ConditionBuilder::new().build(tree, Logic::And)
}

/// Compile parameterized with AND.
pub fn build_fragment(tree: &Condition) -> WeaveResult<Fragment> {
    ConditionBuilder::new().build_params(tree, Logic::And)
}
