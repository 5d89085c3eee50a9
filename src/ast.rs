//! Condition Tree types.
//!
//! A [`Condition`] is built per call by the caller (or by
//! [`crate::parser::condition_from_json`]) and handed to the compiler in
//! [`crate::transpiler`]. Field lists are explicitly ordered so the emitted
//! SQL is deterministic.

use serde::Serialize;

use crate::error::WeaveResult;
use crate::value::SqlValue;

/// Logical operator joining sibling clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }

    /// Recognise a logic keyword used as a `Fields` key.
    pub fn from_key(key: &str) -> Option<Logic> {
        let key = key.trim();
        if key.eq_ignore_ascii_case("and") {
            Some(Logic::And)
        } else if key.eq_ignore_ascii_case("or") {
            Some(Logic::Or)
        } else {
            None
        }
    }
}

/// Lenient normalisation: anything other than `OR` is `AND`.
impl From<&str> for Logic {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("or") {
            Logic::Or
        } else {
            Logic::And
        }
    }
}

impl std::fmt::Display for Logic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// How a match operator consumes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// One coerced literal.
    Scalar,
    /// A non-empty list, rendered `(v1, v2, ...)`.
    Set,
    /// Exactly two values, rendered `v1 AND v2`.
    Range,
}

/// Comparison operator of a match clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchOp {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Not equal, ANSI spelling (<>)
    LtGt,
    Like,
    NotLike,
    /// IS, usually paired with a NULL value
    Is,
    In,
    NotIn,
    /// BETWEEN x AND y (value is a two element list)
    Between,
    NotBetween,
}

impl MatchOp {
    pub const ALL: [MatchOp; 14] = [
        MatchOp::Eq,
        MatchOp::Ne,
        MatchOp::Gt,
        MatchOp::Gte,
        MatchOp::Lt,
        MatchOp::Lte,
        MatchOp::LtGt,
        MatchOp::Like,
        MatchOp::NotLike,
        MatchOp::Is,
        MatchOp::In,
        MatchOp::NotIn,
        MatchOp::Between,
        MatchOp::NotBetween,
    ];

    /// Returns the SQL symbol or keyword for this operator.
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            MatchOp::Eq => "=",
            MatchOp::Ne => "!=",
            MatchOp::Gt => ">",
            MatchOp::Gte => ">=",
            MatchOp::Lt => "<",
            MatchOp::Lte => "<=",
            MatchOp::LtGt => "<>",
            MatchOp::Like => "LIKE",
            MatchOp::NotLike => "NOT LIKE",
            MatchOp::Is => "IS",
            MatchOp::In => "IN",
            MatchOp::NotIn => "NOT IN",
            MatchOp::Between => "BETWEEN",
            MatchOp::NotBetween => "NOT BETWEEN",
        }
    }

    /// Look up an operator by its normalised (uppercase, single-spaced) symbol.
    pub fn from_symbol(symbol: &str) -> Option<MatchOp> {
        MatchOp::ALL
            .iter()
            .copied()
            .find(|op| op.sql_symbol() == symbol)
    }

    pub fn shape(&self) -> OperandShape {
        match self {
            MatchOp::In | MatchOp::NotIn => OperandShape::Set,
            MatchOp::Between | MatchOp::NotBetween => OperandShape::Range,
            _ => OperandShape::Scalar,
        }
    }
}

impl std::fmt::Display for MatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_symbol())
    }
}

/// Right-hand side of a `Fields` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Value(SqlValue),
    /// Only meaningful under an `AND`/`OR` key.
    Nested(Condition),
}

/// One `(key, value)` pair. The key is either `"field"`, `"field op"` or a
/// logic keyword. Field identifiers must not contain spaces: the first space
/// separates the field from the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub key: String,
    pub operand: Operand,
}

/// Ordered list of field predicates.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key = value` (or `key` with its embedded operator).
    pub fn add(mut self, key: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(key, Operand::Value(value.into()));
        self
    }

    /// Append a nested condition under a logic key.
    pub fn nest(mut self, logic: Logic, condition: impl Into<Condition>) -> Self {
        self.push(logic.as_sql(), Operand::Nested(condition.into()));
        self
    }

    pub fn push(&mut self, key: impl Into<String>, operand: Operand) {
        self.0.push(Field {
            key: key.into(),
            operand,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.push(k, Operand::Value(v.into()));
        }
        fields
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Nested predicate description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// Verbatim SQL, trimmed on output.
    Raw(String),
    /// Members joined with the inherited logic.
    Sequence(Vec<Condition>),
    /// Field predicates joined with the inherited logic.
    Fields(Fields),
    /// Members joined with the group's own logic.
    Group(Group),
}

impl Condition {
    pub fn raw(sql: impl Into<String>) -> Self {
        Condition::Raw(sql.into())
    }

    /// Single-entry field list.
    pub fn field(key: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Condition::Fields(Fields::new().add(key, value))
    }

    /// True when the node holds nothing at its own level.
    pub fn is_empty(&self) -> bool {
        match self {
            Condition::Raw(s) => s.trim().is_empty(),
            Condition::Sequence(items) => items.is_empty(),
            Condition::Fields(f) => f.is_empty(),
            Condition::Group(g) => g.members.is_empty(),
        }
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Condition::Raw(s.to_string())
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        Condition::Raw(s)
    }
}

impl From<Fields> for Condition {
    fn from(f: Fields) -> Self {
        Condition::Fields(f)
    }
}

impl From<Group> for Condition {
    fn from(g: Group) -> Self {
        Condition::Group(g)
    }
}

impl From<Vec<Condition>> for Condition {
    fn from(items: Vec<Condition>) -> Self {
        Condition::Sequence(items)
    }
}

/// Explicit-logic group, also usable as a fluent condition builder.
///
/// ```
/// use sqlweave::ast::Group;
///
/// let sql = Group::or()
///     .add("status", "active")
///     .add("score >=", 90)
///     .build()
///     .unwrap();
/// assert_eq!(sql, "(`status` = 'active' OR `score` >= 90)");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Group {
    pub logic: Logic,
    pub members: Vec<Condition>,
}

impl Group {
    pub fn new(logic: Logic) -> Self {
        Self {
            logic,
            members: Vec::new(),
        }
    }

    pub fn and() -> Self {
        Self::new(Logic::And)
    }

    pub fn or() -> Self {
        Self::new(Logic::Or)
    }

    pub fn add(mut self, key: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.members.push(Condition::field(key, value));
        self
    }

    /// Add several pairs as one field list, joined with this group's logic.
    pub fn add_batch<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<SqlValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields: Fields = pairs.into_iter().collect();
        if !fields.is_empty() {
            self.members.push(Condition::Fields(fields));
        }
        self
    }

    pub fn add_group(self, group: Group) -> Self {
        self.add_condition(Condition::Group(group))
    }

    /// Blank text is ignored.
    pub fn add_raw(self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return self;
        }
        self.add_condition(Condition::Raw(sql))
    }

    pub fn add_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.members.push(condition.into());
        self
    }

    /// Compile inline with this group's own logic.
    pub fn build(&self) -> WeaveResult<String> {
        crate::transpiler::build_condition(&Condition::Group(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_is_lenient() {
        assert_eq!(Logic::from("or"), Logic::Or);
        assert_eq!(Logic::from(" OR "), Logic::Or);
        assert_eq!(Logic::from("xor"), Logic::And);
        assert_eq!(Logic::from(""), Logic::And);
    }

    #[test]
    fn test_logic_key() {
        assert_eq!(Logic::from_key("Or"), Some(Logic::Or));
        assert_eq!(Logic::from_key("and"), Some(Logic::And));
        assert_eq!(Logic::from_key("android"), None);
    }

    #[test]
    fn test_match_op_lookup() {
        assert_eq!(MatchOp::from_symbol("NOT BETWEEN"), Some(MatchOp::NotBetween));
        assert_eq!(MatchOp::from_symbol("<>"), Some(MatchOp::LtGt));
        assert_eq!(MatchOp::from_symbol("ILIKE"), None);
        assert_eq!(MatchOp::In.shape(), OperandShape::Set);
        assert_eq!(MatchOp::Like.shape(), OperandShape::Scalar);
    }

    #[test]
    fn test_fields_keep_insertion_order() {
        let fields = Fields::new().add("b", 1).add("a", 2);
        let keys: Vec<_> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_group_ignores_blank_raw() {
        let g = Group::and().add_raw("   ").add_raw("a = 1");
        assert_eq!(g.members, vec![Condition::Raw("a = 1".into())]);
    }

    #[test]
    fn test_add_condition_keeps_any_shape() {
        let g = Group::or()
            .add_condition(Fields::new().add("a", 1))
            .add_condition(Condition::Sequence(vec![Condition::field("b", 2)]));
        assert_eq!(g.members.len(), 2);
        assert_eq!(
            g.build().unwrap(),
            "(`a` = 1 OR (`b` = 2))"
        );
    }

    #[test]
    fn test_empty_nodes() {
        assert!(Condition::raw("  ").is_empty());
        assert!(Condition::Sequence(vec![]).is_empty());
        assert!(Condition::Fields(Fields::new()).is_empty());
        assert!(!Condition::field("a", 1).is_empty());
    }
}
