//! Field-key grammar and the JSON condition reader, using nom.
//!
//! # Key syntax
//!
//! ```text
//! score >=        status not   like        `users`.id in
//! ──┬── ─┬        ──┬─── ──────┬───        ─────┬──── ─┬
//!   │    └ op       │          └ op             │      └ op
//!   └ field         └ field                     └ field
//! ```
//!
//! The first space ends the field name. The rest of the key is the
//! operator, case-insensitive, with inner whitespace collapsed. A missing
//! operator means `=`.

use nom::{
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, rest},
    multi::separated_list0,
    sequence::{pair, preceded, terminated},
    IResult,
};
use serde_json::Value;

use crate::ast::{Condition, Fields, Logic, MatchOp, Operand};
use crate::error::{WeaveError, WeaveResult};
use crate::value::SqlValue;

/// A field key split into its identifier and operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    /// Field identifier with stray backticks removed. May be dotted.
    pub field: String,
    pub op: MatchOp,
}

/// Parse a `Fields` key such as `"age >"` or `"name not like"`.
pub fn parse_field_key(key: &str) -> WeaveResult<FieldKey> {
    let input = key.trim_start();
    let (field, op_text) = match parse_key(input) {
        Ok((_, parts)) => parts,
        Err(_) => return Err(WeaveError::parse(0, "Empty field key")),
    };

    let field: String = field.chars().filter(|c| *c != '`').collect();
    if field.is_empty() {
        return Err(WeaveError::parse(0, format!("Empty field name in key '{}'", key)));
    }

    let op = match op_text {
        None => MatchOp::Eq,
        Some(text) => parse_operator(text, key.len() - text.len())?,
    };

    Ok(FieldKey { field, op })
}

fn parse_key(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(
        take_till1(|c: char| c == ' '),
        opt(preceded(char(' '), rest)),
    )(input)
}

fn operator_words(input: &str) -> IResult<&str, Vec<&str>> {
    terminated(
        preceded(
            multispace0,
            separated_list0(multispace1, take_while1(|c: char| !c.is_whitespace())),
        ),
        multispace0,
    )(input)
}

/// Normalise operator text and look it up. Empty text is `=`.
fn parse_operator(text: &str, position: usize) -> WeaveResult<MatchOp> {
    let words = match map(operator_words, |w| w.join(" ").to_ascii_uppercase())(text) {
        Ok(("", words)) => words,
        Ok((remaining, _)) => {
            return Err(WeaveError::parse(
                position + text.len() - remaining.len(),
                format!("Unexpected trailing content: '{}'", remaining),
            ));
        }
        Err(e) => return Err(WeaveError::parse(position, format!("Parse failed: {:?}", e))),
    };
    if words.is_empty() {
        return Ok(MatchOp::Eq);
    }
    MatchOp::from_symbol(&words).ok_or(WeaveError::UnsupportedMatchOperator(words))
}

/// Parse a JSON condition document.
pub fn parse_condition(text: &str) -> WeaveResult<Condition> {
    let value: Value = serde_json::from_str(text)?;
    condition_from_json(value)
}

/// Read a dynamically shaped JSON value as a Condition Tree.
///
/// * string → `Raw`
/// * array → `Sequence` of its elements
/// * object → ordered `Fields`; an `AND`/`OR` key holds a nested condition
/// * null → empty tree
///
/// Numbers and booleans have no condition meaning and are rejected.
pub fn condition_from_json(value: Value) -> WeaveResult<Condition> {
    match value {
        Value::Null => Ok(Condition::Sequence(Vec::new())),
        Value::String(s) => Ok(Condition::Raw(s)),
        Value::Array(items) => items
            .into_iter()
            .map(condition_from_json)
            .collect::<WeaveResult<Vec<_>>>()
            .map(Condition::Sequence),
        Value::Object(map) => {
            let mut fields = Fields::new();
            for (key, v) in map {
                let operand = if Logic::from_key(&key).is_some() {
                    Operand::Nested(condition_from_json(v)?)
                } else {
                    Operand::Value(SqlValue::from(v))
                };
                fields.push(key, operand);
            }
            Ok(Condition::Fields(fields))
        }
        Value::Number(n) => Err(WeaveError::UnsupportedConditionShape(format!(
            "number {}",
            n
        ))),
        Value::Bool(b) => Err(WeaveError::UnsupportedConditionShape(format!("bool {}", b))),
    }
}
