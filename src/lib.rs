//! # sqlweave
//!
//! Turns dynamically shaped filter descriptions into safe MySQL predicate
//! text, and assembles paged SELECT statements around them.
//!
//! ## Quick Example
//!
//! ```rust
//! use sqlweave::prelude::*;
//!
//! let tree = parse_condition(r#"{"age >=": 18, "OR": [{"role": "admin"}, {"name like": "O'B%"}]}"#)?;
//! assert_eq!(
//!     build_condition(&tree)?,
//!     r"`age` >= 18 AND (`role` = 'admin' OR `name` LIKE 'O\'B%')"
//! );
//!
//! let mut q = Querier::new().from("users").filter(tree).order_by("id").parameterized();
//! q.paginate(2, 10);
//! let statement = q.build()?;
//! assert_eq!(
//!     statement.sql,
//!     "SELECT * FROM `users` WHERE `age` >= ? AND (`role` = ? OR `name` LIKE ?) ORDER BY id LIMIT 10, 10"
//! );
//! assert_eq!(statement.params.len(), 3);
//! # Ok::<(), sqlweave::WeaveError>(())
//! ```
//!
//! ## Condition Tree
//!
//! | Shape      | Compiles to                                    |
//! |------------|------------------------------------------------|
//! | `Raw`      | the trimmed text                               |
//! | `Sequence` | members joined by the inherited logic, in `()` |
//! | `Fields`   | `field OP value` clauses joined by the inherited logic |
//! | `Group`    | members joined by the group's own logic, in `()` |
//!
//! Field keys carry their operator after the first space (`"age >="`,
//! `"id not in"`), so field names cannot contain spaces.

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mutation;
pub mod parser;
pub mod query;
pub mod registry;
pub mod transpiler;
pub mod value;

pub use error::{WeaveError, WeaveResult};

pub mod prelude {
    pub use crate::ast::{Condition, Field, Fields, Group, Logic, MatchOp, Operand, OperandShape};
    pub use crate::config::{Config, DatabaseConfig};
    pub use crate::engine::{ExecResult, Executor, MySqlExecutor, QueryResult, Row, SharedExecutor};
    pub use crate::error::*;
    pub use crate::mutation::{Mutation, Record};
    pub use crate::parser::{condition_from_json, parse_condition, parse_field_key};
    pub use crate::query::{CountStrategy, Join, JoinKind, Querier, Statement};
    pub use crate::registry::Registry;
    pub use crate::transpiler::{
        build_condition, build_fragment, CoercionHooks, CompileMode, ConditionBuilder, Fragment,
    };
    pub use crate::value::SqlValue;
}
