//! Error types for sqlweave.

use thiserror::Error;

/// The main error type for sqlweave operations.
///
/// Compilation and assembly errors abort the whole build; nothing partial
/// is ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// A dynamic condition description had a shape the compiler cannot read.
    #[error("Unsupported condition shape: {0}")]
    UnsupportedConditionShape(String),

    /// The operator embedded in a field key is not one we know how to emit.
    #[error("Unsupported match operator: '{0}'")]
    UnsupportedMatchOperator(String),

    /// IN given zero values, or BETWEEN given anything but two.
    #[error("[{op}] value count not qualified: expected {expected}, found {found}")]
    MalformedOperandCount {
        op: String,
        expected: &'static str,
        found: usize,
    },

    /// Query assembly attempted without a source table.
    #[error("Query table not specified")]
    EmptyTableName,

    /// A join was registered without a table or without an ON condition.
    #[error("Join table and condition must both be non-empty")]
    EmptyJoinTableOrCondition,

    /// UPDATE or DELETE whose condition compiled to nothing.
    #[error("Mutation condition can not be empty")]
    EmptyMutationCondition,

    /// Raw count derivation had no query text to wrap.
    #[error("Query text can not be empty")]
    EmptyQueryText,

    /// INSERT/UPDATE with no columns to write.
    #[error("Nothing to write: {0}")]
    EmptyAssignment(&'static str),

    /// A value could not be used where it was supplied.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Failed to parse a field key or condition document.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// No connection getter registered under this name.
    #[error("No database registered as '{0}'")]
    UnknownDatabase(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WeaveError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an operand count error for `op`.
    pub fn operand_count(op: impl Into<String>, expected: &'static str, found: usize) -> Self {
        Self::MalformedOperandCount {
            op: op.into(),
            expected,
            found,
        }
    }
}

impl From<sqlx::Error> for WeaveError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Self::Config(e.to_string()),
            sqlx::Error::Io(e) => Self::Io(e),
            sqlx::Error::Tls(e) => Self::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Connection(err.to_string())
            }
            other => Self::Execution(other.to_string()),
        }
    }
}

/// Result type alias for sqlweave operations.
pub type WeaveResult<T> = Result<T, WeaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WeaveError::parse(5, "unexpected character");
        assert_eq!(
            err.to_string(),
            "Parse error at position 5: unexpected character"
        );
    }

    #[test]
    fn test_operand_count_display() {
        let err = WeaveError::operand_count("BETWEEN", "exactly 2", 3);
        assert_eq!(
            err.to_string(),
            "[BETWEEN] value count not qualified: expected exactly 2, found 3"
        );
    }
}
