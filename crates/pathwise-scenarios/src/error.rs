//! Condition error types.

use thiserror::Error;

/// Errors raised while parsing or evaluating a scenario condition.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The condition tree does not match the condition grammar.
    #[error("malformed condition: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An ordering comparison addressed a scope entry that does not exist.
    #[error("scope entry '{name}{path}' is missing")]
    MissingSource { name: String, path: String },

    /// An ordering comparison addressed a value that is not a number.
    #[error("expected a number at '{name}{path}', found {found}")]
    NotANumber {
        name: String,
        path: String,
        found: String,
    },

    /// `contains` addressed a value that is neither an array nor a string.
    #[error("cannot test containment in {found} at '{name}{path}'")]
    NotAContainer {
        name: String,
        path: String,
        found: String,
    },
}
