//! Error types for reading formulas and grammar rules.

use thiserror::Error;

/// Errors that can occur while reading s-expressions, formulas or rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    /// The input is not a well-formed s-expression.
    #[error("syntax error in {input:?}: {reason}")]
    Syntax { input: String, reason: String },

    /// The s-expression does not describe a formula.
    #[error("invalid formula {formula}: {reason}")]
    InvalidFormula { formula: String, reason: String },

    /// The s-expression does not describe a grammar rule.
    #[error("invalid rule {rule}: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// Result type for grammar operations.
pub type GrammarResult<T> = Result<T, GrammarError>;
