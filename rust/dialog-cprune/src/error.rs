use std::path::PathBuf;

use dialog_grammar::GrammarError;
use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug)]
pub enum PruningError {
    /// A configured formula rewrite could not be read
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// A synthesized rule could not be read back by the rule interpreter
    #[error("Synthesized rule {rule} is not a valid rule: {source}")]
    InvalidRuleString {
        rule: String,
        #[source]
        source: GrammarError,
    },

    /// The neighbor file could not be read
    #[error("Failed to read neighbor file {}: {source}", .path.display())]
    NeighborFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the neighbor file is not `<id>\t<id>,<id>,...`
    #[error("Malformed neighbor file line {line} ({reason}): {content:?}")]
    MalformedNeighborLine {
        line: usize,
        content: String,
        reason: &'static str,
    },

    /// Neighbor-restricted prediction was requested without a neighbor file
    #[error("A neighbor cap is configured but no neighbor file was given")]
    NeighborsUnavailable,

    /// A pattern was predicted that has no registered rule set
    #[error("Pattern {0} has no registered rules")]
    UnregisteredPattern(String),

    /// A rule set references a rule string that was never synthesized
    #[error("Rule {0} was never synthesized")]
    UnregisteredRule(String),
}

/// Result type for pruning operations.
pub type PruningResult<T> = Result<T, PruningError>;
