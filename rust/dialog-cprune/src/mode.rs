//! Search modes, training phases and the per-phase scratch state.

use dialog_grammar::Rule;
use indexmap::IndexMap;

use crate::pattern::Pattern;

/// Which search the current phase runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No search in progress.
    #[default]
    None,
    /// Unrestricted search over the full grammar, seeding the cache.
    Explore,
    /// Restricted search over the predicted mini-grammar.
    Exploit,
}

/// Position of a data group within training.
///
/// Exploration only happens while seeding; later passes rely on the rules
/// learned so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The first pass over the training examples.
    #[default]
    Seeding,
    /// Every later pass, and evaluation.
    Steady,
}

impl Phase {
    /// The phase of the training pass `iter` (zero-based) over `group`.
    /// Only the first pass over the `train` group seeds.
    pub fn of(iter: usize, group: &str) -> Self {
        if iter == 0 && group == "train" {
            Phase::Seeding
        } else {
            Phase::Steady
        }
    }
}

/// Scratch state of one exploit or explore phase for one example.
///
/// A fresh state is created at the start of every phase, so nothing found
/// by exploit can leak into the explore that follows it.
#[derive(Clone, Debug, Default)]
pub struct PhaseState {
    pub mode: Mode,
    pub found_consistent_derivation: bool,
    /// Predicted patterns keyed by pattern string (exploit only).
    pub predicted_patterns: IndexMap<String, Pattern>,
    /// Base rules followed by the rules of the predicted patterns (exploit
    /// only).
    pub predicted_rules: Vec<Rule>,
}

impl PhaseState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}
