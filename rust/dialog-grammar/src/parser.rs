//! The parsing interface consumed by search-control layers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::derivation::Derivation;
use crate::formula::Value;
use crate::grammar::Grammar;

/// Result of executing a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Denotation {
    /// The values the formula denotes, in a stable order.
    List(Vec<Value>),
    /// The formula could not be executed.
    Error(String),
}

/// A training or evaluation example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub id: String,
    pub utterance: String,
    #[serde(default)]
    pub target_value: Option<Denotation>,
}

impl Example {
    pub fn new(id: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            utterance: utterance.into(),
            target_value: None,
        }
    }

    pub fn with_target(mut self, target: Denotation) -> Self {
        self.target_value = Some(target);
        self
    }

    /// Lowercased whitespace-separated tokens of the utterance.
    pub fn tokens(&self) -> Vec<String> {
        self.utterance
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }
}

/// Budget and options for a single search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Maximum number of complete derivations to return.
    pub max_derivations: usize,
    /// Stop building once this many partial derivations exist.
    pub early_stopping: Option<usize>,
    /// Whether the caller is training on this example.
    pub compute_expected_counts: bool,
}

impl SearchRequest {
    pub fn new(max_derivations: usize) -> Self {
        Self {
            max_derivations,
            early_stopping: None,
            compute_expected_counts: false,
        }
    }

    pub fn with_early_stopping(mut self, limit: usize) -> Self {
        self.early_stopping = Some(limit);
        self
    }

    pub fn with_compute_expected_counts(mut self, compute: bool) -> Self {
        self.compute_expected_counts = compute;
        self
    }
}

/// Derivations produced by one search, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub derivations: Vec<Derivation>,
    /// Feature expectations for the learner, keyed by feature name. Present
    /// only when the request asked for them.
    pub expected_counts: Option<BTreeMap<String, f64>>,
}

/// A search procedure over an explicit grammar.
pub trait Parser {
    /// Parse `example` using only the rules of `grammar`.
    fn parse(&self, grammar: &Grammar, example: &Example, request: &SearchRequest)
    -> ParseOutcome;
}

/// Scores how well a predicted denotation matches a target.
pub trait ValueEvaluator {
    /// A compatibility in `[0, 1]`; `1` means the prediction is correct.
    fn compatibility(&self, target: &Denotation, predicted: Option<&Denotation>) -> f64;
}

/// Exact equality of denotations. Errors are never compatible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchEvaluator;

impl ValueEvaluator for ExactMatchEvaluator {
    fn compatibility(&self, target: &Denotation, predicted: Option<&Denotation>) -> f64 {
        match predicted {
            Some(Denotation::Error(_)) | None => 0.0,
            Some(predicted) if predicted == target => 1.0,
            Some(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exact_match() {
        let target = Denotation::List(vec![Value::Name("fb:row.r0".into())]);
        let evaluator = ExactMatchEvaluator;
        assert_eq!(evaluator.compatibility(&target, Some(&target.clone())), 1.0);
        assert_eq!(
            evaluator.compatibility(&target, Some(&Denotation::List(vec![]))),
            0.0
        );
        assert_eq!(
            evaluator.compatibility(&target, Some(&Denotation::Error("bad".into()))),
            0.0
        );
        assert_eq!(evaluator.compatibility(&target, None), 0.0);
    }

    #[test]
    fn test_example_tokens() {
        let example = Example::new("nt-0", "Largest  city in California");
        assert_eq!(example.tokens(), vec!["largest", "city", "in", "california"]);
    }
}
