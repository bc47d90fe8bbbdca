//! Pattern abstraction.
//!
//! A pattern is the canonical shape of a successful derivation's formula:
//! cell properties are elided, every symbol is replaced by an indexed
//! placeholder `Category#i` numbered by first occurrence, and a table of
//! rewrites shortens the relations that remain. Derivations that differ only
//! in the entities and relations they bind share a pattern:
//!
//! ```text
//! (argmax (number 1) (number 1)
//!         (and (fb:row.row.type fb:cell.city) (fb:row.row.state fb:cell.california))
//!         (reverse fb:row.row.population))
//!
//! (argmax (and ($Binary#1 $Entity#2) ($Binary#3 $Entity#4)) (@R $Binary#5))
//! ```

use std::cmp::Ordering;

use dialog_grammar::{Derivation, Formula, Value};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use crate::config::PatternConfig;
use crate::error::PruningResult;
use crate::symbol::{Scratch, index_symbols, is_primitive_category};

const REVERSE: &str = "@R";
const CANONICAL_VAR: &str = "x";

/// A pattern with its neighbor frequency and the score of the derivation it
/// was taken from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pattern {
    pub pattern: String,
    pub frequency: usize,
    pub score: f64,
}

impl Pattern {
    pub fn new(pattern: impl Into<String>, frequency: usize) -> Self {
        Self {
            pattern: pattern.into(),
            frequency,
            score: 0.0,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Rough count of nested applications: the number of parentheses, with
    /// each `(@R` counted once.
    pub fn complexity(&self) -> usize {
        let collapsed = self
            .pattern
            .replace("(@R", "***")
            .replace(['(', ')'], "");
        self.pattern.len() - collapsed.len()
    }

    /// Prediction order: more frequent first, then less complex, then by
    /// pattern string.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .frequency
            .cmp(&self.frequency)
            .then_with(|| self.complexity().cmp(&other.complexity()))
            .then_with(|| self.pattern.cmp(&other.pattern))
    }
}

/// Maps derivations to their pattern strings.
#[derive(Clone, Debug)]
pub struct PatternAbstractor {
    property_prefixes: Vec<String>,
    renames: IndexMap<String, String>,
    expansions: IndexMap<String, Formula>,
}

impl PatternAbstractor {
    pub fn new(config: &PatternConfig) -> PruningResult<Self> {
        let expansions = config
            .expansions
            .iter()
            .map(|(name, expansion)| Ok((name.clone(), Formula::parse(expansion)?)))
            .collect::<PruningResult<_>>()?;

        Ok(Self {
            property_prefixes: config.property_prefixes.clone(),
            renames: config.renames.clone(),
            expansions,
        })
    }

    /// The pattern of `derivation`.
    ///
    /// Derivations of a primitive lexical category are their own pattern.
    pub fn pattern_of(&self, derivation: &Derivation, scratch: &mut Scratch) -> String {
        let category = derivation.cat();
        if is_primitive_category(category) {
            return category.to_string();
        }

        let stripped = self.strip_properties(derivation.formula());
        let symbols = scratch.tree_symbols(derivation, derivation.root());
        let indexed = index_symbols(&stripped, symbols);
        let pattern = self.canonicalize(indexed).to_string();

        trace!(formula = %derivation.formula(), %pattern, "abstracted pattern");
        pattern
    }

    fn has_property_prefix(&self, name: &str) -> bool {
        self.property_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    fn is_property(&self, formula: &Formula) -> bool {
        match formula {
            Formula::Value(Value::Name(name)) => {
                self.has_property_prefix(name.strip_prefix('!').unwrap_or(name))
            }
            Formula::Reverse(relation) => relation
                .as_name()
                .is_some_and(|name| self.has_property_prefix(name)),
            _ => false,
        }
    }

    fn is_property_application(&self, formula: &Formula) -> bool {
        match formula {
            Formula::Apply(items) => items.first().is_some_and(|head| self.is_property(head)),
            _ => false,
        }
    }

    /// Remove property predicates. An application headed by a property is
    /// replaced by its remaining arguments; a bare property argument is
    /// dropped.
    pub(crate) fn strip_properties(&self, formula: &Formula) -> Formula {
        match formula {
            Formula::Apply(items) if self.is_property_application(formula) => {
                let mut rest = Vec::new();
                for item in &items[1..] {
                    self.splice_into(item, &mut rest);
                }
                match <[Formula; 1]>::try_from(rest) {
                    Ok([only]) => only,
                    Err(rest) => Formula::Apply(rest),
                }
            }
            Formula::Apply(items) => {
                let mut kept = Vec::new();
                for item in items {
                    self.splice_into(item, &mut kept);
                }
                Formula::Apply(kept)
            }
            Formula::Lambda { var, body } => {
                Formula::lambda(var.as_str(), self.strip_properties(body))
            }
            Formula::Reverse(relation) => Formula::reverse(self.strip_properties(relation)),
            Formula::Superlative {
                kind,
                rank,
                count,
                head,
                relation,
            } => {
                let boilerplate = formula.has_boilerplate();
                let strip = |argument: &Formula| {
                    if boilerplate {
                        argument.clone()
                    } else {
                        self.strip_properties(argument)
                    }
                };
                Formula::Superlative {
                    kind: *kind,
                    rank: Box::new(strip(rank)),
                    count: Box::new(strip(count)),
                    head: Box::new(self.strip_properties(head)),
                    relation: Box::new(self.strip_properties(relation)),
                }
            }
            Formula::Value(_) | Formula::Var(_) => formula.clone(),
        }
    }

    fn splice_into(&self, item: &Formula, out: &mut Vec<Formula>) {
        if self.is_property(item) {
            return;
        }
        match item {
            Formula::Apply(items) if self.is_property_application(item) => {
                for argument in &items[1..] {
                    self.splice_into(argument, out);
                }
            }
            _ => out.push(self.strip_properties(item)),
        }
    }

    /// Apply the rewrite table: renames and expansions of names, `@R` for
    /// reversal, a single variable name, and superlatives without their
    /// boilerplate rank and count.
    pub(crate) fn canonicalize(&self, formula: Formula) -> Formula {
        formula.map_bottom_up(&mut |node| match node {
            Formula::Value(Value::Name(name)) => self.rewrite_name(&name),
            Formula::Var(_) => Formula::var(CANONICAL_VAR),
            Formula::Lambda { body, .. } => Formula::Lambda {
                var: CANONICAL_VAR.to_string(),
                body,
            },
            Formula::Reverse(relation) => {
                Formula::apply(vec![Formula::name(REVERSE), *relation])
            }
            Formula::Superlative {
                kind,
                rank,
                count,
                head,
                relation,
            } => {
                let one = Formula::number(1.0);
                if *rank == one && *count == one {
                    Formula::apply(vec![Formula::name(kind.as_str()), *head, *relation])
                } else {
                    Formula::Superlative {
                        kind,
                        rank,
                        count,
                        head,
                        relation,
                    }
                }
            }
            other => other,
        })
    }

    fn rewrite_name(&self, name: &str) -> Formula {
        if let Some(relation) = name.strip_prefix('!') {
            return Formula::apply(vec![Formula::name(REVERSE), self.rewrite_name(relation)]);
        }
        if let Some(expansion) = self.expansions.get(name) {
            return expansion.clone();
        }
        match self.renames.get(name) {
            Some(renamed) => Formula::name(renamed.as_str()),
            None => Formula::name(name),
        }
    }
}
