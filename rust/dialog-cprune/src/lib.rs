//! # dialog-cprune
//!
//! Collaborative pruning for a floating semantic parser. Successful parses
//! are generalized into patterns and grammar rules, and later examples are
//! first parsed against the small grammar predicted from their neighbors'
//! patterns, falling back to a full search only while seeding.
//!
//! ```text
//! PruningParser::infer
//!   exploit: Pruner::begin_phase ─ predict from neighbors ─▶ mini-grammar ─▶ Parser
//!   explore: full grammar ─▶ Parser            (seeding only, on exploit miss)
//!   every derivation ─▶ Pruner::update_consistent_pattern
//!                         ├─ PatternAbstractor::pattern_of
//!                         └─ RuleSynthesizer::synthesize ─▶ Registry
//! ```
//!
//! The parser itself, the value evaluator and the host grammar come from
//! [`dialog_grammar`].

mod config;
pub use config::*;

mod error;
pub use error::*;

mod mode;
pub use mode::*;

mod neighbors;
pub use neighbors::*;

mod parser;
pub use parser::*;

mod pattern;
pub use pattern::*;

mod pruner;
pub use pruner::*;

mod registry;
pub use registry::*;

mod stats;
pub use stats::*;

mod symbol;
pub use symbol::*;

mod synthesizer;
pub use synthesizer::*;

#[cfg(test)]
mod fixtures;
