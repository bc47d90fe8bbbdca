//! # dialog-grammar
//!
//! Formulas, grammar rules and derivation trees for a floating semantic
//! parser, together with the interface a search-control layer uses to run
//! that parser against an explicit grammar.
//!
//! - [`Formula`]: typed logical forms read from and printed to
//!   s-expressions, with structural replace, lookup and beta reduction.
//! - [`Rule`] and [`Grammar`]: rule definitions and the interpreter that
//!   binarizes them through `$Intermediate<N>` categories.
//! - [`Derivation`]: arena-backed parse trees addressed by [`NodeId`].
//! - [`Parser`] and [`ValueEvaluator`]: the collaborator traits.
//!
//! ```
//! use dialog_grammar::{Formula, Grammar};
//!
//! let grammar = Grammar::from_rules_str(
//!     "(rule $Set ($Binary $Entity) (lambda b (lambda e ((var b) (var e)))))",
//! )?;
//! assert_eq!(grammar.rules().len(), 2);
//!
//! let lambda = Formula::parse("(lambda b (lambda e ((var b) (var e))))")?;
//! let join = lambda
//!     .apply_to(&Formula::name("fb:row.row.state"))
//!     .apply_to(&Formula::name("fb:cell.texas"));
//! assert_eq!(join.to_string(), "(fb:row.row.state fb:cell.texas)");
//! # Ok::<(), dialog_grammar::GrammarError>(())
//! ```
//!
//! With the `helpers` feature the crate also provides a reference
//! [`FloatingParser`](helpers::FloatingParser) with a toy lexicon and table
//! executor, used by tests of dependent crates.

mod derivation;
mod error;
mod formula;
mod grammar;
mod lisp;
mod parser;
mod rule;

#[cfg(any(test, feature = "helpers"))]
pub mod helpers;

pub use derivation::*;
pub use error::*;
pub use formula::*;
pub use grammar::*;
pub use lisp::*;
pub use parser::*;
pub use rule::*;
