//! Grammar rules and their semantic functions.
//!
//! A rule is written as
//!
//! ```text
//! (rule $Set ($Binary $Entity) (lambda b (lambda e ((var b) (var e)))))
//! ```
//!
//! The left-hand side is a category, the right-hand side a list of
//! categories (`$`-prefixed) and tokens, and the last item the semantic
//! function that builds the parent formula out of the children's formulas.
//! An empty right-hand side is written `(nothing)`.

use std::fmt;

use crate::error::{GrammarError, GrammarResult};
use crate::formula::Formula;
use crate::lisp::LispTree;

/// Category of complete derivations.
pub const ROOT: &str = "$ROOT";
/// Single token of the utterance.
pub const TOKEN: &str = "$TOKEN";
/// Contiguous span of tokens.
pub const PHRASE: &str = "$PHRASE";
/// Lemmatized single token.
pub const LEMMA_TOKEN: &str = "$LEMMA_TOKEN";
/// Lemmatized span of tokens.
pub const LEMMA_PHRASE: &str = "$LEMMA_PHRASE";
/// Prefix of the categories introduced by binarization.
pub const INTERMEDIATE_PREFIX: &str = "$Intermediate";

/// Returns `true` for nonterminals, which are written with a leading `$`.
pub fn is_category(item: &str) -> bool {
    item.starts_with('$')
}

/// Returns `true` for categories generated while binarizing a rule.
pub fn is_intermediate(category: &str) -> bool {
    category.starts_with(INTERMEDIATE_PREFIX)
}

/// The semantic function of a rule.
///
/// Children are the formulas of the right-hand side categories, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Semantics {
    /// `(IdentityFn)`: the single child formula.
    Identity,
    /// `(ConstantFn f)`: `f`, ignoring any children.
    Constant(Formula),
    /// `(lambda x ...)`: the lambda applied to each child in turn.
    Apply(Formula),
    /// `(JoinFn forward betaReduce)`: the first child applied to the second.
    Forward,
    /// `(SelectFn i)`: the `i`-th child.
    Select(usize),
    /// Any other semantic function, e.g. `(LexiconFn entity)`. These are
    /// evaluated by the parser that owns the corresponding resource.
    External(LispTree),
}

impl Semantics {
    /// Interpret the semantic function part of a rule.
    pub fn from_tree(tree: &LispTree) -> GrammarResult<Self> {
        let invalid = |reason: &str| GrammarError::InvalidRule {
            rule: tree.to_string(),
            reason: reason.to_string(),
        };

        if let LispTree::Leaf(name) = tree {
            return Ok(Semantics::Constant(Formula::name(name.as_str())));
        }
        let children = tree.as_list().unwrap_or_default();

        match tree.head() {
            Some("IdentityFn") if children.len() == 1 => Ok(Semantics::Identity),
            Some("ConstantFn") if children.len() == 2 => {
                Ok(Semantics::Constant(Formula::from_tree(&children[1])?))
            }
            Some("lambda") => Ok(Semantics::Apply(Formula::from_tree(tree)?)),
            Some("JoinFn")
                if children.len() == 3
                    && children[1..]
                        .iter()
                        .all(|flag| matches!(flag.as_leaf(), Some("forward" | "betaReduce")))
                    && children[1] != children[2] =>
            {
                Ok(Semantics::Forward)
            }
            Some("SelectFn") if children.len() == 2 => children[1]
                .as_leaf()
                .and_then(|index| index.parse::<usize>().ok())
                .map(Semantics::Select)
                .ok_or_else(|| invalid("SelectFn expects a child index")),
            Some("IdentityFn" | "ConstantFn" | "SelectFn") => {
                Err(invalid("wrong number of arguments"))
            }
            Some(_) => Ok(Semantics::External(tree.clone())),
            None => Err(invalid("semantic function must start with a name")),
        }
    }

    pub fn to_tree(&self) -> LispTree {
        match self {
            Semantics::Identity => LispTree::List(vec![LispTree::leaf("IdentityFn")]),
            Semantics::Constant(formula) => {
                LispTree::List(vec![LispTree::leaf("ConstantFn"), formula.to_tree()])
            }
            Semantics::Apply(lambda) => lambda.to_tree(),
            Semantics::Forward => LispTree::List(vec![
                LispTree::leaf("JoinFn"),
                LispTree::leaf("forward"),
                LispTree::leaf("betaReduce"),
            ]),
            Semantics::Select(index) => LispTree::List(vec![
                LispTree::leaf("SelectFn"),
                LispTree::leaf(index.to_string()),
            ]),
            Semantics::External(tree) => tree.clone(),
        }
    }

    /// Build the parent formula from the children's formulas.
    ///
    /// Returns `None` for external semantics and when the children do not
    /// fit the function (e.g. `Forward` with a single child).
    pub fn apply(&self, children: &[&Formula]) -> Option<Formula> {
        match self {
            Semantics::Identity => match children {
                [child] => Some((*child).clone()),
                _ => None,
            },
            Semantics::Constant(formula) => Some(formula.clone()),
            Semantics::Apply(lambda) => {
                if children.is_empty() {
                    return None;
                }
                Some(
                    children
                        .iter()
                        .fold(lambda.clone(), |function, child| function.apply_to(child)),
                )
            }
            Semantics::Forward => match children {
                [function, argument] => Some(function.apply_to(argument)),
                _ => None,
            },
            Semantics::Select(index) => children.get(*index).map(|child| (*child).clone()),
            Semantics::External(_) => None,
        }
    }
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tree())
    }
}

/// A grammar rule `lhs -> rhs` with its semantic function.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub lhs: String,
    pub rhs: Vec<String>,
    pub sem: Semantics,
}

impl Rule {
    pub fn new(lhs: impl Into<String>, rhs: Vec<String>, sem: Semantics) -> Self {
        Self {
            lhs: lhs.into(),
            rhs,
            sem,
        }
    }

    /// Parse a single `(rule ...)` definition.
    pub fn parse(input: &str) -> GrammarResult<Self> {
        Self::from_tree(&LispTree::parse(input)?)
    }

    /// Interpret `(rule lhs rhs sem (key value)...)`.
    ///
    /// Trailing key-value annotations are validated and discarded.
    pub fn from_tree(tree: &LispTree) -> GrammarResult<Self> {
        let invalid = |reason: &str| GrammarError::InvalidRule {
            rule: tree.to_string(),
            reason: reason.to_string(),
        };

        let children = tree.as_list().unwrap_or_default();
        if tree.head() != Some("rule") || children.len() < 4 {
            return Err(invalid("expected (rule lhs rhs semantics)"));
        }

        let lhs = children[1]
            .as_leaf()
            .filter(|lhs| is_category(lhs))
            .ok_or_else(|| invalid("left-hand side must be a category"))?;

        let rhs_items = children[2]
            .as_list()
            .ok_or_else(|| invalid("right-hand side must be a list"))?;
        let rhs = match rhs_items {
            [nothing] if nothing.as_leaf() == Some("nothing") => vec![],
            items => items
                .iter()
                .map(|item| {
                    item.as_leaf().map(str::to_string).ok_or_else(|| {
                        invalid("optional right-hand side items are not supported")
                    })
                })
                .collect::<GrammarResult<Vec<_>>>()?,
        };

        let sem = Semantics::from_tree(&children[3])?;

        for annotation in &children[4..] {
            let valid = annotation.as_list().is_some_and(|pair| {
                pair.len() == 2
                    && pair[0].as_leaf().is_some()
                    && pair[1].as_leaf().is_some_and(|value| value.parse::<f64>().is_ok())
            });
            if !valid {
                return Err(invalid("annotations must be (key number) pairs"));
            }
        }

        Ok(Rule::new(lhs, rhs, sem))
    }

    pub fn to_tree(&self) -> LispTree {
        let rhs = if self.rhs.is_empty() {
            vec![LispTree::leaf("nothing")]
        } else {
            self.rhs.iter().map(|item| LispTree::leaf(item.as_str())).collect()
        };
        LispTree::List(vec![
            LispTree::leaf("rule"),
            LispTree::leaf(self.lhs.as_str()),
            LispTree::List(rhs),
            self.sem.to_tree(),
        ])
    }

    /// Categories on the right-hand side, in order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rhs
            .iter()
            .map(String::as_str)
            .filter(|item| is_category(item))
    }

    /// Returns `true` if every right-hand side item is a category.
    pub fn is_floating(&self) -> bool {
        self.rhs.iter().all(|item| is_category(item))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tree())
    }
}

impl std::str::FromStr for Rule {
    type Err = GrammarError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Rule::parse(input)
    }
}
