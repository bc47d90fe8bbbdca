//! Logical forms produced by grammar rules.
//!
//! A [`Formula`] is a tagged tree over the lambda-DCS style language the
//! floating parser builds: constants, variables, lambda abstractions,
//! relation reversal, superlatives and generic application (joins, merges,
//! comparisons). Formulas are read from and printed to s-expressions:
//!
//! ```text
//! (argmax (number 1) (number 1) (fb:row.row.state fb:cell.texas) (reverse fb:row.row.population))
//! ```
//!
//! All structural operations (subtree replacement, first-occurrence lookup,
//! substitution and beta reduction) work on the tree, never on the printed
//! text, so a constant can never be matched inside a longer unrelated token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GrammarError, GrammarResult};
use crate::lisp::LispTree;

/// A constant value appearing in a formula or a denotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A knowledge-base name such as `fb:cell.texas` or `fb:row.row.state`.
    Name(String),
    /// `(number 3)`
    Number(f64),
    /// `(date 2000 -1 -1)`; unknown components are `-1`.
    Date { year: i32, month: i32, day: i32 },
    /// `(string "new york")`
    Text(String),
}

impl Value {
    fn to_tree(&self) -> LispTree {
        match self {
            Value::Name(name) => LispTree::leaf(name.as_str()),
            Value::Number(number) => LispTree::List(vec![
                LispTree::leaf("number"),
                LispTree::leaf(format_number(*number)),
            ]),
            Value::Date { year, month, day } => LispTree::List(vec![
                LispTree::leaf("date"),
                LispTree::leaf(year.to_string()),
                LispTree::leaf(month.to_string()),
                LispTree::leaf(day.to_string()),
            ]),
            Value::Text(text) => {
                LispTree::List(vec![LispTree::leaf("string"), LispTree::leaf(text.as_str())])
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tree())
    }
}

fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

fn invalid(tree: &LispTree, reason: &str) -> GrammarError {
    GrammarError::InvalidFormula {
        formula: tree.to_string(),
        reason: reason.to_string(),
    }
}

fn atom(tree: &LispTree, index: usize) -> GrammarResult<&str> {
    tree.as_list()
        .and_then(|children| children.get(index))
        .and_then(LispTree::as_leaf)
        .ok_or_else(|| invalid(tree, "expected an atom"))
}

fn date_part(tree: &LispTree, index: usize) -> GrammarResult<i32> {
    atom(tree, index)?
        .parse::<i32>()
        .map_err(|_| invalid(tree, "expected an integer date component"))
}

/// Which end of the ordering a superlative selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuperlativeKind {
    Argmax,
    Argmin,
}

impl SuperlativeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuperlativeKind::Argmax => "argmax",
            SuperlativeKind::Argmin => "argmin",
        }
    }
}

/// A logical form.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    /// A constant.
    Value(Value),
    /// `(var x)`
    Var(String),
    /// `(lambda x body)`
    Lambda { var: String, body: Box<Formula> },
    /// `(reverse relation)`
    Reverse(Box<Formula>),
    /// `(argmax rank count head relation)`
    Superlative {
        kind: SuperlativeKind,
        rank: Box<Formula>,
        count: Box<Formula>,
        head: Box<Formula>,
        relation: Box<Formula>,
    },
    /// Any other application: joins `(relation child)`, merges
    /// `(and a b)`, comparisons `(< x)`, and applications of variables.
    Apply(Vec<Formula>),
}

impl Formula {
    /// A knowledge-base name.
    pub fn name(name: impl Into<String>) -> Self {
        Formula::Value(Value::Name(name.into()))
    }

    pub fn number(number: f64) -> Self {
        Formula::Value(Value::Number(number))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Formula::Var(name.into())
    }

    pub fn lambda(var: impl Into<String>, body: Formula) -> Self {
        Formula::Lambda {
            var: var.into(),
            body: Box::new(body),
        }
    }

    pub fn reverse(relation: Formula) -> Self {
        Formula::Reverse(Box::new(relation))
    }

    pub fn apply(items: Vec<Formula>) -> Self {
        Formula::Apply(items)
    }

    /// Parse a formula from its s-expression form.
    pub fn parse(input: &str) -> GrammarResult<Self> {
        Self::from_tree(&LispTree::parse(input)?)
    }

    /// Interpret an s-expression as a formula.
    pub fn from_tree(tree: &LispTree) -> GrammarResult<Self> {
        let children = match tree {
            LispTree::Leaf(name) => return Ok(Formula::name(name.as_str())),
            LispTree::List(children) => children,
        };
        if children.is_empty() {
            return Err(invalid(tree, "empty application"));
        }

        match (tree.head(), children.len()) {
            (Some("number"), 2 | 3) => atom(tree, 1)?
                .parse::<f64>()
                .map(Formula::number)
                .map_err(|_| invalid(tree, "expected a number")),
            (Some("date"), 4) => Ok(Formula::Value(Value::Date {
                year: date_part(tree, 1)?,
                month: date_part(tree, 2)?,
                day: date_part(tree, 3)?,
            })),
            (Some("string"), 2) => Ok(Formula::Value(Value::Text(atom(tree, 1)?.to_string()))),
            (Some("var"), 2) => Ok(Formula::var(atom(tree, 1)?)),
            (Some("lambda"), 3) => Ok(Formula::lambda(
                atom(tree, 1)?,
                Formula::from_tree(&children[2])?,
            )),
            (Some("reverse"), 2) => Ok(Formula::reverse(Formula::from_tree(&children[1])?)),
            (Some(head @ ("argmax" | "argmin")), 5) => Ok(Formula::Superlative {
                kind: if head == "argmax" {
                    SuperlativeKind::Argmax
                } else {
                    SuperlativeKind::Argmin
                },
                rank: Box::new(Formula::from_tree(&children[1])?),
                count: Box::new(Formula::from_tree(&children[2])?),
                head: Box::new(Formula::from_tree(&children[3])?),
                relation: Box::new(Formula::from_tree(&children[4])?),
            }),
            (Some("number" | "date" | "string" | "var" | "lambda" | "reverse"), _) => {
                Err(invalid(tree, "wrong number of arguments"))
            }
            _ => children
                .iter()
                .map(Formula::from_tree)
                .collect::<GrammarResult<Vec<_>>>()
                .map(Formula::Apply),
        }
    }

    /// Render this formula as an s-expression.
    pub fn to_tree(&self) -> LispTree {
        match self {
            Formula::Value(value) => value.to_tree(),
            Formula::Var(name) => {
                LispTree::List(vec![LispTree::leaf("var"), LispTree::leaf(name.as_str())])
            }
            Formula::Lambda { var, body } => LispTree::List(vec![
                LispTree::leaf("lambda"),
                LispTree::leaf(var.as_str()),
                body.to_tree(),
            ]),
            Formula::Reverse(relation) => {
                LispTree::List(vec![LispTree::leaf("reverse"), relation.to_tree()])
            }
            Formula::Superlative {
                kind,
                rank,
                count,
                head,
                relation,
            } => LispTree::List(vec![
                LispTree::leaf(kind.as_str()),
                rank.to_tree(),
                count.to_tree(),
                head.to_tree(),
                relation.to_tree(),
            ]),
            Formula::Apply(items) => LispTree::List(items.iter().map(Formula::to_tree).collect()),
        }
    }

    /// The name if this formula is a knowledge-base name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Formula::Value(Value::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// A superlative of the form `(argmax (number 1) (number 1) head relation)`.
    ///
    /// Its rank and count are fixed plumbing rather than content: they are
    /// skipped by [`Formula::position_of`] and [`Formula::transform`].
    pub fn has_boilerplate(&self) -> bool {
        let one = Formula::number(1.0);
        matches!(self, Formula::Superlative { rank, count, .. } if **rank == one && **count == one)
    }

    /// Children visited by structural matching, in textual order.
    pub fn children(&self) -> Vec<&Formula> {
        match self {
            Formula::Value(_) | Formula::Var(_) => vec![],
            Formula::Lambda { body, .. } => vec![body.as_ref()],
            Formula::Reverse(relation) => vec![relation.as_ref()],
            Formula::Superlative {
                rank,
                count,
                head,
                relation,
                ..
            } => {
                if self.has_boilerplate() {
                    vec![head.as_ref(), relation.as_ref()]
                } else {
                    vec![rank.as_ref(), count.as_ref(), head.as_ref(), relation.as_ref()]
                }
            }
            Formula::Apply(items) => items.iter().collect(),
        }
    }

    /// Pre-order position of the first subtree equal to `target`.
    ///
    /// Pre-order position orders subtrees exactly as their first character
    /// offsets order them in the printed formula.
    pub fn position_of(&self, target: &Formula) -> Option<usize> {
        fn visit(node: &Formula, target: &Formula, position: &mut usize) -> Option<usize> {
            if node == target {
                return Some(*position);
            }
            *position += 1;
            node.children()
                .into_iter()
                .find_map(|child| visit(child, target, position))
        }
        visit(self, target, &mut 0)
    }

    /// Returns `true` if `target` occurs anywhere in this formula.
    pub fn contains(&self, target: &Formula) -> bool {
        self.position_of(target).is_some()
    }

    /// Top-down rewrite: wherever `rewrite` returns a replacement, the whole
    /// subtree is replaced and not descended into.
    pub fn transform<F>(&self, rewrite: &mut F) -> Formula
    where
        F: FnMut(&Formula) -> Option<Formula>,
    {
        if let Some(replacement) = rewrite(self) {
            return replacement;
        }
        match self {
            Formula::Value(_) | Formula::Var(_) => self.clone(),
            Formula::Lambda { var, body } => Formula::lambda(var.as_str(), body.transform(rewrite)),
            Formula::Reverse(relation) => Formula::reverse(relation.transform(rewrite)),
            Formula::Superlative {
                kind,
                rank,
                count,
                head,
                relation,
            } => {
                let boilerplate = self.has_boilerplate();
                Formula::Superlative {
                    kind: *kind,
                    rank: Box::new(if boilerplate {
                        (**rank).clone()
                    } else {
                        rank.transform(rewrite)
                    }),
                    count: Box::new(if boilerplate {
                        (**count).clone()
                    } else {
                        count.transform(rewrite)
                    }),
                    head: Box::new(head.transform(rewrite)),
                    relation: Box::new(relation.transform(rewrite)),
                }
            }
            Formula::Apply(items) => {
                Formula::Apply(items.iter().map(|item| item.transform(rewrite)).collect())
            }
        }
    }

    /// Replace every occurrence of `target` with `replacement`.
    pub fn replace(&self, target: &Formula, replacement: &Formula) -> Formula {
        self.transform(&mut |node| (node == target).then(|| replacement.clone()))
    }

    /// Bottom-up rewrite over every node, children first.
    pub fn map_bottom_up<F>(self, rewrite: &mut F) -> Formula
    where
        F: FnMut(Formula) -> Formula,
    {
        let rebuilt = match self {
            Formula::Value(_) | Formula::Var(_) => self,
            Formula::Lambda { var, body } => Formula::Lambda {
                var,
                body: Box::new((*body).map_bottom_up(rewrite)),
            },
            Formula::Reverse(relation) => Formula::reverse((*relation).map_bottom_up(rewrite)),
            Formula::Superlative {
                kind,
                rank,
                count,
                head,
                relation,
            } => Formula::Superlative {
                kind,
                rank: Box::new((*rank).map_bottom_up(rewrite)),
                count: Box::new((*count).map_bottom_up(rewrite)),
                head: Box::new((*head).map_bottom_up(rewrite)),
                relation: Box::new((*relation).map_bottom_up(rewrite)),
            },
            Formula::Apply(items) => Formula::Apply(
                items
                    .into_iter()
                    .map(|item| item.map_bottom_up(rewrite))
                    .collect(),
            ),
        };
        rewrite(rebuilt)
    }

    /// Substitute `value` for free occurrences of `(var name)`.
    pub fn substitute_var(&self, name: &str, value: &Formula) -> Formula {
        match self {
            Formula::Var(var) if var == name => value.clone(),
            Formula::Lambda { var, .. } if var == name => self.clone(),
            Formula::Lambda { var, body } => {
                Formula::lambda(var.as_str(), body.substitute_var(name, value))
            }
            Formula::Reverse(relation) => Formula::reverse(relation.substitute_var(name, value)),
            Formula::Superlative {
                kind,
                rank,
                count,
                head,
                relation,
            } => Formula::Superlative {
                kind: *kind,
                rank: Box::new(rank.substitute_var(name, value)),
                count: Box::new(count.substitute_var(name, value)),
                head: Box::new(head.substitute_var(name, value)),
                relation: Box::new(relation.substitute_var(name, value)),
            },
            Formula::Apply(items) => Formula::Apply(
                items
                    .iter()
                    .map(|item| item.substitute_var(name, value))
                    .collect(),
            ),
            Formula::Value(_) | Formula::Var(_) => self.clone(),
        }
    }

    /// Apply this formula to `argument`, beta reducing when it is a lambda.
    pub fn apply_to(&self, argument: &Formula) -> Formula {
        match self {
            Formula::Lambda { var, body } => body.substitute_var(var, argument).beta_reduce(),
            _ => Formula::Apply(vec![self.clone(), argument.clone()]),
        }
    }

    /// Reduce every application whose head is a lambda.
    pub fn beta_reduce(self) -> Formula {
        self.map_bottom_up(&mut |node| match node {
            Formula::Apply(items) if items.len() >= 2 && matches!(items[0], Formula::Lambda { .. }) => {
                let mut items = items.into_iter();
                let mut reduced = match items.next() {
                    Some(head) => head,
                    None => return Formula::Apply(vec![]),
                };
                for argument in items {
                    reduced = reduced.apply_to(&argument);
                }
                reduced
            }
            other => other,
        })
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tree())
    }
}

impl std::str::FromStr for Formula {
    type Err = GrammarError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Formula::parse(input)
    }
}
