//! Reader and printer for the s-expressions formulas and rules are written in.
//!
//! ```text
//! tree   = list | quoted | atom
//! list   = '(' tree* ')'
//! quoted = '"' ([^"\\] | '\\"' | '\\\\')* '"'
//! atom   = [^ \t\n()"]+
//! ```
//!
//! Lines whose first non-blank character is `#` are comments when reading a
//! whole document with [`LispTree::parse_many`].

use std::fmt;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::many0,
    sequence::{delimited, preceded, terminated},
};

use crate::error::{GrammarError, GrammarResult};

/// A parsed s-expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LispTree {
    /// An atom such as `fb:row.row.name`, `$Entity` or `lambda`.
    Leaf(String),
    /// A parenthesized list of trees.
    List(Vec<LispTree>),
}

impl LispTree {
    /// Build a leaf.
    pub fn leaf(value: impl Into<String>) -> Self {
        LispTree::Leaf(value.into())
    }

    /// Returns the atom value if this tree is a leaf.
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            LispTree::Leaf(value) => Some(value),
            LispTree::List(_) => None,
        }
    }

    /// Returns the children if this tree is a list.
    pub fn as_list(&self) -> Option<&[LispTree]> {
        match self {
            LispTree::Leaf(_) => None,
            LispTree::List(children) => Some(children),
        }
    }

    /// The head atom of a list, e.g. `lambda` for `(lambda x (var x))`.
    pub fn head(&self) -> Option<&str> {
        self.as_list()
            .and_then(|children| children.first())
            .and_then(LispTree::as_leaf)
    }

    /// Parse exactly one tree from `input`.
    pub fn parse(input: &str) -> GrammarResult<Self> {
        all_consuming(delimited(multispace0, tree, multispace0))(input)
            .map(|(_, tree)| tree)
            .map_err(|error| GrammarError::Syntax {
                input: input.to_string(),
                reason: format!("{error}"),
            })
    }

    /// Parse a sequence of trees, skipping `#` comment lines.
    pub fn parse_many(input: &str) -> GrammarResult<Vec<Self>> {
        let source = strip_comments(input);
        all_consuming(terminated(
            many0(preceded(multispace0, tree)),
            multispace0,
        ))(source.as_str())
        .map(|(_, trees)| trees)
        .map_err(|error| GrammarError::Syntax {
            input: input.to_string(),
            reason: format!("{error}"),
        })
    }
}

fn strip_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')' && c != '"'
}

fn atom(input: &str) -> IResult<&str, LispTree> {
    map(take_while1(is_atom_char), |atom: &str| {
        LispTree::Leaf(atom.to_string())
    })(input)
}

fn quoted(input: &str) -> IResult<&str, LispTree> {
    let escape = alt((value("\\", tag("\\")), value("\"", tag("\""))));
    map(
        delimited(
            char('"'),
            opt(escaped_transform(is_not("\\\""), '\\', escape)),
            char('"'),
        ),
        |text: Option<String>| LispTree::Leaf(text.unwrap_or_default()),
    )(input)
}

fn list(input: &str) -> IResult<&str, LispTree> {
    map(
        delimited(
            char('('),
            many0(preceded(multispace0, tree)),
            preceded(multispace0, char(')')),
        ),
        LispTree::List,
    )(input)
}

fn tree(input: &str) -> IResult<&str, LispTree> {
    alt((list, quoted, atom))(input)
}

impl fmt::Display for LispTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LispTree::Leaf(value) if value.is_empty() || !value.chars().all(is_atom_char) => {
                write!(f, "\"")?;
                for c in value.chars() {
                    if matches!(c, '"' | '\\') {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "\"")
            }
            LispTree::Leaf(value) => write!(f, "{value}"),
            LispTree::List(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_atom() {
        assert_eq!(LispTree::parse("fb:cell.texas").unwrap(), LispTree::leaf("fb:cell.texas"));
    }

    #[test]
    fn test_parse_nested_list() {
        let tree = LispTree::parse("(rule $ROOT ($Set) (IdentityFn))").unwrap();
        let children = tree.as_list().unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(tree.head(), Some("rule"));
        assert_eq!(
            children[2],
            LispTree::List(vec![LispTree::leaf("$Set")])
        );
    }

    #[test]
    fn test_quoted_atom_keeps_spaces() {
        let tree = LispTree::parse("(string \"new york\")").unwrap();
        assert_eq!(
            tree,
            LispTree::List(vec![LispTree::leaf("string"), LispTree::leaf("new york")])
        );
        assert_eq!(tree.to_string(), "(string \"new york\")");
    }

    #[test]
    fn test_quotes_and_backslashes_are_escaped() {
        let tree = LispTree::List(vec![
            LispTree::leaf("string"),
            LispTree::leaf(r#"say "hi" to C:\temp"#),
        ]);
        let printed = tree.to_string();
        assert_eq!(printed, r#"(string "say \"hi\" to C:\\temp")"#);
        assert_eq!(LispTree::parse(&printed).unwrap(), tree);
    }

    #[test]
    fn test_empty_quoted_atom() {
        let tree = LispTree::parse(r#"(string "")"#).unwrap();
        assert_eq!(
            tree,
            LispTree::List(vec![LispTree::leaf("string"), LispTree::leaf("")])
        );
        assert_eq!(tree.to_string(), r#"(string "")"#);
    }

    #[test]
    fn test_whitespace_is_collapsed_on_print() {
        let tree = LispTree::parse("  (and\n  (a b)\t c )  ").unwrap();
        assert_eq!(tree.to_string(), "(and (a b) c)");
    }

    #[test]
    fn test_parse_many_skips_comments() {
        let trees = LispTree::parse_many(
            "# entities\n(rule $Entity ($PHRASE) (LexiconFn entity))\n\n(rule $ROOT ($Set) (IdentityFn))\n",
        )
        .unwrap();
        assert_eq!(trees.len(), 2);
    }

    #[test]
    fn test_unbalanced_input_is_rejected() {
        assert!(matches!(
            LispTree::parse("(and (a b)"),
            Err(GrammarError::Syntax { .. })
        ));
        assert!(LispTree::parse("(a))").is_err());
    }
}
