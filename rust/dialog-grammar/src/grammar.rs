//! Rule-definition interpreter.
//!
//! A [`Grammar`] reads `(rule ...)` definitions and stores them in binarized
//! form: every stored rule has at most two right-hand side items. Longer
//! rules are left-binarized through fresh `$Intermediate<N>` categories, and
//! a lambda applied to several categories is first applied to the leading
//! one and then fed the rest through forward application:
//!
//! ```text
//! (rule $A ($B $C $D) (lambda b (lambda c (lambda d ...))))
//!
//! (rule $Intermediate1 ($B) (lambda b (lambda c (lambda d ...))))
//! (rule $Intermediate2 ($Intermediate1 $C) (JoinFn forward betaReduce))
//! (rule $A ($Intermediate2 $D) (JoinFn forward betaReduce))
//! ```

use tracing::trace;

use crate::error::{GrammarError, GrammarResult};
use crate::formula::Formula;
use crate::lisp::LispTree;
use crate::rule::{INTERMEDIATE_PREFIX, Rule, Semantics, is_category};

/// An ordered collection of binarized rules.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: Vec<Rule>,
    fresh_cat_index: usize,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A grammar holding exactly `rules`, which are assumed to be binarized
    /// already.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            fresh_cat_index: 0,
        }
    }

    /// Read a grammar document: a sequence of `(rule ...)` definitions with
    /// optional `#` comment lines.
    pub fn from_rules_str(input: &str) -> GrammarResult<Self> {
        let mut grammar = Self::new();
        grammar.interpret_str(input)?;
        Ok(grammar)
    }

    /// Continue numbering intermediate categories after `index`.
    pub fn with_fresh_cat_index(mut self, index: usize) -> Self {
        self.fresh_cat_index = index;
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The number of intermediate categories generated so far.
    pub fn fresh_cat_index(&self) -> usize {
        self.fresh_cat_index
    }

    /// Interpret every definition in `input`, add the binarized rules to
    /// this grammar and return them.
    pub fn interpret_str(&mut self, input: &str) -> GrammarResult<Vec<Rule>> {
        let rules = self.read_rules(input)?;
        self.rules.extend(rules.iter().cloned());
        Ok(rules)
    }

    /// Interpret every definition in `input` and return the binarized rules
    /// without adding them to this grammar.
    ///
    /// Intermediate categories are still drawn from this grammar's counter,
    /// so rules read later never reuse a name.
    pub fn read_rules(&mut self, input: &str) -> GrammarResult<Vec<Rule>> {
        let mut rules = Vec::new();
        for tree in LispTree::parse_many(input)? {
            rules.extend(self.interpret(&tree)?);
        }
        Ok(rules)
    }

    /// Interpret a single top-level statement.
    pub fn interpret(&mut self, tree: &LispTree) -> GrammarResult<Vec<Rule>> {
        match tree.head() {
            Some("rule") => {
                let rule = Rule::from_tree(tree)?;
                Ok(self.binarize(rule))
            }
            _ => Err(GrammarError::InvalidRule {
                rule: tree.to_string(),
                reason: "unsupported statement".to_string(),
            }),
        }
    }

    /// Add an already parsed rule, binarizing it.
    pub fn add_rule(&mut self, rule: Rule) -> Vec<Rule> {
        let rules = self.binarize(rule);
        self.rules.extend(rules.iter().cloned());
        rules
    }

    fn generate_fresh_cat(&mut self) -> String {
        self.fresh_cat_index += 1;
        format!("{INTERMEDIATE_PREFIX}{}", self.fresh_cat_index)
    }

    fn binarize(&mut self, rule: Rule) -> Vec<Rule> {
        if let Semantics::Apply(_) = rule.sem {
            let mut categories = rule
                .rhs
                .iter()
                .enumerate()
                .filter(|(_, item)| is_category(item))
                .map(|(position, _)| position);
            if let (Some(first), Some(_)) = (categories.next(), categories.next()) {
                let intermediate = self.generate_fresh_cat();
                let mut rules = self.binarize(Rule::new(
                    intermediate.clone(),
                    rule.rhs[..=first].to_vec(),
                    rule.sem.clone(),
                ));
                let mut rest = vec![intermediate];
                rest.extend(rule.rhs[first + 1..].iter().cloned());
                rules.extend(self.binarize(Rule::new(rule.lhs, rest, Semantics::Forward)));
                return rules;
            }
        }

        if rule.rhs.len() <= 1 {
            trace!(%rule, "binarized");
            return vec![rule];
        }

        let mut rules = Vec::new();
        let mut left = rule.rhs[0].clone();
        let mut left_required = is_category(&left);
        let mut applied = false;

        for (position, right) in rule.rhs.iter().enumerate().skip(1) {
            let right_required = is_category(right);
            if left_required && right_required {
                applied = true;
            }

            let at_end = position == rule.rhs.len() - 1;
            let lhs = if at_end && applied {
                rule.lhs.clone()
            } else {
                self.generate_fresh_cat()
            };

            let sem = if left_required && right_required {
                rule.sem.clone()
            } else if left_required || right_required {
                Semantics::Select(0)
            } else {
                Semantics::Constant(Formula::name("null"))
            };

            rules.push(Rule::new(lhs.clone(), vec![left, right.clone()], sem));
            left = lhs;
            left_required = left_required || right_required;
        }

        if !applied {
            rules.push(Rule::new(rule.lhs.clone(), vec![left], rule.sem.clone()));
        }

        for rule in &rules {
            trace!(%rule, "binarized");
        }
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(rules: &[Rule]) -> Vec<String> {
        rules.iter().map(Rule::to_string).collect()
    }

    #[test]
    fn test_unary_and_zeroary_rules_are_kept() {
        let grammar = Grammar::from_rules_str(
            "(rule $ROOT ($Set) (IdentityFn))\n(rule $Binary (nothing) (ConstantFn fb:row.row.type))",
        )
        .unwrap();
        assert_eq!(
            render(grammar.rules()),
            vec![
                "(rule $ROOT ($Set) (IdentityFn))",
                "(rule $Binary (nothing) (ConstantFn fb:row.row.type))",
            ]
        );
        assert_eq!(grammar.fresh_cat_index(), 0);
    }

    #[test]
    fn test_lambda_over_two_categories_is_split() {
        let grammar = Grammar::from_rules_str(
            "(rule $Set ($Binary $Entity) (lambda b (lambda e ((var b) (var e)))))",
        )
        .unwrap();
        assert_eq!(
            render(grammar.rules()),
            vec![
                "(rule $Intermediate1 ($Binary) (lambda b (lambda e ((var b) (var e)))))",
                "(rule $Set ($Intermediate1 $Entity) (JoinFn forward betaReduce))",
            ]
        );
    }

    #[test]
    fn test_lambda_over_three_categories_is_left_binarized() {
        let grammar = Grammar::from_rules_str(
            "(rule $A ($B $C $D) (lambda b (lambda c (lambda d (and (var b) (var c) (var d))))))",
        )
        .unwrap();
        assert_eq!(
            render(grammar.rules()),
            vec![
                "(rule $Intermediate1 ($B) (lambda b (lambda c (lambda d (and (var b) (var c) (var d))))))",
                "(rule $Intermediate2 ($Intermediate1 $C) (JoinFn forward betaReduce))",
                "(rule $A ($Intermediate2 $D) (JoinFn forward betaReduce))",
            ]
        );
        assert_eq!(grammar.fresh_cat_index(), 2);
    }

    #[test]
    fn test_tokens_are_selected_away() {
        let grammar = Grammar::from_rules_str("(rule $Set (in $Entity) (IdentityFn))").unwrap();
        assert_eq!(
            render(grammar.rules()),
            vec![
                "(rule $Intermediate1 (in $Entity) (SelectFn 0))",
                "(rule $Set ($Intermediate1) (IdentityFn))",
            ]
        );
    }

    #[test]
    fn test_read_rules_continues_the_counter() {
        let mut host = Grammar::from_rules_str(
            "(rule $Set ($Binary $Entity) (lambda b (lambda e ((var b) (var e)))))",
        )
        .unwrap();
        let mut interpreter = Grammar::new().with_fresh_cat_index(host.fresh_cat_index());
        let rules = interpreter
            .read_rules("(rule $Formula1 ($Entity $Binary) (lambda s2 (lambda s1 ((var s1) (var s2)))))")
            .unwrap();
        assert_eq!(rules[0].lhs, "$Intermediate2");
        assert!(interpreter.rules().is_empty());

        let added = host.add_rule(Rule::parse("(rule $ROOT ($Set) (IdentityFn))").unwrap());
        assert_eq!(added.len(), 1);
        assert_eq!(host.rules().len(), 3);
    }

    #[test]
    fn test_unknown_statements_are_rejected() {
        assert!(matches!(
            Grammar::from_rules_str("(include other.grammar)"),
            Err(GrammarError::InvalidRule { .. })
        ));
    }
}
