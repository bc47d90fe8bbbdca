//! Derivation trees.
//!
//! A [`Derivation`] stores its nodes in an arena and refers to them by
//! [`NodeId`]. Consumers that need per-node bookkeeping keep a side table
//! indexed by [`NodeId::index`] instead of attaching state to the nodes.

use crate::formula::Formula;
use crate::parser::Denotation;
use crate::rule::{ROOT, Rule};

/// Index of a node within its [`Derivation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One node of a derivation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationNode {
    pub cat: String,
    pub formula: Formula,
    pub children: Vec<NodeId>,
    /// The rule that built this node; `None` for nodes the parser creates
    /// directly from the utterance.
    pub rule: Option<Rule>,
}

/// A complete parse: a tree of categorized formulas plus its model score
/// and the denotation of the root formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    nodes: Vec<DerivationNode>,
    root: NodeId,
    pub score: f64,
    pub value: Option<Denotation>,
    /// Agreement between `value` and the example's target, once evaluated.
    pub compatibility: Option<f64>,
}

impl Derivation {
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node.
    ///
    /// Panics if `id` was not produced by the builder of this derivation.
    pub fn node(&self, id: NodeId) -> &DerivationNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DerivationNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Category of the root node.
    pub fn cat(&self) -> &str {
        &self.node(self.root).cat
    }

    /// Formula of the root node.
    pub fn formula(&self) -> &Formula {
        &self.node(self.root).formula
    }

    /// Returns `true` if the root node is a complete `$ROOT` parse.
    pub fn is_root_cat(&self) -> bool {
        self.cat() == ROOT
    }

    /// Rules used anywhere in the tree, in pre-order.
    pub fn rules(&self) -> Vec<&Rule> {
        let mut rules = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            rules.extend(node.rule.as_ref());
            stack.extend(node.children.iter().rev().copied());
        }
        rules
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_value(mut self, value: Denotation) -> Self {
        self.value = Some(value);
        self
    }
}

/// Builds a [`Derivation`] bottom-up.
#[derive(Debug, Default)]
pub struct DerivationBuilder {
    nodes: Vec<DerivationNode>,
}

impl DerivationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node without children.
    pub fn leaf(&mut self, cat: impl Into<String>, formula: Formula) -> NodeId {
        self.push(DerivationNode {
            cat: cat.into(),
            formula,
            children: vec![],
            rule: None,
        })
    }

    /// Add a node over previously added children.
    pub fn node(
        &mut self,
        cat: impl Into<String>,
        formula: Formula,
        children: Vec<NodeId>,
        rule: Option<Rule>,
    ) -> NodeId {
        self.push(DerivationNode {
            cat: cat.into(),
            formula,
            children,
            rule,
        })
    }

    fn push(&mut self, node: DerivationNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Finish the tree rooted at `root`.
    pub fn finish(self, root: NodeId) -> Derivation {
        Derivation {
            nodes: self.nodes,
            root,
            score: 0.0,
            value: None,
            compatibility: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_and_navigate() {
        let mut builder = DerivationBuilder::new();
        let binary = builder.leaf("$Binary", Formula::name("fb:row.row.state"));
        let entity = builder.leaf("$Entity", Formula::name("fb:cell.texas"));
        let set = builder.node(
            "$Set",
            Formula::parse("(fb:row.row.state fb:cell.texas)").unwrap(),
            vec![binary, entity],
            None,
        );
        let root_rule = Rule::parse("(rule $ROOT ($Set) (IdentityFn))").unwrap();
        let root = builder.node(
            ROOT,
            Formula::parse("(fb:row.row.state fb:cell.texas)").unwrap(),
            vec![set],
            Some(root_rule.clone()),
        );
        let derivation = builder.finish(root).with_score(-3.0);

        assert!(derivation.is_root_cat());
        assert_eq!(derivation.len(), 4);
        assert_eq!(derivation.node(set).children, vec![binary, entity]);
        assert_eq!(derivation.formula().to_string(), "(fb:row.row.state fb:cell.texas)");
        assert_eq!(derivation.rules(), vec![&root_rule]);
        assert_eq!(derivation.score, -3.0);
        assert_eq!(derivation.compatibility, None);
    }
}
