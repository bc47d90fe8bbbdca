//! Rule synthesis.
//!
//! A successful derivation is turned into a small set of grammar rules that
//! rebuild derivations of the same shape from fresh entities and relations.
//! With template decomposition every non-intermediate subtree becomes its own
//! rule whose left-hand side names the subtree's symbolic formula
//! (`$Formula<N>`), so subtrees of equal shape share rules across examples.
//! A subtree that mentions a symbol more than once (a cross reference) is
//! kept whole, so the repeated symbol stays a single parameter of the rule at
//! the root.

use std::collections::{HashSet, VecDeque};

use dialog_grammar::{
    Derivation, Formula, Grammar, NodeId, ROOT, Rule, Semantics, is_intermediate,
};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::error::{PruningError, PruningResult};
use crate::symbol::{
    Scratch, Symbol, SymbolMap, by_first_occurrence, index_symbols, is_base_category,
    symbolic_formula,
};

/// Synthesizes, binarizes and caches rules for successful derivations.
#[derive(Clone, Debug)]
pub struct RuleSynthesizer {
    /// Host rules producing base categories, always part of a mini-grammar.
    base_rules: Vec<Rule>,
    /// Reads synthesized rule strings; its intermediate category counter
    /// continues the host grammar's.
    interpreter: Grammar,
    enable_decomposition: bool,
    /// Symbolic formula to its `$Formula<N>` index.
    symbolic_formulas: IndexMap<String, usize>,
    /// Indexed symbolic formula of a derivation to its rule strings.
    rule_sets: IndexMap<String, IndexSet<String>>,
    /// Rule string to its binarized rules.
    binarized_rules: IndexMap<String, Vec<Rule>>,
}

impl RuleSynthesizer {
    pub fn new(host: &Grammar, enable_decomposition: bool) -> Self {
        let base_rules = host
            .rules()
            .iter()
            .filter(|rule| is_base_category(&rule.lhs))
            .cloned()
            .collect();

        Self {
            base_rules,
            interpreter: Grammar::new().with_fresh_cat_index(host.fresh_cat_index()),
            enable_decomposition,
            symbolic_formulas: IndexMap::new(),
            rule_sets: IndexMap::new(),
            binarized_rules: IndexMap::new(),
        }
    }

    pub fn base_rules(&self) -> &[Rule] {
        &self.base_rules
    }

    /// The binarized rules of a synthesized rule string.
    pub fn binarized(&self, rule_string: &str) -> Option<&[Rule]> {
        self.binarized_rules.get(rule_string).map(Vec::as_slice)
    }

    /// Number of intermediate categories generated so far, host included.
    pub fn fresh_cat_index(&self) -> usize {
        self.interpreter.fresh_cat_index()
    }

    /// Synthesize the rule strings that rebuild `derivation`.
    ///
    /// Results are cached by the derivation's indexed symbolic formula, so
    /// derivations that differ only in their symbols get the same rule set
    /// back without resynthesis.
    pub fn synthesize(
        &mut self,
        derivation: &Derivation,
        scratch: &mut Scratch,
    ) -> PruningResult<IndexSet<String>> {
        let root = derivation.root();
        let tree_symbols = scratch.tree_symbols(derivation, root);
        let key = index_symbols(derivation.formula(), tree_symbols).to_string();
        if let Some(rule_strings) = self.rule_sets.get(&key) {
            trace!(formula = %key, "reusing synthesized rules");
            return Ok(rule_strings.clone());
        }

        let cross_references: HashSet<String> = tree_symbols
            .iter()
            .filter(|(_, symbol)| symbol.frequency > 1)
            .map(|(formula, _)| formula.clone())
            .collect();

        self.collect_rules(derivation, root, scratch, &cross_references);
        let rule_strings: IndexSet<String> = scratch
            .info(root)
            .map(|info| info.custom_rule_strings.iter().cloned().collect())
            .unwrap_or_default();

        debug!(formula = %key, rules = rule_strings.len(), "synthesized rules");
        for rule_string in &rule_strings {
            if self.binarized_rules.contains_key(rule_string) {
                trace!(rule = %rule_string, "rule exists");
                continue;
            }
            let rules = self.interpreter.read_rules(rule_string).map_err(|source| {
                PruningError::InvalidRuleString {
                    rule: rule_string.clone(),
                    source,
                }
            })?;
            for rule in &rules {
                trace!(rule = %rule_string, binarized = %rule, "binarized rule");
            }
            self.binarized_rules.insert(rule_string.clone(), rules);
        }

        self.rule_sets.insert(key, rule_strings.clone());
        Ok(rule_strings)
    }

    /// The base rules followed by the binarized rules of `rule_strings`,
    /// without duplicates.
    pub fn rules_for<'a>(
        &self,
        rule_strings: impl IntoIterator<Item = &'a String>,
    ) -> PruningResult<Vec<Rule>> {
        let mut seen = IndexSet::new();
        let mut rules = Vec::new();
        let mut keep = |rule: &Rule| {
            if seen.insert(rule.to_string()) {
                rules.push(rule.clone());
            }
        };

        self.base_rules.iter().for_each(&mut keep);
        for rule_string in rule_strings {
            let binarized = self
                .binarized(rule_string)
                .ok_or_else(|| PruningError::UnregisteredRule(rule_string.clone()))?;
            binarized.iter().for_each(&mut keep);
        }
        Ok(rules)
    }

    /// Post-order pass recording, per node, the symbols still to be
    /// surfaced and the rule strings emitted within the subtree.
    fn collect_rules(
        &mut self,
        derivation: &Derivation,
        id: NodeId,
        scratch: &mut Scratch,
        cross_references: &HashSet<String>,
    ) {
        let node = derivation.node(id);
        let key = node.formula.to_string();

        if is_base_category(&node.cat) {
            let tree_symbols = scratch.tree_symbols(derivation, id).clone();
            let info = scratch.info_mut(id);
            info.contains_cross_reference = cross_references.contains(&key);
            info.rule_symbols = tree_symbols;
            info.custom_rule_strings.clear();
            return;
        }

        for child in &node.children {
            self.collect_rules(derivation, *child, scratch, cross_references);
        }

        let mut contains_cross_reference = false;
        let mut rule_symbols = SymbolMap::new();
        let mut custom_rule_strings = Vec::new();
        for child in &node.children {
            if let Some(info) = scratch.info(*child) {
                contains_cross_reference |= info.contains_cross_reference;
                for (formula, symbol) in &info.rule_symbols {
                    rule_symbols.insert(formula.clone(), symbol.clone());
                }
                custom_rule_strings.extend(info.custom_rule_strings.iter().cloned());
            }
        }

        if !self.enable_decomposition || contains_cross_reference {
            if node.cat == ROOT {
                custom_rule_strings.push(self.rule_string(
                    derivation,
                    id,
                    scratch,
                    &rule_symbols,
                    contains_cross_reference,
                ));
            }
        } else if !is_intermediate(&node.cat) {
            custom_rule_strings.push(self.rule_string(derivation, id, scratch, &rule_symbols, false));
            let category = self.category_of(derivation, id, scratch);
            rule_symbols = SymbolMap::from([(key, Symbol::new(category, node.formula.clone(), 1))]);
        }

        let info = scratch.info_mut(id);
        info.contains_cross_reference = contains_cross_reference;
        info.rule_symbols = rule_symbols;
        info.custom_rule_strings = custom_rule_strings;
    }

    /// The rule building the node at `id` from `rule_symbols`.
    ///
    /// Each symbol becomes a lambda parameter `s<i>`, numbered by first
    /// occurrence in the node's formula, with the innermost lambda taking
    /// the first symbol. A single symbol spanning the whole formula gives an
    /// identity rule and no symbols give a constant rule.
    fn rule_string(
        &mut self,
        derivation: &Derivation,
        id: NodeId,
        scratch: &mut Scratch,
        rule_symbols: &SymbolMap,
        contains_cross_reference: bool,
    ) -> String {
        let node = derivation.node(id);
        let lhs = if contains_cross_reference {
            node.cat.clone()
        } else if node.cat == ROOT {
            ROOT.to_string()
        } else {
            self.category_of(derivation, id, scratch)
        };

        let ordered = by_first_occurrence(rule_symbols.values(), &node.formula);
        let (rhs, sem) = match ordered.as_slice() {
            [] => (vec![], Semantics::Constant(node.formula.clone())),
            [only] if only.formula == node.formula => {
                (vec![only.category.clone()], Semantics::Identity)
            }
            symbols => {
                let mut body = node.formula.clone();
                let mut rhs = VecDeque::new();
                for (index, symbol) in symbols.iter().enumerate() {
                    let parameter = format!("s{}", index + 1);
                    let replaced = body.replace(&symbol.formula, &Formula::var(parameter.as_str()));
                    body = Formula::lambda(parameter, replaced);
                    rhs.push_front(symbol.category.clone());
                }
                (Vec::from(rhs), Semantics::Apply(body))
            }
        };

        Rule::new(lhs, rhs, sem).to_string()
    }

    /// The category standing for the subtree at `id`: its own category if
    /// that is a base category, otherwise `$Formula<N>` for its symbolic
    /// formula.
    fn category_of(&mut self, derivation: &Derivation, id: NodeId, scratch: &mut Scratch) -> String {
        let node = derivation.node(id);
        if is_base_category(&node.cat) {
            return node.cat.clone();
        }

        let symbolic = symbolic_formula(&node.formula, scratch.tree_symbols(derivation, id));
        let next = self.symbolic_formulas.len() + 1;
        let index = *self
            .symbolic_formulas
            .entry(symbolic.to_string())
            .or_insert_with(|| {
                debug!(category = %node.cat, formula = %symbolic, index = next, "new symbolic formula");
                next
            });
        format!("$Formula{index}")
    }
}
