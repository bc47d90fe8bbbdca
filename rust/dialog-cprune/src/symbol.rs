//! Symbols and the per-node scratch table.
//!
//! A [`Symbol`] is one moving part of a derivation: the formula of a node
//! whose category is a base category (an entity, a relation, ...). The
//! [`Scratch`] table records, for every node of one derivation, the symbols
//! of its subtree and the bookkeeping of rule synthesis.

use dialog_grammar::{
    Derivation, Formula, LEMMA_PHRASE, LEMMA_TOKEN, NodeId, PHRASE, TOKEN,
};
use indexmap::IndexMap;

/// Categories whose formulas are abstracted away as symbols.
pub const BASE_CATEGORIES: [&str; 8] = [
    TOKEN,
    PHRASE,
    LEMMA_TOKEN,
    LEMMA_PHRASE,
    "$Unary",
    "$Binary",
    "$Entity",
    "$Property",
];

/// Lexical categories whose pattern is the category itself.
pub const PRIMITIVE_CATEGORIES: [&str; 4] = [TOKEN, PHRASE, LEMMA_TOKEN, LEMMA_PHRASE];

pub fn is_base_category(category: &str) -> bool {
    BASE_CATEGORIES.contains(&category)
}

pub fn is_primitive_category(category: &str) -> bool {
    PRIMITIVE_CATEGORIES.contains(&category)
}

/// A sub-formula standing for one category.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub category: String,
    pub formula: Formula,
    /// Occurrences within the subtree the symbol was aggregated over.
    pub frequency: usize,
}

impl Symbol {
    pub fn new(category: impl Into<String>, formula: Formula, frequency: usize) -> Self {
        Self {
            category: category.into(),
            formula,
            frequency,
        }
    }

    /// First-occurrence position of this symbol within `enclosing`, in
    /// textual order. `None` if it does not occur.
    pub fn index_in(&self, enclosing: &Formula) -> Option<usize> {
        enclosing.position_of(&self.formula)
    }
}

/// Symbols keyed by the printed form of their formula, in discovery order.
pub type SymbolMap = IndexMap<String, Symbol>;

/// `symbols` ordered by first occurrence within `enclosing`.
///
/// Symbols that do not occur come first, in their original order.
pub fn by_first_occurrence<'a>(
    symbols: impl IntoIterator<Item = &'a Symbol>,
    enclosing: &Formula,
) -> Vec<&'a Symbol> {
    let mut keyed: Vec<(Option<usize>, &Symbol)> = symbols
        .into_iter()
        .map(|symbol| (symbol.index_in(enclosing), symbol))
        .collect();
    keyed.sort_by_key(|(index, _)| *index);
    keyed.into_iter().map(|(_, symbol)| symbol).collect()
}

/// Replace every symbol in `formula` with an indexed placeholder
/// `Category#i`, numbering by first occurrence.
///
/// Each symbol consumes an index even if an earlier replacement already
/// removed it from the formula.
pub fn index_symbols(formula: &Formula, symbols: &SymbolMap) -> Formula {
    by_first_occurrence(symbols.values(), formula)
        .into_iter()
        .enumerate()
        .fold(formula.clone(), |indexed, (position, symbol)| {
            let placeholder = Formula::name(format!("{}#{}", symbol.category, position + 1));
            indexed.replace(&symbol.formula, &placeholder)
        })
}

/// Replace every symbol in `formula` with its bare category name.
pub fn symbolic_formula(formula: &Formula, symbols: &SymbolMap) -> Formula {
    formula.transform(&mut |node| {
        symbols
            .get(&node.to_string())
            .map(|symbol| Formula::name(symbol.category.as_str()))
    })
}

/// Bookkeeping for one derivation node.
#[derive(Clone, Debug, Default)]
pub struct DerivationInfo {
    /// Symbols of the whole subtree, with summed frequencies.
    pub tree_symbols: SymbolMap,
    /// Symbols still to be surfaced as parameters by the rule covering this
    /// node.
    pub rule_symbols: SymbolMap,
    /// Rules emitted within this subtree.
    pub custom_rule_strings: Vec<String>,
    pub contains_cross_reference: bool,
}

/// Side table of [`DerivationInfo`] for the nodes of one derivation,
/// indexed by [`NodeId`].
#[derive(Clone, Debug)]
pub struct Scratch {
    infos: Vec<Option<DerivationInfo>>,
}

impl Scratch {
    /// An empty table sized for `derivation`.
    pub fn new(derivation: &Derivation) -> Self {
        Self {
            infos: vec![None; derivation.len()],
        }
    }

    pub fn info(&self, id: NodeId) -> Option<&DerivationInfo> {
        self.infos.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn info_mut(&mut self, id: NodeId) -> &mut DerivationInfo {
        if id.index() >= self.infos.len() {
            self.infos.resize(id.index() + 1, None);
        }
        self.infos[id.index()].get_or_insert_with(DerivationInfo::default)
    }

    /// Aggregate the symbols of the subtree at `id`, memoized per node.
    ///
    /// A base-category node is a single symbol; any other node unions the
    /// symbols of its children, summing the frequencies of equal formulas.
    pub fn tree_symbols(&mut self, derivation: &Derivation, id: NodeId) -> &SymbolMap {
        if self.info(id).is_none() {
            let node = derivation.node(id);
            let mut tree_symbols = SymbolMap::new();
            if is_base_category(&node.cat) {
                tree_symbols.insert(
                    node.formula.to_string(),
                    Symbol::new(node.cat.as_str(), node.formula.clone(), 1),
                );
            } else {
                for child in &node.children {
                    for (key, symbol) in self.tree_symbols(derivation, *child) {
                        tree_symbols
                            .entry(key.clone())
                            .and_modify(|existing| existing.frequency += symbol.frequency)
                            .or_insert_with(|| symbol.clone());
                    }
                }
            }
            self.info_mut(id).tree_symbols = tree_symbols;
        }
        &self.info_mut(id).tree_symbols
    }
}
