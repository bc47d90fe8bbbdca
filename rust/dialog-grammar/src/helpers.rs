//! Reference collaborators for exercising search-control layers in tests:
//! a phrase [`Lexicon`], a [`TableExecutor`] over a handful of rows and a
//! size-bounded [`FloatingParser`].

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::derivation::{DerivationBuilder, NodeId};
use crate::formula::{Formula, SuperlativeKind, Value};
use crate::grammar::Grammar;
use crate::parser::{Denotation, Example, ParseOutcome, Parser, SearchRequest};
use crate::rule::{PHRASE, ROOT, Rule, Semantics};

/// Maps phrases to formulas of a given kind (`entity`, `binary`, ...),
/// consulted by `(LexiconFn kind)` rules.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: IndexMap<String, Vec<(String, Formula)>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, phrase: &str, kind: &str, formula: Formula) -> Self {
        self.entries
            .entry(phrase.to_lowercase())
            .or_default()
            .push((kind.to_string(), formula));
        self
    }

    pub fn lookup<'a>(&'a self, phrase: &str, kind: &'a str) -> impl Iterator<Item = &'a Formula> {
        self.entries
            .get(phrase)
            .into_iter()
            .flatten()
            .filter(move |(entry_kind, _)| entry_kind == kind)
            .map(|(_, formula)| formula)
    }
}

/// A table row: a name and its cells keyed by relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: String,
    cells: IndexMap<String, Value>,
}

impl Row {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: IndexMap::new(),
        }
    }

    pub fn with_cell(mut self, relation: impl Into<String>, value: Value) -> Self {
        self.cells.insert(relation.into(), value);
        self
    }

    pub fn cell(&self, relation: &str) -> Option<&Value> {
        self.cells.get(relation)
    }
}

/// Executes set-valued formulas over a list of rows.
///
/// Supported forms are joins `(relation value)`, intersections
/// `(and a b ...)` and superlatives with boilerplate rank and count over a
/// reversed numeric relation. A set denotes the names of its rows, in table
/// order.
#[derive(Debug, Clone, Default)]
pub struct TableExecutor {
    rows: Vec<Row>,
}

impl TableExecutor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn execute(&self, formula: &Formula) -> Denotation {
        match self.rows_of(formula) {
            Ok(rows) => Denotation::List(
                rows.into_iter()
                    .map(|index| Value::Name(self.rows[index].name.clone()))
                    .collect(),
            ),
            Err(reason) => Denotation::Error(reason),
        }
    }

    fn rows_of(&self, formula: &Formula) -> Result<Vec<usize>, String> {
        match formula {
            Formula::Apply(items) => match items.as_slice() {
                [Formula::Value(Value::Name(and)), operands @ ..]
                    if and == "and" && operands.len() >= 2 =>
                {
                    let mut rows = self.rows_of(&operands[0])?;
                    for operand in &operands[1..] {
                        let other = self.rows_of(operand)?;
                        rows.retain(|row| other.contains(row));
                    }
                    Ok(rows)
                }
                [Formula::Value(Value::Name(relation)), Formula::Value(value)] => Ok(self
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| row.cell(relation) == Some(value))
                    .map(|(index, _)| index)
                    .collect()),
                _ => Err(format!("cannot execute {formula}")),
            },
            Formula::Superlative {
                kind,
                head,
                relation,
                ..
            } if formula.has_boilerplate() => {
                let Formula::Reverse(relation) = relation.as_ref() else {
                    return Err(format!("superlative needs a reversed relation: {formula}"));
                };
                let relation = relation
                    .as_name()
                    .ok_or_else(|| format!("cannot execute {formula}"))?;

                let mut keyed = Vec::new();
                for index in self.rows_of(head)? {
                    match self.rows[index].cell(relation) {
                        Some(Value::Number(key)) => keyed.push((index, *key)),
                        _ => return Err(format!("{relation} is not numeric")),
                    }
                }
                let best = keyed.iter().map(|(_, key)| *key).reduce(|best, key| match kind {
                    SuperlativeKind::Argmax => best.max(key),
                    SuperlativeKind::Argmin => best.min(key),
                });
                Ok(keyed
                    .into_iter()
                    .filter(|(_, key)| Some(*key) == best)
                    .map(|(index, _)| index)
                    .collect())
            }
            _ => Err(format!("cannot execute {formula}")),
        }
    }
}

/// A partial derivation in the chart.
#[derive(Debug, Clone)]
struct Item {
    cat: String,
    formula: Formula,
    size: usize,
    /// Bit set of the utterance tokens this item covers.
    anchors: u64,
    children: Vec<usize>,
    rule: Option<Rule>,
}

#[derive(Debug)]
struct Chart {
    items: Vec<Item>,
    cells: HashMap<(String, usize), Vec<usize>>,
    seen: HashSet<(String, String, u64)>,
    beam_size: usize,
    limit: Option<usize>,
}

impl Chart {
    fn new(beam_size: usize, limit: Option<usize>) -> Self {
        Self {
            items: Vec::new(),
            cells: HashMap::new(),
            seen: HashSet::new(),
            beam_size,
            limit,
        }
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.items.len() >= limit)
    }

    fn add(&mut self, item: Item) {
        if self.is_full() {
            return;
        }
        let key = (item.cat.clone(), item.formula.to_string(), item.anchors);
        if self.seen.contains(&key) {
            return;
        }
        let cell = self.cells.entry((item.cat.clone(), item.size)).or_default();
        if cell.len() >= self.beam_size {
            return;
        }
        cell.push(self.items.len());
        self.seen.insert(key);
        self.items.push(item);
    }

    fn cell(&self, cat: &str, size: usize) -> &[usize] {
        self.cells
            .get(&(cat.to_string(), size))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A floating parser: derivations are built bottom-up by size without
/// regard to word order, each lexical anchor used at most once.
///
/// Phrases of the utterance are `$PHRASE` items of size 0; every rule
/// application adds one to the summed size of its children. Rules with
/// tokens on their right-hand side are ignored. Derivations are scored by
/// negated size.
#[derive(Debug, Clone)]
pub struct FloatingParser {
    lexicon: Lexicon,
    executor: TableExecutor,
    max_size: usize,
    max_phrase_length: usize,
    beam_size: usize,
}

impl FloatingParser {
    pub fn new(lexicon: Lexicon, executor: TableExecutor) -> Self {
        Self {
            lexicon,
            executor,
            max_size: 16,
            max_phrase_length: 3,
            beam_size: 1000,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_beam_size(mut self, beam_size: usize) -> Self {
        self.beam_size = beam_size;
        self
    }

    fn apply(&self, rule: &Rule, children: &[&Item]) -> Vec<Formula> {
        match (&rule.sem, children) {
            (Semantics::External(tree), [phrase]) if tree.head() == Some("LexiconFn") => {
                let kind = tree
                    .as_list()
                    .and_then(|items| items.get(1))
                    .and_then(|kind| kind.as_leaf());
                match (kind, &phrase.formula) {
                    (Some(kind), Formula::Value(Value::Text(text))) => {
                        self.lexicon.lookup(text, kind).cloned().collect()
                    }
                    _ => vec![],
                }
            }
            (sem, children) => {
                let formulas: Vec<&Formula> = children.iter().map(|item| &item.formula).collect();
                sem.apply(&formulas).into_iter().collect()
            }
        }
    }

    fn combine(&self, chart: &Chart, rule: &Rule, size: usize) -> Vec<Item> {
        let mut items = Vec::new();
        let mut emit = |children: Vec<usize>| {
            let child_items: Vec<&Item> = children.iter().map(|id| &chart.items[*id]).collect();
            let anchors = child_items.iter().fold(0, |mask, item| mask | item.anchors);
            for formula in self.apply(rule, &child_items) {
                items.push(Item {
                    cat: rule.lhs.clone(),
                    formula,
                    size,
                    anchors,
                    children: children.clone(),
                    rule: Some(rule.clone()),
                });
            }
        };

        match rule.rhs.as_slice() {
            [] if size == 1 => emit(vec![]),
            [child] => {
                for id in chart.cell(child, size - 1) {
                    emit(vec![*id]);
                }
            }
            [left, right] => {
                for left_size in 0..size {
                    let right_size = size - 1 - left_size;
                    for l in chart.cell(left, left_size) {
                        for r in chart.cell(right, right_size) {
                            if chart.items[*l].anchors & chart.items[*r].anchors == 0 {
                                emit(vec![*l, *r]);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        items
    }

    fn build(items: &[Item], id: usize, builder: &mut DerivationBuilder) -> NodeId {
        let item = &items[id];
        let children = item
            .children
            .iter()
            .map(|child| Self::build(items, *child, builder))
            .collect();
        builder.node(
            item.cat.as_str(),
            item.formula.clone(),
            children,
            item.rule.clone(),
        )
    }
}

impl Parser for FloatingParser {
    fn parse(
        &self,
        grammar: &Grammar,
        example: &Example,
        request: &SearchRequest,
    ) -> ParseOutcome {
        let mut chart = Chart::new(self.beam_size, request.early_stopping);

        let tokens = example.tokens();
        let length = tokens.len().min(u64::BITS as usize);
        for start in 0..length {
            for end in start + 1..=(start + self.max_phrase_length).min(length) {
                chart.add(Item {
                    cat: PHRASE.to_string(),
                    formula: Formula::Value(Value::Text(tokens[start..end].join(" "))),
                    size: 0,
                    anchors: ((1u64 << (end - start)) - 1) << start,
                    children: vec![],
                    rule: None,
                });
            }
        }

        let rules: Vec<&Rule> = grammar.rules().iter().filter(|rule| rule.is_floating()).collect();
        for size in 1..=self.max_size {
            for rule in &rules {
                for item in self.combine(&chart, rule, size) {
                    chart.add(item);
                }
            }
        }

        let mut derivations = Vec::new();
        for size in 1..=self.max_size {
            for id in chart.cell(ROOT, size) {
                if derivations.len() >= request.max_derivations {
                    break;
                }
                let mut builder = DerivationBuilder::new();
                let root = Self::build(&chart.items, *id, &mut builder);
                let formula = chart.items[*id].formula.clone();
                derivations.push(
                    builder
                        .finish(root)
                        .with_score(-(size as f64))
                        .with_value(self.executor.execute(&formula)),
                );
            }
        }
        debug!(
            example = %example.id,
            items = chart.items.len(),
            derivations = derivations.len(),
            "floating parse finished"
        );

        let expected_counts = request.compute_expected_counts.then(|| {
            let mut counts = BTreeMap::new();
            let weight = 1.0 / derivations.len().max(1) as f64;
            for derivation in &derivations {
                for rule in derivation.rules() {
                    *counts.entry(rule.to_string()).or_insert(0.0) += weight;
                }
            }
            counts
        });

        ParseOutcome {
            derivations,
            expected_counts,
        }
    }
}
