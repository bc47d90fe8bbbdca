//! Pattern and rule registry.

use std::collections::HashMap;

use dialog_grammar::{Derivation, Rule};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info_span};

use crate::error::{PruningError, PruningResult};
use crate::pattern::Pattern;
use crate::symbol::Scratch;
use crate::synthesizer::RuleSynthesizer;

/// Everything learned from consistent derivations so far.
#[derive(Clone, Debug)]
pub struct Registry {
    synthesizer: RuleSynthesizer,
    /// Example id to the pattern of its best consistent derivation.
    consistent_patterns: HashMap<String, Pattern>,
    /// Pattern to the union of the rule strings synthesized for it.
    pattern_rules: IndexMap<String, IndexSet<String>>,
    /// Every pattern ever recorded, in first-seen order.
    all_patterns: IndexSet<String>,
}

impl Registry {
    pub fn new(synthesizer: RuleSynthesizer) -> Self {
        Self {
            synthesizer,
            consistent_patterns: HashMap::new(),
            pattern_rules: IndexMap::new(),
            all_patterns: IndexSet::new(),
        }
    }

    pub fn synthesizer(&self) -> &RuleSynthesizer {
        &self.synthesizer
    }

    /// The best pattern recorded for an example.
    pub fn consistent_pattern(&self, example_id: &str) -> Option<&Pattern> {
        self.consistent_patterns.get(example_id)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.all_patterns.iter().map(String::as_str)
    }

    pub fn rule_strings(&self, pattern: &str) -> Option<&IndexSet<String>> {
        self.pattern_rules.get(pattern)
    }

    /// Record `pattern` as the best for `example_id` unless a pattern with an
    /// equal or higher score is already stored. Returns `true` if recorded.
    pub fn register(
        &mut self,
        example_id: &str,
        pattern: Pattern,
        derivation: &Derivation,
        scratch: &mut Scratch,
    ) -> PruningResult<bool> {
        if self
            .consistent_patterns
            .get(example_id)
            .is_some_and(|stored| pattern.score <= stored.score)
        {
            return Ok(false);
        }

        let _span = info_span!("register", example = example_id, pattern = %pattern.pattern)
            .entered();
        let rule_strings = self.synthesizer.synthesize(derivation, scratch)?;
        debug!(rules = rule_strings.len(), "registered rules");

        self.pattern_rules
            .entry(pattern.pattern.clone())
            .or_default()
            .extend(rule_strings);
        self.all_patterns.insert(pattern.pattern.clone());
        self.consistent_patterns.insert(example_id.to_string(), pattern);
        Ok(true)
    }

    /// Rank candidate patterns and resolve them to a mini-grammar.
    ///
    /// With `neighbors`, each neighbor's recorded pattern counts once toward
    /// its frequency; neighbors without a pattern are skipped. Without, every
    /// recorded pattern has frequency one. Patterns are ranked by
    /// [`Pattern::rank_cmp`] and the top `max_patterns` kept. The rules are
    /// the base rules followed by the rules of the kept patterns.
    pub fn predict(
        &self,
        neighbors: Option<&[String]>,
        max_patterns: Option<usize>,
    ) -> PruningResult<(IndexMap<String, Pattern>, Vec<Rule>)> {
        let mut frequencies: IndexMap<&str, usize> = IndexMap::new();
        match neighbors {
            Some(neighbors) => {
                for neighbor in neighbors {
                    if let Some(pattern) = self.consistent_patterns.get(neighbor) {
                        *frequencies.entry(pattern.pattern.as_str()).or_default() += 1;
                    }
                }
            }
            None => {
                for pattern in &self.all_patterns {
                    frequencies.insert(pattern.as_str(), 1);
                }
            }
        }

        let mut ranked: Vec<Pattern> = frequencies
            .into_iter()
            .map(|(pattern, frequency)| Pattern::new(pattern, frequency))
            .collect();
        ranked.sort_by(Pattern::rank_cmp);
        ranked.truncate(max_patterns.unwrap_or(usize::MAX));

        let mut rule_strings = IndexSet::new();
        for pattern in &ranked {
            let rules = self
                .pattern_rules
                .get(&pattern.pattern)
                .ok_or_else(|| PruningError::UnregisteredPattern(pattern.pattern.clone()))?;
            rule_strings.extend(rules.iter());
        }
        let rules = self.synthesizer.rules_for(rule_strings)?;

        let predicted = ranked
            .into_iter()
            .map(|pattern| (pattern.pattern.clone(), pattern))
            .collect();
        Ok((predicted, rules))
    }
}
