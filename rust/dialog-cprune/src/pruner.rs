//! The shared pruning engine.

use dialog_grammar::{Derivation, Example, Grammar, ValueEvaluator};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::config::PruningConfig;
use crate::error::{PruningError, PruningResult};
use crate::mode::{Mode, PhaseState};
use crate::neighbors::Neighbors;
use crate::pattern::{Pattern, PatternAbstractor};
use crate::registry::Registry;
use crate::stats::Stats;
use crate::symbol::Scratch;
use crate::synthesizer::RuleSynthesizer;

/// Learns patterns and rules from consistent derivations and predicts
/// mini-grammars for new examples.
///
/// A `Pruner` lives for a whole training run and is shared by reference;
/// every mutation goes through its internal locks.
#[derive(Debug)]
pub struct Pruner {
    config: PruningConfig,
    abstractor: PatternAbstractor,
    registry: Mutex<Registry>,
    neighbors: Mutex<Option<Neighbors>>,
    stats: Mutex<Stats>,
}

impl Pruner {
    /// A pruner for parsers running `host`. Only the rules of `host` that
    /// produce base categories are ever part of a predicted mini-grammar.
    pub fn new(config: PruningConfig, host: &Grammar) -> PruningResult<Self> {
        let abstractor = PatternAbstractor::new(&config.pattern)?;
        let synthesizer = RuleSynthesizer::new(host, config.enable_template_decomposition);

        Ok(Self {
            config,
            abstractor,
            registry: Mutex::new(Registry::new(synthesizer)),
            neighbors: Mutex::new(None),
            stats: Mutex::new(Stats::default()),
        })
    }

    pub fn config(&self) -> &PruningConfig {
        &self.config
    }

    /// Start a pass over a data group: load neighbors on first use and reset
    /// the statistics under the label `<iter>.<group>`.
    pub fn begin_data_group(&self, iter: usize, group: &str) -> PruningResult<()> {
        self.ensure_neighbors()?;
        let label = format!("{iter}.{group}");
        info!(group = %label, "starting data group");
        self.stats.lock().reset(label);
        Ok(())
    }

    fn ensure_neighbors(&self) -> PruningResult<()> {
        let Some(path) = &self.config.neighbor_file_path else {
            return Ok(());
        };
        let mut neighbors = self.neighbors.lock();
        if neighbors.is_none() {
            *neighbors = Some(Neighbors::load(path)?);
        }
        Ok(())
    }

    /// Fresh scratch state for one phase. An exploit phase comes with its
    /// predicted patterns and mini-grammar rules.
    pub fn begin_phase(&self, example: &Example, mode: Mode) -> PruningResult<PhaseState> {
        let mut state = PhaseState::new(mode);
        if mode == Mode::Exploit {
            self.preprocess(example, &mut state)?;
        }
        Ok(state)
    }

    /// Predict patterns for `example` from its neighbors and resolve them to
    /// rules.
    pub fn preprocess(&self, example: &Example, state: &mut PhaseState) -> PruningResult<()> {
        let neighbors = match self.config.max_num_neighbors.filter(|count| *count > 0) {
            Some(count) => {
                self.ensure_neighbors()?;
                let neighbors = self.neighbors.lock();
                let list = neighbors
                    .as_ref()
                    .ok_or(PruningError::NeighborsUnavailable)?
                    .get(&example.id);
                Some(list[..count.min(list.len())].to_vec())
            }
            None => None,
        };

        let (patterns, rules) = self
            .registry
            .lock()
            .predict(neighbors.as_deref(), self.config.max_predicted_patterns)?;

        for (rank, pattern) in patterns.values().enumerate() {
            info!(
                example = %example.id,
                rank = rank + 1,
                frequency = pattern.frequency,
                pattern = %pattern.pattern,
                "predicted pattern"
            );
        }
        for rule in &rules {
            trace!(%rule, "mini-grammar rule");
        }

        state.predicted_patterns = patterns;
        state.predicted_rules = rules;
        Ok(())
    }

    /// Score `derivation` against the example's target and learn from it if
    /// it is a correct root derivation.
    ///
    /// Called once for every derivation either search produces.
    pub fn update_consistent_pattern<E>(
        &self,
        state: &mut PhaseState,
        evaluator: &E,
        example: &Example,
        derivation: &mut Derivation,
    ) -> PruningResult<()>
    where
        E: ValueEvaluator + ?Sized,
    {
        if let Some(target) = &example.target_value {
            derivation.compatibility =
                Some(evaluator.compatibility(target, derivation.value.as_ref()));
        }
        if !derivation.is_root_cat() || derivation.compatibility != Some(1.0) {
            return Ok(());
        }

        state.found_consistent_derivation = true;
        info!(example = %example.id, formula = %derivation.formula(), "found consistent derivation");

        let mut scratch = Scratch::new(derivation);
        let pattern = Pattern::new(self.abstractor.pattern_of(derivation, &mut scratch), 0)
            .with_score(derivation.score);

        let registered = self.registry.lock().register(
            &example.id,
            pattern.clone(),
            derivation,
            &mut scratch,
        )?;
        if registered {
            info!(
                target: "consistent_lf",
                example = %example.id,
                formula = %derivation.formula(),
                pattern = %pattern.pattern
            );
        } else {
            debug!(example = %example.id, pattern = %pattern.pattern, "kept stored pattern");
        }
        Ok(())
    }

    /// The predicted pattern matching a root derivation, during exploit.
    pub fn predicted_pattern<'s>(
        &self,
        state: &'s PhaseState,
        derivation: &Derivation,
    ) -> Option<&'s Pattern> {
        if state.mode != Mode::Exploit || !derivation.is_root_cat() {
            return None;
        }
        let pattern = self
            .abstractor
            .pattern_of(derivation, &mut Scratch::new(derivation));
        state.predicted_patterns.get(&pattern)
    }

    /// The best pattern recorded for an example.
    pub fn consistent_pattern(&self, example_id: &str) -> Option<Pattern> {
        self.registry.lock().consistent_pattern(example_id).cloned()
    }

    pub fn stats(&self) -> Stats {
        self.stats.lock().clone()
    }

    /// Whether another explore search fits the per-group budget.
    ///
    /// A budget of `n` allows exactly `n` explore searches per data group,
    /// not `n + 1`.
    pub fn exploration_allowed(&self) -> bool {
        let explored = self.stats.lock().total_explore;
        self.config
            .max_exploration_iters
            .is_none_or(|budget| explored < budget)
    }

    pub fn record_exploit(&self, succeeded: bool) {
        self.stats.lock().record_exploit(succeeded);
    }

    pub fn record_explore(&self, succeeded: bool) {
        self.stats.lock().record_explore(succeeded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{host_grammar, largest_city, superlative};
    use dialog_grammar::{Denotation, ExactMatchEvaluator, Value};
    use pretty_assertions::assert_eq;

    fn answer() -> Denotation {
        Denotation::List(vec![Value::Name("fb:row.r0".into())])
    }

    fn example(id: &str) -> Example {
        Example::new(id, "largest city in california").with_target(answer())
    }

    fn pruner(config: PruningConfig) -> Pruner {
        Pruner::new(config, &host_grammar()).unwrap()
    }

    #[test]
    fn test_only_correct_root_derivations_are_learned() {
        let pruner = pruner(PruningConfig::default());
        let mut state = pruner.begin_phase(&example("nt-0"), Mode::Explore).unwrap();

        let mut wrong = largest_city().with_value(Denotation::List(vec![]));
        pruner
            .update_consistent_pattern(&mut state, &ExactMatchEvaluator, &example("nt-0"), &mut wrong)
            .unwrap();
        assert_eq!(wrong.compatibility, Some(0.0));
        assert!(!state.found_consistent_derivation);
        assert_eq!(pruner.consistent_pattern("nt-0"), None);

        let mut right = largest_city().with_score(-14.0).with_value(answer());
        pruner
            .update_consistent_pattern(&mut state, &ExactMatchEvaluator, &example("nt-0"), &mut right)
            .unwrap();
        assert!(state.found_consistent_derivation);
        assert_eq!(
            pruner.consistent_pattern("nt-0"),
            Some(
                Pattern::new(
                    "(argmax (and ($Binary#1 $Entity#2) ($Binary#3 $Entity#4)) (@R $Binary#5))",
                    0
                )
                .with_score(-14.0)
            )
        );
    }

    #[test]
    fn test_exploit_phase_predicts_and_matches() {
        let pruner = pruner(PruningConfig::default());
        let mut explore = pruner.begin_phase(&example("nt-0"), Mode::Explore).unwrap();
        let mut derivation = largest_city().with_value(answer());
        pruner
            .update_consistent_pattern(&mut explore, &ExactMatchEvaluator, &example("nt-0"), &mut derivation)
            .unwrap();

        let exploit = pruner.begin_phase(&example("nt-1"), Mode::Exploit).unwrap();
        assert!(!exploit.found_consistent_derivation);
        assert_eq!(exploit.predicted_patterns.len(), 1);
        assert_eq!(exploit.predicted_rules.len(), 4 + 7);

        let other = superlative(
            ("fb:row.row.type", "fb:cell.town"),
            ("fb:row.row.state", "fb:cell.texas"),
            "fb:row.row.population",
        );
        assert_eq!(
            pruner.predicted_pattern(&exploit, &other).map(|p| p.frequency),
            Some(1)
        );
        assert_eq!(pruner.predicted_pattern(&explore, &other), None);
    }

    #[test]
    fn test_neighbor_cap_requires_neighbors() {
        let pruner = pruner(PruningConfig::default().with_max_num_neighbors(3));
        assert!(matches!(
            pruner.begin_phase(&example("nt-0"), Mode::Exploit),
            Err(PruningError::NeighborsUnavailable)
        ));
    }

    #[test]
    fn test_zero_neighbor_cap_counts_every_pattern_once() {
        let pruner = pruner(PruningConfig::default().with_max_num_neighbors(0));
        for id in ["nt-0", "nt-1"] {
            let mut state = pruner.begin_phase(&example(id), Mode::Explore).unwrap();
            let mut derivation = largest_city().with_value(answer());
            pruner
                .update_consistent_pattern(&mut state, &ExactMatchEvaluator, &example(id), &mut derivation)
                .unwrap();
        }

        let state = pruner.begin_phase(&example("nt-2"), Mode::Exploit).unwrap();
        assert_eq!(
            state.predicted_patterns.into_values().collect::<Vec<_>>(),
            vec![Pattern::new(
                "(argmax (and ($Binary#1 $Entity#2) ($Binary#3 $Entity#4)) (@R $Binary#5))",
                1
            )]
        );
        assert_eq!(state.predicted_rules.len(), 4 + 7);
    }

    #[test]
    fn test_exploration_budget_is_per_group() {
        let pruner = pruner(PruningConfig::default().with_max_exploration_iters(1));
        pruner.begin_data_group(0, "train").unwrap();
        assert!(pruner.exploration_allowed());
        pruner.record_explore(false);
        assert!(!pruner.exploration_allowed());

        pruner.begin_data_group(1, "train").unwrap();
        assert!(pruner.exploration_allowed());
        assert_eq!(pruner.stats().group, "1.train");
    }
}
