//! The exploit/explore search protocol.
//!
//! Every example is first parsed against a mini-grammar: the base rules plus
//! the rules of the patterns predicted from its neighbors (exploit). Only if
//! that finds no correct derivation, while seeding and training, does the
//! example fall back to a search over the full grammar (explore). Whichever
//! search ran last supplies the derivations and expected counts, so a caller
//! sees the same [`ParseOutcome`] as from an unpruned parse.

use std::sync::Arc;

use dialog_grammar::{Example, Grammar, ParseOutcome, Parser, SearchRequest, ValueEvaluator};
use tracing::{debug, info, info_span};

use crate::error::PruningResult;
use crate::mode::{Mode, Phase, PhaseState};
use crate::pruner::Pruner;

/// A [`Parser`] wrapped in collaborative pruning.
#[derive(Debug)]
pub struct PruningParser<P, E> {
    parser: P,
    evaluator: E,
    grammar: Grammar,
    pruner: Arc<Pruner>,
    phase: Phase,
}

impl<P, E> PruningParser<P, E>
where
    P: Parser,
    E: ValueEvaluator,
{
    /// Wrap `parser`, whose full grammar is `grammar`. The pruner is
    /// expected to have been built for the same grammar.
    pub fn new(parser: P, evaluator: E, grammar: Grammar, pruner: Arc<Pruner>) -> Self {
        Self {
            parser,
            evaluator,
            grammar,
            pruner,
            phase: Phase::default(),
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn pruner(&self) -> &Arc<Pruner> {
        &self.pruner
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Start pass `iter` over `group`. Exploration is only allowed in the
    /// [`Phase::Seeding`] phase.
    pub fn begin_data_group(&mut self, iter: usize, group: &str, phase: Phase) -> PruningResult<()> {
        self.phase = phase;
        self.pruner.begin_data_group(iter, group)
    }

    /// Parse `example`, exploiting first and exploring if allowed.
    pub fn infer(
        &self,
        example: &Example,
        compute_expected_counts: bool,
    ) -> PruningResult<ParseOutcome> {
        let _span = info_span!("infer", example = %example.id).entered();

        let (exploited, found) = self.exploit(example, compute_expected_counts)?;
        self.pruner.record_exploit(found);

        let outcome = if found
            || !compute_expected_counts
            || self.phase != Phase::Seeding
            || !self.pruner.exploration_allowed()
        {
            exploited
        } else {
            let (explored, found) = self.explore(example, compute_expected_counts)?;
            self.pruner.record_explore(found);
            explored
        };

        let stats = self.pruner.stats();
        info!(
            group = %stats.group,
            successful_exploit = stats.successful_exploit,
            total_exploit = stats.total_exploit,
            successful_explore = stats.successful_explore,
            total_explore = stats.total_explore,
            "pruning statistics"
        );
        Ok(outcome)
    }

    fn exploit(
        &self,
        example: &Example,
        compute_expected_counts: bool,
    ) -> PruningResult<(ParseOutcome, bool)> {
        let _span = info_span!("exploit").entered();
        let mut state = self.pruner.begin_phase(example, Mode::Exploit)?;
        let grammar = Grammar::from_rules(std::mem::take(&mut state.predicted_rules));
        debug!(rules = grammar.rules().len(), "mini-grammar");

        let request = SearchRequest::new(self.pruner.config().max_derivations)
            .with_compute_expected_counts(compute_expected_counts);
        let outcome = self.search(&mut state, &grammar, example, &request)?;
        info!(found = state.found_consistent_derivation, "exploit finished");
        Ok((outcome, state.found_consistent_derivation))
    }

    fn explore(
        &self,
        example: &Example,
        compute_expected_counts: bool,
    ) -> PruningResult<(ParseOutcome, bool)> {
        let _span = info_span!("explore").entered();
        let mut state = self.pruner.begin_phase(example, Mode::Explore)?;

        let config = self.pruner.config();
        let request = SearchRequest::new(config.max_derivations)
            .with_early_stopping(config.max_explore_derivations)
            .with_compute_expected_counts(compute_expected_counts);
        let outcome = self.search(&mut state, &self.grammar, example, &request)?;
        info!(found = state.found_consistent_derivation, "explore finished");
        Ok((outcome, state.found_consistent_derivation))
    }

    fn search(
        &self,
        state: &mut PhaseState,
        grammar: &Grammar,
        example: &Example,
        request: &SearchRequest,
    ) -> PruningResult<ParseOutcome> {
        let mut outcome = self.parser.parse(grammar, example, request);
        if request.compute_expected_counts {
            for derivation in &mut outcome.derivations {
                self.pruner
                    .update_consistent_pattern(state, &self.evaluator, example, derivation)?;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PruningConfig;
    use crate::fixtures::{host_grammar, largest_city};
    use dialog_grammar::{Denotation, Derivation, ExactMatchEvaluator, ROOT, Rule, Value};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Returns a fixed derivation whenever the grammar has a `$ROOT` rule and
    /// remembers the grammars it was given.
    #[derive(Debug, Default)]
    struct Recorder {
        derivation: Option<Derivation>,
        grammars: Mutex<Vec<Vec<Rule>>>,
    }

    impl Parser for Recorder {
        fn parse(&self, grammar: &Grammar, _: &Example, request: &SearchRequest) -> ParseOutcome {
            self.grammars.lock().push(grammar.rules().to_vec());
            let rooted = grammar.rules().iter().any(|rule| rule.lhs == ROOT);
            ParseOutcome {
                derivations: self.derivation.iter().filter(|_| rooted).cloned().collect(),
                expected_counts: request.compute_expected_counts.then(Default::default),
            }
        }
    }

    fn answer() -> Denotation {
        Denotation::List(vec![Value::Name("fb:row.r0".into())])
    }

    fn parser(derivation: Option<Derivation>, config: PruningConfig) -> PruningParser<Recorder, ExactMatchEvaluator> {
        let grammar = host_grammar();
        let pruner = Arc::new(Pruner::new(config, &grammar).unwrap());
        let recorder = Recorder {
            derivation,
            ..Recorder::default()
        };
        PruningParser::new(recorder, ExactMatchEvaluator, grammar, pruner)
    }

    fn example() -> Example {
        Example::new("nt-0", "largest city in california").with_target(answer())
    }

    #[test]
    fn test_explore_follows_failed_exploit_while_seeding() {
        let mut parser = parser(Some(largest_city().with_value(answer())), PruningConfig::default());
        parser.begin_data_group(0, "train", Phase::Seeding).unwrap();

        let outcome = parser.infer(&example(), true).unwrap();
        assert_eq!(outcome.derivations.len(), 1);
        assert!(outcome.expected_counts.is_some());

        let grammars = parser.parser.grammars.lock();
        assert_eq!(grammars.len(), 2);
        assert_eq!(grammars[0].len(), 4);
        assert_eq!(grammars[1], parser.grammar().rules());

        let stats = parser.pruner().stats();
        assert_eq!((stats.successful_exploit, stats.total_exploit), (0, 1));
        assert_eq!((stats.successful_explore, stats.total_explore), (1, 1));
    }

    #[test]
    fn test_no_explore_outside_seeding() {
        let mut parser = parser(Some(largest_city().with_value(answer())), PruningConfig::default());

        parser.begin_data_group(0, "dev", Phase::Steady).unwrap();
        parser.infer(&example(), true).unwrap();
        assert_eq!(parser.parser.grammars.lock().len(), 1);

        parser.begin_data_group(0, "train", Phase::Seeding).unwrap();
        parser.infer(&example(), false).unwrap();
        assert_eq!(parser.parser.grammars.lock().len(), 2);
        assert_eq!(parser.pruner().stats().total_explore, 0);
    }

    #[test]
    fn test_exploration_budget() {
        let mut parser = parser(None, PruningConfig::default().with_max_exploration_iters(1));
        parser.begin_data_group(0, "train", Phase::Seeding).unwrap();

        parser.infer(&example(), true).unwrap();
        parser.infer(&example(), true).unwrap();
        let stats = parser.pruner().stats();
        assert_eq!(stats.total_exploit, 2);
        assert_eq!(stats.total_explore, 1);
        assert_eq!(stats.successful_explore, 0);
    }
}
