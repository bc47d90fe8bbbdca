use std::cmp::Ordering;
use std::io::Write;

use anyhow::Result;
use dialog_cprune::{
    Mode, Pattern, PatternAbstractor, PatternConfig, Pruner, PruningConfig, RuleSynthesizer,
    Scratch,
};
use dialog_grammar::{
    Denotation, Derivation, DerivationBuilder, ExactMatchEvaluator, Example, Formula, Grammar,
    ROOT, Rule, Value,
};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

const GRAMMAR: &str = r#"
(rule $Entity ($PHRASE) (LexiconFn entity))
(rule $Binary ($PHRASE) (LexiconFn binary))
(rule $Set ($Binary $Entity) (lambda b (lambda e ((var b) (var e)))))
(rule $Set ($Set $Set) (lambda a (lambda b (and (var a) (var b)))))
(rule $ROOT ($Set) (IdentityFn))
"#;

fn join(binary: &str, entity: &str) -> Formula {
    Formula::apply(vec![Formula::name(binary), Formula::name(entity)])
}

/// `$ROOT -> $Set -> $Binary $Entity`, with the children in the given order.
fn single_join(binary: &str, entity: &str, entity_first: bool) -> Derivation {
    let mut builder = DerivationBuilder::new();
    let b = builder.leaf("$Binary", Formula::name(binary));
    let e = builder.leaf("$Entity", Formula::name(entity));
    let children = if entity_first { vec![e, b] } else { vec![b, e] };
    let set = builder.node("$Set", join(binary, entity), children, None);
    let root = builder.node(ROOT, join(binary, entity), vec![set], None);
    builder.finish(root)
}

/// `(and (first.0 first.1) (second.0 second.1))`
fn conjunction(first: (&str, &str), second: (&str, &str)) -> Derivation {
    let mut builder = DerivationBuilder::new();
    let set = |builder: &mut DerivationBuilder, (binary, entity): (&str, &str)| {
        let b = builder.leaf("$Binary", Formula::name(binary));
        let e = builder.leaf("$Entity", Formula::name(entity));
        builder.node("$Set", join(binary, entity), vec![b, e], None)
    };
    let left = set(&mut builder, first);
    let right = set(&mut builder, second);
    let formula = Formula::apply(vec![
        Formula::name("and"),
        join(first.0, first.1),
        join(second.0, second.1),
    ]);
    let and = builder.node("$Set", formula.clone(), vec![left, right], None);
    let root = builder.node(ROOT, formula, vec![and], None);
    builder.finish(root)
}

fn answer() -> Denotation {
    Denotation::List(vec![Value::Name("fb:row.r0".into())])
}

fn example(id: &str) -> Example {
    Example::new(id, "unused").with_target(answer())
}

fn learn(pruner: &Pruner, id: &str, derivation: Derivation, score: f64) -> Result<()> {
    let mut state = pruner.begin_phase(&example(id), Mode::Explore)?;
    let mut derivation = derivation.with_score(score).with_value(answer());
    pruner.update_consistent_pattern(&mut state, &ExactMatchEvaluator, &example(id), &mut derivation)?;
    assert!(state.found_consistent_derivation);
    Ok(())
}

#[test]
fn placeholders_are_numbered_by_textual_position() -> Result<()> {
    let abstractor = PatternAbstractor::new(&PatternConfig::default())?;
    for entity_first in [false, true] {
        let derivation = single_join("fb:row.row.state", "fb:cell.texas", entity_first);
        assert_eq!(
            abstractor.pattern_of(&derivation, &mut Scratch::new(&derivation)),
            "($Binary#1 $Entity#2)"
        );
    }
    Ok(())
}

#[test]
fn shared_symbols_stay_a_single_parameter() -> Result<()> {
    let mut synthesizer = RuleSynthesizer::new(&Grammar::from_rules_str(GRAMMAR)?, true);
    let derivation = conjunction(
        ("fb:row.row.state", "fb:cell.texas"),
        ("fb:row.row.origin", "fb:cell.texas"),
    );
    let rule_strings = synthesizer.synthesize(&derivation, &mut Scratch::new(&derivation))?;
    assert_eq!(rule_strings.len(), 1);

    let rule = Rule::parse(&rule_strings[0])?;
    assert_eq!(rule.lhs, ROOT);
    assert_eq!(rule.rhs, vec!["$Binary", "$Entity", "$Binary"]);

    // Rebuilding from fresh symbols keeps the shared entity shared.
    let rebuilt = rule.sem.apply(&[
        &Formula::name("fb:row.row.destination"),
        &Formula::name("fb:cell.ohio"),
        &Formula::name("fb:row.row.state"),
    ]);
    assert_eq!(
        rebuilt.map(|formula| formula.to_string()),
        Some("(and (fb:row.row.state fb:cell.ohio) (fb:row.row.destination fb:cell.ohio))".into())
    );
    Ok(())
}

#[test]
fn unshared_symbols_decompose_into_reusable_rules() -> Result<()> {
    let mut synthesizer = RuleSynthesizer::new(&Grammar::from_rules_str(GRAMMAR)?, true);
    let derivation = conjunction(
        ("fb:row.row.state", "fb:cell.texas"),
        ("fb:row.row.type", "fb:cell.city"),
    );
    let rule_strings = synthesizer.synthesize(&derivation, &mut Scratch::new(&derivation))?;
    assert_eq!(
        rule_strings.into_iter().collect::<Vec<_>>(),
        vec![
            "(rule $Formula1 ($Entity $Binary) (lambda s2 (lambda s1 ((var s1) (var s2)))))",
            "(rule $Formula2 ($Formula1 $Formula1) (lambda s2 (lambda s1 (and (var s1) (var s2)))))",
            "(rule $ROOT ($Formula2) (IdentityFn))",
        ]
    );
    Ok(())
}

#[test]
fn best_pattern_is_never_downgraded() -> Result<()> {
    let simple = || single_join("fb:row.row.state", "fb:cell.texas", false);
    let compound = || {
        conjunction(
            ("fb:row.row.state", "fb:cell.texas"),
            ("fb:row.row.type", "fb:cell.city"),
        )
    };

    // Better derivation first: the worse one is ignored.
    let pruner = Pruner::new(PruningConfig::default(), &Grammar::from_rules_str(GRAMMAR)?)?;
    learn(&pruner, "nt-0", simple(), -5.0)?;
    learn(&pruner, "nt-0", compound(), -10.0)?;
    assert_eq!(
        pruner.consistent_pattern("nt-0"),
        Some(Pattern::new("($Binary#1 $Entity#2)", 0).with_score(-5.0))
    );

    // Worse derivation first: the better one replaces it.
    let pruner = Pruner::new(PruningConfig::default(), &Grammar::from_rules_str(GRAMMAR)?)?;
    learn(&pruner, "nt-0", compound(), -10.0)?;
    learn(&pruner, "nt-0", simple(), -5.0)?;
    assert_eq!(
        pruner.consistent_pattern("nt-0"),
        Some(Pattern::new("($Binary#1 $Entity#2)", 0).with_score(-5.0))
    );

    // Equal scores keep the first.
    learn(&pruner, "nt-0", compound(), -5.0)?;
    assert_eq!(
        pruner.consistent_pattern("nt-0").map(|p| p.pattern),
        Some("($Binary#1 $Entity#2)".to_string())
    );
    Ok(())
}

#[test]
fn only_the_first_neighbors_are_consulted() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    let neighbors: Vec<String> = (0..10).map(|index| format!("nb-{index}")).collect();
    writeln!(file, "target\t{}", neighbors.join(","))?;
    file.flush()?;

    let predicted_for = |count: usize| -> Result<Vec<Pattern>> {
        let config = PruningConfig::default()
            .with_neighbor_file(file.path())
            .with_max_num_neighbors(count);
        let pruner = Pruner::new(config, &Grammar::from_rules_str(GRAMMAR)?)?;
        pruner.begin_data_group(0, "train")?;
        // Only the neighbors at positions 5-7 have patterns.
        for neighbor in &neighbors[4..7] {
            learn(&pruner, neighbor, single_join("fb:row.row.state", "fb:cell.texas", false), -5.0)?;
        }
        let state = pruner.begin_phase(&example("target"), Mode::Exploit)?;
        if state.predicted_patterns.is_empty() {
            assert_eq!(state.predicted_rules.len(), 2);
        }
        Ok(state.predicted_patterns.into_values().collect())
    };

    assert_eq!(predicted_for(3)?, Vec::<Pattern>::new());
    assert_eq!(predicted_for(5)?, vec![Pattern::new("($Binary#1 $Entity#2)", 1)]);
    assert_eq!(predicted_for(10)?, vec![Pattern::new("($Binary#1 $Entity#2)", 3)]);
    Ok(())
}

#[test]
fn equal_frequency_prefers_the_simpler_pattern() {
    let plain = Pattern::new("A", 5);
    let reversed = Pattern::new("(@R A)", 5);
    assert_eq!(plain.rank_cmp(&reversed), Ordering::Less);
    assert_eq!(reversed.rank_cmp(&plain), Ordering::Greater);
}
