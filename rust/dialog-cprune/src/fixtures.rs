//! Hand-built derivations shared by unit tests.

use dialog_grammar::{
    Derivation, DerivationBuilder, Formula, Grammar, NodeId, ROOT, SuperlativeKind,
};

pub const HOST_GRAMMAR: &str = r#"
(rule $Entity ($PHRASE) (LexiconFn entity))
(rule $Binary ($PHRASE) (LexiconFn binary))
(rule $Binary (nothing) (ConstantFn fb:row.row.type))
(rule $Binary (nothing) (ConstantFn fb:row.row.state))
(rule $Set ($Binary $Entity) (lambda b (lambda e ((var b) (var e)))))
(rule $Set ($Set $Set) (lambda a (lambda b (and (var a) (var b)))))
(rule $Set ($Set $Binary) (lambda s (lambda r (argmax (number 1) (number 1) (var s) (reverse (var r))))))
(rule $ROOT ($Set) (IdentityFn))
"#;

pub fn host_grammar() -> Grammar {
    Grammar::from_rules_str(HOST_GRAMMAR).unwrap()
}

pub fn join_formula(binary: &str, entity: &str) -> Formula {
    Formula::apply(vec![Formula::name(binary), Formula::name(entity)])
}

/// `$Set -> $Binary $Entity`
pub fn join(builder: &mut DerivationBuilder, binary: &str, entity: &str) -> NodeId {
    let b = builder.leaf("$Binary", Formula::name(binary));
    let e = builder.leaf("$Entity", Formula::name(entity));
    builder.node("$Set", join_formula(binary, entity), vec![b, e], None)
}

/// `(argmax (number 1) (number 1) (and first second) (reverse superlative))`
/// rooted at `$ROOT`.
pub fn superlative(first: (&str, &str), second: (&str, &str), superlative: &str) -> Derivation {
    let mut builder = DerivationBuilder::new();
    let left = join(&mut builder, first.0, first.1);
    let right = join(&mut builder, second.0, second.1);
    let and = Formula::apply(vec![
        Formula::name("and"),
        join_formula(first.0, first.1),
        join_formula(second.0, second.1),
    ]);
    let merged = builder.node("$Set", and.clone(), vec![left, right], None);
    let relation = builder.leaf("$Binary", Formula::name(superlative));
    let top = Formula::Superlative {
        kind: SuperlativeKind::Argmax,
        rank: Box::new(Formula::number(1.0)),
        count: Box::new(Formula::number(1.0)),
        head: Box::new(and),
        relation: Box::new(Formula::reverse(Formula::name(superlative))),
    };
    let set = builder.node("$Set", top.clone(), vec![merged, relation], None);
    let root = builder.node(ROOT, top, vec![set], None);
    builder.finish(root)
}

/// The largest city in california.
pub fn largest_city() -> Derivation {
    superlative(
        ("fb:row.row.type", "fb:cell.city"),
        ("fb:row.row.state", "fb:cell.california"),
        "fb:row.row.population",
    )
}

/// `(and (state texas) (origin texas))`: texas is referenced twice.
pub fn shared_entity() -> Derivation {
    let mut builder = DerivationBuilder::new();
    let left = join(&mut builder, "fb:row.row.state", "fb:cell.texas");
    let right = join(&mut builder, "fb:row.row.origin", "fb:cell.texas");
    let and = Formula::apply(vec![
        Formula::name("and"),
        join_formula("fb:row.row.state", "fb:cell.texas"),
        join_formula("fb:row.row.origin", "fb:cell.texas"),
    ]);
    let set = builder.node("$Set", and.clone(), vec![left, right], None);
    let root = builder.node(ROOT, and, vec![set], None);
    builder.finish(root)
}
