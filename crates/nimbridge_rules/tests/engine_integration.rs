//! Integration tests for the injection engine against the shipped catalog.

use chrono::NaiveTime;
use nimbridge_core::{ChatMessage, Role};
use nimbridge_rules::{InjectionEngine, RuleCatalog, RuleError, SessionState, VariableValue};
use rand::rngs::StdRng;
use rand::SeedableRng;

const CATALOG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/rulesets.json");

fn engine() -> InjectionEngine {
    let state = SessionState::new();
    let catalog = RuleCatalog::load_file(CATALOG, &state).expect("shipped catalog loads");
    InjectionEngine::new(catalog, state)
}

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn test_shipped_catalog_loads_with_aliases() {
    let engine = engine();
    let list = engine.list();
    let names: Vec<_> = list.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Dynamic Conversation", "Daily Rhythm", "Relationship Stages"]);
    assert_eq!(list[0].entry_count, 3);
    assert_eq!(list[1].entry_count, 2);
    assert!(!list[2].enabled);

    let snap = engine.state().snapshot();
    assert_eq!(snap.variables["affection"], VariableValue::Number(0.0));
    assert!(snap.switches["slow_burn"]);
}

#[test]
fn test_greeting_in_the_morning() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(11);
    let messages = vec![
        ChatMessage::new(Role::System, "You are {{char}}."),
        ChatMessage::new(Role::User, "hello"),
    ];

    let out = engine.rewrite_at(&messages, at(8, 15), &mut rng);

    assert_eq!(out.len(), 2, "both firings fold into the system prompt");
    let system = out[0].text();
    assert!(system.starts_with("You are {{char}}.\n\n"));
    assert!(system.contains("It is morning"));
    assert_eq!(out[1], messages[1]);
}

#[test]
fn test_trailing_sentence_appends_tail_message() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(11);
    let messages = vec![ChatMessage::new(Role::User, "I went to the door and then")];

    let out = engine.rewrite_at(&messages, at(13, 0), &mut rng);

    assert_eq!(out.len(), 2);
    assert_eq!(out[0], messages[0]);
    assert!(out[1].is(Role::System));
    assert!(out[1].text().contains("unfinished"));
}

#[test]
fn test_quiet_turn_is_unchanged() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(11);
    let messages = vec![ChatMessage::new(Role::User, "The weather is fine.")];
    assert_eq!(engine.rewrite_at(&messages, at(13, 0), &mut rng), messages);
    assert_eq!(engine.state().turn_count(), 1);
}

#[test]
fn test_variable_stage_after_enable() {
    let engine = engine();
    engine.set_enabled("Relationship Stages", true).unwrap();
    engine.set_enabled("Dynamic Conversation", false).unwrap();
    engine.set_enabled("Daily Rhythm", false).unwrap();
    engine.state().set_variable("affection", VariableValue::Number(9.0));

    let messages = vec![ChatMessage::new(Role::User, "hey")];
    let mut rng = StdRng::seed_from_u64(5);
    let fired = (0..200)
        .filter(|_| engine.rewrite_at(&messages, at(13, 0), &mut rng).len() == 2)
        .count();
    assert!(fired > 0 && fired < 200, "20% chance should fire sometimes, got {}", fired);
}

#[test]
fn test_toggle_unknown_rule_set() {
    let engine = engine();
    let before = engine.list();
    assert_eq!(
        engine.set_enabled("No Such Set", true),
        Err(RuleError::NotFound("No Such Set".into()))
    );
    assert_eq!(engine.list(), before);
}
