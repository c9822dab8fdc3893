//! Entry selection: combine an entry's trigger results with its logic.

use rand::Rng;

use crate::catalog::{Entry, TriggerLogic};
use crate::trigger::{evaluate, TurnContext};

/// Decide whether an entry fires this turn.
///
/// Every group is evaluated in declared order, even after the outcome is
/// known. An entry without groups, or with unrecognized logic, never fires.
pub fn select<R: Rng + ?Sized>(entry: &Entry, ctx: &TurnContext, rng: &mut R) -> bool {
    if entry.trigger_groups.is_empty() {
        return false;
    }
    let results: Vec<bool> = entry
        .trigger_groups
        .iter()
        .map(|group| evaluate(group, ctx, rng))
        .collect();

    match entry.trigger_logic {
        TriggerLogic::Or => results.iter().any(|fired| *fired),
        TriggerLogic::And => results.iter().all(|fired| *fired),
        TriggerLogic::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::collections::HashMap;

    fn entry(logic: &str, groups: serde_json::Value) -> Entry {
        serde_json::from_value(json!({
            "triggerLogic": logic,
            "triggerGroups": groups,
            "actions": {"default": []}
        }))
        .unwrap()
    }

    fn ctx(text: &str) -> TurnContext {
        TurnContext {
            last_user_message: text.to_string(),
            time_of_day: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            turn_count: 1,
            variables: HashMap::new(),
        }
    }

    fn always() -> serde_json::Value {
        json!({"type": "random", "chance": 100})
    }

    fn never() -> serde_json::Value {
        json!({"type": "keyword", "keywords": ["zzz-cannot-match"]})
    }

    #[test]
    fn test_or_fires_with_one_true_group() {
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry("OR", json!([never(), always(), never()]));
        assert!(select(&e, &ctx("hello"), &mut rng));
    }

    #[test]
    fn test_and_blocked_by_one_false_group() {
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry("AND", json!([always(), never()]));
        assert!(!select(&e, &ctx("hello"), &mut rng));

        let e = entry("E", json!([always(), always()]));
        assert!(select(&e, &ctx("hello"), &mut rng));
    }

    #[test]
    fn test_empty_groups_never_fire() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!select(&entry("AND", json!([])), &ctx("x"), &mut rng));
        assert!(!select(&entry("OR", json!([])), &ctx("x"), &mut rng));
    }

    #[test]
    fn test_unknown_logic_fails_closed() {
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry("ANY", json!([always()]));
        assert!(!select(&e, &ctx("x"), &mut rng));
    }
}
