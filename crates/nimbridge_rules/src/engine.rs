//! Per-turn orchestration: catalog → triggers → selection → actions → merge.

use chrono::{Local, NaiveTime};
use rand::Rng;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{PoisonError, RwLock};

use nimbridge_core::{ChatMessage, Role};

use crate::action::{execute, Injection};
use crate::catalog::{RuleCatalog, RuleSet, RuleSetSummary};
use crate::error::RuleResult;
use crate::merge::merge;
use crate::select::select;
use crate::state::SessionState;
use crate::trigger::TurnContext;

/// Run one turn over the catalog and collect the injections it produces.
///
/// Counts the turn, reads the last user message, then walks the enabled rule
/// sets and their entries in declared order. A rule set that panics is logged
/// and contributes nothing; the remaining rule sets still run.
pub fn process_turn<R: Rng + ?Sized>(
    catalog: &RuleCatalog,
    state: &SessionState,
    messages: &[ChatMessage],
    time_of_day: NaiveTime,
    rng: &mut R,
) -> Vec<Injection> {
    process_turn_with(catalog, state, messages, time_of_day, rng, run_rule_set)
}

/// [`process_turn`] with the per-rule-set step supplied by the caller.
pub(crate) fn process_turn_with<R, F>(
    catalog: &RuleCatalog,
    state: &SessionState,
    messages: &[ChatMessage],
    time_of_day: NaiveTime,
    rng: &mut R,
    mut run: F,
) -> Vec<Injection>
where
    R: Rng + ?Sized,
    F: FnMut(&RuleSet, &TurnContext, &mut R) -> Vec<Injection>,
{
    let ctx = TurnContext {
        last_user_message: messages
            .iter()
            .rev()
            .find(|m| m.is(Role::User))
            .map(ChatMessage::text)
            .unwrap_or_default(),
        time_of_day,
        turn_count: state.next_turn(),
        variables: state.variables(),
    };

    let mut injections = Vec::new();
    for rule_set in catalog.rule_sets().iter().filter(|r| r.enabled) {
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| run(rule_set, &ctx, &mut *rng)));
        match outcome {
            Ok(mut produced) => injections.append(&mut produced),
            Err(cause) => {
                let reason = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown failure".to_string());
                tracing::error!("Rule set '{}' failed: {}", rule_set.name, reason);
            }
        }
    }
    if !injections.is_empty() {
        tracing::info!(
            "Turn {}: injecting {} message(s)",
            ctx.turn_count,
            injections.len()
        );
    }
    injections
}

fn run_rule_set<R: Rng + ?Sized>(
    rule_set: &RuleSet,
    ctx: &TurnContext,
    rng: &mut R,
) -> Vec<Injection> {
    let mut injections = Vec::new();
    for entry in rule_set.entries.values() {
        if select(entry, ctx, rng) {
            let produced = execute(entry, rng);
            tracing::debug!(
                "Rule '{}' / entry {} ({}) fired, {} injection(s)",
                rule_set.name,
                entry.id,
                entry.name,
                produced.len()
            );
            injections.extend(produced);
        }
    }
    injections
}

// ============================================================================
// Engine: catalog + session behind one handle for the host
// ============================================================================

/// The injection engine as the proxy host sees it.
///
/// The catalog sits behind a lock so management calls can toggle rule sets
/// while turns are processed; session state synchronizes itself.
#[derive(Debug, Default)]
pub struct InjectionEngine {
    catalog: RwLock<RuleCatalog>,
    state: SessionState,
}

impl InjectionEngine {
    pub fn new(catalog: RuleCatalog, state: SessionState) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            state,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply one turn of rules to `messages` using the host's local clock.
    pub fn rewrite<R: Rng + ?Sized>(&self, messages: &[ChatMessage], rng: &mut R) -> Vec<ChatMessage> {
        self.rewrite_at(messages, Local::now().time(), rng)
    }

    pub fn rewrite_at<R: Rng + ?Sized>(
        &self,
        messages: &[ChatMessage],
        time_of_day: NaiveTime,
        rng: &mut R,
    ) -> Vec<ChatMessage> {
        let injections = {
            let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
            process_turn(&catalog, &self.state, messages, time_of_day, rng)
        };
        merge(messages, &injections)
    }

    pub fn list(&self) -> Vec<RuleSetSummary> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list()
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> RuleResult<()> {
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_enabled(name, enabled)
    }

    pub fn toggle(&self, name: &str) -> RuleResult<bool> {
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .toggle(name)
    }
}
