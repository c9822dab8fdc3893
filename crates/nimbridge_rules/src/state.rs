//! Process-wide session state: turn counter, variables and switches.
//!
//! The counter is atomic so every request gets its own turn number; the
//! variable and switch maps are behind locks and are snapshotted into each
//! turn's context, so evaluation never holds a lock.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{PoisonError, RwLock};

// ============================================================================
// Variable values
// ============================================================================

/// A session variable: number or string, compared with loose (coercing) semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Number(f64),
    Text(String),
}

impl VariableValue {
    /// Numeric view. Blank strings are 0, unparsable strings are NaN.
    pub fn as_number(&self) -> f64 {
        match self {
            VariableValue::Number(n) => *n,
            VariableValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }

    /// Equality with string→number coercion when the kinds differ.
    pub fn loose_eq(&self, other: &VariableValue) -> bool {
        match (self, other) {
            (VariableValue::Text(a), VariableValue::Text(b)) => a == b,
            _ => self.as_number() == other.as_number(),
        }
    }

    /// Ordering: strings compare lexicographically, anything else numerically.
    /// `None` when a NaN is involved.
    pub fn loose_cmp(&self, other: &VariableValue) -> Option<Ordering> {
        match (self, other) {
            (VariableValue::Text(a), VariableValue::Text(b)) => Some(a.cmp(b)),
            _ => self.as_number().partial_cmp(&other.as_number()),
        }
    }
}

impl From<f64> for VariableValue {
    fn from(n: f64) -> Self {
        VariableValue::Number(n)
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::Text(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::Text(s)
    }
}

// ============================================================================
// Session state
// ============================================================================

/// Read-only copy of the session state, as reported to management clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub turn_count: u64,
    pub variables: BTreeMap<String, VariableValue>,
    pub switches: BTreeMap<String, bool>,
}

#[derive(Debug, Default)]
pub struct SessionState {
    turn_count: AtomicU64,
    variables: RwLock<HashMap<String, VariableValue>>,
    switches: RwLock<HashMap<String, bool>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more turn and return its number (first turn is 1).
    pub fn next_turn(&self) -> u64 {
        self.turn_count.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_count.load(AtomicOrdering::SeqCst)
    }

    pub fn reset_turn_count(&self) {
        self.turn_count.store(0, AtomicOrdering::SeqCst);
    }

    pub fn set_variable(&self, name: impl Into<String>, value: VariableValue) {
        self.variables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> Option<VariableValue> {
        self.variables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Copy of all variables, taken once per turn.
    pub fn variables(&self) -> HashMap<String, VariableValue> {
        self.variables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_switch(&self, name: impl Into<String>, on: bool) {
        self.switches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), on);
    }

    pub fn switch(&self, name: &str) -> Option<bool> {
        self.switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turn_count: self.turn_count(),
            variables: self
                .variables
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            switches: self
                .switches
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}
