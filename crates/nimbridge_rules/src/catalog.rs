//! Rule catalog: the rule sets loaded from configuration.
//!
//! Parsing is lenient at two levels. A rule set that cannot be decoded is
//! skipped with a warning and the rest of the file still loads; inside a rule
//! set, an entry missing `triggerGroups` or `actions` (or otherwise
//! undecodable) is dropped on its own. A single trigger group that fails to
//! decode becomes [`TriggerGroup::Invalid`] and never fires, while the rest
//! of its entry keeps working.
//!
//! Declared variables and switches reach the session only for rule sets the
//! catalog accepts.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

use nimbridge_core::Role;

use crate::error::{RuleError, RuleResult};
use crate::state::{SessionState, VariableValue};
use crate::trigger::TriggerGroup;

// ============================================================================
// Configuration shapes
// ============================================================================

/// A rule set as written in the catalog file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Older catalogs carry the name as `meta.name`.
    #[serde(default)]
    pub meta: Option<RuleSetMeta>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub entries: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub variables: HashMap<String, VariableDecl>,
    #[serde(default)]
    pub switches: HashMap<String, bool>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSetMeta {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDecl {
    #[serde(default)]
    pub value: Option<VariableValue>,
}

// ============================================================================
// Loaded model
// ============================================================================

#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub enabled: bool,
    pub entries: IndexMap<String, Entry>,
    pub variables: HashMap<String, VariableDecl>,
    pub switches: HashMap<String, bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trigger_logic: TriggerLogic,
    #[serde(deserialize_with = "lenient_trigger_groups")]
    pub trigger_groups: Vec<TriggerGroup>,
    pub actions: HashMap<String, Vec<Action>>,
}

impl Entry {
    /// The action list that runs when the entry fires.
    pub fn default_actions(&self) -> &[Action] {
        self.actions.get("default").map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Decode each trigger group on its own so one bad group stays inert
/// instead of taking the whole entry down with it.
fn lenient_trigger_groups<'de, D>(deserializer: D) -> Result<Vec<TriggerGroup>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|group| {
            serde_json::from_value(group).unwrap_or_else(|e| TriggerGroup::Invalid {
                reason: e.to_string(),
            })
        })
        .collect())
}

/// How an entry combines its trigger groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TriggerLogic {
    Or,
    And,
    /// Unrecognized (or missing) logic never fires.
    #[default]
    Unknown,
}

impl From<String> for TriggerLogic {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OR" | "OU" => TriggerLogic::Or,
            "AND" | "E" => TriggerLogic::And,
            _ => TriggerLogic::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Inject one message drawn from `pool`.
    #[serde(rename = "add_message", alias = "adicionar_mensagem")]
    AddMessage {
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        pool: Vec<String>,
        #[serde(default)]
        append: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

/// One row of the management listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSetSummary {
    pub name: String,
    pub enabled: bool,
    pub entry_count: usize,
}

impl RuleSet {
    /// Build a rule set from its configuration.
    ///
    /// Session state is untouched; call [`RuleSet::seed_session`] once the
    /// rule set has been accepted into a catalog.
    pub fn load(config: RuleSetConfig) -> RuleResult<Self> {
        let name = config
            .name
            .or(config.meta.map(|m| m.name))
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| RuleError::InvalidRuleSet {
                name: "<unnamed>".to_string(),
                reason: "missing name".to_string(),
            })?;

        let mut entries = IndexMap::with_capacity(config.entries.len());
        for (id, raw) in config.entries {
            match serde_json::from_value::<Entry>(raw) {
                Ok(mut entry) => {
                    for (index, group) in entry.trigger_groups.iter().enumerate() {
                        if let TriggerGroup::Invalid { reason } = group {
                            tracing::warn!(
                                "Rule set '{}': entry {} trigger #{} is malformed and will never fire: {}",
                                name,
                                id,
                                index,
                                reason
                            );
                        }
                    }
                    entry.id = id.clone();
                    entries.insert(id, entry);
                }
                Err(e) => {
                    tracing::warn!("Rule set '{}': skipping malformed entry {}: {}", name, id, e);
                }
            }
        }

        Ok(Self {
            name,
            enabled: config.enabled,
            entries,
            variables: config.variables,
            switches: config.switches,
        })
    }

    /// Write the declared variable defaults and switches into the session.
    pub fn seed_session(&self, state: &SessionState) {
        for (var, decl) in &self.variables {
            if let Some(value) = &decl.value {
                state.set_variable(var.clone(), value.clone());
            }
        }
        for (switch, on) in &self.switches {
            state.set_switch(switch.clone(), *on);
        }
    }

    pub fn summary(&self) -> RuleSetSummary {
        RuleSetSummary {
            name: self.name.clone(),
            enabled: self.enabled,
            entry_count: self.entries.len(),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rule_sets: Vec<RuleSet>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON catalog: an array of rule sets, or a single rule set object.
    pub fn from_json(json: &str, state: &SessionState) -> Result<Self> {
        let raw: serde_json::Value =
            serde_json::from_str(json).context("Failed to parse rule catalog JSON")?;
        let items = match raw {
            serde_json::Value::Array(items) => items,
            obj @ serde_json::Value::Object(_) => vec![obj],
            _ => anyhow::bail!("Rule catalog must be a JSON array or object"),
        };

        let mut catalog = Self::new();
        for (index, item) in items.into_iter().enumerate() {
            let config = match serde_json::from_value::<RuleSetConfig>(item) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Skipping rule set #{}: {}", index, e);
                    continue;
                }
            };
            match RuleSet::load(config).and_then(|rs| catalog.add(rs)) {
                Ok(()) => {
                    if let Some(added) = catalog.rule_sets.last() {
                        added.seed_session(state);
                    }
                }
                Err(e) => tracing::warn!("Skipping rule set #{}: {}", index, e),
            }
        }
        Ok(catalog)
    }

    /// Load a JSON catalog from disk.
    pub fn load_file<P: AsRef<Path>>(path: P, state: &SessionState) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read rule catalog: {}", path.as_ref().display())
        })?;
        let catalog = Self::from_json(&content, state)?;
        tracing::info!(
            "Loaded {} rule sets ({} entries) from {}",
            catalog.len(),
            catalog.rule_sets.iter().map(|r| r.entries.len()).sum::<usize>(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    /// Add a loaded rule set. Names are unique; a second one with the same name is rejected.
    pub fn add(&mut self, rule_set: RuleSet) -> RuleResult<()> {
        if self.get(&rule_set.name).is_some() {
            return Err(RuleError::Duplicate(rule_set.name));
        }
        self.rule_sets.push(rule_set);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|r| r.name == name)
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    pub fn list(&self) -> Vec<RuleSetSummary> {
        self.rule_sets.iter().map(RuleSet::summary).collect()
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> RuleResult<()> {
        let rule_set = self
            .rule_sets
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| RuleError::NotFound(name.to_string()))?;
        rule_set.enabled = enabled;
        tracing::info!("Rule set '{}' {}", name, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Flip a rule set's flag and return the new value.
    pub fn toggle(&mut self, name: &str) -> RuleResult<bool> {
        let current = self
            .get(name)
            .map(|r| r.enabled)
            .ok_or_else(|| RuleError::NotFound(name.to_string()))?;
        self.set_enabled(name, !current)?;
        Ok(!current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn romance_json() -> serde_json::Value {
        json!({
            "name": "Romance",
            "entries": {
                "2": {
                    "name": "Compliment",
                    "triggerLogic": "OR",
                    "triggerGroups": [{"type": "random", "chance": 5}],
                    "actions": {"default": [{"type": "add_message", "role": "system", "pool": ["a"], "append": false}]}
                },
                "10": {
                    "name": "Listening",
                    "triggerLogic": "OU",
                    "triggerGroups": [{"type": "keyword", "keywords": ["tell me"]}],
                    "actions": {"default": [{"type": "adicionar_mensagem", "pool": ["b"]}]}
                },
                "11": {
                    "name": "Broken - no actions",
                    "triggerLogic": "OR",
                    "triggerGroups": [{"type": "random", "chance": 100}]
                }
            },
            "variables": {"affection": {"value": 3}},
            "switches": {"slow_burn": true}
        })
    }

    #[test]
    fn test_load_keeps_entry_order_and_skips_malformed() {
        let config: RuleSetConfig = serde_json::from_value(romance_json()).unwrap();
        let rs = RuleSet::load(config).unwrap();

        assert_eq!(rs.name, "Romance");
        assert!(rs.enabled);
        assert_eq!(rs.entries.keys().collect::<Vec<_>>(), vec!["2", "10"]);
        assert_eq!(rs.entries["10"].id, "10");
        assert_eq!(rs.entries["10"].trigger_logic, TriggerLogic::Or);
        assert_eq!(
            rs.entries["10"].default_actions(),
            &[Action::AddMessage { role: None, pool: vec!["b".into()], append: None }]
        );
    }

    #[test]
    fn test_load_seeds_session_state() {
        let state = SessionState::new();
        let config: RuleSetConfig = serde_json::from_value(romance_json()).unwrap();
        let rs = RuleSet::load(config).unwrap();
        assert_eq!(state.variable("affection"), None, "load alone leaves the session alone");

        rs.seed_session(&state);
        assert_eq!(state.variable("affection"), Some(VariableValue::Number(3.0)));
        assert_eq!(state.switch("slow_burn"), Some(true));
    }

    #[test]
    fn test_rejected_duplicate_does_not_seed_session() {
        let state = SessionState::new();
        let json = json!([
            {"name": "A", "variables": {"mood": {"value": 1}}, "switches": {"lit": false}},
            {"name": "A", "variables": {"mood": {"value": 99}}, "switches": {"lit": true}}
        ])
        .to_string();
        let catalog = RuleCatalog::from_json(&json, &state).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(state.variable("mood"), Some(VariableValue::Number(1.0)));
        assert_eq!(state.switch("lit"), Some(false));
    }

    #[test]
    fn test_malformed_trigger_group_stays_inert_in_its_entry() {
        let config: RuleSetConfig = serde_json::from_value(json!({
            "name": "Loose",
            "entries": {"1": {
                "triggerLogic": "OR",
                "triggerGroups": [
                    {"type": "random", "chance": 100},
                    {"type": "time", "timeMode": "exact", "timeHour": "7", "timeMinute": 0},
                    {"type": "messageCount", "messageCountInterval": -1, "messageCountValue": 10.5},
                    {"type": "keyword", "keywords": "hi"}
                ],
                "actions": {"default": [{"type": "add_message", "pool": ["kept"]}]}
            }}
        }))
        .unwrap();
        let rs = RuleSet::load(config).unwrap();
        let groups = &rs.entries["1"].trigger_groups;
        assert_eq!(
            groups.iter().map(TriggerGroup::kind).collect::<Vec<_>>(),
            vec!["random", "invalid", "invalid", "invalid"]
        );
    }

    #[test]
    fn test_meta_name_and_missing_name() {
        let config: RuleSetConfig =
            serde_json::from_value(json!({"meta": {"name": "Legacy"}})).unwrap();
        assert_eq!(RuleSet::load(config).unwrap().name, "Legacy");

        let config: RuleSetConfig = serde_json::from_value(json!({"entries": {}})).unwrap();
        assert!(matches!(
            RuleSet::load(config),
            Err(RuleError::InvalidRuleSet { .. })
        ));
    }

    #[test]
    fn test_unknown_logic_and_action_kinds() {
        let entry: Entry = serde_json::from_value(json!({
            "triggerLogic": "XOR",
            "triggerGroups": [],
            "actions": {"default": [{"type": "set_variable", "name": "x"}]}
        }))
        .unwrap();
        assert_eq!(entry.trigger_logic, TriggerLogic::Unknown);
        assert_eq!(entry.default_actions(), &[Action::Unknown]);
    }

    #[test]
    fn test_from_json_skips_bad_rule_sets() {
        let state = SessionState::new();
        let json = json!([
            romance_json(),
            {"name": "Bad", "entries": "not a map"},
            {"name": "Romance"},
            {"name": "Dialogue", "enabled": false}
        ])
        .to_string();
        let catalog = RuleCatalog::from_json(&json, &state).unwrap();
        assert_eq!(
            catalog.list(),
            vec![
                RuleSetSummary { name: "Romance".into(), enabled: true, entry_count: 2 },
                RuleSetSummary { name: "Dialogue".into(), enabled: false, entry_count: 0 },
            ]
        );
    }

    #[test]
    fn test_from_json_rejects_scalar() {
        let state = SessionState::new();
        assert!(RuleCatalog::from_json("42", &state).is_err());
        assert!(RuleCatalog::from_json("not json", &state).is_err());
    }

    #[test]
    fn test_toggle_and_not_found() {
        let state = SessionState::new();
        let json = json!([{"name": "A"}, {"name": "B", "enabled": false}]).to_string();
        let mut catalog = RuleCatalog::from_json(&json, &state).unwrap();

        assert_eq!(
            catalog.set_enabled("missing", true),
            Err(RuleError::NotFound("missing".into()))
        );
        assert_eq!(
            catalog.list().iter().map(|s| s.enabled).collect::<Vec<_>>(),
            vec![true, false]
        );

        assert_eq!(catalog.toggle("B"), Ok(true));
        catalog.set_enabled("A", false).unwrap();
        assert_eq!(
            catalog.list().iter().map(|s| s.enabled).collect::<Vec<_>>(),
            vec![false, true]
        );
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rulesets.json");
        std::fs::write(&path, json!([romance_json()]).to_string()).unwrap();
        let state = SessionState::new();
        let catalog = RuleCatalog::load_file(&path, &state).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(RuleCatalog::load_file(dir.path().join("nope.json"), &state).is_err());
    }
}
