//! Trigger groups: the atomic conditions an entry combines.
//!
//! Every kind is a variant of [`TriggerGroup`] and [`evaluate`] is the single
//! dispatch point. Unknown kinds, operators and modes are kept as explicit
//! variants and always evaluate to `false`; a catalog written for a newer
//! proxy loads fine and the unfamiliar rules simply stay quiet.

use chrono::{NaiveTime, Timelike};
use rand::Rng;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::state::VariableValue;

// ============================================================================
// Turn context
// ============================================================================

/// Everything a trigger may look at for one turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Text of the last `user` message, empty if there is none.
    pub last_user_message: String,
    /// Host-local wall clock time of day.
    pub time_of_day: NaiveTime,
    /// Turn number after this turn's increment.
    pub turn_count: u64,
    /// Snapshot of the session variables.
    pub variables: HashMap<String, VariableValue>,
}

impl TurnContext {
    fn target_text(&self, target: &TextTarget) -> &str {
        match target {
            TextTarget::User => &self.last_user_message,
            TextTarget::Reserved(_) => "",
        }
    }
}

// ============================================================================
// Trigger model
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum TriggerGroup {
    /// Fires with `chance` percent probability.
    Random { chance: Option<f64> },
    #[serde(alias = "palavra-chave")]
    Keyword {
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        keyword_target: TextTarget,
    },
    Regex {
        regex: Option<String>,
        flags: Option<String>,
        #[serde(default)]
        regex_target: TextTarget,
        #[serde(skip)]
        compiled: OnceLock<Option<Regex>>,
    },
    #[serde(alias = "tempo")]
    Time {
        time_mode: Option<TimeMode>,
        time_hour: Option<u32>,
        time_minute: Option<u32>,
        time_hour_end: Option<u32>,
        time_minute_end: Option<u32>,
    },
    #[serde(alias = "contagem de mensagens")]
    MessageCount {
        message_count_operator: Option<CompareOp>,
        message_count_value: Option<i64>,
        message_count_interval: Option<u64>,
    },
    #[serde(alias = "variável")]
    Variable {
        variable_name: Option<String>,
        variable_operator: Option<CompareOp>,
        variable_value: Option<VariableValue>,
    },
    /// A group of a known kind whose fields failed to decode.
    #[serde(skip)]
    Invalid { reason: String },
    #[serde(other)]
    Unknown,
}

impl TriggerGroup {
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerGroup::Random { .. } => "random",
            TriggerGroup::Keyword { .. } => "keyword",
            TriggerGroup::Regex { .. } => "regex",
            TriggerGroup::Time { .. } => "time",
            TriggerGroup::MessageCount { .. } => "messageCount",
            TriggerGroup::Variable { .. } => "variable",
            TriggerGroup::Unknown => "unknown",
            TriggerGroup::Invalid { .. } => "invalid",
        }
    }
}

/// Which message a text trigger reads. Only the user's last message is wired;
/// other names are reserved and read as empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TextTarget {
    #[default]
    User,
    Reserved(String),
}

impl From<String> for TextTarget {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => TextTarget::User,
            _ => TextTarget::Reserved(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TimeMode {
    Exact,
    Between,
    Unknown(String),
}

impl From<String> for TimeMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "exact" => TimeMode::Exact,
            "between" | "entre" => TimeMode::Between,
            _ => TimeMode::Unknown(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Unknown(String),
}

impl From<String> for CompareOp {
    fn from(s: String) -> Self {
        match s.as_str() {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            _ => CompareOp::Unknown(s),
        }
    }
}

impl CompareOp {
    /// Apply an ordering operator. `None` (incomparable) is false for all of them.
    fn holds(&self, ord: Option<Ordering>) -> bool {
        match (self, ord) {
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
            (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
            _ => false,
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Decide whether one trigger group holds for this turn.
///
/// Never fails: missing fields, bad patterns and unknown kinds are `false`.
pub fn evaluate<R: Rng + ?Sized>(group: &TriggerGroup, ctx: &TurnContext, rng: &mut R) -> bool {
    match group {
        TriggerGroup::Random { chance } => match chance {
            Some(chance) => rng.gen_range(0.0..100.0) < *chance,
            None => {
                tracing::warn!("random trigger without chance");
                false
            }
        },
        TriggerGroup::Keyword {
            keywords,
            keyword_target,
        } => {
            if keywords.is_empty() {
                return false;
            }
            let target = ctx.target_text(keyword_target).to_lowercase();
            keywords
                .iter()
                .any(|kw| target.contains(&kw.to_lowercase()))
        }
        TriggerGroup::Regex {
            regex,
            flags,
            regex_target,
            compiled,
        } => {
            let Some(pattern) = regex else {
                return false;
            };
            let compiled = compiled.get_or_init(|| {
                let flags = flags.as_deref().unwrap_or("gi");
                match compile_pattern(pattern, flags) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!("Invalid regex trigger {:?} /{}: {}", pattern, flags, e);
                        None
                    }
                }
            });
            compiled
                .as_ref()
                .is_some_and(|re| re.is_match(ctx.target_text(regex_target)))
        }
        TriggerGroup::Time {
            time_mode,
            time_hour,
            time_minute,
            time_hour_end,
            time_minute_end,
        } => {
            let now_hour = ctx.time_of_day.hour();
            let now_minute = ctx.time_of_day.minute();
            match (time_mode, time_hour, time_minute) {
                (Some(TimeMode::Exact), Some(h), Some(m)) => now_hour == *h && now_minute == *m,
                (Some(TimeMode::Between), Some(h), Some(m)) => {
                    let (Some(h_end), Some(m_end)) = (time_hour_end, time_minute_end) else {
                        return false;
                    };
                    let start = h * 60 + m;
                    let end = h_end * 60 + m_end;
                    let now = now_hour * 60 + now_minute;
                    (start..=end).contains(&now)
                }
                _ => false,
            }
        }
        TriggerGroup::MessageCount {
            message_count_operator,
            message_count_value,
            message_count_interval,
        } => {
            let turn = ctx.turn_count as i64;
            let Some(value) = message_count_value else {
                return false;
            };
            match message_count_interval {
                Some(interval) if *interval > 0 => {
                    ctx.turn_count % interval == 0 && turn > *value
                }
                _ => match message_count_operator {
                    // Inequality is not a counter operator.
                    Some(CompareOp::Ne) | None => false,
                    Some(op) => op.holds(Some(turn.cmp(value))),
                },
            }
        }
        TriggerGroup::Variable {
            variable_name,
            variable_operator,
            variable_value,
        } => {
            let (Some(name), Some(op), Some(expected)) =
                (variable_name, variable_operator, variable_value)
            else {
                return false;
            };
            let Some(actual) = ctx.variables.get(name) else {
                return false;
            };
            match op {
                CompareOp::Eq => actual.loose_eq(expected),
                CompareOp::Ne => !actual.loose_eq(expected),
                CompareOp::Unknown(_) => false,
                ordering => ordering.holds(actual.loose_cmp(expected)),
            }
        }
        TriggerGroup::Unknown | TriggerGroup::Invalid { .. } => false,
    }
}

/// Build a regex from a pattern plus JavaScript-style flag letters.
///
/// `g`, `u`, `y` and `d` change nothing for a single match test and are accepted.
fn compile_pattern(pattern: &str, flags: &str) -> Result<Regex, String> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'g' | 'u' | 'y' | 'd' => {}
            other => return Err(format!("unsupported flag '{}'", other)),
        }
    }
    builder.build().map_err(|e| e.to_string())
}
