use thiserror::Error;

/// Errors surfaced by the rule catalog and its management operations.
///
/// Evaluation itself never fails; malformed triggers and entries degrade to
/// "no injections" instead of producing one of these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule set not found: {0}")]
    NotFound(String),

    #[error("rule set '{0}' is already loaded")]
    Duplicate(String),

    #[error("invalid rule set {name}: {reason}")]
    InvalidRuleSet { name: String, reason: String },
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
