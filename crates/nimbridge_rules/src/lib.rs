//! Declarative message-injection engine.
//!
//! Rule sets hold entries; each entry combines trigger groups with OR/AND
//! logic and, when it fires, draws messages from its action pools. The
//! injections of one turn are merged into the conversation before it is
//! forwarded upstream.

pub mod action;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod merge;
pub mod select;
pub mod state;
pub mod trigger;

pub use action::{execute, Injection};
pub use catalog::{Action, Entry, RuleCatalog, RuleSet, RuleSetConfig, RuleSetSummary, TriggerLogic};
pub use engine::{process_turn, InjectionEngine};
pub use error::{RuleError, RuleResult};
pub use merge::merge;
pub use select::select;
pub use state::{SessionSnapshot, SessionState, VariableValue};
pub use trigger::{evaluate, CompareOp, TextTarget, TimeMode, TriggerGroup, TurnContext};
