//! Action execution: turn a fired entry into injections.

use rand::Rng;
use serde::Serialize;

use nimbridge_core::Role;

use crate::catalog::{Action, Entry};

/// A message fragment waiting to be merged into the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Injection {
    pub role: Role,
    pub content: String,
    pub append: bool,
}

impl Injection {
    pub fn new(role: Role, content: impl Into<String>, append: bool) -> Self {
        Self {
            role,
            content: content.into(),
            append,
        }
    }
}

/// Run the entry's `default` actions in order, one uniformly drawn pool
/// element per `add_message`. Empty pools and unknown actions emit nothing.
pub fn execute<R: Rng + ?Sized>(entry: &Entry, rng: &mut R) -> Vec<Injection> {
    let mut injections = Vec::new();
    for action in entry.default_actions() {
        match action {
            Action::AddMessage { role, pool, append } => {
                if pool.is_empty() {
                    continue;
                }
                let content = &pool[rng.gen_range(0..pool.len())];
                injections.push(Injection {
                    role: role.unwrap_or_default(),
                    content: content.clone(),
                    append: append.unwrap_or(false),
                });
            }
            Action::Unknown => {}
        }
    }
    injections
}
