//! Merge a turn's injections into the outgoing conversation.

use nimbridge_core::{ChatMessage, Role};

use crate::action::Injection;

const SEPARATOR: &str = "\n\n";

/// Return a new message list with `injections` applied.
///
/// Non-appending system injections are joined and folded into the leading
/// system message (created if absent). Appending injections become trailing
/// messages in emission order, whatever their role. A non-appending injection
/// with a non-system role matches neither bucket and is dropped.
pub fn merge(messages: &[ChatMessage], injections: &[Injection]) -> Vec<ChatMessage> {
    let prepend: Vec<&str> = injections
        .iter()
        .filter(|inj| inj.role == Role::System && !inj.append)
        .map(|inj| inj.content.as_str())
        .collect();
    let append = injections.iter().filter(|inj| inj.append);

    let mut merged = Vec::with_capacity(messages.len() + injections.len() + 1);

    if prepend.is_empty() {
        merged.extend_from_slice(messages);
    } else {
        let joined = prepend.join(SEPARATOR);
        match messages.split_first() {
            Some((first, rest)) if first.is(Role::System) => {
                merged.push(first.with_appended_text(SEPARATOR, &joined));
                merged.extend_from_slice(rest);
            }
            _ => {
                merged.push(ChatMessage::new(Role::System, joined));
                merged.extend_from_slice(messages);
            }
        }
    }

    merged.extend(append.map(|inj| ChatMessage::new(inj.role, inj.content.clone())));
    merged
}
