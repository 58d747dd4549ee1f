//! Prompt assembly for the chat completions call.
//!
//! Composes the fixed system instructions, assembled vehicle context, an
//! optional parts listing, the bounded conversation history, and the new
//! user message into an ordered message list. Deterministic: the same inputs
//! always produce the same turns.

use serde::{Deserialize, Serialize};

/// Role tag for a conversation turn. Serializes to the OpenAI wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message unit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One available-parts listing entry, as returned by the parts provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartsRecord {
    pub price: String,
    pub condition: String,
    #[serde(default)]
    pub mileage: Option<String>,
    #[serde(default)]
    pub distance: Option<String>,
    pub seller: String,
}

/// At most this many parts records are embedded in the system turn.
pub const MAX_PARTS_IN_PROMPT: usize = 5;

/// Fixed behavioral instructions for the assistant.
pub const SYSTEM_INSTRUCTIONS: &str = "\
You are an expert automotive mechanic and car repair assistant. Your role is \
to help users diagnose car problems, provide repair guidance, and offer \
automotive advice.

Guidelines:
- Always prioritize safety first
- Provide step-by-step instructions when appropriate
- Explain technical terms in simple language
- Suggest when professional help is needed
- Ask clarifying questions to better diagnose issues
- Provide cost estimates when possible
- Cover all car makes and models
- Include both DIY solutions and professional repair options

When responding:
1. Acknowledge the user's problem
2. Ask clarifying questions if needed
3. Provide possible diagnoses
4. Suggest troubleshooting steps
5. Recommend next actions (DIY or professional)
6. Include safety warnings when relevant";

/// Build the ordered message list for a model call.
///
/// Exactly one system turn comes first, then the supplied history verbatim,
/// then the new user message.
pub fn build_prompt(
    user_message: &str,
    history: &[ConversationTurn],
    context: &str,
    parts: Option<&[PartsRecord]>,
) -> Vec<ConversationTurn> {
    let mut system = String::from(SYSTEM_INSTRUCTIONS);

    if !context.trim().is_empty() {
        system.push_str("\n\nRelevant vehicle information:\n");
        system.push_str(context.trim());
    }

    if let Some(parts) = parts.filter(|p| !p.is_empty()) {
        system.push_str("\n\nAvailable parts found:");
        for record in parts.iter().take(MAX_PARTS_IN_PROMPT) {
            system.push('\n');
            system.push_str(&format_parts_record(record));
        }
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ConversationTurn::system(system));
    messages.extend(history.iter().cloned());
    messages.push(ConversationTurn::user(user_message));
    messages
}

fn format_parts_record(record: &PartsRecord) -> String {
    let mut line = format!("- {} ({})", record.price, record.condition);
    if let Some(mileage) = &record.mileage {
        line.push_str(&format!(", {mileage} miles"));
    }
    if let Some(distance) = &record.distance {
        line.push_str(&format!(", {distance} away"));
    }
    line.push_str(&format!(", sold by {}", record.seller));
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(price: &str) -> PartsRecord {
        PartsRecord {
            price: price.to_string(),
            condition: "used".into(),
            mileage: Some("82,000".into()),
            distance: Some("12 miles".into()),
            seller: "Apex Salvage".into(),
        }
    }

    #[test]
    fn minimal_prompt_is_system_then_user() {
        let messages = build_prompt("fix my brakes", &[], "", None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(!messages[0].content.is_empty());
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "fix my brakes");
    }

    #[test]
    fn history_appears_between_system_and_user_unmodified() {
        let history = vec![
            ConversationTurn::user("my car squeals"),
            ConversationTurn::assistant("When does the squealing happen?"),
        ];
        let messages = build_prompt("when braking", &history, "", None);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], history[0]);
        assert_eq!(messages[2], history[1]);
        assert_eq!(messages[3].content, "when braking");
    }

    #[test]
    fn context_is_embedded_in_system_turn() {
        let messages = build_prompt("oil change interval?", &[], "Vehicle: 2021 Volvo XC60", None);
        assert!(messages[0].content.contains("Relevant vehicle information:"));
        assert!(messages[0].content.contains("Vehicle: 2021 Volvo XC60"));
    }

    #[test]
    fn parts_listing_is_capped_at_five() {
        let parts: Vec<PartsRecord> = (0..8).map(|i| sample_record(&format!("${i}00"))).collect();
        let messages = build_prompt("alternator price?", &[], "", Some(&parts));

        let system = &messages[0].content;
        assert!(system.contains("Available parts found:"));
        assert_eq!(system.matches("sold by Apex Salvage").count(), 5);
    }

    #[test]
    fn empty_parts_slice_adds_no_listing() {
        let messages = build_prompt("alternator price?", &[], "", Some(&[]));
        assert!(!messages[0].content.contains("Available parts found:"));
    }

    #[test]
    fn build_prompt_is_deterministic() {
        let history = vec![ConversationTurn::user("hi")];
        let a = build_prompt("q", &history, "ctx", None);
        let b = build_prompt("q", &history, "ctx", None);
        assert_eq!(a, b);
    }
}
