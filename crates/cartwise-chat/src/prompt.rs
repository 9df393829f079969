//! Generation prompt assembly.

use cartwise_core::config::PersonaConfig;
use cartwise_core::types::{Message, Role};

use crate::generation::PromptMessage;

const BASE_INSTRUCTIONS: &str = "You are a shopping assistant for an online store. \
Help the user find products and answer questions about them. Keep replies short. \
Matching product cards are shown to the user separately, so never invent product \
names, prices or links.";

/// System prompt for a persona, or the base instructions without one.
pub fn system_prompt(persona: Option<&PersonaConfig>) -> String {
    match persona {
        Some(p) => format!(
            "Your name is {}. {}\nStyle: {}",
            p.name, BASE_INSTRUCTIONS, p.tone
        ),
        None => BASE_INSTRUCTIONS.to_string(),
    }
}

/// System prompt, then prior transcript (oldest first), then the new message.
pub fn build_prompt(
    persona: Option<&PersonaConfig>,
    history: &[Message],
    user_text: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system_prompt(persona)));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| PromptMessage {
                role: m.role,
                content: m.content.clone(),
            }),
    );
    messages.push(PromptMessage::user(user_text));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartwise_core::types::Timestamp;
    use uuid::Uuid;

    fn persona() -> PersonaConfig {
        PersonaConfig {
            id: "friendly".to_string(),
            name: "Mia".to_string(),
            tone: "Warm and upbeat.".to_string(),
            greeting: "Hi!".to_string(),
        }
    }

    fn message(role: Role, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            role,
            content: content.to_string(),
            persona_id: None,
            product_ids: Vec::new(),
            created_at: Timestamp(0),
        }
    }

    #[test]
    fn test_system_prompt_mentions_persona() {
        let prompt = system_prompt(Some(&persona()));
        assert!(prompt.starts_with("Your name is Mia."));
        assert!(prompt.ends_with("Style: Warm and upbeat."));
        assert_eq!(system_prompt(None), BASE_INSTRUCTIONS);
    }

    #[test]
    fn test_build_prompt_orders_history_before_new_message() {
        let history = vec![
            message(Role::User, "hi"),
            message(Role::Assistant, "hello!"),
            message(Role::System, "internal note"),
        ];
        let prompt = build_prompt(Some(&persona()), &history, "red shoes?");

        let roles: Vec<Role> = prompt.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(prompt.last().unwrap().content, "red shoes?");
    }
}
