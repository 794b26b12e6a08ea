use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    #[serde(default)]
    pub timestamp: String,

    /// Sources cited by an assistant answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            sources,
            ..Self::new(Role::Assistant, content)
        }
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Local::now().format("%H:%M").to_string(),
            sources: Vec::new(),
        }
    }
}

/// A persisted transcript. `message_count` always equals `messages.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: usize,
    pub messages: Vec<Message>,
}

/// Listing entry without the messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let msg = Message {
            role: Role::User,
            content: "hi".to_string(),
            timestamp: "10:30".to_string(),
            sources: vec![],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi","timestamp":"10:30"}"#);
    }

    #[test]
    fn test_assistant_message_keeps_sources() {
        let msg = Message::assistant("answer", vec!["contract.txt".to_string()]);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.sources, vec!["contract.txt"]);
        assert_eq!(msg.timestamp.len(), 5);
    }

    #[test]
    fn test_message_without_timestamp_deserializes() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"ok"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.timestamp.is_empty());
    }
}
