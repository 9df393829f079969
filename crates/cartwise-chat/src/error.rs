//! Error types for the conversational pipeline.

use cartwise_core::error::CartwiseError;

/// Errors from the chat pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("generation timed out after {0}s")]
    GenerationTimeout(u64),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Text safe to show the end user in an `error` frame.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Generation(_) | ChatError::Catalog(_) | ChatError::Storage(_) => {
                "Sorry, something went wrong while generating a reply. Please try again."
                    .to_string()
            }
            ChatError::GenerationTimeout(_) => {
                "Sorry, the reply took too long. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<CartwiseError> for ChatError {
    fn from(err: CartwiseError) -> Self {
        match err {
            CartwiseError::Catalog(msg) => ChatError::Catalog(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::EmptyMessage;
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = ChatError::MessageTooLong(2000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 2000 characters"
        );

        let id = Uuid::new_v4();
        let err = ChatError::SessionNotFound(id);
        assert_eq!(err.to_string(), format!("session not found: {}", id));

        let err = ChatError::Generation("model not loaded".to_string());
        assert_eq!(err.to_string(), "generation error: model not loaded");

        let err = ChatError::GenerationTimeout(30);
        assert_eq!(err.to_string(), "generation timed out after 30s");

        let err = ChatError::Catalog("query failed".to_string());
        assert_eq!(err.to_string(), "catalog error: query failed");

        let err = ChatError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn test_chat_error_from_cartwise_error() {
        let chat_err: ChatError = CartwiseError::Storage("connection lost".to_string()).into();
        assert!(matches!(chat_err, ChatError::Storage(_)));
        assert!(chat_err.to_string().contains("connection lost"));

        let chat_err: ChatError = CartwiseError::Catalog("bad filter".to_string()).into();
        assert!(matches!(chat_err, ChatError::Catalog(ref m) if m == "bad filter"));
    }

    #[test]
    fn test_user_message_hides_internal_detail() {
        let err = ChatError::Generation("connect ECONNREFUSED 127.0.0.1:11434".to_string());
        assert!(!err.user_message().contains("11434"));

        let err = ChatError::GenerationTimeout(30);
        assert!(err.user_message().contains("too long"));
    }

    #[test]
    fn test_user_message_keeps_validation_errors() {
        assert_eq!(
            ChatError::EmptyMessage.user_message(),
            "message cannot be empty"
        );
        assert_eq!(
            ChatError::MessageTooLong(10).user_message(),
            "message exceeds maximum length of 10 characters"
        );
    }

    #[test]
    fn test_chat_error_session_not_found_nil_uuid() {
        let err = ChatError::SessionNotFound(Uuid::nil());
        assert_eq!(
            err.to_string(),
            "session not found: 00000000-0000-0000-0000-000000000000"
        );
    }
}
