//! Message domain types for payloads routed through queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a message, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Ulid);

impl MessageId {
    /// Create a new unique message ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a message ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message travelling from a publisher, through a queue, to one subscriber.
///
/// The broker never inspects the body; it is carried as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: MessageId,
    /// Optional application subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Message payload.
    #[serde(default)]
    pub body: serde_json::Value,
    /// When the broker accepted the message.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message with the given body.
    pub fn new(body: impl Into<serde_json::Value>) -> Self {
        Self {
            id: MessageId::new(),
            subject: None,
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// Set the subject for this message.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Body as a string slice, when the payload is a JSON string.
    pub fn body_as_str(&self) -> Option<&str> {
        self.body.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_parse_back() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
        assert_eq!(MessageId::parse(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn subject_is_omitted_when_absent() {
        let msg = Message::new("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("subject").is_none());
        assert_eq!(msg.body_as_str(), Some("hello"));

        let msg = msg.with_subject("greeting");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["subject"], "greeting");
    }
}
