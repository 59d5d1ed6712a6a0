//! Event types delivered by the connection engine.

use serde::{Deserialize, Serialize};

use crate::{LinkId, Message, SessionId};

/// An error condition reported by, or sent to, the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCondition {
    /// Symbolic condition name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl ErrorCondition {
    /// Create a new error condition.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.description)
        }
    }
}

/// Events emitted by the connection engine for one connection.
///
/// Each connection has a single consumer that matches on the event kind.
/// `TransportClosed` is always the last event of a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// The peer opened the connection.
    ConnectionOpened,
    /// The peer attached a link the broker sends on.
    SenderOpened {
        link: LinkId,
        session: SessionId,
        /// Source address; empty requests a broker-assigned name.
        source: String,
        /// The peer asked for a dynamic node regardless of the address.
        #[serde(default)]
        dynamic: bool,
    },
    /// The peer granted credit on a sender link.
    ///
    /// The value is the link's current credit, not an increment.
    Sendable { link: LinkId, credit: u32 },
    /// The peer attached a link the broker receives on.
    ReceiverOpened {
        link: LinkId,
        session: SessionId,
        /// Target address; empty requests a broker-assigned name.
        target: String,
    },
    /// A message arrived on a receiver link.
    MessageArrived { link: LinkId, message: Message },
    /// The peer detached a sender link.
    SenderClosed { link: LinkId },
    /// The peer detached a receiver link.
    ReceiverClosed { link: LinkId },
    /// The peer ended a session.
    SessionClosed { session: SessionId },
    /// The transport went away. No further events follow.
    TransportClosed,
    /// The engine reported a protocol error on this connection.
    ProtocolError { condition: ErrorCondition },
}

impl ConnectionEvent {
    /// Short name of the event kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionEvent::ConnectionOpened => "connection_opened",
            ConnectionEvent::SenderOpened { .. } => "sender_opened",
            ConnectionEvent::Sendable { .. } => "sendable",
            ConnectionEvent::ReceiverOpened { .. } => "receiver_opened",
            ConnectionEvent::MessageArrived { .. } => "message_arrived",
            ConnectionEvent::SenderClosed { .. } => "sender_closed",
            ConnectionEvent::ReceiverClosed { .. } => "receiver_closed",
            ConnectionEvent::SessionClosed { .. } => "session_closed",
            ConnectionEvent::TransportClosed => "transport_closed",
            ConnectionEvent::ProtocolError { .. } => "protocol_error",
        }
    }

    /// Get the link this event refers to, if any.
    pub fn link(&self) -> Option<LinkId> {
        match self {
            ConnectionEvent::SenderOpened { link, .. }
            | ConnectionEvent::Sendable { link, .. }
            | ConnectionEvent::ReceiverOpened { link, .. }
            | ConnectionEvent::MessageArrived { link, .. }
            | ConnectionEvent::SenderClosed { link }
            | ConnectionEvent::ReceiverClosed { link } => Some(*link),
            _ => None,
        }
    }
}
