//! Core domain types for the message broker.
//!
//! This crate contains shared types used across all packages:
//! - Message and MessageId for routed payloads
//! - Connection, session and link identities handed out by the transport
//! - ConnectionEvent, the tagged event stream consumed per connection
//! - ConnectionEngine, the command surface the broker drives
//! - BrokerConfig and BrokerError

mod config;
mod engine;
mod error;
mod events;
mod link;
mod message;
mod queue;

pub use config::BrokerConfig;
pub use engine::{ConnectionEngine, SharedEngine};
pub use error::{BrokerError, Result};
pub use events::{ConnectionEvent, ErrorCondition};
pub use link::{ConnectionId, LinkId, LinkRole, SessionId};
pub use message::{Message, MessageId};
pub use queue::{QueueSnapshot, QueueStats};
