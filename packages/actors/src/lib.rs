//! Actor system for the message broker.
//!
//! This crate provides the ractor-based actors that route messages from
//! publishers to subscribers through named queues.
//!
//! # Architecture
//!
//! - `QueueManager` - Registry of named queues; creates them on demand
//! - `QueueActor` - Backlog and credit table for one queue; fair dispatch
//! - `SenderActor` - Bridges one outbound link to its queue
//! - `ReceiverActor` - Bridges one inbound link to its queue
//! - `ConnectionHandler` - Turns one connection's events into actor commands
//!
//! No actor calls another synchronously: every interaction is a command
//! posted through `Addr::post` and executed one at a time per actor.
//!
//! # Usage
//!
//! ```ignore
//! use actors::Broker;
//! use broker_core::{BrokerConfig, ConnectionEvent, ConnectionId};
//!
//! let broker = Broker::start(BrokerConfig::default()).await?;
//! let connection = broker.connect(ConnectionId(1), engine).await?;
//! connection.post(ConnectionEvent::ConnectionOpened)?;
//! ```

mod connection;
mod context;
mod messages;
mod queue_actor;
mod queue_manager;
mod receiver_actor;
pub mod round_robin;
pub mod scheduler;
mod sender_actor;

pub use connection::ConnectionHandler;
pub use context::Broker;
pub use messages::{
    BindRequester, Binding, QueueCommand, QueueManagerCommand, ReceiverCommand, SenderCommand,
};
pub use queue_actor::QueueActor;
pub use queue_manager::QueueManager;
pub use receiver_actor::ReceiverActor;
pub use scheduler::{Addr, Behavior, Step, spawn};
pub use sender_actor::SenderActor;

/// Re-export ractor types for convenience.
pub use ractor::{ActorId, RpcReplyPort};
