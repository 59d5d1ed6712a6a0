//! Commands the broker issues to the connection engine.

use std::sync::Arc;

use crate::{ErrorCondition, LinkId, Message, Result};

/// Command surface of one connection in the transport engine.
///
/// Every call is fire-and-forget: implementations queue the work for the
/// connection's I/O and return immediately. An `Err` means the connection is
/// already gone and the command was discarded.
pub trait ConnectionEngine: Send + Sync + 'static {
    /// Accept the peer's connection open.
    fn open_connection(&self) -> Result<()>;

    /// Complete the attach of an outbound link bound to `address`.
    fn open_sender(&self, link: LinkId, address: &str) -> Result<()>;

    /// Complete the attach of an inbound link bound to `address`.
    fn open_receiver(&self, link: LinkId, address: &str) -> Result<()>;

    /// Transmit a message on an outbound link.
    fn transmit(&self, link: LinkId, message: Message) -> Result<()>;

    /// Ask the hosting process to stop gracefully.
    fn request_shutdown(&self, condition: ErrorCondition) -> Result<()>;
}

/// Engine handle shared between a connection and its link actors.
pub type SharedEngine = Arc<dyn ConnectionEngine>;
