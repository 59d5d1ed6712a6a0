//! Root context shared by everything that creates actors.

use std::sync::Arc;

use broker_core::{
    BrokerConfig, ConnectionEvent, ConnectionId, QueueSnapshot, Result, SharedEngine,
};

use crate::connection::ConnectionHandler;
use crate::messages::{QueueCommand, QueueManagerCommand};
use crate::queue_manager::QueueManager;
use crate::scheduler::{self, Addr};

/// A running broker: configuration plus the QueueManager actor.
///
/// Constructed once at startup and cloned into whatever accepts connections.
#[derive(Clone)]
pub struct Broker {
    config: Arc<BrokerConfig>,
    queue_manager: Addr<QueueManagerCommand>,
}

impl Broker {
    /// Start the QueueManager.
    pub async fn start(config: BrokerConfig) -> Result<Self> {
        tracing::info!(listen = %config.listen_addr, "starting broker");
        let (queue_manager, _handle) =
            scheduler::spawn(QueueManager::new(config.dynamic_prefix.clone())).await?;
        Ok(Self {
            config: Arc::new(config),
            queue_manager,
        })
    }

    /// Create the handler for a newly accepted connection.
    ///
    /// The engine feeds the connection's events to the returned address.
    pub async fn connect(
        &self,
        connection: ConnectionId,
        engine: SharedEngine,
    ) -> Result<Addr<ConnectionEvent>> {
        let handler = ConnectionHandler::new(
            connection,
            engine,
            self.queue_manager.clone(),
            self.config.shutdown_address.clone(),
        );
        let (addr, _handle) = scheduler::spawn(handler).await?;
        tracing::debug!(%connection, "connection handler started");
        Ok(addr)
    }

    /// Names of all queues, sorted.
    pub async fn queue_names(&self) -> Result<Vec<String>> {
        self.queue_manager
            .query(|reply| QueueManagerCommand::ListQueues { reply })
            .await
    }

    /// Look up a queue without creating it.
    pub async fn queue(&self, name: &str) -> Result<Option<Addr<QueueCommand>>> {
        let name = name.to_string();
        self.queue_manager
            .query(|reply| QueueManagerCommand::GetQueue { name, reply })
            .await
    }

    /// Snapshot of a queue, if it exists.
    pub async fn snapshot(&self, name: &str) -> Result<Option<QueueSnapshot>> {
        match self.queue(name).await? {
            Some(queue) => Ok(Some(
                queue.query(|reply| QueueCommand::Snapshot { reply }).await?,
            )),
            None => Ok(None),
        }
    }

    /// Stop every queue and the QueueManager.
    pub fn shutdown(&self) {
        let _ = self.queue_manager.post(QueueManagerCommand::Shutdown);
    }
}
