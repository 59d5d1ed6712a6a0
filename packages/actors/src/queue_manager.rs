//! QueueManager actor: the process-wide registry of named queues.

use std::collections::HashMap;

use broker_core::Result;

use crate::messages::{QueueCommand, QueueManagerCommand};
use crate::queue_actor::QueueActor;
use crate::scheduler::{self, Addr, Behavior, Step};

/// State for the queue manager. Queues are created lazily and never removed.
pub struct QueueManager {
    /// All queue actors by name.
    queues: HashMap<String, Addr<QueueCommand>>,
    /// Counter for broker-assigned names.
    next_id: u64,
    /// Prefix for broker-assigned names.
    dynamic_prefix: String,
}

impl QueueManager {
    /// Create an empty manager.
    pub fn new(dynamic_prefix: impl Into<String>) -> Self {
        Self {
            queues: HashMap::new(),
            next_id: 0,
            dynamic_prefix: dynamic_prefix.into(),
        }
    }

    /// Resolve the requested name, minting a fresh one if it is empty.
    fn resolve_name(&mut self, requested: String) -> String {
        if !requested.is_empty() {
            return requested;
        }
        loop {
            let candidate = format!("{}{}", self.dynamic_prefix, self.next_id);
            self.next_id += 1;
            // A client may have claimed the name explicitly.
            if !self.queues.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    async fn find_or_create(&mut self, name: &str) -> Result<Addr<QueueCommand>> {
        if let Some(queue) = self.queues.get(name) {
            return Ok(queue.clone());
        }
        let (queue, _handle) = scheduler::spawn(QueueActor::new(name)).await?;
        self.queues.insert(name.to_string(), queue.clone());
        tracing::info!(queue = %name, "created queue");
        Ok(queue)
    }
}

impl Behavior for QueueManager {
    type Command = QueueManagerCommand;
    const KIND: &'static str = "queue_manager";

    async fn handle(
        &mut self,
        _myself: &Addr<QueueManagerCommand>,
        command: QueueManagerCommand,
    ) -> Result<Step> {
        match command {
            QueueManagerCommand::FindQueue { name, requester } => {
                let name = self.resolve_name(name);
                let queue = self.find_or_create(&name).await?;
                if let Err(e) = requester.bound(queue, name) {
                    tracing::warn!(error = %e, "bind requester went away");
                }
            }

            QueueManagerCommand::ListQueues { reply } => {
                let mut names: Vec<String> = self.queues.keys().cloned().collect();
                names.sort();
                let _ = reply.send(names);
            }

            QueueManagerCommand::GetQueue { name, reply } => {
                let _ = reply.send(self.queues.get(&name).cloned());
            }

            QueueManagerCommand::Shutdown => {
                tracing::info!(queues = self.queues.len(), "shutting down queue manager");
                for queue in self.queues.values() {
                    let _ = queue.post(QueueCommand::Shutdown);
                }
                return Ok(Step::Stop);
            }
        }

        Ok(Step::Continue)
    }
}
