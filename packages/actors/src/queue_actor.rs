//! Queue actor owning one named destination.

use broker_core::{QueueSnapshot, Result};

use crate::messages::{QueueCommand, SenderCommand};
use crate::round_robin::RoundRobin;
use crate::scheduler::{Addr, Behavior, Step};

/// Queue actor: a FIFO backlog fairly shared among credit-holding subscribers.
pub struct QueueActor {
    name: String,
    subscriptions: RoundRobin<Addr<SenderCommand>>,
}

impl QueueActor {
    /// Create an empty queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: RoundRobin::new(),
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            name: self.name.clone(),
            stats: self.subscriptions.stats(),
            credits: self.subscriptions.credits(),
            cursor: self.subscriptions.cursor(),
        }
    }

    fn try_to_send(&mut self) {
        let name = &self.name;
        let sent = self.subscriptions.dispatch(|subscriber, message| {
            let id = message.id;
            if let Err(e) = subscriber.post(SenderCommand::Deliver { message }) {
                tracing::error!(
                    queue = %name,
                    message = %id,
                    error = %e,
                    "lost message for stopped subscriber"
                );
            }
        });
        if sent > 0 {
            tracing::debug!(
                queue = %self.name,
                sent,
                backlog = self.subscriptions.backlog_len(),
                "dispatched"
            );
        }
    }
}

impl Behavior for QueueActor {
    type Command = QueueCommand;
    const KIND: &'static str = "queue";

    async fn handle(
        &mut self,
        _myself: &Addr<QueueCommand>,
        command: QueueCommand,
    ) -> Result<Step> {
        match command {
            QueueCommand::Subscribe { subscriber } => {
                tracing::debug!(queue = %self.name, subscriber = %subscriber.id(), "subscribe");
                if !self.subscriptions.subscribe(subscriber.id(), subscriber.clone()) {
                    tracing::warn!(
                        queue = %self.name,
                        subscriber = %subscriber.id(),
                        "duplicate subscribe ignored"
                    );
                }
            }

            QueueCommand::Flow { subscriber, credit } => {
                tracing::debug!(queue = %self.name, %subscriber, credit, "flow");
                if !self.subscriptions.flow(subscriber, credit) {
                    tracing::warn!(
                        queue = %self.name,
                        %subscriber,
                        "flow for unknown subscriber ignored"
                    );
                }
                self.try_to_send();
            }

            QueueCommand::Enqueue { message } => {
                tracing::debug!(queue = %self.name, message = %message.id, "enqueue");
                self.subscriptions.push(message);
                self.try_to_send();
            }

            QueueCommand::Unsubscribe { subscriber } => {
                tracing::debug!(queue = %self.name, subscriber = %subscriber.id(), "unsubscribe");
                self.subscriptions.unsubscribe(subscriber.id());
                if subscriber.post(SenderCommand::Unsubscribed).is_err() {
                    tracing::debug!(
                        queue = %self.name,
                        subscriber = %subscriber.id(),
                        "subscriber already gone"
                    );
                }
                self.try_to_send();
            }

            QueueCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }

            QueueCommand::Shutdown => {
                tracing::info!(
                    queue = %self.name,
                    backlog = self.subscriptions.backlog_len(),
                    "shutting down queue"
                );
                return Ok(Step::Stop);
            }
        }

        Ok(Step::Continue)
    }
}
