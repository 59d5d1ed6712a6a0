//! Receiver actor bridging one inbound link to its queue.

use std::collections::VecDeque;

use broker_core::{LinkId, Message, Result, SharedEngine};

use crate::messages::{Binding, QueueCommand, ReceiverCommand};
use crate::scheduler::{Addr, Behavior, Step};

/// Receiver actor: forwards every arriving message to its queue exactly once,
/// in arrival order, buffering until the queue is known.
pub struct ReceiverActor {
    link: LinkId,
    engine: SharedEngine,
    binding: Option<Binding>,
    /// Messages that arrived before the binding resolved.
    backlog: VecDeque<Message>,
    detached: bool,
}

impl ReceiverActor {
    /// Create an unbound receiver for a link.
    pub fn new(link: LinkId, engine: SharedEngine) -> Self {
        Self {
            link,
            engine,
            binding: None,
            backlog: VecDeque::new(),
            detached: false,
        }
    }

    fn flush(&mut self, queue: &Addr<QueueCommand>) -> Result<()> {
        if !self.backlog.is_empty() {
            tracing::debug!(
                link = %self.link,
                count = self.backlog.len(),
                "flushing buffered messages"
            );
        }
        while let Some(message) = self.backlog.pop_front() {
            queue.post(QueueCommand::Enqueue { message })?;
        }
        Ok(())
    }
}

impl Behavior for ReceiverActor {
    type Command = ReceiverCommand;
    const KIND: &'static str = "receiver";

    async fn handle(
        &mut self,
        _myself: &Addr<ReceiverCommand>,
        command: ReceiverCommand,
    ) -> Result<Step> {
        match command {
            ReceiverCommand::Bound { queue, name } => {
                if let Some(existing) = &self.binding {
                    tracing::warn!(
                        link = %self.link,
                        queue = %existing.name,
                        "receiver already bound; ignoring rebind to {}",
                        name
                    );
                    return Ok(Step::Continue);
                }
                if !self.detached {
                    if let Err(e) = self.engine.open_receiver(self.link, &name) {
                        tracing::debug!(
                            link = %self.link,
                            error = %e,
                            "could not open receiver link"
                        );
                    }
                    tracing::info!(link = %self.link, queue = %name, "receiving to queue");
                }
                self.flush(&queue)?;
                self.binding = Some(Binding { queue, name });

                if self.detached {
                    return Ok(Step::Stop);
                }
            }

            ReceiverCommand::Arrived { message } => match &self.binding {
                Some(binding) => binding.queue.post(QueueCommand::Enqueue { message })?,
                None => self.backlog.push_back(message),
            },

            ReceiverCommand::Detach => {
                self.detached = true;
                if self.binding.is_some() {
                    tracing::debug!(link = %self.link, "receiver released");
                    return Ok(Step::Stop);
                }
                tracing::debug!(
                    link = %self.link,
                    buffered = self.backlog.len(),
                    "detached before binding; waiting to flush"
                );
            }
        }

        Ok(Step::Continue)
    }
}
