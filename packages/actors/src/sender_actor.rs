//! Sender actor bridging one outbound link to its queue.

use broker_core::{LinkId, Message, Result, SharedEngine};

use crate::messages::{Binding, QueueCommand, SenderCommand};
use crate::scheduler::{Addr, Behavior, Step};

/// Sender actor: subscribes to a queue and transmits what the queue hands out.
pub struct SenderActor {
    /// Link this actor transmits on.
    link: LinkId,
    /// Connection engine owning the link.
    engine: SharedEngine,
    /// Queue binding, written once.
    binding: Option<Binding>,
    /// Credit granted before the binding resolved.
    pending_credit: Option<u32>,
    /// The link has gone; only teardown remains.
    detached: bool,
}

impl SenderActor {
    /// Create an unbound sender for a link.
    pub fn new(link: LinkId, engine: SharedEngine) -> Self {
        Self {
            link,
            engine,
            binding: None,
            pending_credit: None,
            detached: false,
        }
    }

    fn bind(
        &mut self,
        myself: &Addr<SenderCommand>,
        queue: Addr<QueueCommand>,
        name: String,
    ) -> Result<()> {
        if let Some(existing) = &self.binding {
            tracing::warn!(
                link = %self.link,
                queue = %existing.name,
                "sender already bound; ignoring rebind to {}",
                name
            );
            return Ok(());
        }
        self.binding = Some(Binding {
            queue: queue.clone(),
            name: name.clone(),
        });

        if self.detached {
            // Closed while the lookup was in flight: never attach, just release.
            tracing::debug!(
                link = %self.link,
                queue = %name,
                "link closed before binding; releasing"
            );
            return queue.post(QueueCommand::Unsubscribe {
                subscriber: myself.clone(),
            });
        }

        queue.post(QueueCommand::Subscribe {
            subscriber: myself.clone(),
        })?;
        if let Err(e) = self.engine.open_sender(self.link, &name) {
            tracing::debug!(link = %self.link, error = %e, "could not open sender link");
        }
        if let Some(credit) = self.pending_credit.take()
            && credit > 0
        {
            queue.post(QueueCommand::Flow {
                subscriber: myself.id(),
                credit,
            })?;
        }

        tracing::info!(link = %self.link, queue = %name, "sending from queue");
        Ok(())
    }

    /// Hand a message back to the bound queue so another subscriber gets it.
    fn requeue(&self, message: Message, reason: &str) -> Result<()> {
        let Some(binding) = &self.binding else {
            tracing::error!(
                link = %self.link,
                message = %message.id,
                "no queue to return message to"
            );
            return Ok(());
        };
        tracing::debug!(link = %self.link, message = %message.id, "{}", reason);
        binding.queue.post(QueueCommand::Enqueue { message })
    }
}

impl Behavior for SenderActor {
    type Command = SenderCommand;
    const KIND: &'static str = "sender";

    async fn handle(
        &mut self,
        myself: &Addr<SenderCommand>,
        command: SenderCommand,
    ) -> Result<Step> {
        match command {
            SenderCommand::Bound { queue, name } => {
                self.bind(myself, queue, name)?;
            }

            SenderCommand::Sendable { credit } => {
                if self.detached {
                    return Ok(Step::Continue);
                }
                match &self.binding {
                    Some(binding) => binding.queue.post(QueueCommand::Flow {
                        subscriber: myself.id(),
                        credit,
                    })?,
                    None => self.pending_credit = Some(credit),
                }
            }

            SenderCommand::Deliver { message } => {
                if self.detached {
                    // Handed out before the queue saw our unsubscribe: give it back.
                    self.requeue(message, "returning message to queue")?;
                    return Ok(Step::Continue);
                }
                tracing::debug!(link = %self.link, message = %message.id, "sending");
                if let Err(e) = self.engine.transmit(self.link, message.clone()) {
                    tracing::warn!(link = %self.link, error = %e, "transmit failed");
                    self.requeue(message, "returning untransmitted message to queue")?;
                }
            }

            SenderCommand::Detach => {
                if self.detached {
                    return Ok(Step::Continue);
                }
                self.detached = true;
                match &self.binding {
                    Some(binding) => binding.queue.post(QueueCommand::Unsubscribe {
                        subscriber: myself.clone(),
                    })?,
                    None => {
                        tracing::debug!(
                            link = %self.link,
                            "detached before binding; cleanup deferred"
                        );
                    }
                }
            }

            SenderCommand::Unsubscribed => {
                tracing::debug!(link = %self.link, "sender released");
                return Ok(Step::Stop);
            }
        }

        Ok(Step::Continue)
    }
}
