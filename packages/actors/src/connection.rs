//! Per-connection controller turning engine events into actor traffic.

use std::collections::HashMap;

use broker_core::{
    ConnectionEvent, ConnectionId, ErrorCondition, LinkId, Result, SessionId, SharedEngine,
};

use crate::messages::{BindRequester, QueueManagerCommand, ReceiverCommand, SenderCommand};
use crate::receiver_actor::ReceiverActor;
use crate::scheduler::{self, Addr, Behavior, Step};
use crate::sender_actor::SenderActor;

struct LinkEntry<C> {
    session: SessionId,
    actor: Addr<C>,
}

/// Connection handler: owns the link actors of one connection and their
/// teardown order.
pub struct ConnectionHandler {
    connection: ConnectionId,
    engine: SharedEngine,
    queue_manager: Addr<QueueManagerCommand>,
    shutdown_address: String,
    senders: HashMap<LinkId, LinkEntry<SenderCommand>>,
    receivers: HashMap<LinkId, LinkEntry<ReceiverCommand>>,
}

impl ConnectionHandler {
    /// Create a handler for a freshly accepted connection.
    pub fn new(
        connection: ConnectionId,
        engine: SharedEngine,
        queue_manager: Addr<QueueManagerCommand>,
        shutdown_address: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            engine,
            queue_manager,
            shutdown_address: shutdown_address.into(),
            senders: HashMap::new(),
            receivers: HashMap::new(),
        }
    }

    async fn open_sender(&mut self, link: LinkId, session: SessionId, name: String) -> Result<()> {
        let (actor, _handle) =
            scheduler::spawn(SenderActor::new(link, self.engine.clone())).await?;
        if let Some(previous) = self.senders.insert(
            link,
            LinkEntry {
                session,
                actor: actor.clone(),
            },
        ) {
            tracing::warn!(
                connection = %self.connection,
                %link,
                "sender link reattached; detaching old one"
            );
            let _ = previous.actor.post(SenderCommand::Detach);
        }
        self.queue_manager.post(QueueManagerCommand::FindQueue {
            name,
            requester: BindRequester::Sender(actor),
        })
    }

    async fn open_receiver(
        &mut self,
        link: LinkId,
        session: SessionId,
        target: String,
    ) -> Result<()> {
        if target == self.shutdown_address {
            tracing::info!(connection = %self.connection, "broker shutting down");
            return self
                .engine
                .request_shutdown(ErrorCondition::new("shutdown", "stop broker"));
        }
        if target.is_empty() {
            tracing::warn!(
                connection = %self.connection,
                %link,
                "receiver attached to an empty address; assigning a dynamic queue"
            );
        }

        let (actor, _handle) =
            scheduler::spawn(ReceiverActor::new(link, self.engine.clone())).await?;
        if let Some(previous) = self.receivers.insert(
            link,
            LinkEntry {
                session,
                actor: actor.clone(),
            },
        ) {
            tracing::warn!(
                connection = %self.connection,
                %link,
                "receiver link reattached; detaching old one"
            );
            let _ = previous.actor.post(ReceiverCommand::Detach);
        }
        self.queue_manager.post(QueueManagerCommand::FindQueue {
            name: target,
            requester: BindRequester::Receiver(actor),
        })
    }

    fn close_session(&mut self, session: SessionId) {
        let senders: Vec<LinkId> = self
            .senders
            .iter()
            .filter(|(_, entry)| entry.session == session)
            .map(|(link, _)| *link)
            .collect();
        for link in senders {
            if let Some(entry) = self.senders.remove(&link) {
                let _ = entry.actor.post(SenderCommand::Detach);
            }
        }

        let receivers: Vec<LinkId> = self
            .receivers
            .iter()
            .filter(|(_, entry)| entry.session == session)
            .map(|(link, _)| *link)
            .collect();
        for link in receivers {
            if let Some(entry) = self.receivers.remove(&link) {
                let _ = entry.actor.post(ReceiverCommand::Detach);
            }
        }
    }

    fn close_all(&mut self) {
        for (_, entry) in self.senders.drain() {
            let _ = entry.actor.post(SenderCommand::Detach);
        }
        for (_, entry) in self.receivers.drain() {
            let _ = entry.actor.post(ReceiverCommand::Detach);
        }
    }
}

impl Behavior for ConnectionHandler {
    type Command = ConnectionEvent;
    const KIND: &'static str = "connection";

    async fn handle(
        &mut self,
        _myself: &Addr<ConnectionEvent>,
        event: ConnectionEvent,
    ) -> Result<Step> {
        tracing::trace!(
            connection = %self.connection,
            event = event.kind(),
            link = ?event.link(),
            "event"
        );

        match event {
            ConnectionEvent::ConnectionOpened => {
                tracing::info!(connection = %self.connection, "connection opened");
                self.engine.open_connection()?;
            }

            ConnectionEvent::SenderOpened {
                link,
                session,
                source,
                dynamic,
            } => {
                let name = if dynamic { String::new() } else { source };
                self.open_sender(link, session, name).await?;
            }

            ConnectionEvent::Sendable { link, credit } => match self.senders.get(&link) {
                Some(entry) => entry.actor.post(SenderCommand::Sendable { credit })?,
                None => {
                    tracing::warn!(
                        connection = %self.connection,
                        %link,
                        "credit for unknown sender link"
                    )
                }
            },

            ConnectionEvent::ReceiverOpened {
                link,
                session,
                target,
            } => {
                self.open_receiver(link, session, target).await?;
            }

            ConnectionEvent::MessageArrived { link, message } => match self.receivers.get(&link) {
                Some(entry) => entry.actor.post(ReceiverCommand::Arrived { message })?,
                None => {
                    tracing::warn!(
                        connection = %self.connection,
                        %link,
                        message = %message.id,
                        "message on unknown receiver link dropped"
                    )
                }
            },

            ConnectionEvent::SenderClosed { link } => match self.senders.remove(&link) {
                Some(entry) => entry.actor.post(SenderCommand::Detach)?,
                None => {
                    tracing::debug!(
                        connection = %self.connection,
                        %link,
                        "close for unknown sender link"
                    )
                }
            },

            ConnectionEvent::ReceiverClosed { link } => match self.receivers.remove(&link) {
                Some(entry) => entry.actor.post(ReceiverCommand::Detach)?,
                None => {
                    tracing::debug!(
                        connection = %self.connection,
                        %link,
                        "close for unknown receiver link"
                    )
                }
            },

            ConnectionEvent::SessionClosed { session } => {
                tracing::debug!(connection = %self.connection, %session, "session closed");
                self.close_session(session);
            }

            ConnectionEvent::TransportClosed => {
                tracing::info!(
                    connection = %self.connection,
                    senders = self.senders.len(),
                    receivers = self.receivers.len(),
                    "transport closed"
                );
                self.close_all();
                return Ok(Step::Stop);
            }

            ConnectionEvent::ProtocolError { condition } => {
                tracing::error!(connection = %self.connection, %condition, "protocol error");
            }
        }

        Ok(Step::Continue)
    }
}
