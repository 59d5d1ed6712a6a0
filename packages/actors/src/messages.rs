//! Command types for actor communication.

use broker_core::{Message, QueueSnapshot, Result};
use ractor::{ActorId, RpcReplyPort};

use crate::scheduler::Addr;

/// Commands for the QueueManager.
#[derive(Debug)]
pub enum QueueManagerCommand {
    /// Resolve or create a queue and bind the requester to it.
    ///
    /// An empty name asks for a fresh broker-assigned name.
    FindQueue {
        name: String,
        requester: BindRequester,
    },

    /// List all queue names, sorted.
    ListQueues { reply: RpcReplyPort<Vec<String>> },

    /// Look up a queue without creating it.
    GetQueue {
        name: String,
        reply: RpcReplyPort<Option<Addr<QueueCommand>>>,
    },

    /// Stop every queue and then the manager itself.
    Shutdown,
}

/// Commands for a Queue.
#[derive(Debug)]
pub enum QueueCommand {
    /// Register a subscriber with zero credit.
    Subscribe { subscriber: Addr<SenderCommand> },

    /// Set a subscriber's credit to an absolute value.
    Flow { subscriber: ActorId, credit: u32 },

    /// Append a message to the backlog.
    Enqueue { message: Message },

    /// Remove a subscriber and acknowledge with `SenderCommand::Unsubscribed`.
    Unsubscribe { subscriber: Addr<SenderCommand> },

    /// Report the current backlog and credit table.
    Snapshot { reply: RpcReplyPort<QueueSnapshot> },

    /// Stop the queue.
    Shutdown,
}

/// Commands for a Sender (broker to peer link).
#[derive(Debug)]
pub enum SenderCommand {
    /// The QueueManager resolved the queue for this link.
    Bound {
        queue: Addr<QueueCommand>,
        name: String,
    },

    /// The peer granted credit on the link.
    Sendable { credit: u32 },

    /// Transmit a message handed out by the queue.
    Deliver { message: Message },

    /// The link or its session/transport closed.
    Detach,

    /// The queue has dropped this subscriber; the actor may be released.
    Unsubscribed,
}

/// Commands for a Receiver (peer to broker link).
#[derive(Debug)]
pub enum ReceiverCommand {
    /// The QueueManager resolved the queue for this link.
    Bound {
        queue: Addr<QueueCommand>,
        name: String,
    },

    /// A message arrived from the peer.
    Arrived { message: Message },

    /// The link or its session/transport closed.
    Detach,
}

/// Link actor waiting for a queue binding.
#[derive(Debug, Clone)]
pub enum BindRequester {
    Sender(Addr<SenderCommand>),
    Receiver(Addr<ReceiverCommand>),
}

impl BindRequester {
    /// Deliver the resolved queue to the requester.
    pub fn bound(&self, queue: Addr<QueueCommand>, name: String) -> Result<()> {
        match self {
            BindRequester::Sender(sender) => sender.post(SenderCommand::Bound { queue, name }),
            BindRequester::Receiver(receiver) => {
                receiver.post(ReceiverCommand::Bound { queue, name })
            }
        }
    }
}

/// A queue reference recorded once at bind time.
#[derive(Debug, Clone)]
pub struct Binding {
    pub queue: Addr<QueueCommand>,
    pub name: String,
}
