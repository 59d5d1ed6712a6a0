//! Queue introspection types.

use serde::{Deserialize, Serialize};

/// Counters for a single queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Messages waiting in the backlog.
    pub backlog: u64,
    /// Registered subscribers.
    pub subscribers: u64,
    /// Messages accepted since the queue was created.
    pub enqueued: u64,
    /// Messages handed to a subscriber since the queue was created.
    pub delivered: u64,
}

impl QueueStats {
    /// Messages accepted but not yet handed out.
    pub fn pending(&self) -> u64 {
        self.enqueued.saturating_sub(self.delivered)
    }
}

/// Point-in-time view of a queue, for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Queue name.
    pub name: String,
    /// Current counters.
    pub stats: QueueStats,
    /// Remaining credit of each subscriber, in subscription order.
    pub credits: Vec<u32>,
    /// Registry position of the next candidate, `None` when past the end.
    pub cursor: Option<usize>,
}

impl QueueSnapshot {
    /// Total credit outstanding across all subscribers.
    pub fn total_credit(&self) -> u64 {
        self.credits.iter().map(|c| u64::from(*c)).sum()
    }
}
