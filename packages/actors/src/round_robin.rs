//! Credit-based round-robin dispatch over an ordered subscriber table.

use std::collections::VecDeque;

use broker_core::{Message, QueueStats};
use ractor::ActorId;

/// One registered subscriber and its remaining credit.
#[derive(Debug, Clone)]
pub struct Subscription<T> {
    pub id: ActorId,
    pub outlet: T,
    pub credit: u32,
}

/// Backlog plus subscriber table for one queue.
///
/// Subscribers are kept in subscription order, so dispatch order depends only
/// on the order of `subscribe` calls. The cursor is either a valid index into
/// the table or `None` for past-the-end.
#[derive(Debug)]
pub struct RoundRobin<T> {
    backlog: VecDeque<Message>,
    subscriptions: Vec<Subscription<T>>,
    cursor: Option<usize>,
    enqueued: u64,
    delivered: u64,
}

impl<T> Default for RoundRobin<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RoundRobin<T> {
    pub fn new() -> Self {
        Self {
            backlog: VecDeque::new(),
            subscriptions: Vec::new(),
            cursor: None,
            enqueued: 0,
            delivered: 0,
        }
    }

    /// Append a subscriber with zero credit. Returns false if already present.
    pub fn subscribe(&mut self, id: ActorId, outlet: T) -> bool {
        if self.position(id).is_some() {
            return false;
        }
        self.subscriptions.push(Subscription {
            id,
            outlet,
            credit: 0,
        });
        true
    }

    /// Set a subscriber's credit. Returns false for an unknown subscriber.
    pub fn flow(&mut self, id: ActorId, credit: u32) -> bool {
        match self.position(id) {
            Some(index) => {
                self.subscriptions[index].credit = credit;
                true
            }
            None => false,
        }
    }

    /// Remove a subscriber, moving the cursor off it first.
    pub fn unsubscribe(&mut self, id: ActorId) -> Option<Subscription<T>> {
        let index = self.position(id)?;
        if self.cursor == Some(index) {
            self.advance();
        }
        let removed = self.subscriptions.remove(index);
        if let Some(cursor) = self.cursor
            && cursor > index
        {
            self.cursor = Some(cursor - 1);
        }
        Some(removed)
    }

    /// Append a message to the backlog.
    pub fn push(&mut self, message: Message) {
        self.backlog.push_back(message);
        self.enqueued += 1;
    }

    /// Hand out backlog messages to subscribers with credit.
    ///
    /// Starting at the cursor, each subscriber with credit receives the
    /// oldest message and loses one credit; subscribers without credit are
    /// skipped. Stops when the backlog is empty or every subscriber has been
    /// skipped in a row. Returns the number of messages delivered.
    pub fn dispatch(&mut self, mut deliver: impl FnMut(&T, Message)) -> usize {
        let mut skipped = 0;
        let mut sent = 0;

        while !self.backlog.is_empty() && skipped < self.subscriptions.len() {
            let index = *self.cursor.get_or_insert(0);
            let entry = &mut self.subscriptions[index];

            if entry.credit > 0 {
                let Some(message) = self.backlog.pop_front() else {
                    break;
                };
                entry.credit -= 1;
                deliver(&entry.outlet, message);
                skipped = 0;
                sent += 1;
            } else {
                skipped += 1;
            }
            self.advance();
        }

        self.delivered += sent as u64;
        sent
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Remaining credit per subscriber, in subscription order.
    pub fn credits(&self) -> Vec<u32> {
        self.subscriptions.iter().map(|s| s.credit).collect()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            backlog: self.backlog.len() as u64,
            subscribers: self.subscriptions.len() as u64,
            enqueued: self.enqueued,
            delivered: self.delivered,
        }
    }

    fn position(&self, id: ActorId) -> Option<usize> {
        self.subscriptions.iter().position(|s| s.id == id)
    }

    fn advance(&mut self) {
        self.cursor = match self.cursor {
            Some(i) if i + 1 < self.subscriptions.len() => Some(i + 1),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ActorId {
        ActorId::Local(n)
    }

    fn msg(body: &str) -> Message {
        Message::new(body)
    }

    fn drain(rr: &mut RoundRobin<&'static str>) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        rr.dispatch(|who, m| out.push((*who, m.body_as_str().unwrap_or_default().to_string())));
        out
    }

    fn table(credits: &[(&'static str, u32)]) -> RoundRobin<&'static str> {
        let mut rr = RoundRobin::new();
        for (n, (name, credit)) in credits.iter().enumerate() {
            assert!(rr.subscribe(id(n as u64), *name));
            assert!(rr.flow(id(n as u64), *credit));
        }
        rr
    }

    #[test]
    fn wraps_once_across_two_subscribers() {
        let mut rr = table(&[("a", 2), ("b", 1)]);
        rr.push(msg("m1"));
        rr.push(msg("m2"));
        rr.push(msg("m3"));

        let delivered = drain(&mut rr);
        assert_eq!(
            delivered,
            vec![
                ("a", "m1".to_string()),
                ("b", "m2".to_string()),
                ("a", "m3".to_string()),
            ]
        );
        assert_eq!(rr.credits(), vec![0, 0]);
        assert_eq!(rr.backlog_len(), 0);
    }

    #[test]
    fn never_delivers_without_credit() {
        let mut rr = table(&[("a", 0), ("b", 3), ("c", 0)]);
        for i in 0..5 {
            rr.push(msg(&format!("m{i}")));
        }

        let delivered = drain(&mut rr);
        assert_eq!(delivered.len(), 3);
        assert!(delivered.iter().all(|(who, _)| *who == "b"));
        assert_eq!(rr.credits(), vec![0, 0, 0]);
        assert_eq!(rr.backlog_len(), 2);
    }

    #[test]
    fn visits_in_subscription_order_and_spends_one_credit_each() {
        let mut rr = table(&[("a", 1), ("b", 2), ("c", 3)]);
        for i in 0..6 {
            rr.push(msg(&format!("m{i}")));
        }

        let order: Vec<_> = drain(&mut rr).into_iter().map(|(who, _)| who).collect();
        assert_eq!(order, vec!["a", "b", "c", "b", "c", "c"]);
        assert_eq!(rr.stats().delivered, 6);
        assert_eq!(rr.stats().pending(), 0);
    }

    #[test]
    fn subscribe_starts_without_credit() {
        let mut rr = RoundRobin::new();
        assert!(rr.subscribe(id(1), "a"));
        assert!(!rr.subscribe(id(1), "a"));
        rr.push(msg("m1"));

        assert!(drain(&mut rr).is_empty());
        assert_eq!(rr.backlog_len(), 1);
    }

    #[test]
    fn credit_is_absolute() {
        let mut rr = table(&[("a", 0)]);
        assert!(rr.flow(id(0), 3));
        assert!(rr.flow(id(0), 1));
        assert_eq!(rr.credits(), vec![1]);

        rr.push(msg("m1"));
        rr.push(msg("m2"));
        assert_eq!(drain(&mut rr).len(), 1);
        assert_eq!(rr.backlog_len(), 1);
    }

    #[test]
    fn flow_for_unknown_subscriber_is_rejected() {
        let mut rr: RoundRobin<&'static str> = RoundRobin::new();
        assert!(!rr.flow(id(9), 4));
        assert!(rr.is_empty());
    }

    #[test]
    fn each_message_goes_to_exactly_one_subscriber() {
        let mut rr = table(&[("a", 10), ("b", 10), ("c", 10)]);
        for i in 0..20 {
            rr.push(msg(&format!("m{i}")));
        }

        let mut bodies: Vec<String> = drain(&mut rr).into_iter().map(|(_, b)| b).collect();
        bodies.sort();
        bodies.dedup();
        assert_eq!(bodies.len(), 20);
        assert_eq!(rr.credits().iter().sum::<u32>(), 10);
    }

    #[test]
    fn unsubscribing_cursor_entry_moves_to_next() {
        let mut rr = table(&[("a", 1), ("b", 5), ("c", 5)]);
        rr.push(msg("m1"));
        assert_eq!(drain(&mut rr), vec![("a", "m1".to_string())]);
        // Cursor now rests on b.
        assert_eq!(rr.cursor(), Some(1));

        let removed = rr.unsubscribe(id(1)).unwrap();
        assert_eq!(removed.outlet, "b");
        assert_eq!(rr.cursor(), Some(1));

        rr.push(msg("m2"));
        rr.push(msg("m3"));
        let delivered = drain(&mut rr);
        assert_eq!(
            delivered,
            vec![("c", "m2".to_string()), ("c", "m3".to_string())]
        );
    }

    #[test]
    fn unsubscribing_last_entry_under_cursor_goes_past_the_end() {
        let mut rr = table(&[("a", 5), ("b", 1)]);
        rr.push(msg("m1"));
        assert_eq!(drain(&mut rr), vec![("a", "m1".to_string())]);
        assert_eq!(rr.cursor(), Some(1));

        rr.unsubscribe(id(1));
        assert_eq!(rr.cursor(), None);

        rr.push(msg("m2"));
        assert_eq!(drain(&mut rr), vec![("a", "m2".to_string())]);
    }

    #[test]
    fn unsubscribing_before_cursor_keeps_it_on_the_same_entry() {
        let mut rr = table(&[("a", 1), ("b", 1), ("c", 5)]);
        rr.push(msg("m1"));
        rr.push(msg("m2"));
        drain(&mut rr);
        assert_eq!(rr.cursor(), Some(2));

        rr.unsubscribe(id(0));
        assert_eq!(rr.cursor(), Some(1));
        rr.push(msg("m3"));
        assert_eq!(drain(&mut rr), vec![("c", "m3".to_string())]);
    }

    #[test]
    fn unknown_unsubscribe_is_a_no_op() {
        let mut rr = table(&[("a", 1)]);
        assert!(rr.unsubscribe(id(42)).is_none());
        assert_eq!(rr.len(), 1);
    }
}
