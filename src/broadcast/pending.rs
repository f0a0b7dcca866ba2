use std::collections::VecDeque;

use super::message::Message;

/// Messages held back until their causal prerequisites are delivered.
///
/// Order carries no meaning for correctness, but sweeps visit members in
/// insertion order so a run's delivery log can be reproduced.
#[derive(Debug, Default)]
pub struct PendingSet {
    messages: VecDeque<Message>,
}

impl PendingSet {
    pub fn new() -> Self {
        PendingSet {
            messages: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, msg: Message) {
        self.messages.push_back(msg);
    }

    /// Runs one pass over the set. Every member is handed to `visit`; the ones
    /// it returns are kept for the next pass, in their original order.
    pub fn sweep<F>(&mut self, mut visit: F)
    where
        F: FnMut(Message) -> Option<Message>,
    {
        let pass = std::mem::take(&mut self.messages);
        for msg in pass {
            if let Some(kept) = visit(msg) {
                self.messages.push_back(kept);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::VectorClock;

    fn msg(sender_id: usize, seq_number: u32) -> Message {
        Message::new(sender_id, seq_number, VectorClock::new(4))
    }

    #[test]
    fn test_sweep_keeps_insertion_order() {
        let mut pending = PendingSet::new();
        pending.insert(msg(1, 5));
        pending.insert(msg(2, 3));
        pending.insert(msg(1, 4));
        pending.insert(msg(3, 2));

        let mut visited = Vec::new();
        pending.sweep(|m| {
            visited.push(m.id());
            if m.sender_id == 1 { None } else { Some(m) }
        });

        assert_eq!(visited.len(), 4);
        assert_eq!(visited[0].seq_number, 5);
        assert_eq!(visited[2].seq_number, 4);
        let left: Vec<_> = pending.iter().map(|m| (m.sender_id, m.seq_number)).collect();
        assert_eq!(left, vec![(2, 3), (3, 2)]);
    }
}
