use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::message::{Message, MessageId};
use super::pending::PendingSet;
use crate::common::clock::{ProcessId, VectorClock};

/*
    Causal delivery. A message m from sender s may be handed to the
    application once everything s had seen when it sent m has been
    delivered here. With local clock V that means

        m.vc[s] == V[s] + 1        (m is the next message from s)
        m.vc[j] <= V[j]  for j!=s  (we know at least what s knew about j)

    The first two messages of each sender follow their own rules:

        seq 0: m.vc[s] == 1 and m.vc[j] == 0 for every j != s
        seq 1: m.vc[s] >= 1

    Delivering m merges m.vc into V. Messages that fail the check wait in
    the pending set, which is swept again after every delivery until a
    whole pass delivers nothing.
*/

pub fn can_deliver(msg: &Message, local: &VectorClock) -> bool {
    assert_eq!(
        msg.vector_clock.len(),
        local.len(),
        "vector clock length mismatch on delivery check"
    );
    let sender = msg.sender_id;
    let vc = msg.vector_clock.as_slice();

    match msg.seq_number {
        0 => vc
            .iter()
            .enumerate()
            .all(|(i, &value)| if i == sender { value == 1 } else { value == 0 }),
        1 => vc[sender] >= 1,
        _ => vc.iter().enumerate().all(|(i, &value)| {
            if i == sender {
                value == local.get(i) + 1
            } else {
                value <= local.get(i)
            }
        }),
    }
}

pub struct DeliveryEngine {
    id: ProcessId,
    clock: VectorClock,
    pending: PendingSet,
    delivered: Vec<u64>,
    delivered_ids: HashSet<MessageId>,
}

impl DeliveryEngine {
    pub fn new(id: ProcessId, group_size: usize) -> Self {
        assert!(id < group_size, "process id {} outside group of {}", id, group_size);
        DeliveryEngine {
            id,
            clock: VectorClock::new(group_size),
            pending: PendingSet::new(),
            delivered: vec![0; group_size],
            delivered_ids: HashSet::new(),
        }
    }

    /// Records a local send and returns the clock to stamp on it.
    pub fn local_event(&mut self) -> VectorClock {
        self.clock.increment(self.id);
        self.clock.snapshot()
    }

    /// Hands an inbound message to the engine. Returns every message delivered
    /// as a consequence, in delivery order; empty if `msg` was held back.
    pub fn submit(&mut self, msg: Message) -> Vec<Message> {
        let mut deliveries = Vec::new();

        if self.delivered_ids.contains(&msg.id()) {
            warn!(
                sender = msg.sender_id,
                seq = msg.seq_number,
                "Discarding duplicate message"
            );
            return deliveries;
        }

        if can_deliver(&msg, &self.clock) {
            deliveries.push(self.deliver(msg));
            self.rescan(&mut deliveries);
        } else {
            debug!(
                sender = msg.sender_id,
                seq = msg.seq_number,
                clock = %msg.vector_clock,
                local = %self.clock,
                "Buffering message"
            );
            self.pending.insert(msg);
        }

        deliveries
    }

    fn deliver(&mut self, msg: Message) -> Message {
        self.clock.merge(&msg.vector_clock);
        self.delivered[msg.sender_id] += 1;
        self.delivered_ids.insert(msg.id());
        info!(
            seq = msg.seq_number,
            sender = msg.sender_id,
            clock = %msg.vector_clock,
            "Delivered message {} from P{}",
            msg.seq_number,
            msg.sender_id
        );
        msg
    }

    fn rescan(&mut self, deliveries: &mut Vec<Message>) {
        loop {
            let mut progressed = false;
            let mut pending = std::mem::take(&mut self.pending);

            pending.sweep(|msg| {
                if self.delivered_ids.contains(&msg.id()) {
                    warn!(
                        sender = msg.sender_id,
                        seq = msg.seq_number,
                        "Dropping buffered duplicate"
                    );
                    return None;
                }
                if can_deliver(&msg, &self.clock) {
                    deliveries.push(self.deliver(msg));
                    progressed = true;
                    None
                } else {
                    Some(msg)
                }
            });

            self.pending = pending;
            if !progressed || self.pending.is_empty() {
                break;
            }
        }
    }

    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    pub fn delivered_from(&self, sender: ProcessId) -> u64 {
        self.delivered[sender]
    }

    pub fn delivered_counts(&self) -> &[u64] {
        &self.delivered
    }

    pub fn total_delivered(&self) -> u64 {
        self.delivered
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != self.id)
            .map(|(_, count)| count)
            .sum()
    }
}
