use crate::common::clock::{ProcessId, VectorClock};

/*
    A message m carries the identity of its sender, the sender-local
    sequence number (starting at 0) and the sender's vector clock as of
    the send. The clock is the sender's local clock copied just before
    the send, with the sender's own slot replaced by its post-increment
    value. The payload is opaque to delivery; it only shows up in logs.
*/

pub type SeqNumber = u32;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    pub sender_id: ProcessId,
    pub seq_number: SeqNumber,
    pub vector_clock: VectorClock,
    pub payload: String,
}

/// Identity of a broadcast within the group.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MessageId {
    pub sender_id: ProcessId,
    pub seq_number: SeqNumber,
}

impl Message {
    pub fn new(sender_id: ProcessId, seq_number: SeqNumber, vector_clock: VectorClock) -> Self {
        Message {
            sender_id,
            seq_number,
            vector_clock,
            payload: format!("Message from P{} #{}", sender_id, seq_number),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn id(&self) -> MessageId {
        MessageId {
            sender_id: self.sender_id,
            seq_number: self.seq_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_payload() {
        let msg = Message::new(3, 17, VectorClock::from_slots(vec![0, 0, 0, 18]));

        assert_eq!(msg.payload, "Message from P3 #17");
        assert_eq!(msg.id(), MessageId { sender_id: 3, seq_number: 17 });
    }
}
