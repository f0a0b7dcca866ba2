use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::{Inbound, PeerEvent, Transport};
use crate::broadcast::message::Message;
use crate::common::clock::ProcessId;
use crate::common::error::TransportError;

/// Channel-backed network for running a whole group inside one process.
pub struct MemoryNetwork {
    senders: Vec<UnboundedSender<Inbound>>,
    receivers: Vec<Option<UnboundedReceiver<Inbound>>>,
}

impl MemoryNetwork {
    pub fn new(group_size: usize) -> Self {
        let (senders, receivers) = (0..group_size)
            .map(|_| {
                let (tx, rx) = unbounded_channel();
                (tx, Some(rx))
            })
            .unzip();
        MemoryNetwork { senders, receivers }
    }

    /// Hands out the endpoint of member `id`. Each endpoint can be taken once.
    pub fn endpoint(&mut self, id: ProcessId) -> Option<MemoryTransport> {
        let inbox = self.receivers.get_mut(id)?.take()?;
        let links = self
            .senders
            .iter()
            .enumerate()
            .filter(|&(peer, _)| peer != id)
            .map(|(peer, tx)| (peer, tx.clone()))
            .collect();
        Some(MemoryTransport { id, inbox, links })
    }
}

pub struct MemoryTransport {
    id: ProcessId,
    inbox: UnboundedReceiver<Inbound>,
    links: HashMap<ProcessId, UnboundedSender<Inbound>>,
}

impl MemoryTransport {
    fn notify_closed(&self, link: &UnboundedSender<Inbound>) {
        let _ = link.send(Inbound {
            peer: self.id,
            event: PeerEvent::Closed,
        });
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, peer: ProcessId, msg: &Message) -> Result<(), TransportError> {
        let link = self.links.get(&peer).ok_or(TransportError::Closed(peer))?;
        link.send(Inbound {
            peer: self.id,
            event: PeerEvent::Message(msg.clone()),
        })
        .map_err(|_| TransportError::Closed(peer))
    }

    fn try_receive(&mut self) -> Option<Inbound> {
        self.inbox.try_recv().ok()
    }

    async fn receive_timeout(&mut self, wait: Duration) -> Option<Inbound> {
        tokio::time::timeout(wait, self.inbox.recv()).await.ok().flatten()
    }

    fn close(&mut self, peer: ProcessId) {
        if let Some(link) = self.links.remove(&peer) {
            self.notify_closed(&link);
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        for link in self.links.values() {
            self.notify_closed(link);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::VectorClock;

    #[tokio::test]
    async fn test_links_are_fifo_per_sender() {
        let mut network = MemoryNetwork::new(3);
        let mut a = network.endpoint(0).unwrap();
        let mut b = network.endpoint(1).unwrap();
        let mut c = network.endpoint(2).unwrap();

        for seq in 0..3 {
            let msg = Message::new(0, seq, VectorClock::new(3));
            a.send(2, &msg).await.unwrap();
        }
        b.send(2, &Message::new(1, 0, VectorClock::new(3))).await.unwrap();

        let mut from_a = Vec::new();
        while let Some(inbound) = c.try_receive() {
            if let PeerEvent::Message(msg) = inbound.event {
                if inbound.peer == 0 {
                    from_a.push(msg.seq_number);
                }
            }
        }
        assert_eq!(from_a, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_endpoint_taken_once() {
        let mut network = MemoryNetwork::new(2);

        assert!(network.endpoint(1).is_some());
        assert!(network.endpoint(1).is_none());
        assert!(network.endpoint(5).is_none());
    }

    #[tokio::test]
    async fn test_drop_reports_closed_to_peers() {
        let mut network = MemoryNetwork::new(2);
        let a = network.endpoint(0).unwrap();
        let mut b = network.endpoint(1).unwrap();

        drop(a);

        let inbound = b.receive_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(inbound.peer, 0);
        assert!(matches!(inbound.event, PeerEvent::Closed));
        let err = b.send(0, &Message::new(1, 0, VectorClock::new(2))).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed(0)));
    }

    #[tokio::test]
    async fn test_close_stops_sends() {
        let mut network = MemoryNetwork::new(2);
        let mut a = network.endpoint(0).unwrap();
        let _b = network.endpoint(1).unwrap();

        a.close(1);

        let err = a.send(1, &Message::new(0, 0, VectorClock::new(2))).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed(1)));
    }
}
