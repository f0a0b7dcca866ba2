pub mod codec;
pub mod memory;
pub mod tcp;

use std::time::Duration;

use async_trait::async_trait;

use crate::broadcast::message::Message;
use crate::common::clock::ProcessId;
use crate::common::error::TransportError;

/*
    Links between members are point-to-point and FIFO: messages sent by
    one member to another arrive in the order they were sent, or the link
    is reported closed and stays closed. There is no ordering between
    different links; a receiver sees the inbound streams of all peers
    interleaved in whatever order they happen to arrive. Causal order is
    restored above this layer by the delivery engine.
*/

#[derive(Debug)]
pub enum PeerEvent {
    Message(Message),
    Closed,
    Failed(TransportError),
}

#[derive(Debug)]
pub struct Inbound {
    pub peer: ProcessId,
    pub event: PeerEvent,
}

#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, peer: ProcessId, msg: &Message) -> Result<(), TransportError>;

    /// Returns the next inbound event if one is already waiting.
    fn try_receive(&mut self) -> Option<Inbound>;

    /// Waits up to `wait` for an inbound event from any peer.
    async fn receive_timeout(&mut self, wait: Duration) -> Option<Inbound>;

    /// Stops sending to and receiving from `peer` for the rest of the run.
    fn close(&mut self, peer: ProcessId);
}
