use std::fmt;

use tracing::{debug, info, warn};

use super::engine::DeliveryEngine;
use super::message::Message;
use super::peers::Peers;
use crate::common::clock::ProcessId;
use crate::common::config::Config;
use crate::common::delay::DelayProvider;
use crate::common::error::SessionError;
use crate::network::{Inbound, PeerEvent, Transport};

/*
    A session alternates between producing its own broadcasts and feeding
    whatever has arrived into the delivery engine. Every send waits a
    short random interval first. The session is finished once it has sent
    its quota and delivered a full quota from every other member.

    The engine lives inside the session and is only touched from the
    session's task; inbound traffic reaches it through the transport's
    queue.
*/

const PENDING_PREVIEW: usize = 5;

pub struct BroadcastSession<T, D> {
    pub id: ProcessId,
    pub config: Config,
    pub engine: DeliveryEngine,
    pub peers: Peers,
    transport: T,
    delay: D,
    sent: u32,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Summary {
    pub id: ProcessId,
    pub sent: u32,
    /// Delivered count per other member, in id order.
    pub delivered: Vec<(ProcessId, u64)>,
}

impl<T: Transport, D: DelayProvider> BroadcastSession<T, D> {
    pub fn new(config: Config, transport: T, delay: D) -> Self {
        BroadcastSession {
            id: config.id,
            engine: DeliveryEngine::new(config.id, config.group_size),
            peers: Peers::new(config.others().collect()),
            config,
            transport,
            delay,
            sent: 0,
        }
    }

    pub async fn run(&mut self) -> Result<Summary, SessionError> {
        info!(
            id = self.id,
            delay = self.config.simulate_delay,
            "Process {} started",
            self.id
        );

        while !self.is_finished() {
            if self.sent < self.config.quota {
                tokio::time::sleep(self.delay.send_delay()).await;
                self.broadcast().await;
            }

            self.drain_inbound().await;

            if self.sent >= self.config.quota && !self.is_done() {
                if self.peers.all_closed() {
                    return Err(SessionError::PeersLost {
                        missing: self.missing(),
                    });
                }
                if let Some(inbound) = self.transport.receive_timeout(self.config.poll_interval).await {
                    self.handle_inbound(inbound).await;
                }
            }
        }

        let summary = self.summary();
        info!(id = self.id, sent = summary.sent, "Process {} finished", self.id);
        Ok(summary)
    }

    async fn broadcast(&mut self) {
        let vector_clock = self.engine.local_event();
        let msg = Message::new(self.id, self.sent, vector_clock);

        for peer in self.peers.open_members() {
            if let Err(e) = self.transport.send(peer, &msg).await {
                warn!(peer, error = %e, "Failed to send message to process {}", peer);
                self.close_peer(peer);
            }
        }

        info!(
            seq = msg.seq_number,
            clock = %msg.vector_clock,
            "Sent message {}",
            msg.seq_number
        );
        self.sent += 1;
    }

    async fn drain_inbound(&mut self) {
        while let Some(inbound) = self.transport.try_receive() {
            self.handle_inbound(inbound).await;
        }
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        let peer = inbound.peer;
        match inbound.event {
            PeerEvent::Message(msg) => {
                if !self.peers.is_open(peer) {
                    return;
                }
                if msg.sender_id != peer {
                    warn!(peer, sender = msg.sender_id, "Dropping message relayed under another sender id");
                    return;
                }
                if self.config.simulate_delay {
                    tokio::time::sleep(self.delay.inbound_jitter()).await;
                }
                self.submit(msg);
            }
            PeerEvent::Closed => {
                if self.close_peer(peer) {
                    warn!(peer, "Connection closed by process {}", peer);
                }
            }
            PeerEvent::Failed(e) => {
                warn!(peer, error = %e, "Error receiving message from process {}", peer);
                self.close_peer(peer);
            }
        }
    }

    fn submit(&mut self, msg: Message) {
        let before = self.engine.delivered_counts().to_vec();
        let delivered = self.engine.submit(msg);
        if !self.config.debug || delivered.is_empty() {
            return;
        }
        let mark = u64::from(self.config.quota) - 1;
        for peer in self.config.others() {
            if before[peer] < mark && self.engine.delivered_from(peer) >= mark {
                debug!(peer, "Process {} has received message {} from P{}", self.id, mark, peer);
            }
        }
    }

    fn close_peer(&mut self, peer: ProcessId) -> bool {
        self.transport.close(peer);
        self.peers.mark_closed(peer)
    }

    /// Termination check; logs the session state first when debugging.
    pub fn is_finished(&self) -> bool {
        if self.config.debug {
            self.dump_state();
        }
        self.is_done()
    }

    fn is_done(&self) -> bool {
        self.sent >= self.config.quota && self.missing() == 0
    }

    fn missing(&self) -> u64 {
        let quota = u64::from(self.config.quota);
        self.config
            .others()
            .map(|peer| quota.saturating_sub(self.engine.delivered_from(peer)))
            .sum()
    }

    fn dump_state(&self) {
        let counts: Vec<String> = self
            .config
            .others()
            .map(|peer| format!("P{}={}", peer, self.engine.delivered_from(peer)))
            .collect();
        debug!(
            "Process {} checking termination: sent={}, delivered {}",
            self.id,
            self.sent,
            counts.join(", ")
        );

        let pending = self.engine.pending();
        if pending.is_empty() {
            return;
        }
        debug!("Process {} has {} messages in buffer", self.id, pending.len());
        for (i, msg) in pending.iter().take(PENDING_PREVIEW).enumerate() {
            debug!(
                "  Buffer[{}]: From P{}, seq={}, VC={}",
                i, msg.sender_id, msg.seq_number, msg.vector_clock
            );
        }
        if pending.len() > PENDING_PREVIEW {
            debug!("  ... and {} more messages", pending.len() - PENDING_PREVIEW);
        }
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn summary(&self) -> Summary {
        Summary {
            id: self.id,
            sent: self.sent,
            delivered: self
                .config
                .others()
                .map(|peer| (peer, self.engine.delivered_from(peer)))
                .collect(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "======= SUMMARY =======")?;
        writeln!(f, "Process {} final state:", self.id)?;
        writeln!(f, "Messages sent: {}", self.sent)?;
        for (peer, count) in &self.delivered {
            writeln!(f, "Messages delivered from P{}: {}", peer, count)?;
        }
        write!(f, "======================")
    }
}
