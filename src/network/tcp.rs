use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{codec, Inbound, PeerEvent, Transport};
use crate::broadcast::message::Message;
use crate::common::clock::ProcessId;
use crate::common::config::Config;
use crate::common::error::{ConnectError, TransportError};

/*
    Member i listens on base_port + i. It dials every member with a lower
    id and accepts one connection from every member with a higher id, so
    each pair shares exactly one stream. The dialing side opens with its
    own id as a big-endian u32. Each stream gets a reader task that
    decodes frames and forwards them to a single inbound queue, which
    keeps per-peer arrival order.
*/

pub struct TcpTransport {
    writers: HashMap<ProcessId, OwnedWriteHalf>,
    readers: HashMap<ProcessId, JoinHandle<()>>,
    inbox: UnboundedReceiver<Inbound>,
}

impl TcpTransport {
    pub async fn connect_all(config: &Config) -> Result<Self, ConnectError> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ConnectError::Bind { addr, source })?;

        let mut streams = HashMap::new();
        for peer in 0..config.id {
            let stream = dial(config, peer).await?;
            streams.insert(peer, stream);
        }
        while streams.len() < config.group_size - 1 {
            let (peer, stream) = accept(config, &listener).await?;
            if streams.contains_key(&peer) {
                return Err(ConnectError::Handshake(format!("duplicate connection from process {}", peer)));
            }
            streams.insert(peer, stream);
        }

        let (tx, inbox) = unbounded_channel();
        let mut writers = HashMap::new();
        let mut readers = HashMap::new();
        for (peer, stream) in streams {
            let (read_half, write_half) = stream.into_split();
            writers.insert(peer, write_half);
            readers.insert(
                peer,
                tokio::spawn(read_loop(peer, config.group_size, read_half, tx.clone())),
            );
        }

        Ok(TcpTransport {
            writers,
            readers,
            inbox,
        })
    }
}

async fn dial(config: &Config, peer: ProcessId) -> Result<TcpStream, ConnectError> {
    let addr = config.addr_of(peer);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match TcpStream::connect(&addr).await {
            Ok(mut stream) => {
                stream
                    .write_u32(config.id as u32)
                    .await
                    .map_err(|e| ConnectError::Handshake(format!("failed to send id to process {}: {}", peer, e)))?;
                let _ = stream.set_nodelay(true);
                info!(peer, "Connected to process {}", peer);
                return Ok(stream);
            }
            Err(source) if attempt >= config.dial_attempts => {
                return Err(ConnectError::Dial {
                    peer,
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                warn!(
                    peer,
                    attempt,
                    "Connection attempt {} to process {} failed: {}. Retrying...",
                    attempt,
                    peer,
                    e
                );
                tokio::time::sleep(config.dial_backoff).await;
            }
        }
    }
}

async fn accept(config: &Config, listener: &TcpListener) -> Result<(ProcessId, TcpStream), ConnectError> {
    let (mut stream, remote) = listener.accept().await.map_err(ConnectError::Accept)?;
    let peer = stream
        .read_u32()
        .await
        .map_err(|e| ConnectError::Handshake(format!("failed to read id from {}: {}", remote, e)))?
        as ProcessId;

    if peer <= config.id || peer >= config.group_size {
        return Err(ConnectError::Handshake(format!("invalid client id {} from {}", peer, remote)));
    }
    let _ = stream.set_nodelay(true);
    info!(peer, "Accepted connection from process {}", peer);
    Ok((peer, stream))
}

async fn read_loop(peer: ProcessId, group_size: usize, read_half: OwnedReadHalf, tx: UnboundedSender<Inbound>) {
    let mut reader = BufReader::new(read_half);
    loop {
        let event = match codec::read_message(&mut reader, group_size).await {
            Ok(Some(msg)) => PeerEvent::Message(msg),
            Ok(None) => PeerEvent::Closed,
            Err(e) => PeerEvent::Failed(e),
        };
        let last = !matches!(event, PeerEvent::Message(_));
        if tx.send(Inbound { peer, event }).is_err() || last {
            return;
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, peer: ProcessId, msg: &Message) -> Result<(), TransportError> {
        let writer = self.writers.get_mut(&peer).ok_or(TransportError::Closed(peer))?;
        codec::write_message(writer, msg).await
    }

    fn try_receive(&mut self) -> Option<Inbound> {
        self.inbox.try_recv().ok()
    }

    async fn receive_timeout(&mut self, wait: Duration) -> Option<Inbound> {
        tokio::time::timeout(wait, self.inbox.recv()).await.ok().flatten()
    }

    fn close(&mut self, peer: ProcessId) {
        self.writers.remove(&peer);
        if let Some(reader) = self.readers.remove(&peer) {
            reader.abort();
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        for reader in self.readers.values() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::session::BroadcastSession;
    use crate::common::clock::VectorClock;
    use crate::common::delay::RandomDelay;

    fn local_config(id: ProcessId, base_port: u16) -> Config {
        let mut config = Config::new(id).unwrap();
        config.hosts = vec!["127.0.0.1".to_string(); 4];
        config.base_port = base_port;
        config.dial_attempts = 50;
        config.dial_backoff = Duration::from_millis(50);
        config
    }

    async fn group(base_port: u16) -> Vec<TcpTransport> {
        let handles: Vec<_> = (0..4)
            .map(|id| {
                let config = local_config(id, base_port);
                tokio::spawn(async move { TcpTransport::connect_all(&config).await })
            })
            .collect();
        let mut transports = Vec::new();
        for handle in handles {
            transports.push(handle.await.unwrap().unwrap());
        }
        transports
    }

    async fn next_message(transport: &mut TcpTransport) -> (ProcessId, Message) {
        loop {
            let inbound = transport
                .receive_timeout(Duration::from_secs(5))
                .await
                .expect("timed out waiting for a frame");
            if let PeerEvent::Message(msg) = inbound.event {
                return (inbound.peer, msg);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_mesh_exchanges_frames() {
        let mut transports = group(47310).await;

        for sender in 0..4 {
            let msg = Message::new(sender, 0, VectorClock::from_slots({
                let mut slots = vec![0; 4];
                slots[sender] = 1;
                slots
            }));
            for peer in (0..4).filter(|&p| p != sender) {
                transports[sender].send(peer, &msg).await.unwrap();
            }
        }

        for (id, transport) in transports.iter_mut().enumerate() {
            let mut senders = Vec::new();
            for _ in 0..3 {
                let (peer, msg) = next_message(transport).await;
                assert_eq!(peer, msg.sender_id);
                assert_eq!(msg.payload, format!("Message from P{} #0", peer));
                senders.push(peer);
            }
            senders.sort();
            let expected: Vec<_> = (0..4).filter(|&p| p != id).collect();
            assert_eq!(senders, expected);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_closed_peer_is_reported() {
        let mut transports = group(47330).await;
        let last = transports.pop().unwrap();
        drop(last);

        for transport in transports.iter_mut() {
            let inbound = transport.receive_timeout(Duration::from_secs(5)).await.unwrap();
            assert_eq!(inbound.peer, 3);
            assert!(matches!(inbound.event, PeerEvent::Closed));
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_handshake_id() {
        let config = local_config(1, 47350);
        let server = tokio::spawn(async move { TcpTransport::connect_all(&config).await });

        // Process 1 first dials 0, so play process 0 and then send a bad id
        let listener = TcpListener::bind("127.0.0.1:47350").await.unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();
        assert_eq!(stream.read_u32().await.unwrap(), 1);

        let mut bad = loop {
            match TcpStream::connect("127.0.0.1:47351").await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        };
        bad.write_u32(9).await.unwrap();

        let err = server.await.unwrap().err().unwrap();
        assert!(matches!(err, ConnectError::Handshake(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tcp_sessions_finish() {
        let quota = 20;
        let handles: Vec<_> = (0..4)
            .map(|id| {
                let mut config = local_config(id, 47370);
                config.quota = quota;
                tokio::spawn(async move {
                    let transport = TcpTransport::connect_all(&config).await.unwrap();
                    let delay = RandomDelay::new(config.send_delay_ms.clone(), config.jitter_ms.clone(), Some(id as u64));
                    let mut session = BroadcastSession::new(config, transport, delay);
                    let summary = session.run().await;
                    (summary, session.engine.pending().len())
                })
            })
            .collect();

        for (id, handle) in handles.into_iter().enumerate() {
            let (summary, pending) = tokio::time::timeout(Duration::from_secs(60), handle)
                .await
                .expect("session did not finish")
                .unwrap();
            let summary = summary.unwrap();
            assert_eq!(summary.id, id);
            assert_eq!(summary.sent, quota);
            let expected: Vec<_> = (0..4).filter(|&p| p != id).map(|p| (p, quota as u64)).collect();
            assert_eq!(summary.delivered, expected);
            assert_eq!(pending, 0);
        }
    }
}
