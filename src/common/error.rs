use std::io;

use thiserror::Error;

use super::clock::ProcessId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("process id {id} is out of range, expected 0..{group_size}")]
    InvalidProcessId { id: ProcessId, group_size: usize },
    #[error("expected {expected} hosts, got {actual}")]
    HostCount { expected: usize, actual: usize },
    #[error("message quota must be at least 1")]
    EmptyQuota,
    #[error("base port {base} leaves no room for {group_size} processes")]
    PortRange { base: u16, group_size: usize },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("connection to process {0} is closed")]
    Closed(ProcessId),
    #[error("malformed frame: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("failed to connect to process {peer} after {attempts} attempts: {source}")]
    Dial {
        peer: ProcessId,
        attempts: u32,
        source: io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(io::Error),
    #[error("handshake failed: {0}")]
    Handshake(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("all peers disconnected with {missing} deliveries outstanding")]
    PeersLost { missing: u64 },
}
