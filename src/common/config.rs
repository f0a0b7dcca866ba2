use std::ops::RangeInclusive;
use std::time::Duration;

use super::clock::ProcessId;
use super::error::ConfigError;

pub const GROUP_SIZE: usize = 4;
pub const MESSAGE_QUOTA: u32 = 100;
pub const BASE_PORT: u16 = 8000;

/// Runtime settings for one member of the group.
#[derive(Clone, Debug)]
pub struct Config {
    pub id: ProcessId,
    pub group_size: usize,
    /// Host of each member, indexed by process id.
    pub hosts: Vec<String>,
    /// Member `i` listens on `base_port + i`.
    pub base_port: u16,
    pub quota: u32,
    pub simulate_delay: bool,
    pub debug: bool,
    pub send_delay_ms: RangeInclusive<u64>,
    pub jitter_ms: RangeInclusive<u64>,
    pub dial_attempts: u32,
    pub dial_backoff: Duration,
    /// Upper bound on an idle inbound wait once the send quota is spent.
    pub poll_interval: Duration,
    pub seed: Option<u64>,
}

impl Config {
    pub fn new(id: ProcessId) -> Result<Self, ConfigError> {
        let config = Config {
            id,
            group_size: GROUP_SIZE,
            hosts: vec!["localhost".to_string(); GROUP_SIZE],
            base_port: BASE_PORT,
            quota: MESSAGE_QUOTA,
            simulate_delay: false,
            debug: false,
            send_delay_ms: 1..=10,
            jitter_ms: 1..=5,
            dial_attempts: 5,
            dial_backoff: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            seed: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id >= self.group_size {
            return Err(ConfigError::InvalidProcessId {
                id: self.id,
                group_size: self.group_size,
            });
        }
        if self.hosts.len() != self.group_size {
            return Err(ConfigError::HostCount {
                expected: self.group_size,
                actual: self.hosts.len(),
            });
        }
        if self.quota == 0 {
            return Err(ConfigError::EmptyQuota);
        }
        if self.base_port as usize + self.group_size > u16::MAX as usize + 1 {
            return Err(ConfigError::PortRange {
                base: self.base_port,
                group_size: self.group_size,
            });
        }
        Ok(())
    }

    pub fn port_of(&self, id: ProcessId) -> u16 {
        self.base_port + id as u16
    }

    pub fn addr_of(&self, id: ProcessId) -> String {
        format!("{}:{}", self.hosts[id], self.port_of(id))
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port_of(self.id))
    }

    /// Every member except this one, in id order.
    pub fn others(&self) -> impl Iterator<Item = ProcessId> + '_ {
        (0..self.group_size).filter(move |&peer| peer != self.id)
    }
}
