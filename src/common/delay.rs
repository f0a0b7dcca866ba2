use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the waits a session takes: the pause before each send and the
/// simulated network jitter applied to inbound messages.
pub trait DelayProvider: Send {
    fn send_delay(&mut self) -> Duration;
    fn inbound_jitter(&mut self) -> Duration;
}

pub struct RandomDelay {
    rng: StdRng,
    send_ms: RangeInclusive<u64>,
    jitter_ms: RangeInclusive<u64>,
}

impl RandomDelay {
    pub fn new(send_ms: RangeInclusive<u64>, jitter_ms: RangeInclusive<u64>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RandomDelay {
            rng,
            send_ms,
            jitter_ms,
        }
    }
}

impl DelayProvider for RandomDelay {
    fn send_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.send_ms.clone()))
    }

    fn inbound_jitter(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.jitter_ms.clone()))
    }
}

/// Constant waits, for tests that should not depend on timing.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedDelay(pub Duration);

impl DelayProvider for FixedDelay {
    fn send_delay(&mut self) -> Duration {
        self.0
    }

    fn inbound_jitter(&mut self) -> Duration {
        self.0
    }
}
