/// Only every `THROTTLE_FACTOR`th heartbeat polls the remote.
pub const THROTTLE_FACTOR: u32 = 4;

/// Modulo counter gating remote polls against the host heartbeat.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    counter: u32,
    factor: u32,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(THROTTLE_FACTOR)
    }
}

impl PollScheduler {
    pub fn new(factor: u32) -> Self {
        Self {
            counter: 1,
            factor: factor.max(1),
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Advance one heartbeat; true when this tick should poll.
    pub fn should_poll_now(&mut self) -> bool {
        if self.counter >= self.factor {
            self.counter = 1;
            true
        } else {
            self.counter += 1;
            false
        }
    }
}
