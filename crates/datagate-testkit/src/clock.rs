//! Manually advanced clock

use async_trait::async_trait;
use chrono::Duration;
use datagate_core::effects::PhysicalClockEffects;
use datagate_core::Timestamp;
use parking_lot::Mutex;

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Clock frozen at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`
    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Current reading
    pub fn current(&self) -> Timestamp {
        *self.now.lock()
    }
}

#[async_trait]
impl PhysicalClockEffects for ManualClock {
    async fn now(&self) -> Timestamp {
        self.current()
    }
}
