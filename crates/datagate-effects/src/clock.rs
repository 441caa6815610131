//! System clock handler

use async_trait::async_trait;
use chrono::Utc;
use datagate_core::effects::PhysicalClockEffects;
use datagate_core::Timestamp;

/// Real clock for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClockHandler;

impl SystemClockHandler {
    /// Create a new system clock handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalClockEffects for SystemClockHandler {
    #[allow(clippy::disallowed_methods)]
    async fn now(&self) -> Timestamp {
        // Utc::now() is allowed in the handler that implements the clock effect.
        Utc::now()
    }
}
