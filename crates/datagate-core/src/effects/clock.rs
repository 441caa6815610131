//! Wall-clock time
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `datagate-effects` (system clock), `datagate-testkit` (manual clock)

use crate::Timestamp;
use async_trait::async_trait;

/// Source of the current time
#[async_trait]
pub trait PhysicalClockEffects: Send + Sync {
    /// Current wall-clock time
    async fn now(&self) -> Timestamp;
}

