//! Change publication
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `datagate-effects` (`ChannelMessenger`), `datagate-testkit` (`RecordingMessenger`)

use crate::change::ChangeMessage;
use async_trait::async_trait;

/// Publishes committed changes
///
/// Publication is fire-and-forget: it runs after the write committed and a
/// failure to publish never undoes the write.
#[async_trait]
pub trait ChangeMessengerEffects: Send + Sync {
    /// Publish messages in order
    async fn publish(&self, messages: Vec<ChangeMessage>);
}
