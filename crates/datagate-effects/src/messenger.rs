//! Channel-backed change messenger
//!
//! Committed changes are pushed onto an unbounded tokio channel; the
//! receiving half is typically handed to a `NotificationWorker`.

use async_trait::async_trait;
use datagate_core::effects::ChangeMessengerEffects;
use datagate_core::ChangeMessage;
use tokio::sync::mpsc;

/// Publishes change messages onto a channel
#[derive(Debug, Clone)]
pub struct ChannelMessenger {
    sender: mpsc::UnboundedSender<ChangeMessage>,
}

impl ChannelMessenger {
    /// Create a messenger and the receiver its messages arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChangeMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ChangeMessengerEffects for ChannelMessenger {
    async fn publish(&self, messages: Vec<ChangeMessage>) {
        for message in messages {
            if self.sender.send(message).is_err() {
                tracing::warn!("Change stream closed; dropping change messages");
                return;
            }
        }
    }
}
