//! Outbox delivery handler
//!
//! Records every message handed to it and assigns sequential message ids.
//! Deployments relay the outbox to their mail transport.

use async_trait::async_trait;
use datagate_core::effects::DeliveryEffects;
use datagate_core::{AccessResult, MessageId, PrincipalId, RenderedMessage};
use parking_lot::Mutex;

/// A message accepted by the outbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    /// Id assigned by the outbox
    pub message_id: MessageId,
    /// Recipient
    pub recipient: PrincipalId,
    /// Rendered content
    pub message: RenderedMessage,
}

#[derive(Debug, Default)]
struct Outbox {
    next_id: u64,
    messages: Vec<DeliveredMessage>,
}

/// In-process outbox
#[derive(Debug, Default)]
pub struct OutboxDeliveryHandler {
    outbox: Mutex<Outbox>,
}

impl OutboxDeliveryHandler {
    /// Create an empty outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far
    pub fn delivered(&self) -> Vec<DeliveredMessage> {
        self.outbox.lock().messages.clone()
    }

    /// Messages accepted for one recipient
    pub fn delivered_to(&self, recipient: PrincipalId) -> Vec<DeliveredMessage> {
        self.outbox
            .lock()
            .messages
            .iter()
            .filter(|m| m.recipient == recipient)
            .cloned()
            .collect()
    }

    /// Remove and return the accepted messages
    pub fn drain(&self) -> Vec<DeliveredMessage> {
        std::mem::take(&mut self.outbox.lock().messages)
    }
}

#[async_trait]
impl DeliveryEffects for OutboxDeliveryHandler {
    async fn deliver(
        &self,
        recipient: PrincipalId,
        message: &RenderedMessage,
    ) -> AccessResult<MessageId> {
        let mut outbox = self.outbox.lock();
        outbox.next_id += 1;
        let message_id = MessageId::new(outbox.next_id);
        outbox.messages.push(DeliveredMessage {
            message_id,
            recipient,
            message: message.clone(),
        });
        tracing::info!(
            "Queued message {} for {}: {}",
            message_id,
            recipient,
            message.subject
        );
        Ok(message_id)
    }
}
