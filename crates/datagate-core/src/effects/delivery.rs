//! Outbound message transport
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `datagate-effects` (`OutboxDeliveryHandler`)

use crate::errors::AccessResult;
use crate::identifiers::{MessageId, PrincipalId};
use crate::notification::RenderedMessage;
use async_trait::async_trait;

/// Hands rendered messages to the transport
#[async_trait]
pub trait DeliveryEffects: Send + Sync {
    /// Send `message` to `recipient` and return the transport's message id
    async fn deliver(
        &self,
        recipient: PrincipalId,
        message: &RenderedMessage,
    ) -> AccessResult<MessageId>;
}
