//! Deployment environment
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `datagate-effects` (`ConfiguredEnvironmentHandler`)

use crate::identifiers::PrincipalId;
use crate::notification::Feature;
use async_trait::async_trait;

/// Facts about the running deployment
#[async_trait]
pub trait EnvironmentEffects: Send + Sync {
    /// `Some(true)` on production, `Some(false)` elsewhere, `None` when undetermined
    async fn is_production_stack(&self) -> Option<bool>;

    /// Whether `principal` receives messages on every stack
    async fn is_in_testing_group(&self, principal: PrincipalId) -> bool;

    /// Whether `feature` is switched on
    async fn is_feature_enabled(&self, feature: Feature) -> bool;
}
