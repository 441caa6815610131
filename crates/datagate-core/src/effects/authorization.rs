//! Principal standing checks
//!
//! - **Category**: Application Effect
//! - **Implementation**: `datagate-effects` (`DirectoryHandler`)
//!
//! General ACL evaluation lives outside the workflow; these traits expose only
//! the answers the workflow needs.

use crate::errors::AccessResult;
use crate::identifiers::PrincipalId;
use async_trait::async_trait;

/// Reviewer membership
#[async_trait]
pub trait AuthorizationEffects: Send + Sync {
    /// Whether `principal` may review submissions and manage approvals
    async fn is_reviewer(&self, principal: PrincipalId) -> AccessResult<bool>;
}

/// Accessor verification status
#[async_trait]
pub trait VerificationEffects: Send + Sync {
    /// Whether every principal has passed certification
    async fn are_certified(&self, principals: &[PrincipalId]) -> AccessResult<bool>;

    /// Whether every principal has a validated profile
    async fn have_validated_profiles(&self, principals: &[PrincipalId]) -> AccessResult<bool>;
}
