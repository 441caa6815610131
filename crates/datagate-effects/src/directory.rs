//! In-process principal directory
//!
//! Answers reviewer membership and accessor verification from sets held in
//! memory. Deployments backed by an identity service implement the same
//! traits over their own lookups.

use async_trait::async_trait;
use datagate_core::effects::{AuthorizationEffects, VerificationEffects};
use datagate_core::{AccessResult, PrincipalId};
use std::collections::HashSet;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Directory {
    reviewers: HashSet<PrincipalId>,
    certified: HashSet<PrincipalId>,
    validated: HashSet<PrincipalId>,
}

/// Reviewer and verification lookups
#[derive(Debug, Default)]
pub struct DirectoryHandler {
    directory: RwLock<Directory>,
}

impl DirectoryHandler {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant reviewer standing
    pub async fn add_reviewer(&self, principal: PrincipalId) {
        self.directory.write().await.reviewers.insert(principal);
    }

    /// Mark a principal as certified
    pub async fn certify(&self, principal: PrincipalId) {
        self.directory.write().await.certified.insert(principal);
    }

    /// Mark a principal's profile as validated
    pub async fn validate_profile(&self, principal: PrincipalId) {
        self.directory.write().await.validated.insert(principal);
    }

    /// Withdraw certification
    pub async fn revoke_certification(&self, principal: PrincipalId) {
        self.directory.write().await.certified.remove(&principal);
    }
}

#[async_trait]
impl AuthorizationEffects for DirectoryHandler {
    async fn is_reviewer(&self, principal: PrincipalId) -> AccessResult<bool> {
        Ok(self.directory.read().await.reviewers.contains(&principal))
    }
}

#[async_trait]
impl VerificationEffects for DirectoryHandler {
    async fn are_certified(&self, principals: &[PrincipalId]) -> AccessResult<bool> {
        let directory = self.directory.read().await;
        Ok(principals.iter().all(|p| directory.certified.contains(p)))
    }

    async fn have_validated_profiles(&self, principals: &[PrincipalId]) -> AccessResult<bool> {
        let directory = self.directory.read().await;
        Ok(principals.iter().all(|p| directory.validated.contains(p)))
    }
}
