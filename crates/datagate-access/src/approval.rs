//! Approval ledger
//!
//! Approvals are append-mostly rows keyed by (requirement, version,
//! submitter, accessor). Revocation flips `APPROVED` rows to `REVOKED` and
//! never deletes them; every row actually revoked produces one
//! `AccessApproval` UPDATE change after commit, which drives the
//! notification engine.

use crate::changes::ChangeBatch;
use crate::effects::DataAccessEffects;
use crate::guards::{check_accessor_policy, require_reviewer};
use datagate_core::errors::ensure;
use datagate_core::store::StoreTransaction;
use datagate_core::{
    AccessApproval, AccessApprovalInfo, AccessError, AccessResult, ApprovalId, ApprovalState,
    ChangeType, Etag, NewApproval, ObjectType, PrincipalId, RequirementId, Timestamp,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Input of [`AccessApprovalManager::create_approval`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    /// Requirement being satisfied
    pub requirement_id: RequirementId,
    /// Pinned version; defaults to the current one
    pub requirement_version: Option<u64>,
    /// Principal receiving access; forced to the caller for self-sign variants
    pub accessor_id: Option<PrincipalId>,
    /// Sponsor; defaults to the accessor
    pub submitter_id: Option<PrincipalId>,
    /// Expiry, if any
    pub expired_on: Option<Timestamp>,
}

impl ApprovalRequest {
    /// Request with every optional field unset
    pub fn new(requirement_id: RequirementId) -> Self {
        Self {
            requirement_id,
            requirement_version: None,
            accessor_id: None,
            submitter_id: None,
            expired_on: None,
        }
    }

    /// Grant to `accessor`
    pub fn for_accessor(mut self, accessor: PrincipalId) -> Self {
        self.accessor_id = Some(accessor);
        self
    }

    /// Sponsored by `submitter`
    pub fn submitted_by(mut self, submitter: PrincipalId) -> Self {
        self.submitter_id = Some(submitter);
        self
    }

    /// Pin a requirement version
    pub fn at_version(mut self, version: u64) -> Self {
        self.requirement_version = Some(version);
        self
    }

    /// Expire at `expired_on`
    pub fn expiring(mut self, expired_on: Timestamp) -> Self {
        self.expired_on = Some(expired_on);
        self
    }
}

/// Approval ledger operations
pub struct AccessApprovalManager<E> {
    effects: Arc<E>,
}

impl<E> Clone for AccessApprovalManager<E> {
    fn clone(&self) -> Self {
        Self {
            effects: Arc::clone(&self.effects),
        }
    }
}

impl<E: DataAccessEffects> AccessApprovalManager<E> {
    /// Create a manager over `effects`
    pub fn new(effects: Arc<E>) -> Self {
        Self { effects }
    }

    /// Record an approval
    ///
    /// Self-sign variants always grant to `actor`; any other variant needs a
    /// reviewer. Lock and post-message requirements never take approvals.
    pub async fn create_approval(
        &self,
        actor: PrincipalId,
        request: ApprovalRequest,
    ) -> AccessResult<AccessApproval> {
        let requirement_id = request.requirement_id;
        let requirement = self
            .effects
            .transaction(move |txn| txn.requirement(requirement_id))
            .await?;

        if !requirement.accepts_approvals() {
            return Err(AccessError::validation(format!(
                "Cannot apply an approval to a {}",
                requirement.kind.kind_name()
            )));
        }

        let accessor = if requirement.is_self_signable() {
            actor
        } else {
            require_reviewer(self.effects.as_ref(), actor).await?;
            request
                .accessor_id
                .ok_or_else(|| AccessError::validation("The accessorId is required."))?
        };
        ensure(
            !accessor.is_anonymous(),
            "Cannot create an AccessApproval for anonymous user.",
        )?;
        check_accessor_policy(
            self.effects.as_ref(),
            requirement.accessor_policy(),
            &[accessor],
        )
        .await?;

        let now = self.effects.now().await;
        let grant = NewApproval {
            requirement_id,
            requirement_version: request
                .requirement_version
                .unwrap_or(requirement.version_number),
            submitter_id: request.submitter_id.unwrap_or(accessor),
            accessor_id: accessor,
            created_by: actor,
            created_on: now,
            expired_on: request.expired_on,
        };

        let mut stored = self
            .effects
            .transaction(move |txn| txn.upsert_approvals(vec![grant]))
            .await?;
        let approval = stored
            .pop()
            .ok_or_else(|| AccessError::internal("The approval was not stored."))?;

        info!(
            "Approval {} granted to {} for requirement {} by {}",
            approval.id, accessor, requirement_id, actor
        );
        Ok(approval)
    }

    /// Revoke every `APPROVED` row `accessor` holds for a requirement
    pub async fn revoke_access_approvals(
        &self,
        actor: PrincipalId,
        requirement_id: RequirementId,
        accessor: PrincipalId,
    ) -> AccessResult<Vec<ApprovalId>> {
        require_reviewer(self.effects.as_ref(), actor).await?;
        let now = self.effects.now().await;

        let revoked = self
            .effects
            .transaction(move |txn| {
                let ids = txn.approved_ids_for_accessor(requirement_id, accessor);
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(txn.revoke_batch(&ids, actor, now))
            })
            .await?;

        self.publish_revocations(actor, now, &revoked).await;
        Ok(revoked)
    }

    /// Revoke the `APPROVED` rows sponsored by `submitter`
    ///
    /// With `accessors` set only those accessors lose access, and an empty
    /// list revokes nothing.
    pub async fn revoke_group(
        &self,
        actor: PrincipalId,
        requirement_id: RequirementId,
        submitter: PrincipalId,
        accessors: Option<Vec<PrincipalId>>,
    ) -> AccessResult<Vec<ApprovalId>> {
        require_reviewer(self.effects.as_ref(), actor).await?;
        let now = self.effects.now().await;

        let revoked = self
            .effects
            .transaction(move |txn| {
                Ok(revoke_group_in(
                    txn,
                    requirement_id,
                    submitter,
                    accessors.as_deref(),
                    actor,
                    now,
                ))
            })
            .await?;

        self.publish_revocations(actor, now, &revoked).await;
        Ok(revoked)
    }

    /// Revoke one batch of approvals that expired in `[expired_after, now]`
    ///
    /// Returns how many rows were actually revoked.
    pub async fn revoke_expired_approvals(
        &self,
        actor: PrincipalId,
        expired_after: Timestamp,
        max_batch_size: usize,
    ) -> AccessResult<usize> {
        ensure(max_batch_size > 0, "The maxBatchSize must be greater than 0.")?;
        let now = self.effects.now().await;
        ensure(
            expired_after < now,
            "The expiredAfter must be a value in the past.",
        )?;
        require_reviewer(self.effects.as_ref(), actor).await?;

        let revoked = self
            .effects
            .transaction(move |txn| {
                let ids = txn.expired_approval_ids(expired_after, now, max_batch_size);
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(txn.revoke_batch(&ids, actor, now))
            })
            .await?;

        if !revoked.is_empty() {
            info!(
                "Revoked {} expired approvals (expired after {})",
                revoked.len(),
                expired_after
            );
        }
        self.publish_revocations(actor, now, &revoked).await;
        Ok(revoked.len())
    }

    /// Revoke a single approval, guarded by its etag
    ///
    /// Revoking a row that is already revoked returns it unchanged.
    pub async fn revoke_approval(
        &self,
        actor: PrincipalId,
        approval_id: ApprovalId,
        expected: Etag,
    ) -> AccessResult<AccessApproval> {
        require_reviewer(self.effects.as_ref(), actor).await?;
        let now = self.effects.now().await;

        let (approval, changed) = self
            .effects
            .transaction(move |txn| {
                let current = txn.approval(approval_id)?;
                if current.state == ApprovalState::Revoked {
                    return Ok((current, false));
                }
                let revoked = AccessApproval {
                    state: ApprovalState::Revoked,
                    modified_by: actor,
                    modified_on: now,
                    ..current
                };
                Ok((txn.update_approval(revoked, &expected)?, true))
            })
            .await?;

        if changed {
            self.publish_revocations(actor, now, &[approval.id]).await;
        } else {
            debug!("Approval {} was already revoked", approval_id);
        }
        Ok(approval)
    }

    /// Whether `accessor` currently holds access for the requirement
    pub async fn has_access(
        &self,
        requirement_id: RequirementId,
        accessor: PrincipalId,
    ) -> AccessResult<bool> {
        let now = self.effects.now().await;
        self.effects
            .transaction(move |txn| {
                Ok(!txn
                    .active_approvals_for(requirement_id, accessor, now)
                    .is_empty())
            })
            .await
    }

    /// Approval by id
    pub async fn get_approval(&self, approval_id: ApprovalId) -> AccessResult<AccessApproval> {
        self.effects
            .transaction(move |txn| txn.approval(approval_id))
            .await
    }

    /// Whether `user` holds access, per requirement
    pub async fn approval_info(
        &self,
        user: PrincipalId,
        requirement_ids: Vec<RequirementId>,
    ) -> AccessResult<Vec<AccessApprovalInfo>> {
        let now = self.effects.now().await;
        self.effects
            .transaction(move |txn| {
                Ok(requirement_ids
                    .into_iter()
                    .map(|requirement_id| AccessApprovalInfo {
                        user_id: user,
                        requirement_id,
                        has_access_approval: !txn
                            .active_approvals_for(requirement_id, user, now)
                            .is_empty(),
                    })
                    .collect())
            })
            .await
    }

    async fn publish_revocations(&self, actor: PrincipalId, at: Timestamp, ids: &[ApprovalId]) {
        let mut batch = ChangeBatch::new(actor, at);
        batch.record_all(ObjectType::AccessApproval, ids.iter(), ChangeType::Update);
        batch.publish(self.effects.as_ref()).await;
    }
}

/// Revoke the `APPROVED` rows `submitter` sponsored, inside a transaction
pub(crate) fn revoke_group_in(
    txn: &mut dyn StoreTransaction,
    requirement_id: RequirementId,
    submitter: PrincipalId,
    accessors: Option<&[PrincipalId]>,
    actor: PrincipalId,
    now: Timestamp,
) -> Vec<ApprovalId> {
    if accessors.is_some_and(|accessors| accessors.is_empty()) {
        return Vec::new();
    }
    let ids = txn.approved_ids_for_submitter(requirement_id, submitter, accessors);
    if ids.is_empty() {
        return Vec::new();
    }
    txn.revoke_batch(&ids, actor, now)
}
