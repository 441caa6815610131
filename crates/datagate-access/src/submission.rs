//! Submission workflow
//!
//! A submission freezes a draft for review. Only a reviewer moves it out of
//! `SUBMITTED`; approving one writes the approval ledger, revokes what the
//! submission asked to revoke and turns the draft into a renewal template,
//! all in the same transaction.

use crate::approval::revoke_group_in;
use crate::changes::ChangeBatch;
use crate::draft::convert_to_renewal_in;
use crate::effects::DataAccessEffects;
use crate::guards::{check_accessor_policy, require_reviewer};
use datagate_core::errors::ensure;
use datagate_core::request::duplicate_accessor;
use datagate_core::store::{OpenSubmissionCount, StoreTransaction};
use datagate_core::{
    AccessError, AccessRequirement, AccessResult, ApprovalId, ChangeType, DataAccessRequest,
    Etag, NewApproval, NewSubmission, ObjectType, PrincipalId, RequestId, RequirementId,
    ResearchProject, Submission, SubmissionId, SubmissionState, SubmissionStatus,
    SubmissionSubscription, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A reviewer's decision on a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStateChange {
    /// Submission being reviewed
    pub submission_id: SubmissionId,
    /// `APPROVED` or `REJECTED`
    pub new_state: SubmissionState,
    /// Reason shown to the submitter on rejection
    pub rejected_reason: Option<String>,
    /// Etag the reviewer last saw, if they want the write guarded
    pub expected_etag: Option<Etag>,
}

impl SubmissionStateChange {
    /// Approve `submission_id`
    pub fn approve(submission_id: SubmissionId) -> Self {
        Self {
            submission_id,
            new_state: SubmissionState::Approved,
            rejected_reason: None,
            expected_etag: None,
        }
    }

    /// Reject `submission_id` with `reason`
    pub fn reject(submission_id: SubmissionId, reason: impl Into<String>) -> Self {
        Self {
            submission_id,
            new_state: SubmissionState::Rejected,
            rejected_reason: Some(reason.into()),
            expected_etag: None,
        }
    }

    /// Only apply if the submission still carries `etag`
    pub fn with_etag(mut self, etag: Etag) -> Self {
        self.expected_etag = Some(etag);
        self
    }
}

/// Where a user stands with respect to one requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirementStatus {
    /// Requirement
    pub requirement_id: RequirementId,
    /// The user holds at least one active approval
    pub is_approved: bool,
    /// Latest expiry among the user's active approvals
    pub expired_on: Option<Timestamp>,
    /// Latest submission of the user, for managed requirements
    pub current_submission_status: Option<SubmissionStatus>,
}

/// Draft, requirement and project a submission would be built from
struct Submittable {
    request: DataAccessRequest,
    requirement: AccessRequirement,
    project: ResearchProject,
    will_have_access: Vec<PrincipalId>,
}

/// Submission operations
pub struct SubmissionManager<E> {
    effects: Arc<E>,
}

impl<E: DataAccessEffects> SubmissionManager<E> {
    /// Create a manager over `effects`
    pub fn new(effects: Arc<E>) -> Self {
        Self { effects }
    }

    /// Submit the user's draft for review
    pub async fn create(
        &self,
        user: PrincipalId,
        request_id: RequestId,
        etag: Etag,
    ) -> AccessResult<Submission> {
        let checked_etag = etag.clone();
        let submittable = self
            .effects
            .transaction(move |txn| check_submittable(txn, user, request_id, &checked_etag))
            .await?;

        check_accessor_policy(
            self.effects.as_ref(),
            submittable.requirement.accessor_policy(),
            &submittable.will_have_access,
        )
        .await?;

        let now = self.effects.now().await;
        let submission = self
            .effects
            .transaction(move |txn| {
                // Re-validated so nothing changed while the policy was checked
                let Submittable {
                    request,
                    requirement,
                    project,
                    ..
                } = check_submittable(txn, user, request_id, &etag)?;

                let new = NewSubmission {
                    request_id: request.id,
                    access_requirement_id: requirement.id,
                    access_requirement_version: requirement.version_number,
                    research_project_snapshot: project,
                    submitted_by: user,
                    submitted_on: now,
                    duc_file_handle_id: request.duc_file_handle_id.clone(),
                    irb_file_handle_id: request.irb_file_handle_id.clone(),
                    attachments: request.attachments.clone(),
                    accessor_changes: request.accessor_changes.clone(),
                    is_renewal_submission: request.is_renewal(),
                    publication: request.publication().map(str::to_string),
                    summary_of_use: request.summary_of_use().map(str::to_string),
                };
                let submission = txn.insert_submission(new)?;
                txn.subscribe(SubmissionSubscription {
                    subscriber: user,
                    submission_id: submission.id,
                });
                Ok(submission)
            })
            .await?;

        info!(
            "Submission {} created by {} for requirement {} (version {})",
            submission.id,
            user,
            submission.access_requirement_id,
            submission.access_requirement_version
        );
        let mut batch = ChangeBatch::new(user, now);
        batch.record(ObjectType::DataAccessSubmission, submission.id, ChangeType::Create);
        batch.publish(self.effects.as_ref()).await;
        Ok(submission)
    }

    /// Withdraw a submission that has not been reviewed yet
    pub async fn cancel(
        &self,
        user: PrincipalId,
        submission_id: SubmissionId,
    ) -> AccessResult<SubmissionStatus> {
        let now = self.effects.now().await;

        let submission = self
            .effects
            .transaction(move |txn| {
                let current = txn.submission(submission_id)?;
                if current.submitted_by != user {
                    return Err(AccessError::unauthorized(
                        "Can only cancel submission you submitted.",
                    ));
                }
                ensure_transition(
                    &current,
                    SubmissionState::Cancelled,
                    "Cannot cancel a submission",
                )?;
                let expected = current.etag.clone();
                let cancelled = Submission {
                    state: SubmissionState::Cancelled,
                    modified_by: user,
                    modified_on: now,
                    ..current
                };
                txn.update_submission(cancelled, &expected)
            })
            .await?;

        info!("Submission {} cancelled by {}", submission_id, user);
        let mut batch = ChangeBatch::new(user, now);
        batch.record(
            ObjectType::DataAccessSubmissionStatus,
            submission_id,
            ChangeType::Update,
        );
        batch.publish(self.effects.as_ref()).await;
        Ok(submission.status())
    }

    /// Apply a reviewer's decision
    pub async fn update_status(
        &self,
        actor: PrincipalId,
        change: SubmissionStateChange,
    ) -> AccessResult<Submission> {
        if !matches!(
            change.new_state,
            SubmissionState::Approved | SubmissionState::Rejected
        ) {
            return Err(AccessError::validation(format!(
                "Do not support changing to state: {}",
                change.new_state
            )));
        }
        require_reviewer(self.effects.as_ref(), actor).await?;
        let now = self.effects.now().await;

        let (submission, revoked) = self
            .effects
            .transaction(move |txn| {
                let current = txn.submission(change.submission_id)?;
                ensure_transition(
                    &current,
                    change.new_state,
                    "Cannot change state of a submission",
                )?;
                if let Some(expected) = &change.expected_etag {
                    if &current.etag != expected {
                        return Err(AccessError::stale("Submission", current.id));
                    }
                }

                let mut revoked = Vec::new();
                if change.new_state == SubmissionState::Approved {
                    revoked = apply_approval(txn, &current, actor, now)?;
                }

                let expected = current.etag.clone();
                let updated = Submission {
                    state: change.new_state,
                    rejected_reason: match change.new_state {
                        SubmissionState::Rejected => change.rejected_reason,
                        _ => None,
                    },
                    modified_by: actor,
                    modified_on: now,
                    ..current
                };
                Ok((txn.update_submission(updated, &expected)?, revoked))
            })
            .await?;

        info!(
            "Submission {} moved to {} by {} ({} approvals revoked)",
            submission.id,
            submission.state,
            actor,
            revoked.len()
        );
        let mut batch = ChangeBatch::new(actor, now);
        batch.record(
            ObjectType::DataAccessSubmissionStatus,
            submission.id,
            ChangeType::Update,
        );
        batch.record_all(ObjectType::AccessApproval, revoked.iter(), ChangeType::Update);
        batch.publish(self.effects.as_ref()).await;
        Ok(submission)
    }

    /// Status of a submission, visible to its submitter and to reviewers
    pub async fn get_status(
        &self,
        user: PrincipalId,
        submission_id: SubmissionId,
    ) -> AccessResult<SubmissionStatus> {
        let submission = self
            .effects
            .transaction(move |txn| txn.submission(submission_id))
            .await?;
        if submission.submitted_by != user {
            require_reviewer(self.effects.as_ref(), user).await?;
        }
        Ok(submission.status())
    }

    /// Submissions for a requirement, optionally in one state
    pub async fn list_submissions(
        &self,
        actor: PrincipalId,
        requirement_id: RequirementId,
        state: Option<SubmissionState>,
    ) -> AccessResult<Vec<Submission>> {
        require_reviewer(self.effects.as_ref(), actor).await?;
        self.effects
            .transaction(move |txn| Ok(txn.submissions_for_requirement(requirement_id, state)))
            .await
    }

    /// Requirements with submissions awaiting review
    pub async fn list_open_submissions(
        &self,
        actor: PrincipalId,
    ) -> AccessResult<Vec<OpenSubmissionCount>> {
        require_reviewer(self.effects.as_ref(), actor).await?;
        self.effects
            .transaction(|txn| Ok(txn.open_submission_counts()))
            .await
    }

    /// Approval and submission standing of `user` for a requirement
    pub async fn access_requirement_status(
        &self,
        user: PrincipalId,
        requirement_id: RequirementId,
    ) -> AccessResult<AccessRequirementStatus> {
        let now = self.effects.now().await;
        self.effects
            .transaction(move |txn| {
                let requirement = txn.requirement(requirement_id)?;
                let approvals = txn.active_approvals_for(requirement_id, user, now);
                let expired_on = approvals.iter().filter_map(|a| a.expired_on).max();
                let current_submission_status = if requirement.is_managed() {
                    txn.latest_submission_for(user, requirement_id)
                        .map(|submission| submission.status())
                } else {
                    None
                };
                Ok(AccessRequirementStatus {
                    requirement_id,
                    is_approved: !approvals.is_empty(),
                    expired_on,
                    current_submission_status,
                })
            })
            .await
    }
}

/// Terminal states are final; leaving one is an invalid argument
fn ensure_transition(
    submission: &Submission,
    next: SubmissionState,
    action: &str,
) -> AccessResult<()> {
    if submission.state.can_transition_to(next) {
        Ok(())
    } else {
        Err(AccessError::validation(format!(
            "{action} with {} state.",
            submission.state
        )))
    }
}

/// Load and validate everything a submission of `request_id` needs
fn check_submittable(
    txn: &dyn StoreTransaction,
    user: PrincipalId,
    request_id: RequestId,
    etag: &Etag,
) -> AccessResult<Submittable> {
    let request = txn.request(request_id)?;
    if &request.etag != etag {
        return Err(AccessError::stale("Request", request_id));
    }
    if request.created_by != user {
        return Err(AccessError::unauthorized(
            "Only the owner can perform this action.",
        ));
    }

    let project_id = request
        .research_project_id
        .ok_or_else(|| AccessError::validation("The request has no research project."))?;
    let project = txn.research_project(project_id)?;
    let requirement = txn.requirement(request.access_requirement_id)?;
    let policy = requirement.managed_policy().ok_or_else(|| {
        AccessError::validation(
            "A Submission can only be created for an ManagedACTAccessRequirement.",
        )
    })?;

    ensure(
        !txn.has_submission_in_state(user, requirement.id, SubmissionState::Submitted),
        "A submission has been created. It has to be reviewed or cancelled before another submission can be created.",
    )?;

    if policy.duc_required {
        ensure(
            request.duc_file_handle_id.is_some(),
            "You must provide a Data Use Certification document.",
        )?;
    }
    if policy.irb_approval_required {
        ensure(
            request.irb_file_handle_id.is_some(),
            "You must provide an Institutional Review Board approval document.",
        )?;
    }
    if policy.are_other_attachments_required {
        ensure(
            !request.attachments.is_empty(),
            "You must provide the required attachment(s).",
        )?;
    }
    if policy.is_idu_required {
        ensure(
            project.details.has_idu(),
            "You must provide an intended data use statement.",
        )?;
    }
    ensure(
        !request.accessor_changes.is_empty(),
        "Must provide at least one accessor.",
    )?;

    if let Some(accessor) = duplicate_accessor(&request.accessor_changes) {
        return Err(AccessError::validation(format!(
            "Accessor {accessor} is listed more than once."
        )));
    }
    let will_have_access = request.accessors_gaining_access();
    let already_have_access: Vec<PrincipalId> = request
        .accessor_changes
        .iter()
        .filter(|change| change.change_type.requires_prior_sponsorship())
        .map(|change| change.user_id)
        .collect();

    ensure(
        will_have_access.contains(&user),
        "Submitter has to be an accessor.",
    )?;
    // One submission under review per accessor and requirement
    if let Some(accessor) = txn
        .accessors_under_review(requirement.id, &will_have_access)
        .first()
    {
        return Err(AccessError::validation(format!(
            "Accessor {accessor} is already part of a submission under review."
        )));
    }
    if !already_have_access.is_empty() {
        ensure(
            txn.have_approvals_submitted_by(&already_have_access, user, requirement.id),
            "Cannot revoke / renew access for accessor who didn't gain access via your submission.",
        )?;
    }

    Ok(Submittable {
        request,
        requirement,
        project,
        will_have_access,
    })
}

/// Ledger writes of an approval; returns the approvals revoked on the way
fn apply_approval(
    txn: &mut dyn StoreTransaction,
    submission: &Submission,
    actor: PrincipalId,
    now: Timestamp,
) -> AccessResult<Vec<ApprovalId>> {
    let requirement = txn.requirement(submission.access_requirement_id)?;
    let expired_on = requirement
        .managed_policy()
        .ok_or_else(|| {
            AccessError::internal(format!(
                "Access requirement {} is no longer managed.",
                requirement.id
            ))
        })?
        .expiration_from(now)?;

    let mut to_revoke = Vec::new();
    let mut grants = Vec::new();
    for change in &submission.accessor_changes {
        if change.change_type.requires_prior_sponsorship() {
            to_revoke.push(change.user_id);
        }
        if change.change_type.grants_access() {
            grants.push(NewApproval {
                requirement_id: submission.access_requirement_id,
                requirement_version: submission.access_requirement_version,
                submitter_id: submission.submitted_by,
                accessor_id: change.user_id,
                created_by: actor,
                created_on: now,
                expired_on,
            });
        }
    }

    let revoked = if to_revoke.is_empty() {
        Vec::new()
    } else {
        revoke_group_in(
            txn,
            submission.access_requirement_id,
            submission.submitted_by,
            Some(&to_revoke),
            actor,
            now,
        )
    };
    if !grants.is_empty() {
        txn.upsert_approvals(grants)?;
    }
    convert_to_renewal_in(txn, submission.request_id)?;
    Ok(revoked)
}
