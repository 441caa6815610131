//! Transactional store contracts
//!
//! Every mutating workflow operation is one call to
//! [`AccessStore::transaction`]: the closure reads, validates and writes
//! through a [`StoreTransaction`], and the store commits only if the closure
//! returns `Ok`. Any `Err` discards every write made by the closure.
//!
//! Update methods take the etag the caller last saw and fail with
//! `Conflict` when the stored etag differs. The store assigns ids and fresh
//! etags; callers never fabricate them.

use crate::approval::{AccessApproval, NewApproval};
use crate::errors::AccessResult;
use crate::identifiers::{
    ApprovalId, Etag, NotificationId, PrincipalId, RequestId, RequirementId, ResearchProjectId,
    SubmissionId,
};
use crate::notification::{DataAccessNotification, NotificationKey, NotificationRecord, NotificationType};
use crate::request::{DataAccessRequest, NewRequest};
use crate::requirement::AccessRequirement;
use crate::research_project::ResearchProject;
use crate::submission::{NewSubmission, Submission, SubmissionState, SubmissionSubscription};
use crate::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Number of submissions awaiting review for one requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSubmissionCount {
    /// Requirement
    pub requirement_id: RequirementId,
    /// Submissions in `SUBMITTED`
    pub open_submissions: usize,
}

/// Exclusive hold on one notification dedup key
///
/// The lock is released when the value is dropped.
pub struct RowLock {
    _guard: Box<dyn Send + Sync>,
}

impl RowLock {
    /// Wrap a guard whose drop releases the lock
    pub fn new<G: Send + Sync + 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for RowLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RowLock")
    }
}

/// Entry point to the store
#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Run `operation` atomically
    async fn transaction<R, F>(&self, operation: F) -> AccessResult<R>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> AccessResult<R> + Send,
        R: Send;

    /// Acquire the row lock of a notification dedup key
    async fn lock_notification(&self, key: NotificationKey) -> RowLock;
}

/// Table operations available inside a transaction
pub trait StoreTransaction {
    // ---------------------------------------------------------------------
    // Requirement catalog
    // ---------------------------------------------------------------------

    /// Latest version of a requirement
    fn requirement(&self, id: RequirementId) -> AccessResult<AccessRequirement>;

    /// A specific version of a requirement
    fn requirement_version(&self, id: RequirementId, version: u64)
        -> AccessResult<AccessRequirement>;

    /// Store a new version; the catalog assigns the version number and etag
    fn put_requirement(&mut self, requirement: AccessRequirement)
        -> AccessResult<AccessRequirement>;

    // ---------------------------------------------------------------------
    // Research projects
    // ---------------------------------------------------------------------

    /// Project by id
    fn research_project(&self, id: ResearchProjectId) -> AccessResult<ResearchProject>;

    /// The project `owner` created for `requirement_id`
    fn research_project_for(
        &self,
        owner: PrincipalId,
        requirement_id: RequirementId,
    ) -> Option<ResearchProject>;

    /// Store an unsaved project; assigns id and etag
    fn insert_research_project(&mut self, project: ResearchProject)
        -> AccessResult<ResearchProject>;

    /// Replace a saved project if its etag is still `expected`
    fn update_research_project(
        &mut self,
        project: ResearchProject,
        expected: &Etag,
    ) -> AccessResult<ResearchProject>;

    // ---------------------------------------------------------------------
    // Drafts
    // ---------------------------------------------------------------------

    /// Draft by id
    fn request(&self, id: RequestId) -> AccessResult<DataAccessRequest>;

    /// The open draft `owner` holds for `requirement_id`
    fn open_request_for(
        &self,
        owner: PrincipalId,
        requirement_id: RequirementId,
    ) -> Option<DataAccessRequest>;

    /// Store a new draft; assigns id and etag
    fn insert_request(&mut self, request: NewRequest) -> AccessResult<DataAccessRequest>;

    /// Replace a draft if its etag is still `expected`; assigns a fresh etag
    fn update_request(
        &mut self,
        request: DataAccessRequest,
        expected: &Etag,
    ) -> AccessResult<DataAccessRequest>;

    // ---------------------------------------------------------------------
    // Submissions
    // ---------------------------------------------------------------------

    /// Submission by id
    fn submission(&self, id: SubmissionId) -> AccessResult<Submission>;

    /// Whether `submitter` submitted a submission in `state` for
    /// `requirement_id`
    fn has_submission_in_state(
        &self,
        submitter: PrincipalId,
        requirement_id: RequirementId,
        state: SubmissionState,
    ) -> bool;

    /// The `accessors` that a `SUBMITTED` submission for `requirement_id`
    /// would grant access to, in the order given
    fn accessors_under_review(
        &self,
        requirement_id: RequirementId,
        accessors: &[PrincipalId],
    ) -> Vec<PrincipalId>;

    /// Most recent submission by `submitter` for `requirement_id`
    fn latest_submission_for(
        &self,
        submitter: PrincipalId,
        requirement_id: RequirementId,
    ) -> Option<Submission>;

    /// Submissions for a requirement, optionally filtered by state, oldest first
    fn submissions_for_requirement(
        &self,
        requirement_id: RequirementId,
        state: Option<SubmissionState>,
    ) -> Vec<Submission>;

    /// Requirements with submissions awaiting review
    fn open_submission_counts(&self) -> Vec<OpenSubmissionCount>;

    /// Store a new submission in `SUBMITTED`; assigns id and etag
    fn insert_submission(&mut self, submission: NewSubmission) -> AccessResult<Submission>;

    /// Replace a submission if its etag is still `expected`; assigns a fresh etag
    fn update_submission(
        &mut self,
        submission: Submission,
        expected: &Etag,
    ) -> AccessResult<Submission>;

    /// Record a status subscription
    fn subscribe(&mut self, subscription: SubmissionSubscription);

    /// Subscribers of a submission's status
    fn subscribers(&self, submission_id: SubmissionId) -> Vec<PrincipalId>;

    // ---------------------------------------------------------------------
    // Approval ledger
    // ---------------------------------------------------------------------

    /// Approval by id
    fn approval(&self, id: ApprovalId) -> AccessResult<AccessApproval>;

    /// Upsert grants
    ///
    /// A grant whose key matches an `APPROVED` row refreshes that row's
    /// expiry and audit fields; otherwise a new `APPROVED` row is inserted.
    fn upsert_approvals(&mut self, approvals: Vec<NewApproval>)
        -> AccessResult<Vec<AccessApproval>>;

    /// Replace an approval if its etag is still `expected`; assigns a fresh etag
    fn update_approval(
        &mut self,
        approval: AccessApproval,
        expected: &Etag,
    ) -> AccessResult<AccessApproval>;

    /// `APPROVED` rows held by `accessor` for `requirement_id`, any version
    fn approved_ids_for_accessor(
        &self,
        requirement_id: RequirementId,
        accessor: PrincipalId,
    ) -> Vec<ApprovalId>;

    /// `APPROVED` rows sponsored by `submitter`, optionally restricted to
    /// `accessors`
    fn approved_ids_for_submitter(
        &self,
        requirement_id: RequirementId,
        submitter: PrincipalId,
        accessors: Option<&[PrincipalId]>,
    ) -> Vec<ApprovalId>;

    /// `APPROVED` rows with `expired_after <= expired_on <= now`, ordered by
    /// expiry then id, at most `limit`
    fn expired_approval_ids(
        &self,
        expired_after: Timestamp,
        now: Timestamp,
        limit: usize,
    ) -> Vec<ApprovalId>;

    /// Revoke the listed rows that are still `APPROVED`
    ///
    /// Returns the ids actually revoked; rows already revoked are skipped.
    fn revoke_batch(
        &mut self,
        ids: &[ApprovalId],
        revoked_by: PrincipalId,
        now: Timestamp,
    ) -> Vec<ApprovalId>;

    /// Whether every accessor has at least one row (any state) sponsored by
    /// `submitter` for `requirement_id`
    fn have_approvals_submitted_by(
        &self,
        accessors: &[PrincipalId],
        submitter: PrincipalId,
        requirement_id: RequirementId,
    ) -> bool;

    /// Approvals of `accessor` for `requirement_id` that are active at `now`
    fn active_approvals_for(
        &self,
        requirement_id: RequirementId,
        accessor: PrincipalId,
        now: Timestamp,
    ) -> Vec<AccessApproval>;

    /// Whether `submitter` holds an `APPROVED` row for themselves expiring
    /// strictly after `instant`, or never expiring
    fn has_submitter_approval_expiring_after(
        &self,
        requirement_id: RequirementId,
        submitter: PrincipalId,
        instant: Timestamp,
    ) -> bool;

    /// `APPROVED` self-sponsored rows expiring in `[from, until)` with no
    /// `notification_type` row for the submitter sent at or after
    /// `sent_since`, ordered by id, at most `limit`
    fn approvals_pending_reminder(
        &self,
        notification_type: NotificationType,
        from: Timestamp,
        until: Timestamp,
        sent_since: Timestamp,
        limit: usize,
    ) -> Vec<ApprovalId>;

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    /// Row for a dedup key
    fn notification(&self, key: &NotificationKey) -> Option<DataAccessNotification>;

    /// Insert a row; `Conflict` if the key already has one
    fn insert_notification(
        &mut self,
        record: NotificationRecord,
    ) -> AccessResult<DataAccessNotification>;

    /// Overwrite an existing row in place
    fn update_notification(
        &mut self,
        id: NotificationId,
        record: NotificationRecord,
    ) -> AccessResult<DataAccessNotification>;

    /// Rows for a requirement addressed to any of `recipients`
    fn notifications_for_recipients(
        &self,
        requirement_id: RequirementId,
        recipients: &[PrincipalId],
    ) -> Vec<DataAccessNotification>;
}
