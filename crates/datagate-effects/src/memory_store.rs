//! In-memory transactional store
//!
//! Tables live behind one `tokio::sync::Mutex`. A transaction works on a copy
//! of the tables and swaps it in only when the closure succeeds, so a failed
//! operation leaves no partial writes behind. Notification row locks are
//! per-key async mutexes held independently of transactions.
//!
//! Suitable for tests and single-process deployments.

use async_trait::async_trait;
use datagate_core::store::{AccessStore, OpenSubmissionCount, RowLock, StoreTransaction};
use datagate_core::{
    AccessApproval, AccessError, AccessRequirement, AccessResult, ApprovalId, ApprovalState,
    DataAccessNotification, DataAccessRequest, Etag, NewApproval, NewRequest, NewSubmission,
    NotificationId, NotificationKey, NotificationRecord, NotificationType, PrincipalId, RequestId,
    RequirementId, ResearchProject, ResearchProjectId, Submission, SubmissionId, SubmissionState,
    SubmissionSubscription, Timestamp,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type RowLockTable = Arc<parking_lot::Mutex<HashMap<NotificationKey, Arc<Mutex<()>>>>>;

#[derive(Debug, Clone, Default)]
struct Tables {
    requirements: BTreeMap<RequirementId, Vec<AccessRequirement>>,
    research_projects: BTreeMap<ResearchProjectId, ResearchProject>,
    requests: BTreeMap<RequestId, DataAccessRequest>,
    submissions: BTreeMap<SubmissionId, Submission>,
    subscriptions: Vec<SubmissionSubscription>,
    approvals: BTreeMap<ApprovalId, AccessApproval>,
    notifications: BTreeMap<NotificationId, DataAccessNotification>,
    sequence: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// In-memory implementation of [`AccessStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessStore {
    tables: Arc<Mutex<Tables>>,
    row_locks: RowLockTable,
}

impl MemoryAccessStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn transaction<R, F>(&self, operation: F) -> AccessResult<R>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> AccessResult<R> + Send,
        R: Send,
    {
        let mut committed = self.tables.lock().await;
        let mut working = committed.clone();
        let mut txn = MemoryTransaction {
            tables: &mut working,
        };
        let result = operation(&mut txn)?;
        *committed = working;
        Ok(result)
    }

    async fn lock_notification(&self, key: NotificationKey) -> RowLock {
        let lock = {
            let mut locks = self.row_locks.lock();
            Arc::clone(locks.entry(key).or_default())
        };
        RowLock::new(KeyLockGuard {
            key,
            table: Arc::clone(&self.row_locks),
            guard: Some(lock.lock_owned().await),
        })
    }
}

/// Held row lock; the last holder removes the key's entry
struct KeyLockGuard {
    key: NotificationKey,
    table: RowLockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        // New requesters clone the entry under the table lock, so nobody can
        // pick it up between the release and the removal below
        let mut locks = self.table.lock();
        self.guard.take();
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

struct MemoryTransaction<'a> {
    tables: &'a mut Tables,
}

impl StoreTransaction for MemoryTransaction<'_> {
    // -- requirement catalog ------------------------------------------------

    fn requirement(&self, id: RequirementId) -> AccessResult<AccessRequirement> {
        self.tables
            .requirements
            .get(&id)
            .and_then(|versions| versions.last())
            .cloned()
            .ok_or_else(|| AccessError::not_found(format!("Access requirement {id} does not exist.")))
    }

    fn requirement_version(
        &self,
        id: RequirementId,
        version: u64,
    ) -> AccessResult<AccessRequirement> {
        self.tables
            .requirements
            .get(&id)
            .and_then(|versions| versions.iter().find(|r| r.version_number == version))
            .cloned()
            .ok_or_else(|| {
                AccessError::not_found(format!(
                    "Access requirement {id} version {version} does not exist."
                ))
            })
    }

    fn put_requirement(
        &mut self,
        mut requirement: AccessRequirement,
    ) -> AccessResult<AccessRequirement> {
        let versions = self.tables.requirements.entry(requirement.id).or_default();
        requirement.version_number = versions.last().map_or(1, |r| r.version_number + 1);
        requirement.etag = Etag::generate();
        versions.push(requirement.clone());
        Ok(requirement)
    }

    // -- research projects --------------------------------------------------

    fn research_project(&self, id: ResearchProjectId) -> AccessResult<ResearchProject> {
        self.tables
            .research_projects
            .get(&id)
            .cloned()
            .ok_or_else(|| AccessError::not_found(format!("Research project {id} does not exist.")))
    }

    fn research_project_for(
        &self,
        owner: PrincipalId,
        requirement_id: RequirementId,
    ) -> Option<ResearchProject> {
        self.tables
            .research_projects
            .values()
            .find(|p| p.created_by == owner && p.access_requirement_id == requirement_id)
            .cloned()
    }

    fn insert_research_project(
        &mut self,
        mut project: ResearchProject,
    ) -> AccessResult<ResearchProject> {
        if project.id.is_some() {
            return Err(AccessError::internal("Research project is already persisted."));
        }
        let id = ResearchProjectId::new(self.tables.next_id());
        project.id = Some(id);
        project.etag = Some(Etag::generate());
        self.tables.research_projects.insert(id, project.clone());
        Ok(project)
    }

    fn update_research_project(
        &mut self,
        mut project: ResearchProject,
        expected: &Etag,
    ) -> AccessResult<ResearchProject> {
        let id = project
            .id
            .ok_or_else(|| AccessError::internal("Research project has no id."))?;
        let stored = self
            .tables
            .research_projects
            .get_mut(&id)
            .ok_or_else(|| AccessError::not_found(format!("Research project {id} does not exist.")))?;
        if stored.etag.as_ref() != Some(expected) {
            return Err(AccessError::stale("Research project", id));
        }
        project.etag = Some(Etag::generate());
        *stored = project.clone();
        Ok(project)
    }

    // -- drafts -------------------------------------------------------------

    fn request(&self, id: RequestId) -> AccessResult<DataAccessRequest> {
        self.tables
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| AccessError::not_found(format!("Request {id} does not exist.")))
    }

    fn open_request_for(
        &self,
        owner: PrincipalId,
        requirement_id: RequirementId,
    ) -> Option<DataAccessRequest> {
        self.tables
            .requests
            .values()
            .find(|r| r.created_by == owner && r.access_requirement_id == requirement_id)
            .cloned()
    }

    fn insert_request(&mut self, request: NewRequest) -> AccessResult<DataAccessRequest> {
        if self
            .open_request_for(request.created_by, request.access_requirement_id)
            .is_some()
        {
            return Err(AccessError::conflict(format!(
                "A request for access requirement {} already exists.",
                request.access_requirement_id
            )));
        }
        let id = RequestId::new(self.tables.next_id());
        let stored = DataAccessRequest::from_new(id, Etag::generate(), request);
        self.tables.requests.insert(id, stored.clone());
        Ok(stored)
    }

    fn update_request(
        &mut self,
        mut request: DataAccessRequest,
        expected: &Etag,
    ) -> AccessResult<DataAccessRequest> {
        let id = request.id;
        let stored = self
            .tables
            .requests
            .get_mut(&id)
            .ok_or_else(|| AccessError::not_found(format!("Request {id} does not exist.")))?;
        if &stored.etag != expected {
            return Err(AccessError::stale("Request", id));
        }
        request.etag = Etag::generate();
        *stored = request.clone();
        Ok(request)
    }

    // -- submissions --------------------------------------------------------

    fn submission(&self, id: SubmissionId) -> AccessResult<Submission> {
        self.tables
            .submissions
            .get(&id)
            .cloned()
            .ok_or_else(|| AccessError::not_found(format!("Submission {id} does not exist.")))
    }

    fn has_submission_in_state(
        &self,
        submitter: PrincipalId,
        requirement_id: RequirementId,
        state: SubmissionState,
    ) -> bool {
        self.tables.submissions.values().any(|s| {
            s.access_requirement_id == requirement_id
                && s.state == state
                && s.submitted_by == submitter
        })
    }

    fn accessors_under_review(
        &self,
        requirement_id: RequirementId,
        accessors: &[PrincipalId],
    ) -> Vec<PrincipalId> {
        let open: Vec<&Submission> = self
            .tables
            .submissions
            .values()
            .filter(|s| {
                s.access_requirement_id == requirement_id && s.state == SubmissionState::Submitted
            })
            .collect();
        accessors
            .iter()
            .copied()
            .filter(|accessor| open.iter().any(|s| s.grants_access_to(*accessor)))
            .collect()
    }

    fn latest_submission_for(
        &self,
        submitter: PrincipalId,
        requirement_id: RequirementId,
    ) -> Option<Submission> {
        self.tables
            .submissions
            .values()
            .rev()
            .find(|s| s.submitted_by == submitter && s.access_requirement_id == requirement_id)
            .cloned()
    }

    fn submissions_for_requirement(
        &self,
        requirement_id: RequirementId,
        state: Option<SubmissionState>,
    ) -> Vec<Submission> {
        self.tables
            .submissions
            .values()
            .filter(|s| s.access_requirement_id == requirement_id)
            .filter(|s| state.map_or(true, |wanted| s.state == wanted))
            .cloned()
            .collect()
    }

    fn open_submission_counts(&self) -> Vec<OpenSubmissionCount> {
        let mut counts: BTreeMap<RequirementId, usize> = BTreeMap::new();
        for submission in self.tables.submissions.values() {
            if submission.state == SubmissionState::Submitted {
                *counts.entry(submission.access_requirement_id).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(requirement_id, open_submissions)| OpenSubmissionCount {
                requirement_id,
                open_submissions,
            })
            .collect()
    }

    fn insert_submission(&mut self, submission: NewSubmission) -> AccessResult<Submission> {
        let id = SubmissionId::new(self.tables.next_id());
        let stored = Submission::from_new(id, Etag::generate(), submission);
        self.tables.submissions.insert(id, stored.clone());
        Ok(stored)
    }

    fn update_submission(
        &mut self,
        mut submission: Submission,
        expected: &Etag,
    ) -> AccessResult<Submission> {
        let id = submission.id;
        let stored = self
            .tables
            .submissions
            .get_mut(&id)
            .ok_or_else(|| AccessError::not_found(format!("Submission {id} does not exist.")))?;
        if &stored.etag != expected {
            return Err(AccessError::stale("Submission", id));
        }
        submission.etag = Etag::generate();
        *stored = submission.clone();
        Ok(submission)
    }

    fn subscribe(&mut self, subscription: SubmissionSubscription) {
        if !self.tables.subscriptions.contains(&subscription) {
            self.tables.subscriptions.push(subscription);
        }
    }

    fn subscribers(&self, submission_id: SubmissionId) -> Vec<PrincipalId> {
        self.tables
            .subscriptions
            .iter()
            .filter(|s| s.submission_id == submission_id)
            .map(|s| s.subscriber)
            .collect()
    }

    // -- approval ledger ----------------------------------------------------

    fn approval(&self, id: ApprovalId) -> AccessResult<AccessApproval> {
        self.tables
            .approvals
            .get(&id)
            .cloned()
            .ok_or_else(|| AccessError::not_found(format!("Access approval {id} does not exist.")))
    }

    fn upsert_approvals(
        &mut self,
        approvals: Vec<NewApproval>,
    ) -> AccessResult<Vec<AccessApproval>> {
        let mut stored = Vec::with_capacity(approvals.len());
        for approval in approvals {
            let key = approval.key();
            let existing = self
                .tables
                .approvals
                .values_mut()
                .find(|row| row.state == ApprovalState::Approved && row.key() == key);
            let row = match existing {
                Some(row) => {
                    row.expired_on = approval.expired_on;
                    row.modified_by = approval.created_by;
                    row.modified_on = approval.created_on;
                    row.etag = Etag::generate();
                    row.clone()
                }
                None => {
                    let id = ApprovalId::new(self.tables.next_id());
                    let row = AccessApproval::from_new(id, Etag::generate(), approval);
                    self.tables.approvals.insert(id, row.clone());
                    row
                }
            };
            stored.push(row);
        }
        Ok(stored)
    }

    fn update_approval(
        &mut self,
        mut approval: AccessApproval,
        expected: &Etag,
    ) -> AccessResult<AccessApproval> {
        let id = approval.id;
        let stored = self
            .tables
            .approvals
            .get_mut(&id)
            .ok_or_else(|| AccessError::not_found(format!("Access approval {id} does not exist.")))?;
        if &stored.etag != expected {
            return Err(AccessError::stale("Access approval", id));
        }
        approval.etag = Etag::generate();
        *stored = approval.clone();
        Ok(approval)
    }

    fn approved_ids_for_accessor(
        &self,
        requirement_id: RequirementId,
        accessor: PrincipalId,
    ) -> Vec<ApprovalId> {
        self.tables
            .approvals
            .values()
            .filter(|a| {
                a.state == ApprovalState::Approved
                    && a.requirement_id == requirement_id
                    && a.accessor_id == accessor
            })
            .map(|a| a.id)
            .collect()
    }

    fn approved_ids_for_submitter(
        &self,
        requirement_id: RequirementId,
        submitter: PrincipalId,
        accessors: Option<&[PrincipalId]>,
    ) -> Vec<ApprovalId> {
        self.tables
            .approvals
            .values()
            .filter(|a| {
                a.state == ApprovalState::Approved
                    && a.requirement_id == requirement_id
                    && a.submitter_id == submitter
                    && accessors.map_or(true, |ids| ids.contains(&a.accessor_id))
            })
            .map(|a| a.id)
            .collect()
    }

    fn expired_approval_ids(
        &self,
        expired_after: Timestamp,
        now: Timestamp,
        limit: usize,
    ) -> Vec<ApprovalId> {
        let mut expired: Vec<(Timestamp, ApprovalId)> = self
            .tables
            .approvals
            .values()
            .filter(|a| a.state == ApprovalState::Approved)
            .filter_map(|a| a.expired_on.map(|expired_on| (expired_on, a.id)))
            .filter(|(expired_on, _)| *expired_on >= expired_after && *expired_on <= now)
            .collect();
        expired.sort();
        expired.into_iter().take(limit).map(|(_, id)| id).collect()
    }

    fn revoke_batch(
        &mut self,
        ids: &[ApprovalId],
        revoked_by: PrincipalId,
        now: Timestamp,
    ) -> Vec<ApprovalId> {
        let mut revoked = Vec::new();
        for id in ids {
            if let Some(row) = self.tables.approvals.get_mut(id) {
                if row.state == ApprovalState::Approved {
                    row.state = ApprovalState::Revoked;
                    row.modified_by = revoked_by;
                    row.modified_on = now;
                    row.etag = Etag::generate();
                    revoked.push(*id);
                }
            }
        }
        revoked
    }

    fn have_approvals_submitted_by(
        &self,
        accessors: &[PrincipalId],
        submitter: PrincipalId,
        requirement_id: RequirementId,
    ) -> bool {
        accessors.iter().all(|accessor| {
            self.tables.approvals.values().any(|a| {
                a.requirement_id == requirement_id
                    && a.submitter_id == submitter
                    && a.accessor_id == *accessor
            })
        })
    }

    fn active_approvals_for(
        &self,
        requirement_id: RequirementId,
        accessor: PrincipalId,
        now: Timestamp,
    ) -> Vec<AccessApproval> {
        self.tables
            .approvals
            .values()
            .filter(|a| {
                a.requirement_id == requirement_id && a.accessor_id == accessor && a.is_active(now)
            })
            .cloned()
            .collect()
    }

    fn has_submitter_approval_expiring_after(
        &self,
        requirement_id: RequirementId,
        submitter: PrincipalId,
        instant: Timestamp,
    ) -> bool {
        self.tables.approvals.values().any(|a| {
            a.state == ApprovalState::Approved
                && a.requirement_id == requirement_id
                && a.submitter_id == submitter
                && a.accessor_id == submitter
                && a.expired_on.map_or(true, |e| e > instant)
        })
    }

    fn approvals_pending_reminder(
        &self,
        notification_type: NotificationType,
        from: Timestamp,
        until: Timestamp,
        sent_since: Timestamp,
        limit: usize,
    ) -> Vec<ApprovalId> {
        self.tables
            .approvals
            .values()
            .filter(|a| a.state == ApprovalState::Approved && a.submitter_id == a.accessor_id)
            .filter(|a| a.expired_on.is_some_and(|e| e >= from && e < until))
            .filter(|a| {
                let key = NotificationKey {
                    notification_type,
                    requirement_id: a.requirement_id,
                    recipient_id: a.submitter_id,
                };
                self.notification(&key)
                    .map_or(true, |sent| sent.sent_on() < sent_since)
            })
            .map(|a| a.id)
            .take(limit)
            .collect()
    }

    // -- notifications ------------------------------------------------------

    fn notification(&self, key: &NotificationKey) -> Option<DataAccessNotification> {
        self.tables
            .notifications
            .values()
            .find(|n| n.key() == *key)
            .cloned()
    }

    fn insert_notification(
        &mut self,
        record: NotificationRecord,
    ) -> AccessResult<DataAccessNotification> {
        let key = record.key();
        if self.notification(&key).is_some() {
            return Err(AccessError::conflict(format!(
                "A {} notification for requirement {} and recipient {} already exists.",
                key.notification_type, key.requirement_id, key.recipient_id
            )));
        }
        let id = NotificationId::new(self.tables.next_id());
        let stored = DataAccessNotification { id, record };
        self.tables.notifications.insert(id, stored.clone());
        Ok(stored)
    }

    fn update_notification(
        &mut self,
        id: NotificationId,
        record: NotificationRecord,
    ) -> AccessResult<DataAccessNotification> {
        let stored = self
            .tables
            .notifications
            .get_mut(&id)
            .ok_or_else(|| AccessError::not_found(format!("Notification {id} does not exist.")))?;
        if stored.key() != record.key() {
            return Err(AccessError::internal(format!(
                "Notification {id} cannot change its dedup key."
            )));
        }
        stored.record = record;
        Ok(stored.clone())
    }

    fn notifications_for_recipients(
        &self,
        requirement_id: RequirementId,
        recipients: &[PrincipalId],
    ) -> Vec<DataAccessNotification> {
        self.tables
            .notifications
            .values()
            .filter(|n| {
                n.record.requirement_id == requirement_id
                    && recipients.contains(&n.record.recipient_id)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};
    use datagate_core::{ManagedActPolicy, RequirementKind};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn grant(accessor: u64, expired_on: Option<Timestamp>) -> NewApproval {
        NewApproval {
            requirement_id: RequirementId::new(1),
            requirement_version: 1,
            submitter_id: PrincipalId::new(accessor),
            accessor_id: PrincipalId::new(accessor),
            created_by: PrincipalId::new(99),
            created_on: now(),
            expired_on,
        }
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back() {
        let store = MemoryAccessStore::new();
        let result: AccessResult<()> = store
            .transaction(|txn| {
                txn.upsert_approvals(vec![grant(1, None)])?;
                Err(AccessError::validation("abort"))
            })
            .await;
        assert!(result.is_err());

        let ids = store
            .transaction(|txn| Ok(txn.approved_ids_for_accessor(RequirementId::new(1), PrincipalId::new(1))))
            .await
            .unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn requirement_versions_are_kept() {
        let store = MemoryAccessStore::new();
        let requirement = AccessRequirement::new(
            RequirementId::new(5),
            "managed",
            RequirementKind::ManagedAct(ManagedActPolicy::default()),
        );
        let (first, second, latest, pinned) = store
            .transaction(|txn| {
                let first = txn.put_requirement(requirement.clone())?;
                let second = txn.put_requirement(requirement.clone())?;
                Ok((
                    first,
                    second,
                    txn.requirement(RequirementId::new(5))?,
                    txn.requirement_version(RequirementId::new(5), 1)?,
                ))
            })
            .await
            .unwrap();
        assert_eq!(first.version_number, 1);
        assert_eq!(second.version_number, 2);
        assert_eq!(latest, second);
        assert_eq!(pinned, first);
    }

    #[tokio::test]
    async fn upsert_refreshes_approved_rows_and_reinserts_revoked_keys() {
        let store = MemoryAccessStore::new();
        let later = now() + Duration::days(30);
        let (first, refreshed, after_revoke) = store
            .transaction(|txn| {
                let first = txn.upsert_approvals(vec![grant(1, None)])?.remove(0);
                let refreshed = txn.upsert_approvals(vec![grant(1, Some(later))])?.remove(0);
                txn.revoke_batch(&[first.id], PrincipalId::new(99), now());
                let after_revoke = txn.upsert_approvals(vec![grant(1, None)])?.remove(0);
                Ok((first, refreshed, after_revoke))
            })
            .await
            .unwrap();
        assert_eq!(first.id, refreshed.id);
        assert_eq!(refreshed.expired_on, Some(later));
        assert_ne!(after_revoke.id, first.id);
    }

    #[tokio::test]
    async fn stale_etag_is_a_conflict() {
        let store = MemoryAccessStore::new();
        let err = store
            .transaction(|txn| {
                let row = txn.upsert_approvals(vec![grant(1, None)])?.remove(0);
                let updated = txn.update_approval(row.clone(), &row.etag)?;
                assert_ne!(updated.etag, row.etag);
                txn.update_approval(row.clone(), &row.etag)
            })
            .await
            .unwrap_err();
        assert_matches!(err, AccessError::Conflict { .. });
    }

    #[tokio::test]
    async fn revoke_batch_skips_revoked_rows() {
        let store = MemoryAccessStore::new();
        let (first, second) = store
            .transaction(|txn| {
                let rows = txn.upsert_approvals(vec![grant(1, None), grant(2, None)])?;
                let ids: Vec<ApprovalId> = rows.iter().map(|r| r.id).collect();
                let first = txn.revoke_batch(&ids[..1], PrincipalId::new(99), now());
                let second = txn.revoke_batch(&ids, PrincipalId::new(99), now());
                Ok((first, second))
            })
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn expired_ids_respect_window_order_and_limit() {
        let store = MemoryAccessStore::new();
        let ids = store
            .transaction(|txn| {
                txn.upsert_approvals(vec![
                    grant(1, Some(now() - Duration::days(2))),
                    grant(2, Some(now() - Duration::days(5))),
                    grant(3, Some(now() - Duration::days(90))),
                    grant(4, Some(now() + Duration::days(1))),
                    grant(5, None),
                ])?;
                Ok(txn.expired_approval_ids(now() - Duration::days(60), now(), 10))
            })
            .await
            .unwrap();
        let accessors: Vec<u64> = store
            .transaction(move |txn| {
                ids.iter()
                    .map(|id| txn.approval(*id).map(|a| a.accessor_id.value()))
                    .collect()
            })
            .await
            .unwrap();
        assert_eq!(accessors, vec![2, 1]);
    }

    #[tokio::test]
    async fn duplicate_notification_key_is_a_conflict() {
        let store = MemoryAccessStore::new();
        let record = NotificationRecord {
            notification_type: NotificationType::Revocation,
            requirement_id: RequirementId::new(1),
            recipient_id: PrincipalId::new(2),
            access_approval_id: ApprovalId::new(3),
            message_id: None,
            sent_on: now(),
        };
        let err = store
            .transaction(move |txn| {
                txn.insert_notification(record.clone())?;
                txn.insert_notification(record)
            })
            .await
            .unwrap_err();
        assert_matches!(err, AccessError::Conflict { .. });
    }

    #[tokio::test]
    async fn row_locks_are_exclusive_per_key() {
        let store = MemoryAccessStore::new();
        let key = NotificationKey {
            notification_type: NotificationType::Revocation,
            requirement_id: RequirementId::new(1),
            recipient_id: PrincipalId::new(2),
        };
        let other = NotificationKey {
            recipient_id: PrincipalId::new(3),
            ..key
        };
        let held = store.lock_notification(key).await;
        let _independent = store.lock_notification(other).await;

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let _lock = contender.lock_notification(key).await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(held);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn row_lock_entries_are_pruned_after_release() {
        let store = MemoryAccessStore::new();
        let key = NotificationKey {
            notification_type: NotificationType::Revocation,
            requirement_id: RequirementId::new(1),
            recipient_id: PrincipalId::new(2),
        };

        let held = store.lock_notification(key).await;
        assert_eq!(store.row_locks.lock().len(), 1);

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let _lock = contender.lock_notification(key).await;
        });
        tokio::task::yield_now().await;
        drop(held);
        // Still wanted by the waiter
        waiter.await.unwrap();
        assert!(store.row_locks.lock().is_empty());

        for recipient in 0..50 {
            let _lock = store
                .lock_notification(NotificationKey {
                    recipient_id: PrincipalId::new(recipient),
                    ..key
                })
                .await;
        }
        assert!(store.row_locks.lock().is_empty());
    }
}
