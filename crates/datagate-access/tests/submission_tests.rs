//! Submission workflow: creation checks, review and the ledger writes of an
//! approval

use assert_matches::assert_matches;
use chrono::Duration;
use datagate_access::{
    AccessApprovalManager, DraftManager, ResearchProjectManager, SubmissionManager,
    SubmissionStateChange,
};
use datagate_core::config::DraftConfig;
use datagate_core::{
    AccessError, AccessRequirement, AccessorChange, AccessorChangeType, ApprovalState,
    ChangeType, DataAccessRequest, Etag, ObjectType, PrincipalId, RequirementId,
    ResearchProject, SubmissionState,
};
use datagate_effects::AccessEffectSystem;
use datagate_testkit::*;

const MANAGED: RequirementId = RequirementId(10);

struct Workflow {
    effects: TestEffects,
    drafts: DraftManager<AccessEffectSystem>,
    projects: ResearchProjectManager<AccessEffectSystem>,
    submissions: SubmissionManager<AccessEffectSystem>,
    approvals: AccessApprovalManager<AccessEffectSystem>,
}

impl Workflow {
    async fn new(requirement: AccessRequirement) -> Self {
        let effects = TestEffects::new().await;
        effects.seed_requirement(requirement).await;
        Self {
            drafts: DraftManager::new(effects.system(), DraftConfig::default()),
            projects: ResearchProjectManager::new(effects.system()),
            submissions: SubmissionManager::new(effects.system()),
            approvals: AccessApprovalManager::new(effects.system()),
            effects,
        }
    }

    async fn managed() -> Self {
        Self::new(RequirementBuilder::managed(MANAGED.value()).build()).await
    }

    /// Save a draft for `user` with a project attached and `changes` listed
    async fn prepare(
        &self,
        user: PrincipalId,
        changes: Vec<AccessorChange>,
    ) -> DataAccessRequest {
        let project = match self.projects.get_or_template(user, MANAGED).await.unwrap() {
            project if project.is_persisted() => project,
            template => self
                .projects
                .create_or_update(user, template.with_details(project_details()))
                .await
                .unwrap(),
        };
        let mut draft = self.drafts.get_or_create_draft(user, MANAGED).await.unwrap();
        draft.research_project_id = project.id;
        draft.accessor_changes = changes;
        self.drafts.update(user, draft).await.unwrap()
    }
}

fn gain(user: PrincipalId) -> AccessorChange {
    AccessorChange::new(user, AccessorChangeType::GainAccess)
}

fn renew(user: PrincipalId) -> AccessorChange {
    AccessorChange::new(user, AccessorChangeType::RenewAccess)
}

fn revoke(user: PrincipalId) -> AccessorChange {
    AccessorChange::new(user, AccessorChangeType::RevokeAccess)
}

#[tokio::test]
async fn test_create_snapshots_draft_and_project() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER), gain(ACCESSOR_A)]).await;

    let submission = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag.clone())
        .await
        .unwrap();

    assert_eq!(submission.state, SubmissionState::Submitted);
    assert_eq!(submission.request_id, draft.id);
    assert_eq!(submission.access_requirement_version, 1);
    assert_eq!(submission.accessor_changes, draft.accessor_changes);
    assert_eq!(submission.research_project_snapshot.id, draft.research_project_id);
    assert!(!submission.is_renewal_submission);
    assert_eq!(flow.effects.subscribers(submission.id).await, vec![SUBMITTER]);
    assert_eq!(
        flow.effects
            .messenger
            .of(ObjectType::DataAccessSubmission, ChangeType::Create)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_create_rejects_stale_or_foreign_draft() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER)]).await;

    let err = flow
        .submissions
        .create(SUBMITTER, draft.id, Etag::new("stale"))
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Conflict { .. });

    let err = flow
        .submissions
        .create(OUTSIDER, draft.id, draft.etag.clone())
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Unauthorized { .. });
}

#[tokio::test]
async fn test_create_validates_accessor_list() {
    let flow = Workflow::managed().await;

    let without_submitter = flow.prepare(SUBMITTER, vec![gain(ACCESSOR_A)]).await;
    let err = flow
        .submissions
        .create(SUBMITTER, without_submitter.id, without_submitter.etag)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Submitter has to be an accessor.");

    let empty = flow.prepare(SUBMITTER, Vec::new()).await;
    let err = flow
        .submissions
        .create(SUBMITTER, empty.id, empty.etag)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Must provide at least one accessor.");

    // Gaining and renewing the same user in one request is ambiguous
    let twice = flow
        .prepare(SUBMITTER, vec![gain(SUBMITTER), renew(SUBMITTER)])
        .await;
    let err = flow
        .submissions
        .create(SUBMITTER, twice.id, twice.etag)
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Validation { .. });
    assert!(err.message().contains("listed more than once"));

    let unsponsored = flow
        .prepare(SUBMITTER, vec![gain(SUBMITTER), revoke(ACCESSOR_B)])
        .await;
    let err = flow
        .submissions
        .create(SUBMITTER, unsponsored.id, unsponsored.etag)
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Validation { .. });
}

#[tokio::test]
async fn test_create_requires_project_and_documents() {
    let flow = Workflow::new(
        RequirementBuilder::managed(MANAGED.value())
            .duc_required()
            .build(),
    )
    .await;

    let mut bare = flow
        .drafts
        .get_or_create_draft(SUBMITTER, MANAGED)
        .await
        .unwrap();
    bare.accessor_changes = vec![gain(SUBMITTER)];
    let bare = flow.drafts.update(SUBMITTER, bare).await.unwrap();
    let err = flow
        .submissions
        .create(SUBMITTER, bare.id, bare.etag)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "The request has no research project.");

    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER)]).await;
    let err = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag.clone())
        .await
        .unwrap_err();
    assert_eq!(
        err.message(),
        "You must provide a Data Use Certification document."
    );

    let mut with_duc = draft;
    with_duc.duc_file_handle_id = Some("duc-1".to_string());
    let with_duc = flow.drafts.update(SUBMITTER, with_duc).await.unwrap();
    let submission = flow
        .submissions
        .create(SUBMITTER, with_duc.id, with_duc.etag)
        .await
        .unwrap();
    assert_eq!(submission.duc_file_handle_id.as_deref(), Some("duc-1"));
}

#[tokio::test]
async fn test_create_enforces_accessor_policy() {
    let flow = Workflow::new(
        RequirementBuilder::managed(MANAGED.value())
            .certified_required()
            .validated_required()
            .build(),
    )
    .await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER), gain(ACCESSOR_A)]).await;

    flow.effects.verify(&[SUBMITTER]).await;
    let err = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag.clone())
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Unauthorized { .. });

    flow.effects.verify(&[ACCESSOR_A]).await;
    flow.submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_only_one_open_submission() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER)]).await;
    flow.submissions
        .create(SUBMITTER, draft.id, draft.etag.clone())
        .await
        .unwrap();

    let err = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag.clone())
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Validation { .. });

    let err = flow.drafts.update(SUBMITTER, draft).await.unwrap_err();
    assert_matches!(err, AccessError::Validation { .. });
}

#[tokio::test]
async fn test_accessor_is_under_review_once() {
    let flow = Workflow::managed().await;
    let first = flow.prepare(SUBMITTER, vec![gain(SUBMITTER), gain(ACCESSOR_A)]).await;
    let pending = flow
        .submissions
        .create(SUBMITTER, first.id, first.etag)
        .await
        .unwrap();

    let competing = flow.prepare(ACCESSOR_B, vec![gain(ACCESSOR_B), gain(ACCESSOR_A)]).await;
    let err = flow
        .submissions
        .create(ACCESSOR_B, competing.id, competing.etag.clone())
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Validation { .. });
    assert_eq!(
        err.message(),
        format!("Accessor {ACCESSOR_A} is already part of a submission under review.")
    );
    assert_eq!(
        flow.submissions
            .list_submissions(REVIEWER, MANAGED, Some(SubmissionState::Submitted))
            .await
            .unwrap()
            .len(),
        1
    );

    flow.submissions.cancel(SUBMITTER, pending.id).await.unwrap();
    flow.submissions
        .create(ACCESSOR_B, competing.id, competing.etag)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_listed_accessor_keeps_editing_own_draft() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER), gain(ACCESSOR_A)]).await;
    flow.submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();

    // Blocked only for the submitter of the pending submission
    let own = flow.prepare(ACCESSOR_A, vec![gain(ACCESSOR_A)]).await;
    assert_eq!(own.created_by, ACCESSOR_A);
    assert_eq!(own.accessor_changes, vec![gain(ACCESSOR_A)]);
}

#[tokio::test]
async fn test_revoked_accessor_may_be_under_review_elsewhere() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER), gain(ACCESSOR_A)]).await;
    let submission = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();
    flow.submissions
        .update_status(REVIEWER, SubmissionStateChange::approve(submission.id))
        .await
        .unwrap();

    let mut renewal = flow.drafts.get_or_create_draft(SUBMITTER, MANAGED).await.unwrap();
    renewal.accessor_changes = vec![renew(SUBMITTER), revoke(ACCESSOR_A)];
    let renewal = flow.drafts.update(SUBMITTER, renewal).await.unwrap();
    flow.submissions
        .create(SUBMITTER, renewal.id, renewal.etag)
        .await
        .unwrap();

    let own = flow.prepare(ACCESSOR_A, vec![gain(ACCESSOR_A)]).await;
    flow.submissions
        .create(ACCESSOR_A, own.id, own.etag)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancel_is_submitter_only_and_final() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER)]).await;
    let submission = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();

    assert_matches!(
        flow.submissions.cancel(REVIEWER, submission.id).await,
        Err(AccessError::Unauthorized { .. })
    );

    let status = flow.submissions.cancel(SUBMITTER, submission.id).await.unwrap();
    assert_eq!(status.state, SubmissionState::Cancelled);

    let err = flow
        .submissions
        .cancel(SUBMITTER, submission.id)
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Validation { .. });
    assert_eq!(err.message(), "Cannot cancel a submission with CANCELLED state.");

    let err = flow
        .submissions
        .update_status(REVIEWER, SubmissionStateChange::approve(submission.id))
        .await
        .unwrap_err();
    assert_matches!(err, AccessError::Validation { .. });
    assert_eq!(
        err.message(),
        "Cannot change state of a submission with CANCELLED state."
    );
}

#[tokio::test]
async fn test_review_requires_reviewer_and_supported_state() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER)]).await;
    let submission = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();

    let mut cancel = SubmissionStateChange::approve(submission.id);
    cancel.new_state = SubmissionState::Cancelled;
    let err = flow
        .submissions
        .update_status(REVIEWER, cancel)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Do not support changing to state: CANCELLED");

    assert_matches!(
        flow.submissions
            .update_status(SUBMITTER, SubmissionStateChange::approve(submission.id))
            .await,
        Err(AccessError::Unauthorized { .. })
    );

    let stale = SubmissionStateChange::approve(submission.id).with_etag(Etag::new("old"));
    assert_matches!(
        flow.submissions.update_status(REVIEWER, stale).await,
        Err(AccessError::Conflict { .. })
    );
}

#[tokio::test]
async fn test_approval_grants_access_and_prepares_renewal() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER), gain(ACCESSOR_A)]).await;
    let submission = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();

    let approved = flow
        .submissions
        .update_status(
            REVIEWER,
            SubmissionStateChange::approve(submission.id).with_etag(submission.etag.clone()),
        )
        .await
        .unwrap();
    assert_eq!(approved.state, SubmissionState::Approved);
    assert_eq!(approved.modified_by, REVIEWER);
    assert_eq!(approved.rejected_reason, None);

    for accessor in [SUBMITTER, ACCESSOR_A] {
        assert!(flow.approvals.has_access(MANAGED, accessor).await.unwrap());
    }
    assert!(!flow.approvals.has_access(MANAGED, ACCESSOR_B).await.unwrap());

    let status = flow
        .submissions
        .access_requirement_status(ACCESSOR_A, MANAGED)
        .await
        .unwrap();
    assert!(status.is_approved);
    assert_eq!(status.expired_on, Some(fixed_now() + Duration::days(365)));

    let renewal = flow.drafts.get_or_create_draft(SUBMITTER, MANAGED).await.unwrap();
    assert_eq!(renewal.id, draft.id);
    assert!(renewal.is_renewal());
    assert_eq!(renewal.accessor_changes, vec![renew(SUBMITTER), renew(ACCESSOR_A)]);

    assert_matches!(
        flow.submissions
            .update_status(REVIEWER, SubmissionStateChange::approve(submission.id))
            .await,
        Err(AccessError::Validation { .. })
    );

    let err = flow
        .submissions
        .cancel(SUBMITTER, submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Cannot cancel a submission with APPROVED state.");
}

#[tokio::test]
async fn test_renewal_revokes_dropped_accessor() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER), gain(ACCESSOR_A)]).await;
    let first = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();
    flow.submissions
        .update_status(REVIEWER, SubmissionStateChange::approve(first.id))
        .await
        .unwrap();

    flow.effects.clock.advance(Duration::days(300));
    let renewal = flow.prepare(SUBMITTER, vec![renew(SUBMITTER), revoke(ACCESSOR_A)]).await;
    assert!(renewal.is_renewal());
    let second = flow
        .submissions
        .create(SUBMITTER, renewal.id, renewal.etag)
        .await
        .unwrap();
    assert!(second.is_renewal_submission);

    flow.effects.messenger.take();
    flow.submissions
        .update_status(REVIEWER, SubmissionStateChange::approve(second.id))
        .await
        .unwrap();

    assert!(flow.approvals.has_access(MANAGED, SUBMITTER).await.unwrap());
    assert!(!flow.approvals.has_access(MANAGED, ACCESSOR_A).await.unwrap());

    let status = flow
        .submissions
        .access_requirement_status(SUBMITTER, MANAGED)
        .await
        .unwrap();
    assert_eq!(
        status.expired_on,
        Some(fixed_now() + Duration::days(300) + Duration::days(365)),
        "renewal restarts the expiry clock"
    );

    // The old rows of both accessors were revoked on the way
    let revoked = flow
        .effects
        .messenger
        .of(ObjectType::AccessApproval, ChangeType::Update);
    assert_eq!(revoked.len(), 2);
    for message in revoked {
        let approval = flow.effects.approval(message.object_id.parse().unwrap()).await;
        assert_eq!(approval.state, ApprovalState::Revoked);
    }
}

#[tokio::test]
async fn test_rejection_keeps_reason_and_frees_draft() {
    let flow = Workflow::managed().await;
    let draft = flow.prepare(SUBMITTER, vec![gain(SUBMITTER)]).await;
    let submission = flow
        .submissions
        .create(SUBMITTER, draft.id, draft.etag)
        .await
        .unwrap();

    let rejected = flow
        .submissions
        .update_status(
            REVIEWER,
            SubmissionStateChange::reject(submission.id, "Missing signature"),
        )
        .await
        .unwrap();
    assert_eq!(rejected.state, SubmissionState::Rejected);
    assert_eq!(rejected.rejected_reason.as_deref(), Some("Missing signature"));
    assert!(!flow.approvals.has_access(MANAGED, SUBMITTER).await.unwrap());

    let status = flow
        .submissions
        .get_status(SUBMITTER, submission.id)
        .await
        .unwrap();
    assert_eq!(status.rejected_reason.as_deref(), Some("Missing signature"));

    // Nothing open any more, so the draft is editable again
    let draft = flow.drafts.get_or_create_draft(SUBMITTER, MANAGED).await.unwrap();
    assert!(!draft.is_renewal());
    flow.drafts.update(SUBMITTER, draft).await.unwrap();
}

#[tokio::test]
async fn test_reviewer_listings() {
    let flow = Workflow::managed().await;
    for user in [SUBMITTER, ACCESSOR_A] {
        let draft = flow.prepare(user, vec![gain(user)]).await;
        flow.submissions
            .create(user, draft.id, draft.etag)
            .await
            .unwrap();
    }

    assert_matches!(
        flow.submissions.list_open_submissions(SUBMITTER).await,
        Err(AccessError::Unauthorized { .. })
    );
    let open = flow.submissions.list_open_submissions(REVIEWER).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].requirement_id, MANAGED);
    assert_eq!(open[0].open_submissions, 2);

    let all = flow
        .submissions
        .list_submissions(REVIEWER, MANAGED, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    let approved = flow
        .submissions
        .list_submissions(REVIEWER, MANAGED, Some(SubmissionState::Approved))
        .await
        .unwrap();
    assert!(approved.is_empty());

    assert_matches!(
        flow.submissions.get_status(OUTSIDER, all[0].id).await,
        Err(AccessError::Unauthorized { .. })
    );
    flow.submissions
        .get_status(REVIEWER, all[0].id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_status_of_unmanaged_requirement_has_no_submission() {
    let flow = Workflow::managed().await;
    flow.effects
        .seed_requirement(RequirementBuilder::self_sign(30).build())
        .await;

    let status = flow
        .submissions
        .access_requirement_status(SUBMITTER, RequirementId::new(30))
        .await
        .unwrap();
    assert!(!status.is_approved);
    assert_eq!(status.current_submission_status, None);

    let project = ResearchProject::template(SUBMITTER, RequirementId::new(30))
        .with_details(project_details());
    assert_matches!(
        flow.projects.create_or_update(SUBMITTER, project).await,
        Err(AccessError::Validation { .. })
    );
}
