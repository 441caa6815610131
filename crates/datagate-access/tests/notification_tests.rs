//! Notification dedup: revocation notices, delivery suppression and
//! renewal reminders

use assert_matches::assert_matches;
use chrono::Duration;
use datagate_access::{
    AccessApprovalManager, DiscardReason, NotificationManager, NotificationOutcome,
};
use datagate_core::config::NotificationConfig;
use datagate_core::{
    AccessError, ApprovalId, ChangeMessage, ChangeType, Feature, NewApproval, NotificationType,
    ObjectType, PrincipalId, RequirementId,
};
use datagate_effects::AccessEffectSystem;
use datagate_testkit::*;
use std::sync::Arc;

const MANAGED: RequirementId = RequirementId(10);

struct Harness {
    effects: TestEffects,
    approvals: AccessApprovalManager<AccessEffectSystem>,
    notifications: Arc<NotificationManager<AccessEffectSystem>>,
}

impl Harness {
    async fn new() -> Self {
        init_test_tracing();
        let effects = TestEffects::new().await;
        effects
            .seed_requirement(RequirementBuilder::managed(MANAGED.value()).build())
            .await;
        Self {
            approvals: AccessApprovalManager::new(effects.system()),
            notifications: Arc::new(NotificationManager::new(
                effects.system(),
                NotificationConfig::default(),
            )),
            effects,
        }
    }

    /// Grant `accessor` access through `submitter`, then revoke it and
    /// return the resulting change message
    async fn revoke_grant(&self, submitter: PrincipalId, accessor: PrincipalId) -> ChangeMessage {
        let row = self
            .effects
            .seed_approvals(vec![NewApproval {
                created_on: self.effects.clock.current(),
                ..grant(MANAGED, submitter, accessor, None)
            }])
            .await
            .remove(0);
        self.effects.messenger.take();
        self.approvals
            .revoke_approval(REVIEWER, row.id, row.etag)
            .await
            .unwrap();
        let mut changes = self.effects.messenger.take();
        assert_eq!(changes.len(), 1);
        changes.remove(0)
    }

    fn approval_change(&self, id: ApprovalId) -> ChangeMessage {
        ChangeMessage::new(
            ObjectType::AccessApproval,
            id,
            ChangeType::Update,
            REVIEWER,
            self.effects.clock.current(),
        )
    }
}

#[tokio::test]
async fn test_revocation_notifies_accessor_once() {
    let harness = Harness::new().await;
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    let outcome = harness.notifications.process_change(&change).await.unwrap();
    let notification = assert_matches!(outcome, NotificationOutcome::Sent(n) => n);
    assert_eq!(notification.record.notification_type, NotificationType::Revocation);
    assert_eq!(notification.record.recipient_id, ACCESSOR_A);
    assert_eq!(notification.record.requirement_id, MANAGED);
    assert_eq!(notification.sent_on(), fixed_now());
    assert!(notification.was_delivered());

    let delivered = harness.effects.outbox.delivered_to(ACCESSOR_A);
    assert_eq!(delivered.len(), 1);
    assert_eq!(Some(delivered[0].message_id), notification.record.message_id);
    assert!(delivered[0].message.subject.contains("revoked"));

    let replay = harness.notifications.process_change(&change).await.unwrap();
    assert_eq!(replay, NotificationOutcome::Skipped);
    assert_eq!(harness.effects.outbox.delivered().len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicates_deliver_once() {
    let harness = Harness::new().await;
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    let (first, second) = futures::future::join(
        harness.notifications.process_change(&change),
        harness.notifications.process_change(&change),
    )
    .await;
    let outcomes = [first.unwrap(), second.unwrap()];

    let sent = outcomes
        .iter()
        .filter(|o| matches!(o, NotificationOutcome::Sent(_)))
        .count();
    assert_eq!(sent, 1);
    assert!(outcomes.contains(&NotificationOutcome::Skipped));
    assert_eq!(harness.effects.outbox.delivered().len(), 1);

    let rows = harness
        .notifications
        .list_notifications(REVIEWER, MANAGED, vec![ACCESSOR_A])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_resend_after_cooldown_reuses_row() {
    let harness = Harness::new().await;
    let first_change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;
    let first = harness
        .notifications
        .process_change(&first_change)
        .await
        .unwrap();
    let first = assert_matches!(first, NotificationOutcome::Sent(n) => n);

    harness.effects.clock.advance(Duration::days(8));
    let second_change = harness.revoke_grant(OUTSIDER, ACCESSOR_A).await;
    let second = harness
        .notifications
        .process_change(&second_change)
        .await
        .unwrap();
    let second = assert_matches!(second, NotificationOutcome::Sent(n) => n);

    assert_eq!(second.id, first.id, "one row per dedup key");
    assert_eq!(second.sent_on(), fixed_now() + Duration::days(8));
    assert_eq!(harness.effects.outbox.delivered_to(ACCESSOR_A).len(), 2);
}

#[tokio::test]
async fn test_change_filters() {
    let harness = Harness::new().await;
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    let mut created = change.clone();
    created.change_type = ChangeType::Create;
    assert_eq!(
        harness.notifications.process_change(&created).await.unwrap(),
        NotificationOutcome::Discarded(DiscardReason::NotAnUpdate)
    );

    let mut other = change.clone();
    other.object_type = ObjectType::DataAccessSubmissionStatus;
    assert_eq!(
        harness.notifications.process_change(&other).await.unwrap(),
        NotificationOutcome::Discarded(DiscardReason::NotAnApprovalChange)
    );

    harness.effects.clock.advance(Duration::hours(25));
    assert_eq!(
        harness.notifications.process_change(&change).await.unwrap(),
        NotificationOutcome::Discarded(DiscardReason::Stale)
    );
    assert!(harness.effects.outbox.delivered().is_empty());
}

#[tokio::test]
async fn test_feature_flag_and_state_gate_sending() {
    let harness = Harness::new().await;
    let active = harness
        .effects
        .seed_approvals(vec![grant(MANAGED, SUBMITTER, ACCESSOR_B, None)])
        .await
        .remove(0);
    assert_eq!(
        harness
            .notifications
            .process_change(&harness.approval_change(active.id))
            .await
            .unwrap(),
        NotificationOutcome::Discarded(DiscardReason::UnexpectedState)
    );

    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;
    harness
        .effects
        .environment
        .set_feature(Feature::DataAccessNotifications, false);
    assert_eq!(
        harness.notifications.process_change(&change).await.unwrap(),
        NotificationOutcome::Discarded(DiscardReason::FeatureDisabled)
    );
}

#[tokio::test]
async fn test_no_notice_while_accessor_keeps_access() {
    let harness = Harness::new().await;
    harness
        .effects
        .seed_approvals(vec![grant(MANAGED, OUTSIDER, ACCESSOR_A, None)])
        .await;
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    assert_eq!(
        harness.notifications.process_change(&change).await.unwrap(),
        NotificationOutcome::Discarded(DiscardReason::StillApproved)
    );
}

#[tokio::test]
async fn test_only_managed_download_requirements_notify() {
    let harness = Harness::new().await;
    harness
        .effects
        .seed_requirement(
            RequirementBuilder::managed(MANAGED.value())
                .participate()
                .build(),
        )
        .await;
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    assert_eq!(
        harness.notifications.process_change(&change).await.unwrap(),
        NotificationOutcome::Discarded(DiscardReason::NotManagedDownload)
    );
}

#[tokio::test]
async fn test_suppressed_outside_production_but_recorded() {
    let harness = Harness::new().await;
    harness.effects.environment.set_production_stack(Some(false));
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    let outcome = harness.notifications.process_change(&change).await.unwrap();
    let notification = assert_matches!(outcome, NotificationOutcome::Sent(n) => n);
    assert_eq!(notification.record.message_id, None);
    assert!(harness.effects.outbox.delivered().is_empty());

    assert_eq!(
        harness.notifications.process_change(&change).await.unwrap(),
        NotificationOutcome::Skipped,
        "a suppressed send still deduplicates the key"
    );
}

#[tokio::test]
async fn test_testing_group_receives_outside_production() {
    let harness = Harness::new().await;
    harness.effects.environment.set_production_stack(Some(false));
    harness.effects.environment.add_to_testing_group(ACCESSOR_A);
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    harness.notifications.process_change(&change).await.unwrap();
    assert_eq!(harness.effects.outbox.delivered_to(ACCESSOR_A).len(), 1);
}

#[tokio::test]
async fn test_unknown_stack_is_retryable_and_writes_nothing() {
    let harness = Harness::new().await;
    harness.effects.environment.set_production_stack(None);
    let change = harness.revoke_grant(SUBMITTER, ACCESSOR_A).await;

    let err = harness
        .notifications
        .process_change(&change)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.message(), "Could not detect current stack version.");

    let rows = harness
        .notifications
        .list_notifications(REVIEWER, MANAGED, Vec::new())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_list_notifications_limits() {
    let harness = Harness::new().await;
    let crowd: Vec<PrincipalId> = (0..26).map(PrincipalId::new).collect();

    let err = harness
        .notifications
        .list_notifications(REVIEWER, MANAGED, crowd)
        .await
        .unwrap_err();
    assert_eq!(
        err.message(),
        "The maximum number of allowed recipient ids in the request is 25."
    );
    assert_matches!(
        harness
            .notifications
            .list_notifications(SUBMITTER, MANAGED, vec![SUBMITTER])
            .await,
        Err(AccessError::Unauthorized { .. })
    );
}

#[tokio::test]
async fn test_first_reminder_goes_out_once() {
    let harness = Harness::new().await;
    let expiring = harness
        .effects
        .seed_approvals(vec![
            grant(
                MANAGED,
                SUBMITTER,
                SUBMITTER,
                Some(fixed_now() + Duration::days(30)),
            ),
            // Sponsored accessors are not reminded
            grant(
                MANAGED,
                SUBMITTER,
                ACCESSOR_A,
                Some(fixed_now() + Duration::days(30)),
            ),
        ])
        .await;

    let due = harness
        .notifications
        .list_submitter_approvals_for_unsent_reminder(NotificationType::FirstRenewalReminder, 10)
        .await
        .unwrap();
    assert_eq!(due, vec![expiring[0].id]);
    let none_yet = harness
        .notifications
        .list_submitter_approvals_for_unsent_reminder(NotificationType::SecondRenewalReminder, 10)
        .await
        .unwrap();
    assert!(none_yet.is_empty());

    let outcomes = harness
        .notifications
        .process_reminders(NotificationType::FirstRenewalReminder, 10)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_matches!(&outcomes[0], NotificationOutcome::Sent(n) if n.record.recipient_id == SUBMITTER);
    let delivered = harness.effects.outbox.delivered_to(SUBMITTER);
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].message.body.contains("July 1, 2024"));

    let rerun = harness
        .notifications
        .process_reminders(NotificationType::FirstRenewalReminder, 10)
        .await
        .unwrap();
    assert!(rerun.is_empty());
}

#[tokio::test]
async fn test_second_reminder_is_final() {
    let harness = Harness::new().await;
    harness
        .effects
        .seed_approvals(vec![grant(
            MANAGED,
            SUBMITTER,
            SUBMITTER,
            Some(fixed_now() + Duration::days(7)),
        )])
        .await;

    harness
        .notifications
        .process_reminders(NotificationType::SecondRenewalReminder, 10)
        .await
        .unwrap();
    let delivered = harness.effects.outbox.delivered_to(SUBMITTER);
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].message.subject.starts_with("Final reminder: "));
}

#[tokio::test]
async fn test_reminder_skipped_once_renewed() {
    let harness = Harness::new().await;
    let rows = harness
        .effects
        .seed_approvals(vec![
            grant(
                MANAGED,
                SUBMITTER,
                SUBMITTER,
                Some(fixed_now() + Duration::days(30)),
            ),
            NewApproval {
                requirement_version: 2,
                ..grant(
                    MANAGED,
                    SUBMITTER,
                    SUBMITTER,
                    Some(fixed_now() + Duration::days(395)),
                )
            },
        ])
        .await;

    assert_eq!(
        harness
            .notifications
            .process_approval(NotificationType::FirstRenewalReminder, rows[0].id)
            .await
            .unwrap(),
        NotificationOutcome::Discarded(DiscardReason::AlreadyRenewed)
    );
    assert_eq!(
        harness
            .notifications
            .process_approval(NotificationType::SecondRenewalReminder, rows[0].id)
            .await
            .unwrap(),
        NotificationOutcome::Discarded(DiscardReason::NotDue)
    );
}

#[tokio::test]
async fn test_reminder_listing_arguments() {
    let harness = Harness::new().await;

    let err = harness
        .notifications
        .list_submitter_approvals_for_unsent_reminder(NotificationType::Revocation, 10)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "The notification type must be a reminder.");

    let err = harness
        .notifications
        .list_submitter_approvals_for_unsent_reminder(NotificationType::FirstRenewalReminder, 0)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "The limit must be greater than zero.");
}
