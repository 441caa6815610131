//! Notification dedup engine
//!
//! Turns approval changes into at most one message per
//! (type, requirement, recipient) key. The existing row for a key is read
//! under the key's row lock and a resend policy decides whether another
//! message is warranted; concurrent duplicates of the same change therefore
//! produce a single delivery and a single row.
//!
//! Delivery is suppressed outside production unless the recipient is in the
//! testing group. A suppressed send still records the row, with no message
//! id, so the key stays deduplicated.

mod builder;
mod policy;
mod worker;

pub use builder::{BuilderRegistry, NotificationBuilder, RenewalReminderBuilder, RevocationBuilder};
pub use policy::{CooldownResendPolicy, ReminderResendPolicy, ResendPolicy};
pub use worker::NotificationWorker;

use crate::effects::NotificationEffects;
use crate::guards::require_reviewer;
use chrono::{Duration, NaiveTime, TimeZone, Utc};
use datagate_core::config::NotificationConfig;
use datagate_core::errors::ensure;
use datagate_core::store::StoreTransaction;
use datagate_core::{
    AccessApproval, AccessError, AccessResult, AccessType, ApprovalId, ChangeMessage, ChangeType,
    DataAccessNotification, Feature, NotificationKey, NotificationRecord, NotificationType,
    ObjectType, PrincipalId, RequirementId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a change or approval produced no notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// The change is not about an access approval
    NotAnApprovalChange,
    /// The change is not an update
    NotAnUpdate,
    /// The change is older than the processing window
    Stale,
    /// Data access notifications are switched off
    FeatureDisabled,
    /// The approval is not in the state the notification type expects
    UnexpectedState,
    /// The requirement is not a managed download requirement
    NotManagedDownload,
    /// The accessor still holds another active approval
    StillApproved,
    /// The approval never expires
    NoExpiry,
    /// The approval does not expire at the end of the reminder period
    NotDue,
    /// The submitter already holds an approval expiring later
    AlreadyRenewed,
}

/// Result of processing one change or approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Nothing to notify
    Discarded(DiscardReason),
    /// The key was notified before and the resend policy declined
    Skipped,
    /// The row was written; delivery may have been suppressed
    Sent(DataAccessNotification),
}

/// Deduplicated notifications about access approvals
pub struct NotificationManager<E> {
    effects: Arc<E>,
    config: NotificationConfig,
    builders: BuilderRegistry,
    revocation_policy: Box<dyn ResendPolicy>,
    reminder_policy: Box<dyn ResendPolicy>,
}

impl<E: NotificationEffects> NotificationManager<E> {
    /// Manager with the default builders and resend policies
    pub fn new(effects: Arc<E>, config: NotificationConfig) -> Self {
        Self {
            revocation_policy: Box::new(CooldownResendPolicy::from_config(&config)),
            reminder_policy: Box::new(ReminderResendPolicy::from_config(&config)),
            builders: BuilderRegistry::default(),
            effects,
            config,
        }
    }

    /// Replace the message builders
    pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
        self.builders = builders;
        self
    }

    /// Replace the resend policy used for revocations
    pub fn with_revocation_policy<P: ResendPolicy + 'static>(mut self, policy: P) -> Self {
        self.revocation_policy = Box::new(policy);
        self
    }

    /// Replace the resend policy used for reminders
    pub fn with_reminder_policy<P: ResendPolicy + 'static>(mut self, policy: P) -> Self {
        self.reminder_policy = Box::new(policy);
        self
    }

    /// React to a change message
    ///
    /// Only recent `AccessApproval` updates are considered; they may produce
    /// a revocation notice.
    pub async fn process_change(
        &self,
        message: &ChangeMessage,
    ) -> AccessResult<NotificationOutcome> {
        if message.object_type != ObjectType::AccessApproval {
            return Ok(NotificationOutcome::Discarded(
                DiscardReason::NotAnApprovalChange,
            ));
        }
        if message.change_type != ChangeType::Update {
            return Ok(NotificationOutcome::Discarded(DiscardReason::NotAnUpdate));
        }
        let now = self.effects.now().await;
        if message.timestamp < now - self.config.change_timeout() {
            debug!(
                "Discarding change for approval {} from {}",
                message.object_id, message.timestamp
            );
            return Ok(NotificationOutcome::Discarded(DiscardReason::Stale));
        }

        let approval_id: ApprovalId = message.object_id.parse()?;
        self.process_approval(NotificationType::Revocation, approval_id)
            .await
    }

    /// Send a `notification_type` message about an approval if warranted
    pub async fn process_approval(
        &self,
        notification_type: NotificationType,
        approval_id: ApprovalId,
    ) -> AccessResult<NotificationOutcome> {
        if !self
            .effects
            .is_feature_enabled(Feature::DataAccessNotifications)
            .await
        {
            return Ok(NotificationOutcome::Discarded(DiscardReason::FeatureDisabled));
        }

        let approval = self
            .effects
            .transaction(move |txn| txn.approval(approval_id))
            .await?;
        if approval.state != notification_type.expected_state() {
            debug!(
                "Approval {} is {}, not notifying {}",
                approval.id, approval.state, notification_type
            );
            return Ok(NotificationOutcome::Discarded(DiscardReason::UnexpectedState));
        }

        self.send_if_needed(notification_type, approval).await
    }

    /// Deliver and record a notification unless the key was already handled
    async fn send_if_needed(
        &self,
        notification_type: NotificationType,
        approval: AccessApproval,
    ) -> AccessResult<NotificationOutcome> {
        let requirement_id = approval.requirement_id;
        let requirement = self
            .effects
            .transaction(move |txn| txn.requirement(requirement_id))
            .await?;
        if !requirement.is_managed() || requirement.access_type != AccessType::Download {
            return Ok(NotificationOutcome::Discarded(
                DiscardReason::NotManagedDownload,
            ));
        }

        let recipient = notification_type.recipient_of(&approval);
        let key = NotificationKey {
            notification_type,
            requirement_id,
            recipient_id: recipient,
        };
        let _lock = self.effects.lock_notification(key).await;
        let now = self.effects.now().await;

        let candidate = approval.clone();
        let (discard, existing) = self
            .effects
            .transaction(move |txn| {
                let discard = match notification_type {
                    NotificationType::Revocation => (!txn
                        .active_approvals_for(requirement_id, candidate.accessor_id, now)
                        .is_empty())
                    .then_some(DiscardReason::StillApproved),
                    NotificationType::FirstRenewalReminder
                    | NotificationType::SecondRenewalReminder => {
                        reminder_discard(txn, notification_type, &candidate, now)
                    }
                };
                Ok((discard, txn.notification(&key)))
            })
            .await?;
        if let Some(reason) = discard {
            debug!(
                "Not sending {} for approval {}: {:?}",
                notification_type, approval.id, reason
            );
            return Ok(NotificationOutcome::Discarded(reason));
        }

        if let Some(existing) = &existing {
            if !self
                .resend_policy(notification_type)
                .can_resend(&approval, existing, now)
            {
                return Ok(NotificationOutcome::Skipped);
            }
        }

        let message_id = if self.should_deliver(recipient).await? {
            let message = self
                .builders
                .get(notification_type)?
                .build(&requirement, &approval, recipient);
            Some(self.effects.deliver(recipient, &message).await?)
        } else {
            warn!(
                "{} notification (AR: {}, Recipient: {}, AP: {}) will not be delivered.",
                notification_type, requirement_id, recipient, approval.id
            );
            None
        };

        let record = NotificationRecord {
            notification_type,
            requirement_id,
            recipient_id: recipient,
            access_approval_id: approval.id,
            message_id,
            sent_on: now,
        };
        let existing_id = existing.map(|row| row.id);
        let stored = self
            .effects
            .transaction(move |txn| match existing_id {
                Some(id) => txn.update_notification(id, record),
                None => txn.insert_notification(record),
            })
            .await?;

        info!(
            "Recorded {} notification {} for {} on requirement {}",
            notification_type, stored.id, recipient, requirement_id
        );
        Ok(NotificationOutcome::Sent(stored))
    }

    fn resend_policy(&self, notification_type: NotificationType) -> &dyn ResendPolicy {
        if notification_type.is_reminder() {
            self.reminder_policy.as_ref()
        } else {
            self.revocation_policy.as_ref()
        }
    }

    /// Testing-group members always receive; everyone else only in production
    async fn should_deliver(&self, recipient: PrincipalId) -> AccessResult<bool> {
        if self.effects.is_in_testing_group(recipient).await {
            return Ok(true);
        }
        self.effects
            .is_production_stack()
            .await
            .ok_or_else(|| AccessError::retryable("Could not detect current stack version."))
    }

    /// Self-sponsored approvals due for a `notification_type` reminder today
    pub async fn list_submitter_approvals_for_unsent_reminder(
        &self,
        notification_type: NotificationType,
        limit: usize,
    ) -> AccessResult<Vec<ApprovalId>> {
        ensure(
            notification_type.is_reminder(),
            "The notification type must be a reminder.",
        )?;
        ensure(limit > 0, "The limit must be greater than zero.")?;
        let period = notification_type
            .reminder_period()
            .ok_or_else(|| AccessError::internal("Reminder without a period."))?;

        let now = self.effects.now().await;
        let from = start_of_day(now) + period;
        let until = from + Duration::days(1);
        let sent_since = now - self.config.resend_cooldown();

        self.effects
            .transaction(move |txn| {
                Ok(txn.approvals_pending_reminder(notification_type, from, until, sent_since, limit))
            })
            .await
    }

    /// Send the reminders due today, at most `limit`
    pub async fn process_reminders(
        &self,
        notification_type: NotificationType,
        limit: usize,
    ) -> AccessResult<Vec<NotificationOutcome>> {
        let due = self
            .list_submitter_approvals_for_unsent_reminder(notification_type, limit)
            .await?;
        let mut outcomes = Vec::with_capacity(due.len());
        for approval_id in due {
            outcomes.push(self.process_approval(notification_type, approval_id).await?);
        }
        Ok(outcomes)
    }

    /// Notification rows for a requirement, reviewer-only
    pub async fn list_notifications(
        &self,
        actor: PrincipalId,
        requirement_id: RequirementId,
        recipients: Vec<PrincipalId>,
    ) -> AccessResult<Vec<DataAccessNotification>> {
        let max = self.config.max_request_recipients;
        if recipients.len() > max {
            return Err(AccessError::validation(format!(
                "The maximum number of allowed recipient ids in the request is {max}."
            )));
        }
        require_reviewer(self.effects.as_ref(), actor).await?;

        self.effects
            .transaction(move |txn| {
                Ok(txn.notifications_for_recipients(requirement_id, &recipients))
            })
            .await
    }
}

/// Reason a reminder for `approval` should not go out, if any
fn reminder_discard(
    txn: &dyn StoreTransaction,
    notification_type: NotificationType,
    approval: &AccessApproval,
    now: Timestamp,
) -> Option<DiscardReason> {
    let Some(expired_on) = approval.expired_on else {
        return Some(DiscardReason::NoExpiry);
    };
    let period = notification_type.reminder_period()?;
    if (now + period).date_naive() != expired_on.date_naive() {
        return Some(DiscardReason::NotDue);
    }
    if txn.has_submitter_approval_expiring_after(
        approval.requirement_id,
        approval.submitter_id,
        expired_on,
    ) {
        return Some(DiscardReason::AlreadyRenewed);
    }
    None
}

fn start_of_day(instant: Timestamp) -> Timestamp {
    Utc.from_utc_datetime(&instant.date_naive().and_time(NaiveTime::MIN))
}
