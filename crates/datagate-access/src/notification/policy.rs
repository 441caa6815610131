//! Resend policies
//!
//! A policy is consulted only when a notification row already exists for
//! the (type, requirement, recipient) key; the first send is always allowed.

use chrono::Duration;
use datagate_core::config::NotificationConfig;
use datagate_core::{AccessApproval, DataAccessNotification, Timestamp};

/// Decides whether an already-notified key may be notified again
pub trait ResendPolicy: Send + Sync {
    /// Whether `approval` warrants another message given the `existing` row
    fn can_resend(
        &self,
        approval: &AccessApproval,
        existing: &DataAccessNotification,
        now: Timestamp,
    ) -> bool;
}

/// Resend only for an approval modified after the last send, and only once
/// the cooldown separates the two
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownResendPolicy {
    cooldown: Duration,
}

impl CooldownResendPolicy {
    /// Policy with an explicit cooldown
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Policy using the configured cooldown
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.resend_cooldown())
    }
}

impl ResendPolicy for CooldownResendPolicy {
    fn can_resend(
        &self,
        approval: &AccessApproval,
        existing: &DataAccessNotification,
        _now: Timestamp,
    ) -> bool {
        let sent_on = existing.sent_on();
        approval.modified_on > sent_on && approval.modified_on - sent_on >= self.cooldown
    }
}

/// Resend once the cooldown has elapsed since the last send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderResendPolicy {
    cooldown: Duration,
}

impl ReminderResendPolicy {
    /// Policy with an explicit cooldown
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Policy using the configured cooldown
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.resend_cooldown())
    }
}

impl ResendPolicy for ReminderResendPolicy {
    fn can_resend(
        &self,
        _approval: &AccessApproval,
        existing: &DataAccessNotification,
        now: Timestamp,
    ) -> bool {
        now - existing.sent_on() >= self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use datagate_core::{
        ApprovalId, Etag, MessageId, NewApproval, NotificationId, NotificationRecord,
        NotificationType, PrincipalId, RequirementId,
    };

    fn at(day: u32) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()
    }

    fn approval_modified(modified_on: Timestamp) -> AccessApproval {
        let mut approval = AccessApproval::from_new(
            ApprovalId::new(1),
            Etag::new("e"),
            NewApproval {
                requirement_id: RequirementId::new(1),
                requirement_version: 1,
                submitter_id: PrincipalId::new(2),
                accessor_id: PrincipalId::new(2),
                created_by: PrincipalId::new(9),
                created_on: at(1),
                expired_on: None,
            },
        );
        approval.modified_on = modified_on;
        approval
    }

    fn sent(sent_on: Timestamp) -> DataAccessNotification {
        DataAccessNotification {
            id: NotificationId::new(1),
            record: NotificationRecord {
                notification_type: NotificationType::Revocation,
                requirement_id: RequirementId::new(1),
                recipient_id: PrincipalId::new(2),
                access_approval_id: ApprovalId::new(1),
                message_id: Some(MessageId::new(1)),
                sent_on,
            },
        }
    }

    #[test]
    fn cooldown_policy_needs_a_later_modification() {
        let policy = CooldownResendPolicy::new(Duration::days(7));
        let now = at(30);

        // Processed already: sent after the last modification
        assert!(!policy.can_resend(&approval_modified(at(10)), &sent(at(11)), now));
        // Modified again, but within the cooldown
        assert!(!policy.can_resend(&approval_modified(at(16)), &sent(at(11)), now));
        // Modified again, a full cooldown later
        assert!(policy.can_resend(&approval_modified(at(18)), &sent(at(11)), now));
    }

    #[test]
    fn reminder_policy_measures_against_now() {
        let policy = ReminderResendPolicy::new(Duration::days(7));
        let approval = approval_modified(at(1));

        assert!(!policy.can_resend(&approval, &sent(at(20)), at(26)));
        assert!(policy.can_resend(&approval, &sent(at(20)), at(27)));
    }
}
