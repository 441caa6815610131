//! Notification records and types
//!
//! A notification row remembers what was last sent for a
//! (type, requirement, recipient) triple so that replayed change events do
//! not produce duplicate messages.

use crate::approval::{AccessApproval, ApprovalState};
use crate::identifiers::{ApprovalId, MessageId, NotificationId, PrincipalId, RequirementId};
use crate::Timestamp;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Access was revoked
    Revocation,
    /// Access expires in a month
    FirstRenewalReminder,
    /// Access expires in a week
    SecondRenewalReminder,
}

impl NotificationType {
    /// Every notification type
    pub const ALL: [NotificationType; 3] = [
        Self::Revocation,
        Self::FirstRenewalReminder,
        Self::SecondRenewalReminder,
    ];

    /// Approval state the triggering approval must be in
    pub fn expected_state(self) -> ApprovalState {
        match self {
            Self::Revocation => ApprovalState::Revoked,
            Self::FirstRenewalReminder | Self::SecondRenewalReminder => ApprovalState::Approved,
        }
    }

    /// Whether this is a renewal reminder
    pub fn is_reminder(self) -> bool {
        self.reminder_period().is_some()
    }

    /// How long before expiry a reminder goes out
    pub fn reminder_period(self) -> Option<Duration> {
        match self {
            Self::Revocation => None,
            Self::FirstRenewalReminder => Some(Duration::days(30)),
            Self::SecondRenewalReminder => Some(Duration::days(7)),
        }
    }

    /// Who the notification goes to
    pub fn recipient_of(self, approval: &AccessApproval) -> PrincipalId {
        if self.is_reminder() {
            approval.submitter_id
        } else {
            approval.accessor_id
        }
    }

    /// Wire name of the type
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Revocation => "REVOCATION",
            Self::FirstRenewalReminder => "FIRST_RENEWAL_REMINDER",
            Self::SecondRenewalReminder => "SECOND_RENEWAL_REMINDER",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dedup key of a notification row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationKey {
    /// Kind of notification
    pub notification_type: NotificationType,
    /// Requirement the notification is about
    pub requirement_id: RequirementId,
    /// Recipient
    pub recipient_id: PrincipalId,
}

/// Content of a notification row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Kind of notification
    pub notification_type: NotificationType,
    /// Requirement the notification is about
    pub requirement_id: RequirementId,
    /// Recipient
    pub recipient_id: PrincipalId,
    /// Approval that triggered the send
    pub access_approval_id: ApprovalId,
    /// Delivered message; `None` when delivery was suppressed
    pub message_id: Option<MessageId>,
    /// Time of the (possibly suppressed) send
    pub sent_on: Timestamp,
}

impl NotificationRecord {
    /// Dedup key of the record
    pub fn key(&self) -> NotificationKey {
        NotificationKey {
            notification_type: self.notification_type,
            requirement_id: self.requirement_id,
            recipient_id: self.recipient_id,
        }
    }
}

/// A stored notification row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccessNotification {
    /// Row id
    pub id: NotificationId,
    /// Row content
    #[serde(flatten)]
    pub record: NotificationRecord,
}

impl DataAccessNotification {
    /// Dedup key of the row
    pub fn key(&self) -> NotificationKey {
        self.record.key()
    }

    /// Time of the last send
    pub fn sent_on(&self) -> Timestamp {
        self.record.sent_on
    }

    /// Whether a message actually went out
    pub fn was_delivered(&self) -> bool {
        self.record.message_id.is_some()
    }
}

/// A message ready for the delivery transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// Principal the message is sent as
    pub sender: PrincipalId,
    /// Subject line
    pub subject: String,
    /// Body text
    pub body: String,
    /// MIME type of the body
    pub mime_type: String,
}

/// Runtime feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    /// Send data access notifications
    DataAccessNotifications,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminders_expect_approved_approvals() {
        assert_eq!(
            NotificationType::Revocation.expected_state(),
            ApprovalState::Revoked
        );
        for t in [
            NotificationType::FirstRenewalReminder,
            NotificationType::SecondRenewalReminder,
        ] {
            assert!(t.is_reminder());
            assert_eq!(t.expected_state(), ApprovalState::Approved);
        }
        assert!(!NotificationType::Revocation.is_reminder());
    }

    #[test]
    fn reminder_periods() {
        assert_eq!(
            NotificationType::FirstRenewalReminder.reminder_period(),
            Some(Duration::days(30))
        );
        assert_eq!(
            NotificationType::SecondRenewalReminder.reminder_period(),
            Some(Duration::days(7))
        );
    }
}
