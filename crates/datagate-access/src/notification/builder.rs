//! Message rendering per notification type

use datagate_core::{
    AccessApproval, AccessError, AccessRequirement, AccessResult, NotificationType, PrincipalId,
    RenderedMessage, Timestamp,
};
use std::collections::HashMap;
use std::fmt::Write;

const MARKDOWN: &str = "text/markdown";

/// Renders the subject and body of one notification type
pub trait NotificationBuilder: Send + Sync {
    /// Subject line
    fn subject(&self, requirement: &AccessRequirement, approval: &AccessApproval) -> String;

    /// Message body
    fn body(
        &self,
        requirement: &AccessRequirement,
        approval: &AccessApproval,
        recipient: PrincipalId,
    ) -> String;

    /// MIME type of the body
    fn mime_type(&self) -> &'static str {
        MARKDOWN
    }

    /// Full message sent on behalf of the notifications principal
    fn build(
        &self,
        requirement: &AccessRequirement,
        approval: &AccessApproval,
        recipient: PrincipalId,
    ) -> RenderedMessage {
        RenderedMessage {
            sender: PrincipalId::DATA_ACCESS_NOTIFICATIONS_SENDER,
            subject: self.subject(requirement, approval),
            body: self.body(requirement, approval, recipient),
            mime_type: self.mime_type().to_string(),
        }
    }
}

fn format_date(instant: Timestamp) -> String {
    instant.format("%B %-d, %Y").to_string()
}

fn requirement_title(requirement: &AccessRequirement) -> String {
    if requirement.name.trim().is_empty() {
        format!("access requirement {}", requirement.id)
    } else {
        format!("{} (access requirement {})", requirement.name, requirement.id)
    }
}

fn subjects(requirement: &AccessRequirement) -> String {
    requirement
        .subject_ids
        .iter()
        .map(|subject| format!("- {}", subject.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tells an accessor their access was revoked
#[derive(Debug, Clone, Copy, Default)]
pub struct RevocationBuilder;

impl NotificationBuilder for RevocationBuilder {
    fn subject(&self, requirement: &AccessRequirement, _approval: &AccessApproval) -> String {
        format!("Data access revoked for {}", requirement_title(requirement))
    }

    fn body(
        &self,
        requirement: &AccessRequirement,
        approval: &AccessApproval,
        recipient: PrincipalId,
    ) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "Dear user {recipient},\n");
        let _ = writeln!(
            body,
            "Your access to the data governed by **{}** was revoked on {}.",
            requirement_title(requirement),
            format_date(approval.modified_on)
        );
        let listed = subjects(requirement);
        if !listed.is_empty() {
            let _ = writeln!(body, "\nThe following resources are affected:\n\n{listed}");
        }
        if approval.submitter_id != recipient {
            let _ = writeln!(
                body,
                "\nYour access was granted through a request submitted by user {}. \
                 Contact them if you believe you still need access.",
                approval.submitter_id
            );
        } else {
            let _ = writeln!(
                body,
                "\nYou can submit a new request for access at any time."
            );
        }
        body
    }
}

/// Reminds a submitter that their approval is about to expire
#[derive(Debug, Clone, Copy)]
pub struct RenewalReminderBuilder {
    notification_type: NotificationType,
}

impl RenewalReminderBuilder {
    /// Builder for the first or second reminder
    pub fn new(notification_type: NotificationType) -> Self {
        Self { notification_type }
    }
}

impl NotificationBuilder for RenewalReminderBuilder {
    fn subject(&self, requirement: &AccessRequirement, _approval: &AccessApproval) -> String {
        let prefix = match self.notification_type {
            NotificationType::SecondRenewalReminder => "Final reminder: ",
            _ => "",
        };
        format!(
            "{prefix}Data access renewal due for {}",
            requirement_title(requirement)
        )
    }

    fn body(
        &self,
        requirement: &AccessRequirement,
        approval: &AccessApproval,
        recipient: PrincipalId,
    ) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "Dear user {recipient},\n");
        match approval.expired_on {
            Some(expired_on) => {
                let _ = writeln!(
                    body,
                    "Your access to the data governed by **{}** expires on {}.",
                    requirement_title(requirement),
                    format_date(expired_on)
                );
            }
            None => {
                let _ = writeln!(
                    body,
                    "Your access to the data governed by **{}** is due for renewal.",
                    requirement_title(requirement)
                );
            }
        }
        let _ = writeln!(
            body,
            "\nTo keep access for you and your accessors, submit a renewal request \
             before that date. Your previous request has been prepared as a renewal."
        );
        body
    }
}

/// Builder lookup by notification type
pub struct BuilderRegistry {
    builders: HashMap<NotificationType, Box<dyn NotificationBuilder>>,
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::new()
            .with(NotificationType::Revocation, RevocationBuilder)
            .with(
                NotificationType::FirstRenewalReminder,
                RenewalReminderBuilder::new(NotificationType::FirstRenewalReminder),
            )
            .with(
                NotificationType::SecondRenewalReminder,
                RenewalReminderBuilder::new(NotificationType::SecondRenewalReminder),
            )
    }
}

impl BuilderRegistry {
    /// Registry with no builders
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Register `builder` for `notification_type`, replacing any previous one
    pub fn with<B: NotificationBuilder + 'static>(
        mut self,
        notification_type: NotificationType,
        builder: B,
    ) -> Self {
        self.builders.insert(notification_type, Box::new(builder));
        self
    }

    /// Builder for `notification_type`
    pub fn get(&self, notification_type: NotificationType) -> AccessResult<&dyn NotificationBuilder> {
        self.builders
            .get(&notification_type)
            .map(|builder| builder.as_ref())
            .ok_or_else(|| {
                AccessError::internal(format!(
                    "Could not find a message builder for {notification_type} notification type."
                ))
            })
    }
}
