//! Change messages
//!
//! Committed mutations are announced as change messages so that
//! asynchronous consumers (notifications, indexing) can react without being
//! part of the write.

use crate::identifiers::PrincipalId;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Kind of object a change message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    /// An approval ledger row
    AccessApproval,
    /// A submission
    DataAccessSubmission,
    /// The status of a submission
    DataAccessSubmissionStatus,
    /// A request or renewal draft
    DataAccessRequest,
    /// A research project
    ResearchProject,
}

/// What happened to the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    /// Object created
    Create,
    /// Object updated
    Update,
    /// Object deleted
    Delete,
}

/// Announcement of a committed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// Kind of object changed
    pub object_type: ObjectType,
    /// Id of the object, as text
    pub object_id: String,
    /// What happened
    pub change_type: ChangeType,
    /// Actor responsible for the change
    pub user_id: PrincipalId,
    /// Commit time
    pub timestamp: Timestamp,
}

impl ChangeMessage {
    /// Build a message for an object id
    pub fn new(
        object_type: ObjectType,
        object_id: impl Display,
        change_type: ChangeType,
        user_id: PrincipalId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            object_type,
            object_id: object_id.to_string(),
            change_type,
            user_id,
            timestamp,
        }
    }
}
