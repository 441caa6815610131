//! Submission records and their state machine

use crate::identifiers::{Etag, PrincipalId, RequestId, RequirementId, SubmissionId};
use crate::request::AccessorChange;
use crate::research_project::ResearchProject;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Review state of a submission
///
/// `Submitted` is the only state with outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    /// Awaiting review
    Submitted,
    /// Accepted by a reviewer
    Approved,
    /// Declined by a reviewer
    Rejected,
    /// Withdrawn by the submitter
    Cancelled,
}

impl SubmissionState {
    /// Whether no transition leaves this state
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Submitted)
    }

    /// Whether `self → next` is an edge of the state machine
    pub fn can_transition_to(self, next: SubmissionState) -> bool {
        self == Self::Submitted && next != Self::Submitted
    }

    /// Wire name of the state
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields supplied when a submission is first stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    /// Draft the submission was built from
    pub request_id: RequestId,
    /// Requirement under review
    pub access_requirement_id: RequirementId,
    /// Requirement version the submission is reviewed against
    pub access_requirement_version: u64,
    /// Copy of the project at submission time
    pub research_project_snapshot: ResearchProject,
    /// Submitter
    pub submitted_by: PrincipalId,
    /// Submission time
    pub submitted_on: Timestamp,
    /// Data use certificate file handle
    pub duc_file_handle_id: Option<String>,
    /// IRB approval file handle
    pub irb_file_handle_id: Option<String>,
    /// Other attachment file handles
    pub attachments: Vec<String>,
    /// Requested accessor changes
    pub accessor_changes: Vec<AccessorChange>,
    /// Built from a renewal draft
    pub is_renewal_submission: bool,
    /// Publications (renewals)
    pub publication: Option<String>,
    /// Summary of use (renewals)
    pub summary_of_use: Option<String>,
}

/// A stored submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Submission id
    pub id: SubmissionId,
    /// Draft the submission was built from
    pub request_id: RequestId,
    /// Requirement under review
    pub access_requirement_id: RequirementId,
    /// Pinned requirement version
    pub access_requirement_version: u64,
    /// Copy of the project at submission time
    pub research_project_snapshot: ResearchProject,
    /// Submitter
    pub submitted_by: PrincipalId,
    /// Submission time
    pub submitted_on: Timestamp,
    /// Last actor to change the state
    pub modified_by: PrincipalId,
    /// Last state change time
    pub modified_on: Timestamp,
    /// Data use certificate file handle
    pub duc_file_handle_id: Option<String>,
    /// IRB approval file handle
    pub irb_file_handle_id: Option<String>,
    /// Other attachment file handles
    pub attachments: Vec<String>,
    /// Requested accessor changes
    pub accessor_changes: Vec<AccessorChange>,
    /// Built from a renewal draft
    pub is_renewal_submission: bool,
    /// Publications (renewals)
    pub publication: Option<String>,
    /// Summary of use (renewals)
    pub summary_of_use: Option<String>,
    /// Review state
    pub state: SubmissionState,
    /// Reason given on rejection
    pub rejected_reason: Option<String>,
    /// Version token
    pub etag: Etag,
}

impl Submission {
    /// Materialize a new submission in the `Submitted` state
    pub fn from_new(id: SubmissionId, etag: Etag, new: NewSubmission) -> Self {
        Self {
            id,
            request_id: new.request_id,
            access_requirement_id: new.access_requirement_id,
            access_requirement_version: new.access_requirement_version,
            research_project_snapshot: new.research_project_snapshot,
            submitted_by: new.submitted_by,
            submitted_on: new.submitted_on,
            modified_by: new.submitted_by,
            modified_on: new.submitted_on,
            duc_file_handle_id: new.duc_file_handle_id,
            irb_file_handle_id: new.irb_file_handle_id,
            attachments: new.attachments,
            accessor_changes: new.accessor_changes,
            is_renewal_submission: new.is_renewal_submission,
            publication: new.publication,
            summary_of_use: new.summary_of_use,
            state: SubmissionState::Submitted,
            rejected_reason: None,
            etag,
        }
    }

    /// Whether approving this submission grants access to `principal`
    pub fn grants_access_to(&self, principal: PrincipalId) -> bool {
        self.accessor_changes
            .iter()
            .any(|change| change.user_id == principal && change.change_type.grants_access())
    }

    /// Summary shown to the submitter
    pub fn status(&self) -> SubmissionStatus {
        SubmissionStatus {
            submission_id: self.id,
            submitted_by: self.submitted_by,
            state: self.state,
            rejected_reason: self.rejected_reason.clone(),
            modified_on: self.modified_on,
        }
    }
}

/// Status view of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    /// Submission id
    pub submission_id: SubmissionId,
    /// Submitter
    pub submitted_by: PrincipalId,
    /// Review state
    pub state: SubmissionState,
    /// Reason given on rejection
    pub rejected_reason: Option<String>,
    /// Last state change time
    pub modified_on: Timestamp,
}

/// Subscription of a principal to status changes of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionSubscription {
    /// Subscriber
    pub subscriber: PrincipalId,
    /// Submission watched
    pub submission_id: SubmissionId,
}
