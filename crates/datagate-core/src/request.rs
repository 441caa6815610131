//! Request and renewal drafts
//!
//! A draft is the mutable, pre-submission form a user fills in. There is at
//! most one open draft per (user, requirement). Once a submission built from
//! it is approved, the draft is turned into a renewal so the next round starts
//! from the approved accessor list.

use crate::identifiers::{Etag, PrincipalId, RequestId, RequirementId, ResearchProjectId};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a submission asks for on behalf of one accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessorChangeType {
    /// First-time access
    GainAccess,
    /// Extend access previously sponsored by the submitter
    RenewAccess,
    /// Remove access previously sponsored by the submitter
    RevokeAccess,
}

impl AccessorChangeType {
    /// The accessor holds access once the submission is approved
    pub fn grants_access(self) -> bool {
        matches!(self, Self::GainAccess | Self::RenewAccess)
    }

    /// The accessor must already have been sponsored by the submitter
    pub fn requires_prior_sponsorship(self) -> bool {
        matches!(self, Self::RenewAccess | Self::RevokeAccess)
    }
}

/// One entry of a draft's accessor list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessorChange {
    /// Accessor the change applies to
    pub user_id: PrincipalId,
    /// Requested change
    #[serde(rename = "type")]
    pub change_type: AccessorChangeType,
}

impl AccessorChange {
    /// Build a change
    pub fn new(user_id: PrincipalId, change_type: AccessorChangeType) -> Self {
        Self {
            user_id,
            change_type,
        }
    }
}

/// First user id listed more than once
pub fn duplicate_accessor(changes: &[AccessorChange]) -> Option<PrincipalId> {
    let mut seen = HashSet::with_capacity(changes.len());
    changes
        .iter()
        .map(|change| change.user_id)
        .find(|user_id| !seen.insert(*user_id))
}

/// Whether the draft is a first request or a renewal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "concreteType")]
pub enum DraftKind {
    /// First request for access
    Request,
    /// Renewal of previously approved access
    Renewal {
        /// Publications resulting from the data
        publication: Option<String>,
        /// How the data was used
        summary_of_use: Option<String>,
    },
}

/// Fields supplied when a draft is first stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    /// Requirement the draft is for
    pub access_requirement_id: RequirementId,
    /// Owner of the draft
    pub created_by: PrincipalId,
    /// Creation time
    pub created_on: Timestamp,
    /// Request or renewal
    pub kind: DraftKind,
}

/// A stored request or renewal draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccessRequest {
    /// Draft id
    pub id: RequestId,
    /// Requirement the draft is for; fixed
    pub access_requirement_id: RequirementId,
    /// Research project; may be attached once
    pub research_project_id: Option<ResearchProjectId>,
    /// Owner; fixed
    pub created_by: PrincipalId,
    /// Creation time; fixed
    pub created_on: Timestamp,
    /// Last editor
    pub modified_by: PrincipalId,
    /// Last edit time
    pub modified_on: Timestamp,
    /// Version token
    pub etag: Etag,
    /// Data use certificate file handle
    pub duc_file_handle_id: Option<String>,
    /// IRB approval file handle
    pub irb_file_handle_id: Option<String>,
    /// Other attachment file handles
    pub attachments: Vec<String>,
    /// Requested accessor changes
    pub accessor_changes: Vec<AccessorChange>,
    /// Request or renewal
    pub kind: DraftKind,
}

impl DataAccessRequest {
    /// Materialize a new draft
    pub fn from_new(id: RequestId, etag: Etag, new: NewRequest) -> Self {
        Self {
            id,
            access_requirement_id: new.access_requirement_id,
            research_project_id: None,
            created_by: new.created_by,
            created_on: new.created_on,
            modified_by: new.created_by,
            modified_on: new.created_on,
            etag,
            duc_file_handle_id: None,
            irb_file_handle_id: None,
            attachments: Vec::new(),
            accessor_changes: Vec::new(),
            kind: new.kind,
        }
    }

    /// Whether this draft is a renewal
    pub fn is_renewal(&self) -> bool {
        matches!(self.kind, DraftKind::Renewal { .. })
    }

    /// Publication text of a renewal
    pub fn publication(&self) -> Option<&str> {
        match &self.kind {
            DraftKind::Renewal { publication, .. } => publication.as_deref(),
            DraftKind::Request => None,
        }
    }

    /// Summary of use of a renewal
    pub fn summary_of_use(&self) -> Option<&str> {
        match &self.kind {
            DraftKind::Renewal { summary_of_use, .. } => summary_of_use.as_deref(),
            DraftKind::Request => None,
        }
    }

    /// Ids of accessors that hold access once approved
    pub fn accessors_gaining_access(&self) -> Vec<PrincipalId> {
        self.accessor_changes
            .iter()
            .filter(|change| change.change_type.grants_access())
            .map(|change| change.user_id)
            .collect()
    }

    /// Turn an approved draft into the template for the next renewal
    ///
    /// Gained accessors become renewals, renewals stay, revocations are
    /// dropped and the renewal text is cleared. Identity, etag and audit
    /// fields are preserved.
    pub fn into_renewal(mut self) -> Self {
        self.accessor_changes = self
            .accessor_changes
            .into_iter()
            .filter_map(|change| match change.change_type {
                AccessorChangeType::RevokeAccess => None,
                AccessorChangeType::GainAccess | AccessorChangeType::RenewAccess => Some(
                    AccessorChange::new(change.user_id, AccessorChangeType::RenewAccess),
                ),
            })
            .collect();
        self.kind = DraftKind::Renewal {
            publication: None,
            summary_of_use: None,
        };
        self
    }
}
