//! Research project records

use crate::identifiers::{Etag, PrincipalId, RequirementId, ResearchProjectId};
use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// User-editable fields of a research project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchProjectDetails {
    /// Person leading the project
    pub project_lead: String,
    /// Institution the project belongs to
    pub institution: String,
    /// What the data will be used for
    pub intended_data_use_statement: Option<String>,
}

impl ResearchProjectDetails {
    /// Whether an intended data use statement with content is present
    pub fn has_idu(&self) -> bool {
        self.intended_data_use_statement
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Project metadata owned by one user for one requirement
///
/// `id` and `etag` are `None` for an unsaved template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchProject {
    /// Assigned on first save
    pub id: Option<ResearchProjectId>,
    /// Requirement the project applies to; fixed after creation
    pub access_requirement_id: RequirementId,
    /// Owner of the project
    pub created_by: PrincipalId,
    /// Creation time
    pub created_on: Option<Timestamp>,
    /// Last editor
    pub modified_by: PrincipalId,
    /// Last edit time
    pub modified_on: Option<Timestamp>,
    /// Version token; `None` until saved
    pub etag: Option<Etag>,
    /// Editable content
    pub details: ResearchProjectDetails,
}

impl ResearchProject {
    /// Unsaved project owned by `owner`
    pub fn template(owner: PrincipalId, access_requirement_id: RequirementId) -> Self {
        Self {
            id: None,
            access_requirement_id,
            created_by: owner,
            created_on: None,
            modified_by: owner,
            modified_on: None,
            etag: None,
            details: ResearchProjectDetails::default(),
        }
    }

    /// Replace the editable content
    pub fn with_details(mut self, details: ResearchProjectDetails) -> Self {
        self.details = details;
        self
    }

    /// Whether the project has been saved
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}
