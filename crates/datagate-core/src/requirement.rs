//! Access requirement catalog types
//!
//! A requirement is versioned: every edit stores a new version under the same
//! id and older versions stay readable, because submissions and approvals pin
//! the version they were reviewed against.

use crate::errors::{AccessError, AccessResult};
use crate::identifiers::{Etag, RequirementId};
use crate::Timestamp;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What satisfying the requirement unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    /// Download of protected files
    Download,
    /// Participation in a challenge or team
    Participate,
}

/// Kind of object a requirement restricts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestrictableKind {
    /// A file or folder entity
    Entity,
    /// A team
    Team,
    /// An evaluation queue
    Evaluation,
}

/// An object the requirement applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestrictableObject {
    /// External id of the object
    pub id: String,
    /// Kind of the object
    pub kind: RestrictableKind,
}

/// Flags every accessor must satisfy before access is granted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorPolicy {
    /// Accessors must have passed the certification quiz
    pub certified_user_required: bool,
    /// Accessors must have a validated profile
    pub validated_profile_required: bool,
}

impl AccessorPolicy {
    /// True when no accessor check is needed
    pub fn is_empty(&self) -> bool {
        !self.certified_user_required && !self.validated_profile_required
    }
}

/// Review policy of a managed requirement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedActPolicy {
    /// A data use certificate must be attached
    pub duc_required: bool,
    /// Template the submitter fills in for the DUC
    pub duc_template_file_handle_id: Option<String>,
    /// An IRB approval must be attached
    pub irb_approval_required: bool,
    /// Other attachments must be supplied
    pub are_other_attachments_required: bool,
    /// Accessor-level checks
    #[serde(flatten)]
    pub accessor_policy: AccessorPolicy,
    /// Approvals must be renewed on a schedule
    pub is_annual_review_required: bool,
    /// Lifetime of an approval in milliseconds; zero means it never expires
    pub expiration_period_ms: u64,
    /// The project must state its intended data use
    pub is_idu_required: bool,
    /// Intended data use statements are published
    pub is_idu_public: bool,
}

impl ManagedActPolicy {
    /// Expiry of an approval granted at `granted_on`
    ///
    /// A period that runs past the representable range is a validation
    /// error, never an approval without expiry.
    pub fn expiration_from(&self, granted_on: Timestamp) -> AccessResult<Option<Timestamp>> {
        if self.expiration_period_ms == 0 {
            return Ok(None);
        }
        i64::try_from(self.expiration_period_ms)
            .ok()
            .and_then(|period| granted_on.checked_add_signed(Duration::milliseconds(period)))
            .map(Some)
            .ok_or_else(|| {
                AccessError::validation(format!(
                    "The expiration period of {} ms is out of range.",
                    self.expiration_period_ms
                ))
            })
    }
}

/// Variant of a requirement with the fields specific to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "concreteType")]
pub enum RequirementKind {
    /// Click-through terms of use
    TermsOfUse {
        /// Terms shown to the user
        terms_of_use: Option<String>,
    },
    /// Click-through that may also demand accessor checks
    SelfSign {
        /// Accessor-level checks
        #[serde(flatten)]
        accessor_policy: AccessorPolicy,
    },
    /// Legacy reviewer-granted requirement
    Act {
        /// Contact details shown to requesters
        act_contact_info: Option<String>,
    },
    /// Reviewed request/submission workflow
    ManagedAct(ManagedActPolicy),
    /// Manual lock lifted through a ticket
    Lock {
        /// Ticket tracking the lock
        jira_key: Option<String>,
    },
    /// Legacy requirement rendered from a wiki page
    PostMessageContent {
        /// Page describing the requirement
        url: Option<String>,
    },
}

impl RequirementKind {
    /// Stable name of the variant used in messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::TermsOfUse { .. } => "TermsOfUseAccessRequirement",
            Self::SelfSign { .. } => "SelfSignAccessRequirement",
            Self::Act { .. } => "ACTAccessRequirement",
            Self::ManagedAct(_) => "ManagedACTAccessRequirement",
            Self::Lock { .. } => "LockAccessRequirement",
            Self::PostMessageContent { .. } => "PostMessageContentAccessRequirement",
        }
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// One version of an access requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    /// Identifier shared by all versions
    pub id: RequirementId,
    /// Monotonic version, assigned by the catalog
    pub version_number: u64,
    /// Human-readable name
    pub name: String,
    /// What satisfying the requirement unlocks
    pub access_type: AccessType,
    /// Objects restricted by the requirement
    pub subject_ids: Vec<RestrictableObject>,
    /// Version token, assigned by the catalog
    pub etag: Etag,
    /// Variant-specific policy
    pub kind: RequirementKind,
}

impl AccessRequirement {
    /// Unversioned requirement ready to be put into the catalog
    pub fn new(id: RequirementId, name: impl Into<String>, kind: RequirementKind) -> Self {
        Self {
            id,
            version_number: 0,
            name: name.into(),
            access_type: AccessType::Download,
            subject_ids: Vec::new(),
            etag: Etag::generate(),
            kind,
        }
    }

    /// Set the access type
    pub fn with_access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }

    /// Add a restricted object
    pub fn with_subject(mut self, id: impl Into<String>, kind: RestrictableKind) -> Self {
        self.subject_ids.push(RestrictableObject { id: id.into(), kind });
        self
    }

    /// Review policy when this is a managed requirement
    pub fn managed_policy(&self) -> Option<&ManagedActPolicy> {
        match &self.kind {
            RequirementKind::ManagedAct(policy) => Some(policy),
            _ => None,
        }
    }

    /// Accessor checks for the variants that carry them
    pub fn accessor_policy(&self) -> Option<AccessorPolicy> {
        match &self.kind {
            RequirementKind::SelfSign { accessor_policy } => Some(*accessor_policy),
            RequirementKind::ManagedAct(policy) => Some(policy.accessor_policy),
            _ => None,
        }
    }

    /// Whether the requirement runs the reviewed workflow
    pub fn is_managed(&self) -> bool {
        matches!(self.kind, RequirementKind::ManagedAct(_))
    }

    /// Whether approvals may be recorded against this variant
    pub fn accepts_approvals(&self) -> bool {
        !matches!(
            self.kind,
            RequirementKind::Lock { .. } | RequirementKind::PostMessageContent { .. }
        )
    }

    /// Whether users may record their own approval for this variant
    pub fn is_self_signable(&self) -> bool {
        matches!(
            self.kind,
            RequirementKind::TermsOfUse { .. } | RequirementKind::SelfSign { .. }
        )
    }

    /// Whether the project must state its intended data use
    pub fn requires_idu(&self) -> bool {
        self.managed_policy().is_some_and(|p| p.is_idu_required)
    }
}
