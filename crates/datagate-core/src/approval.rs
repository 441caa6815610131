//! Approval ledger rows

use crate::identifiers::{ApprovalId, Etag, PrincipalId, RequirementId};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a ledger row; `Revoked` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    /// Access granted
    Approved,
    /// Access withdrawn
    Revoked,
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approved => "APPROVED",
            Self::Revoked => "REVOKED",
        })
    }
}

/// Upsert key of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalKey {
    /// Requirement
    pub requirement_id: RequirementId,
    /// Requirement version the grant was made under
    pub requirement_version: u64,
    /// Sponsor of the grant
    pub submitter_id: PrincipalId,
    /// Holder of the grant
    pub accessor_id: PrincipalId,
}

/// Fields of a grant before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApproval {
    /// Requirement
    pub requirement_id: RequirementId,
    /// Requirement version the grant was made under
    pub requirement_version: u64,
    /// Sponsor of the grant
    pub submitter_id: PrincipalId,
    /// Holder of the grant
    pub accessor_id: PrincipalId,
    /// Actor recording the grant
    pub created_by: PrincipalId,
    /// Grant time
    pub created_on: Timestamp,
    /// Expiry; `None` never expires
    pub expired_on: Option<Timestamp>,
}

impl NewApproval {
    /// Upsert key of the grant
    pub fn key(&self) -> ApprovalKey {
        ApprovalKey {
            requirement_id: self.requirement_id,
            requirement_version: self.requirement_version,
            submitter_id: self.submitter_id,
            accessor_id: self.accessor_id,
        }
    }
}

/// A stored ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessApproval {
    /// Row id
    pub id: ApprovalId,
    /// Requirement
    pub requirement_id: RequirementId,
    /// Requirement version the grant was made under
    pub requirement_version: u64,
    /// Sponsor of the grant
    pub submitter_id: PrincipalId,
    /// Holder of the grant
    pub accessor_id: PrincipalId,
    /// Actor recording the grant
    pub created_by: PrincipalId,
    /// Grant time
    pub created_on: Timestamp,
    /// Last actor to change the row
    pub modified_by: PrincipalId,
    /// Last change time
    pub modified_on: Timestamp,
    /// Expiry; `None` never expires
    pub expired_on: Option<Timestamp>,
    /// Row state
    pub state: ApprovalState,
    /// Version token
    pub etag: Etag,
}

impl AccessApproval {
    /// Materialize a new `Approved` row
    pub fn from_new(id: ApprovalId, etag: Etag, new: NewApproval) -> Self {
        Self {
            id,
            requirement_id: new.requirement_id,
            requirement_version: new.requirement_version,
            submitter_id: new.submitter_id,
            accessor_id: new.accessor_id,
            created_by: new.created_by,
            created_on: new.created_on,
            modified_by: new.created_by,
            modified_on: new.created_on,
            expired_on: new.expired_on,
            state: ApprovalState::Approved,
            etag,
        }
    }

    /// Upsert key of the row
    pub fn key(&self) -> ApprovalKey {
        ApprovalKey {
            requirement_id: self.requirement_id,
            requirement_version: self.requirement_version,
            submitter_id: self.submitter_id,
            accessor_id: self.accessor_id,
        }
    }

    /// Approved and not yet expired at `now`
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.state == ApprovalState::Approved && self.expired_on.map_or(true, |e| e > now)
    }
}

/// Whether a user currently holds access to a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessApprovalInfo {
    /// User queried
    pub user_id: PrincipalId,
    /// Requirement queried
    pub requirement_id: RequirementId,
    /// An active approval exists
    pub has_access_approval: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn approval(expired_on: Option<Timestamp>) -> AccessApproval {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        AccessApproval::from_new(
            ApprovalId::new(1),
            Etag::new("e"),
            NewApproval {
                requirement_id: RequirementId::new(1),
                requirement_version: 1,
                submitter_id: PrincipalId::new(2),
                accessor_id: PrincipalId::new(3),
                created_by: PrincipalId::new(9),
                created_on: created,
                expired_on,
            },
        )
    }

    #[test]
    fn activity_depends_on_state_and_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(approval(None).is_active(now));
        assert!(approval(Some(now + Duration::days(1))).is_active(now));
        assert!(!approval(Some(now - Duration::days(1))).is_active(now));

        let mut revoked = approval(None);
        revoked.state = ApprovalState::Revoked;
        assert!(!revoked.is_active(now));
    }
}
