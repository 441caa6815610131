//! Principal and requirement fixtures

use chrono::{Duration, TimeZone, Utc};
use datagate_core::{
    AccessRequirement, AccessType, AccessorPolicy, ManagedActPolicy, NewApproval, PrincipalId,
    RequirementId, RequirementKind, ResearchProjectDetails, RestrictableKind, Timestamp,
};

/// Reviewer seeded by [`crate::TestEffects`]
pub const REVIEWER: PrincipalId = PrincipalId(1_000);
/// Submitter of most scenarios
pub const SUBMITTER: PrincipalId = PrincipalId(2_000);
/// First co-accessor
pub const ACCESSOR_A: PrincipalId = PrincipalId(3_001);
/// Second co-accessor
pub const ACCESSOR_B: PrincipalId = PrincipalId(3_002);
/// A principal with no standing anywhere
pub const OUTSIDER: PrincipalId = PrincipalId(9_999);

/// Clock reading every `TestEffects` starts from
pub fn fixed_now() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// One year in milliseconds
pub const ONE_YEAR_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Filled-in project details
pub fn project_details() -> ResearchProjectDetails {
    ResearchProjectDetails {
        project_lead: "Dr. Lead".to_string(),
        institution: "Institute".to_string(),
        intended_data_use_statement: Some("Cohort analysis".to_string()),
    }
}

/// Builder for catalog entries
#[derive(Debug, Clone)]
pub struct RequirementBuilder {
    requirement: AccessRequirement,
}

impl RequirementBuilder {
    fn with_kind(id: u64, name: &str, kind: RequirementKind) -> Self {
        Self {
            requirement: AccessRequirement::new(RequirementId::new(id), name, kind)
                .with_subject(format!("syn{id}"), RestrictableKind::Entity),
        }
    }

    /// Managed requirement with no attachments required and one-year expiry
    pub fn managed(id: u64) -> Self {
        Self::with_kind(
            id,
            "Managed dataset",
            RequirementKind::ManagedAct(ManagedActPolicy {
                expiration_period_ms: ONE_YEAR_MS,
                ..ManagedActPolicy::default()
            }),
        )
    }

    /// Terms-of-use requirement
    pub fn terms_of_use(id: u64) -> Self {
        Self::with_kind(
            id,
            "Terms of use",
            RequirementKind::TermsOfUse {
                terms_of_use: Some("Be nice".to_string()),
            },
        )
    }

    /// Self-sign requirement with no accessor checks
    pub fn self_sign(id: u64) -> Self {
        Self::with_kind(
            id,
            "Self sign",
            RequirementKind::SelfSign {
                accessor_policy: AccessorPolicy::default(),
            },
        )
    }

    /// Lock requirement
    pub fn lock(id: u64) -> Self {
        Self::with_kind(
            id,
            "Lock",
            RequirementKind::Lock {
                jira_key: Some("LOCK-1".to_string()),
            },
        )
    }

    fn managed_policy(&mut self) -> Option<&mut ManagedActPolicy> {
        match &mut self.requirement.kind {
            RequirementKind::ManagedAct(policy) => Some(policy),
            _ => None,
        }
    }

    fn accessor_policy(&mut self) -> Option<&mut AccessorPolicy> {
        match &mut self.requirement.kind {
            RequirementKind::ManagedAct(policy) => Some(&mut policy.accessor_policy),
            RequirementKind::SelfSign { accessor_policy } => Some(accessor_policy),
            _ => None,
        }
    }

    /// Require a data use certificate
    pub fn duc_required(mut self) -> Self {
        if let Some(policy) = self.managed_policy() {
            policy.duc_required = true;
        }
        self
    }

    /// Require an IRB approval
    pub fn irb_required(mut self) -> Self {
        if let Some(policy) = self.managed_policy() {
            policy.irb_approval_required = true;
        }
        self
    }

    /// Require other attachments
    pub fn attachments_required(mut self) -> Self {
        if let Some(policy) = self.managed_policy() {
            policy.are_other_attachments_required = true;
        }
        self
    }

    /// Require an intended data use statement
    pub fn idu_required(mut self) -> Self {
        if let Some(policy) = self.managed_policy() {
            policy.is_idu_required = true;
        }
        self
    }

    /// Set the approval lifetime; zero never expires
    pub fn expiration(mut self, period: Duration) -> Self {
        let ms = u64::try_from(period.num_milliseconds()).unwrap_or(0);
        if let Some(policy) = self.managed_policy() {
            policy.expiration_period_ms = ms;
        }
        self
    }

    /// Require certified accessors
    pub fn certified_required(mut self) -> Self {
        if let Some(policy) = self.accessor_policy() {
            policy.certified_user_required = true;
        }
        self
    }

    /// Require validated profiles
    pub fn validated_required(mut self) -> Self {
        if let Some(policy) = self.accessor_policy() {
            policy.validated_profile_required = true;
        }
        self
    }

    /// Unlock participation instead of download
    pub fn participate(mut self) -> Self {
        self.requirement.access_type = AccessType::Participate;
        self
    }

    /// Finish
    pub fn build(self) -> AccessRequirement {
        self.requirement
    }
}

/// Grant from `submitter` to `accessor` under version 1 of `requirement_id`
pub fn grant(
    requirement_id: RequirementId,
    submitter: PrincipalId,
    accessor: PrincipalId,
    expired_on: Option<Timestamp>,
) -> NewApproval {
    NewApproval {
        requirement_id,
        requirement_version: 1,
        submitter_id: submitter,
        accessor_id: accessor,
        created_by: REVIEWER,
        created_on: fixed_now() - Duration::days(365),
        expired_on,
    }
}
