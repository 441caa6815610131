//! Authorization and accessor-policy guards shared by the managers

use datagate_core::effects::{AuthorizationEffects, VerificationEffects};
use datagate_core::{AccessError, AccessResult, AccessorPolicy, PrincipalId};

/// Message returned when a reviewer-only operation is attempted by anyone else
pub(crate) const REVIEWER_ONLY: &str = "Only ACT member can perform this action.";

/// Fail with `Unauthorized` unless `actor` is a reviewer
pub(crate) async fn require_reviewer<E>(effects: &E, actor: PrincipalId) -> AccessResult<()>
where
    E: AuthorizationEffects + ?Sized,
{
    if effects.is_reviewer(actor).await? {
        Ok(())
    } else {
        Err(AccessError::unauthorized(REVIEWER_ONLY))
    }
}

/// Enforce the certification and profile flags of a requirement on `accessors`
pub(crate) async fn check_accessor_policy<E>(
    effects: &E,
    policy: Option<AccessorPolicy>,
    accessors: &[PrincipalId],
) -> AccessResult<()>
where
    E: VerificationEffects + ?Sized,
{
    let Some(policy) = policy else {
        return Ok(());
    };
    if accessors.is_empty() || policy.is_empty() {
        return Ok(());
    }
    if policy.certified_user_required && !effects.are_certified(accessors).await? {
        return Err(AccessError::unauthorized(
            "Accessors must be certified users.",
        ));
    }
    if policy.validated_profile_required && !effects.have_validated_profiles(accessors).await? {
        return Err(AccessError::validation(
            "Accessors must have validated profiles.",
        ));
    }
    Ok(())
}
