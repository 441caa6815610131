//! Request and renewal drafts

use crate::changes::ChangeBatch;
use crate::effects::DataAccessEffects;
use crate::guards::require_reviewer;
use crate::research_project::managed_requirement;
use datagate_core::config::DraftConfig;
use datagate_core::errors::ensure;
use datagate_core::store::StoreTransaction;
use datagate_core::{
    AccessError, AccessResult, ChangeType, DataAccessRequest, DraftKind, NewRequest, ObjectType,
    PrincipalId, RequestId, RequirementId, SubmissionState,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Draft operations
pub struct DraftManager<E> {
    effects: Arc<E>,
    config: DraftConfig,
}

impl<E: DataAccessEffects> DraftManager<E> {
    /// Create a manager over `effects`
    pub fn new(effects: Arc<E>, config: DraftConfig) -> Self {
        Self { effects, config }
    }

    /// The user's open draft for a requirement, created on first use
    ///
    /// A new draft is a renewal when the user already holds an active
    /// approval for the requirement.
    pub async fn get_or_create_draft(
        &self,
        user: PrincipalId,
        requirement_id: RequirementId,
    ) -> AccessResult<DataAccessRequest> {
        let now = self.effects.now().await;

        let (draft, created) = self
            .effects
            .transaction(move |txn| {
                managed_requirement(txn, requirement_id)?;
                if let Some(existing) = txn.open_request_for(user, requirement_id) {
                    return Ok((existing, false));
                }
                let kind = if txn
                    .active_approvals_for(requirement_id, user, now)
                    .is_empty()
                {
                    DraftKind::Request
                } else {
                    DraftKind::Renewal {
                        publication: None,
                        summary_of_use: None,
                    }
                };
                let draft = txn.insert_request(NewRequest {
                    access_requirement_id: requirement_id,
                    created_by: user,
                    created_on: now,
                    kind,
                })?;
                Ok((draft, true))
            })
            .await?;

        if created {
            info!(
                "Created {} draft {} for {} on requirement {}",
                if draft.is_renewal() { "renewal" } else { "request" },
                draft.id,
                user,
                requirement_id
            );
            let mut batch = ChangeBatch::new(user, now);
            batch.record(ObjectType::DataAccessRequest, draft.id, ChangeType::Create);
            batch.publish(self.effects.as_ref()).await;
        }
        Ok(draft)
    }

    /// Save the user's edits to a draft
    pub async fn update(
        &self,
        user: PrincipalId,
        draft: DataAccessRequest,
    ) -> AccessResult<DataAccessRequest> {
        let now = self.effects.now().await;
        let max_accessors = self.config.max_accessors;

        let saved = self
            .effects
            .transaction(move |txn| {
                let stored = txn.request(draft.id)?;
                if stored.created_by != user {
                    return Err(AccessError::unauthorized(
                        "Only the owner can perform this action.",
                    ));
                }
                if stored.etag != draft.etag {
                    return Err(AccessError::stale("Request", stored.id));
                }

                ensure(
                    draft.access_requirement_id == stored.access_requirement_id,
                    "The accessRequirementId of a request cannot be changed.",
                )?;
                ensure(
                    draft.created_by == stored.created_by && draft.created_on == stored.created_on,
                    "The creation details of a request cannot be changed.",
                )?;
                ensure(
                    draft.is_renewal() == stored.is_renewal(),
                    "A request cannot be turned into a renewal or back.",
                )?;
                check_research_project(txn, &stored, &draft)?;
                if draft.accessor_changes.len() > max_accessors {
                    return Err(AccessError::validation(format!(
                        "A request cannot list more than {max_accessors} accessor changes."
                    )));
                }
                if txn.has_submission_in_state(
                    user,
                    stored.access_requirement_id,
                    SubmissionState::Submitted,
                ) {
                    return Err(AccessError::validation(
                        "A submission has been created. It has to be reviewed or cancelled before the request can be updated.",
                    ));
                }

                let expected = stored.etag;
                let updated = DataAccessRequest {
                    modified_by: user,
                    modified_on: now,
                    ..draft
                };
                txn.update_request(updated, &expected)
            })
            .await?;

        debug!("Draft {} updated by {}", saved.id, user);
        let mut batch = ChangeBatch::new(user, now);
        batch.record(ObjectType::DataAccessRequest, saved.id, ChangeType::Update);
        batch.publish(self.effects.as_ref()).await;
        Ok(saved)
    }

    /// Turn a draft into a renewal template
    pub async fn convert_to_renewal(
        &self,
        actor: PrincipalId,
        request_id: RequestId,
    ) -> AccessResult<DataAccessRequest> {
        require_reviewer(self.effects.as_ref(), actor).await?;
        let now = self.effects.now().await;

        let renewal = self
            .effects
            .transaction(move |txn| convert_to_renewal_in(txn, request_id))
            .await?;

        let mut batch = ChangeBatch::new(actor, now);
        batch.record(ObjectType::DataAccessRequest, renewal.id, ChangeType::Update);
        batch.publish(self.effects.as_ref()).await;
        Ok(renewal)
    }
}

/// Rewrite a stored draft as a renewal inside a transaction
pub(crate) fn convert_to_renewal_in(
    txn: &mut dyn StoreTransaction,
    request_id: RequestId,
) -> AccessResult<DataAccessRequest> {
    let request = txn.request(request_id)?;
    let expected = request.etag.clone();
    txn.update_request(request.into_renewal(), &expected)
}

/// A project may be attached once and must be the owner's own for the
/// same requirement
fn check_research_project(
    txn: &dyn StoreTransaction,
    stored: &DataAccessRequest,
    draft: &DataAccessRequest,
) -> AccessResult<()> {
    match (stored.research_project_id, draft.research_project_id) {
        (Some(current), Some(proposed)) if current == proposed => Ok(()),
        (Some(_), _) => Err(AccessError::validation(
            "The research project of a request cannot be changed.",
        )),
        (None, None) => Ok(()),
        (None, Some(proposed)) => {
            let project = txn.research_project(proposed)?;
            ensure(
                project.created_by == stored.created_by
                    && project.access_requirement_id == stored.access_requirement_id,
                "The research project must be your own project for this access requirement.",
            )
        }
    }
}
