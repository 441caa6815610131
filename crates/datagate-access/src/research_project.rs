//! Research project store
//!
//! Each user keeps at most one research project per managed requirement. A
//! draft points at it, and a submission snapshots it.

use crate::changes::ChangeBatch;
use crate::effects::DataAccessEffects;
use datagate_core::errors::ensure;
use datagate_core::store::StoreTransaction;
use datagate_core::{
    AccessError, AccessRequirement, AccessResult, ChangeType, ObjectType, PrincipalId,
    RequirementId, ResearchProject,
};
use std::sync::Arc;
use tracing::info;

/// Research project operations
pub struct ResearchProjectManager<E> {
    effects: Arc<E>,
}

impl<E: DataAccessEffects> ResearchProjectManager<E> {
    /// Create a manager over `effects`
    pub fn new(effects: Arc<E>) -> Self {
        Self { effects }
    }

    /// The user's project for the requirement, or an unsaved template
    pub async fn get_or_template(
        &self,
        user: PrincipalId,
        requirement_id: RequirementId,
    ) -> AccessResult<ResearchProject> {
        self.effects
            .transaction(move |txn| {
                managed_requirement(txn, requirement_id)?;
                Ok(txn
                    .research_project_for(user, requirement_id)
                    .unwrap_or_else(|| ResearchProject::template(user, requirement_id)))
            })
            .await
    }

    /// Save a project
    ///
    /// A project without an id is created; otherwise the stored project is
    /// replaced if the caller owns it and the etag is current.
    pub async fn create_or_update(
        &self,
        user: PrincipalId,
        project: ResearchProject,
    ) -> AccessResult<ResearchProject> {
        let now = self.effects.now().await;
        let mut batch = ChangeBatch::new(user, now);

        let (saved, change_type) = self
            .effects
            .transaction(move |txn| {
                let requirement = managed_requirement(txn, project.access_requirement_id)?;
                validate_details(&requirement, &project)?;

                match project.id {
                    None => {
                        if txn
                            .research_project_for(user, project.access_requirement_id)
                            .is_some()
                        {
                            return Err(AccessError::validation(format!(
                                "A research project for access requirement {} already exists.",
                                project.access_requirement_id
                            )));
                        }
                        let mut created = project;
                        created.created_by = user;
                        created.created_on = Some(now);
                        created.modified_by = user;
                        created.modified_on = Some(now);
                        created.etag = None;
                        Ok((txn.insert_research_project(created)?, ChangeType::Create))
                    }
                    Some(id) => {
                        let stored = txn.research_project(id)?;
                        if stored.created_by != user {
                            return Err(AccessError::unauthorized(
                                "Only the owner can perform this action.",
                            ));
                        }
                        let expected = stored.etag.clone().ok_or_else(|| {
                            AccessError::internal(format!("Research project {id} has no etag."))
                        })?;
                        if project.etag.as_ref() != Some(&expected) {
                            return Err(AccessError::stale("Research project", id));
                        }
                        ensure(
                            stored.access_requirement_id == project.access_requirement_id,
                            "The access requirement of a research project cannot be changed.",
                        )?;

                        let updated = ResearchProject {
                            created_by: stored.created_by,
                            created_on: stored.created_on,
                            modified_by: user,
                            modified_on: Some(now),
                            ..project
                        };
                        Ok((
                            txn.update_research_project(updated, &expected)?,
                            ChangeType::Update,
                        ))
                    }
                }
            })
            .await?;

        if let Some(id) = saved.id {
            info!(
                "Research project {} {:?} by {} for requirement {}",
                id, change_type, user, saved.access_requirement_id
            );
            batch.record(ObjectType::ResearchProject, id, change_type);
        }
        batch.publish(self.effects.as_ref()).await;
        Ok(saved)
    }
}

/// Load a requirement and insist it is managed
pub(crate) fn managed_requirement(
    txn: &dyn StoreTransaction,
    requirement_id: RequirementId,
) -> AccessResult<AccessRequirement> {
    let requirement = txn.requirement(requirement_id)?;
    if !requirement.is_managed() {
        return Err(AccessError::validation(format!(
            "Access requirement {} is a {}, not a ManagedACTAccessRequirement.",
            requirement_id, requirement.kind
        )));
    }
    Ok(requirement)
}

fn validate_details(
    requirement: &AccessRequirement,
    project: &ResearchProject,
) -> AccessResult<()> {
    ensure(
        !project.details.project_lead.trim().is_empty(),
        "The project lead is required.",
    )?;
    ensure(
        !project.details.institution.trim().is_empty(),
        "The institution is required.",
    )?;
    if requirement.requires_idu() {
        ensure(
            project.details.has_idu(),
            "An intended data use statement is required.",
        )?;
    }
    Ok(())
}
