//! Test effect system
//!
//! `TestEffects` wires an `AccessEffectSystem` from in-process handlers and
//! keeps a handle on each so tests can steer time, inspect published changes
//! and delivered messages, and grant standing to principals.

use crate::clock::ManualClock;
use crate::fixtures::{fixed_now, REVIEWER};
use crate::messenger::RecordingMessenger;
use datagate_core::config::EnvironmentConfig;
use datagate_core::store::AccessStore;
use datagate_core::{
    AccessApproval, AccessRequirement, ApprovalId, Feature, NewApproval, PrincipalId,
    SubmissionId,
};
use datagate_effects::{
    AccessEffectSystem, ConfiguredEnvironmentHandler, DirectoryHandler, MemoryAccessStore,
    OutboxDeliveryHandler,
};
use std::sync::Arc;

/// Effect system plus handles on its handlers
pub struct TestEffects {
    /// The wired system
    pub system: Arc<AccessEffectSystem>,
    /// Clock starting at [`fixed_now`]
    pub clock: Arc<ManualClock>,
    /// Every published change
    pub messenger: Arc<RecordingMessenger>,
    /// Every delivered message
    pub outbox: Arc<OutboxDeliveryHandler>,
    /// Reviewer and verification lookups
    pub directory: Arc<DirectoryHandler>,
    /// Stack, testing group and feature flags
    pub environment: Arc<ConfiguredEnvironmentHandler>,
}

impl TestEffects {
    /// Production stack, notifications enabled, [`REVIEWER`] registered
    pub async fn new() -> Self {
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let messenger = Arc::new(RecordingMessenger::new());
        let outbox = Arc::new(OutboxDeliveryHandler::new());
        let directory = Arc::new(DirectoryHandler::new());
        let environment = Arc::new(ConfiguredEnvironmentHandler::from_config(
            &EnvironmentConfig {
                production_stack: Some(true),
                testing_group: Vec::new(),
                features: vec![Feature::DataAccessNotifications],
            },
        ));
        directory.add_reviewer(REVIEWER).await;

        let system = AccessEffectSystem::builder(Arc::new(MemoryAccessStore::new()))
            .with_clock(clock.clone())
            .with_authorization(directory.clone())
            .with_verification(directory.clone())
            .with_messenger(messenger.clone())
            .with_delivery(outbox.clone())
            .with_environment(environment.clone())
            .try_build()
            .expect("all handlers supplied");

        Self {
            system: Arc::new(system),
            clock,
            messenger,
            outbox,
            directory,
            environment,
        }
    }

    /// Shared handle on the system for managers
    pub fn system(&self) -> Arc<AccessEffectSystem> {
        Arc::clone(&self.system)
    }

    /// Put a requirement into the catalog
    pub async fn seed_requirement(&self, requirement: AccessRequirement) -> AccessRequirement {
        self.system
            .transaction(move |txn| txn.put_requirement(requirement))
            .await
            .expect("seed requirement")
    }

    /// Insert grants directly into the ledger
    pub async fn seed_approvals(&self, grants: Vec<NewApproval>) -> Vec<AccessApproval> {
        self.system
            .transaction(move |txn| txn.upsert_approvals(grants))
            .await
            .expect("seed approvals")
    }

    /// Read an approval row
    pub async fn approval(&self, id: ApprovalId) -> AccessApproval {
        self.system
            .transaction(move |txn| txn.approval(id))
            .await
            .expect("approval exists")
    }

    /// Principals subscribed to a submission's status
    pub async fn subscribers(&self, id: SubmissionId) -> Vec<PrincipalId> {
        self.system
            .transaction(move |txn| Ok(txn.subscribers(id)))
            .await
            .expect("read subscribers")
    }

    /// Certify and validate each principal
    pub async fn verify(&self, principals: &[PrincipalId]) {
        for principal in principals {
            self.directory.certify(*principal).await;
            self.directory.validate_profile(*principal).await;
        }
    }
}
