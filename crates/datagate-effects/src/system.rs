//! Effect system bundle
//!
//! `AccessEffectSystem` owns one handler per effect trait and implements every
//! trait by delegation, so the managers in `datagate-access` take a single
//! `Arc<E>` regardless of how the handlers are wired.

use crate::{
    ChannelMessenger, ConfiguredEnvironmentHandler, DirectoryHandler, MemoryAccessStore,
    OutboxDeliveryHandler, SystemClockHandler,
};
use async_trait::async_trait;
use datagate_core::config::AccessConfig;
use datagate_core::effects::{
    AuthorizationEffects, ChangeMessengerEffects, DeliveryEffects, EnvironmentEffects,
    PhysicalClockEffects, VerificationEffects,
};
use datagate_core::store::{AccessStore, RowLock, StoreTransaction};
use datagate_core::{
    AccessError, AccessResult, ChangeMessage, Feature, MessageId, NotificationKey, PrincipalId,
    RenderedMessage, Timestamp,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handlers for every effect the access workflow needs
pub struct AccessEffectSystem<S = MemoryAccessStore> {
    store: Arc<S>,
    clock: Arc<dyn PhysicalClockEffects>,
    authorization: Arc<dyn AuthorizationEffects>,
    verification: Arc<dyn VerificationEffects>,
    messenger: Arc<dyn ChangeMessengerEffects>,
    delivery: Arc<dyn DeliveryEffects>,
    environment: Arc<dyn EnvironmentEffects>,
}

impl<S> AccessEffectSystem<S> {
    /// Start building a system around `store`
    pub fn builder(store: Arc<S>) -> AccessEffectSystemBuilder<S> {
        AccessEffectSystemBuilder::new(store)
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl AccessEffectSystem<MemoryAccessStore> {
    /// Wire the in-process handlers from configuration
    ///
    /// Returns the system, the directory used for reviewer and verification
    /// lookups, and the receiver on which committed changes arrive.
    pub fn in_process(
        config: &AccessConfig,
    ) -> (
        Self,
        Arc<DirectoryHandler>,
        mpsc::UnboundedReceiver<ChangeMessage>,
    ) {
        let directory = Arc::new(DirectoryHandler::new());
        let (messenger, changes) = ChannelMessenger::channel();
        let system = Self::builder(Arc::new(MemoryAccessStore::new()))
            .with_clock(Arc::new(SystemClockHandler::new()))
            .with_authorization(directory.clone())
            .with_verification(directory.clone())
            .with_messenger(Arc::new(messenger))
            .with_delivery(Arc::new(OutboxDeliveryHandler::new()))
            .with_environment(Arc::new(ConfiguredEnvironmentHandler::from_config(
                &config.environment,
            )))
            .build();
        (system, directory, changes)
    }
}

/// Builder for [`AccessEffectSystem`]
///
/// `try_build` insists on explicit authorization, verification, messenger
/// and delivery handlers; `build` fills any gap with in-process handlers.
pub struct AccessEffectSystemBuilder<S> {
    store: Arc<S>,
    clock: Option<Arc<dyn PhysicalClockEffects>>,
    authorization: Option<Arc<dyn AuthorizationEffects>>,
    verification: Option<Arc<dyn VerificationEffects>>,
    messenger: Option<Arc<dyn ChangeMessengerEffects>>,
    delivery: Option<Arc<dyn DeliveryEffects>>,
    environment: Option<Arc<dyn EnvironmentEffects>>,
}

impl<S> AccessEffectSystemBuilder<S> {
    fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: None,
            authorization: None,
            verification: None,
            messenger: None,
            delivery: None,
            environment: None,
        }
    }

    /// Use `clock` for wall-clock reads
    pub fn with_clock(mut self, clock: Arc<dyn PhysicalClockEffects>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `authorization` for reviewer checks
    pub fn with_authorization(mut self, authorization: Arc<dyn AuthorizationEffects>) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Use `verification` for accessor checks
    pub fn with_verification(mut self, verification: Arc<dyn VerificationEffects>) -> Self {
        self.verification = Some(verification);
        self
    }

    /// Use `messenger` to publish committed changes
    pub fn with_messenger(mut self, messenger: Arc<dyn ChangeMessengerEffects>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Use `delivery` for outbound messages
    pub fn with_delivery(mut self, delivery: Arc<dyn DeliveryEffects>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Use `environment` for stack and feature questions
    pub fn with_environment(mut self, environment: Arc<dyn EnvironmentEffects>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Finish, failing if a required handler is missing
    pub fn try_build(self) -> AccessResult<AccessEffectSystem<S>> {
        fn required<T: ?Sized>(handler: Option<Arc<T>>, name: &str) -> AccessResult<Arc<T>> {
            handler.ok_or_else(|| AccessError::internal(format!("No {name} handler configured")))
        }

        let clock: Arc<dyn PhysicalClockEffects> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClockHandler::new()),
        };
        let environment: Arc<dyn EnvironmentEffects> = match self.environment {
            Some(environment) => environment,
            None => Arc::new(ConfiguredEnvironmentHandler::default()),
        };
        Ok(AccessEffectSystem {
            store: self.store,
            clock,
            authorization: required(self.authorization, "authorization")?,
            verification: required(self.verification, "verification")?,
            messenger: required(self.messenger, "change messenger")?,
            delivery: required(self.delivery, "delivery")?,
            environment,
        })
    }

    /// Finish; handlers that were not supplied fall back to in-process ones
    pub fn build(self) -> AccessEffectSystem<S> {
        let directory = Arc::new(DirectoryHandler::new());
        let clock: Arc<dyn PhysicalClockEffects> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClockHandler::new()),
        };
        let authorization: Arc<dyn AuthorizationEffects> = match self.authorization {
            Some(authorization) => authorization,
            None => directory.clone(),
        };
        let verification: Arc<dyn VerificationEffects> = match self.verification {
            Some(verification) => verification,
            None => directory,
        };
        let messenger: Arc<dyn ChangeMessengerEffects> = match self.messenger {
            Some(messenger) => messenger,
            None => Arc::new(ChannelMessenger::channel().0),
        };
        let delivery: Arc<dyn DeliveryEffects> = match self.delivery {
            Some(delivery) => delivery,
            None => Arc::new(OutboxDeliveryHandler::new()),
        };
        let environment: Arc<dyn EnvironmentEffects> = match self.environment {
            Some(environment) => environment,
            None => Arc::new(ConfiguredEnvironmentHandler::default()),
        };
        AccessEffectSystem {
            store: self.store,
            clock,
            authorization,
            verification,
            messenger,
            delivery,
            environment,
        }
    }
}

#[async_trait]
impl<S: AccessStore> AccessStore for AccessEffectSystem<S> {
    async fn transaction<R, F>(&self, operation: F) -> AccessResult<R>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> AccessResult<R> + Send,
        R: Send,
    {
        self.store.transaction(operation).await
    }

    async fn lock_notification(&self, key: NotificationKey) -> RowLock {
        self.store.lock_notification(key).await
    }
}

#[async_trait]
impl<S: Send + Sync> PhysicalClockEffects for AccessEffectSystem<S> {
    async fn now(&self) -> Timestamp {
        self.clock.now().await
    }
}

#[async_trait]
impl<S: Send + Sync> AuthorizationEffects for AccessEffectSystem<S> {
    async fn is_reviewer(&self, principal: PrincipalId) -> AccessResult<bool> {
        self.authorization.is_reviewer(principal).await
    }
}

#[async_trait]
impl<S: Send + Sync> VerificationEffects for AccessEffectSystem<S> {
    async fn are_certified(&self, principals: &[PrincipalId]) -> AccessResult<bool> {
        self.verification.are_certified(principals).await
    }

    async fn have_validated_profiles(&self, principals: &[PrincipalId]) -> AccessResult<bool> {
        self.verification.have_validated_profiles(principals).await
    }
}

#[async_trait]
impl<S: Send + Sync> ChangeMessengerEffects for AccessEffectSystem<S> {
    async fn publish(&self, messages: Vec<ChangeMessage>) {
        self.messenger.publish(messages).await;
    }
}

#[async_trait]
impl<S: Send + Sync> DeliveryEffects for AccessEffectSystem<S> {
    async fn deliver(
        &self,
        recipient: PrincipalId,
        message: &RenderedMessage,
    ) -> AccessResult<MessageId> {
        self.delivery.deliver(recipient, message).await
    }
}

#[async_trait]
impl<S: Send + Sync> EnvironmentEffects for AccessEffectSystem<S> {
    async fn is_production_stack(&self) -> Option<bool> {
        self.environment.is_production_stack().await
    }

    async fn is_in_testing_group(&self, principal: PrincipalId) -> bool {
        self.environment.is_in_testing_group(principal).await
    }

    async fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.environment.is_feature_enabled(feature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use datagate_core::RequirementId;

    #[tokio::test]
    async fn try_build_reports_missing_handlers() {
        let result = AccessEffectSystem::builder(Arc::new(MemoryAccessStore::new())).try_build();
        let err = result.err().unwrap();
        assert_eq!(err.message(), "No authorization handler configured");
    }

    #[tokio::test]
    async fn in_process_system_delegates() {
        let mut config = AccessConfig::default();
        config.environment.features = vec![Feature::DataAccessNotifications];
        let (system, directory, _changes) = AccessEffectSystem::in_process(&config);

        directory.add_reviewer(PrincipalId::new(1)).await;
        assert!(system.is_reviewer(PrincipalId::new(1)).await.unwrap());
        assert!(!system.is_reviewer(PrincipalId::new(2)).await.unwrap());
        assert!(system.is_feature_enabled(Feature::DataAccessNotifications).await);

        let missing = system
            .transaction(|txn| txn.requirement(RequirementId::new(1)))
            .await
            .unwrap_err();
        assert_matches!(missing, AccessError::NotFound { .. });
    }
}
