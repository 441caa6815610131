//! Configuration-driven environment handler

use async_trait::async_trait;
use datagate_core::config::EnvironmentConfig;
use datagate_core::effects::EnvironmentEffects;
use datagate_core::{Feature, PrincipalId};
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Default)]
struct EnvironmentState {
    production_stack: Option<bool>,
    testing_group: HashSet<PrincipalId>,
    features: HashSet<Feature>,
}

/// Answers environment questions from configuration
///
/// Values may be changed at runtime, e.g. when a feature flag is toggled.
#[derive(Debug, Default)]
pub struct ConfiguredEnvironmentHandler {
    state: RwLock<EnvironmentState>,
}

impl ConfiguredEnvironmentHandler {
    /// Build from the environment section of the configuration
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            state: RwLock::new(EnvironmentState {
                production_stack: config.production_stack,
                testing_group: config.testing_group.iter().copied().collect(),
                features: config.features.iter().copied().collect(),
            }),
        }
    }

    /// Set whether this is the production stack
    pub fn set_production_stack(&self, production_stack: Option<bool>) {
        self.state.write().production_stack = production_stack;
    }

    /// Add a principal to the testing group
    pub fn add_to_testing_group(&self, principal: PrincipalId) {
        self.state.write().testing_group.insert(principal);
    }

    /// Switch a feature on or off
    pub fn set_feature(&self, feature: Feature, enabled: bool) {
        let mut state = self.state.write();
        if enabled {
            state.features.insert(feature);
        } else {
            state.features.remove(&feature);
        }
    }
}

#[async_trait]
impl EnvironmentEffects for ConfiguredEnvironmentHandler {
    async fn is_production_stack(&self) -> Option<bool> {
        self.state.read().production_stack
    }

    async fn is_in_testing_group(&self, principal: PrincipalId) -> bool {
        self.state.read().testing_group.contains(&principal)
    }

    async fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.state.read().features.contains(&feature)
    }
}
