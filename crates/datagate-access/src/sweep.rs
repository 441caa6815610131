//! Scheduled revocation of expired approvals
//!
//! Each run re-derives its candidates from the ledger, so a run that is
//! interrupted or overlaps another one only revokes what is still
//! `APPROVED`.

use crate::approval::AccessApprovalManager;
use crate::effects::DataAccessEffects;
use datagate_core::config::SweepConfig;
use datagate_core::{AccessResult, PrincipalId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Outcome of one sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Batches executed
    pub batches: usize,
    /// Approvals revoked
    pub revoked: usize,
}

/// Periodic job around [`AccessApprovalManager::revoke_expired_approvals`]
pub struct RevocationSweep<E> {
    approvals: AccessApprovalManager<E>,
    effects: Arc<E>,
    actor: PrincipalId,
    config: SweepConfig,
}

impl<E: DataAccessEffects> RevocationSweep<E> {
    /// Sweep acting as `actor`, which must be a reviewer
    pub fn new(effects: Arc<E>, actor: PrincipalId, config: SweepConfig) -> Self {
        Self {
            approvals: AccessApprovalManager::new(Arc::clone(&effects)),
            effects,
            actor,
            config,
        }
    }

    /// Revoke approvals that expired within the lookback window
    ///
    /// Keeps going while batches come back full, up to the configured number
    /// of batches.
    pub async fn run_once(&self) -> AccessResult<SweepReport> {
        let now = self.effects.now().await;
        let expired_after = now - self.config.lookback();
        let mut report = SweepReport::default();

        while report.batches < self.config.max_batches_per_run {
            let revoked = self
                .approvals
                .revoke_expired_approvals(self.actor, expired_after, self.config.batch_size)
                .await?;
            report.batches += 1;
            report.revoked += revoked;
            if revoked < self.config.batch_size {
                break;
            }
        }

        Ok(report)
    }

    /// Run on the configured interval until `shutdown` turns true or its
    /// sender goes away
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("Revocation sweep disabled");
            return;
        }

        let mut ticker = interval(self.config.interval());
        info!(
            "Starting revocation sweep every {:?}",
            self.config.interval()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.revoked > 0 => {
                            info!(
                                "Revocation sweep revoked {} approvals in {} batches",
                                report.revoked, report.batches
                            );
                        }
                        Ok(_) => debug!("Revocation sweep found nothing to revoke"),
                        Err(e) => error!("Revocation sweep failed: {}", e),
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Revocation sweep stopped");
    }
}
