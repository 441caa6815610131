//! Change-stream consumer driving the notification engine

use super::{NotificationManager, NotificationOutcome};
use crate::effects::NotificationEffects;
use crate::retry::RetryPolicy;
use datagate_core::config::RetryConfig;
use datagate_core::{AccessResult, ChangeMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_secs(60);

/// Feeds committed change messages to a [`NotificationManager`]
///
/// Retryable failures are retried with the configured backoff. A message
/// that still fails afterwards is held back and redelivered after the
/// redelivery delay until it succeeds or fails for good.
pub struct NotificationWorker<E> {
    manager: Arc<NotificationManager<E>>,
    retry: RetryPolicy,
    redelivery_delay: Duration,
}

impl<E: NotificationEffects> NotificationWorker<E> {
    /// Worker over `manager`
    pub fn new(manager: Arc<NotificationManager<E>>, retry: RetryPolicy) -> Self {
        Self {
            manager,
            retry,
            redelivery_delay: DEFAULT_REDELIVERY_DELAY,
        }
    }

    /// Worker with the configured retry schedule and redelivery delay
    pub fn from_config(manager: Arc<NotificationManager<E>>, config: &RetryConfig) -> Self {
        Self::new(manager, RetryPolicy::from_config(config))
            .with_redelivery_delay(Duration::from_millis(config.redelivery_delay_ms))
    }

    /// Wait `delay` before redelivering messages whose retries ran out
    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay.max(Duration::from_millis(1));
        self
    }

    /// Process one message, retrying transient failures
    pub async fn handle(&self, message: &ChangeMessage) -> AccessResult<NotificationOutcome> {
        let manager = &self.manager;
        self.retry
            .execute(move || manager.process_change(message))
            .await
    }

    /// Consume `changes` until `shutdown` turns true, or until the channel
    /// closes and nothing awaits redelivery
    pub async fn run(
        &self,
        mut changes: mpsc::UnboundedReceiver<ChangeMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Notification worker started");

        let mut redelivery: Vec<ChangeMessage> = Vec::new();
        let mut open = true;
        let mut ticker = interval(self.redelivery_delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            if !open && redelivery.is_empty() {
                break;
            }

            tokio::select! {
                next = changes.recv(), if open => {
                    match next {
                        Some(message) => {
                            if let Some(held) = self.dispatch(message).await {
                                // A full delay passes before the first redelivery
                                if redelivery.is_empty() {
                                    ticker.reset();
                                }
                                redelivery.push(held);
                            }
                        }
                        None => open = false,
                    }
                }

                _ = ticker.tick(), if !redelivery.is_empty() => {
                    for message in std::mem::take(&mut redelivery) {
                        redelivery.extend(self.dispatch(message).await);
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if !redelivery.is_empty() {
            warn!(
                "Notification worker stopped with {} changes awaiting redelivery",
                redelivery.len()
            );
        }
        info!("Notification worker stopped");
    }

    /// Process `message`; hands it back when it should be redelivered
    async fn dispatch(&self, message: ChangeMessage) -> Option<ChangeMessage> {
        match self.handle(&message).await {
            Ok(NotificationOutcome::Sent(notification)) => {
                debug!(
                    "Notification {} recorded for change of {:?} {}",
                    notification.id, message.object_type, message.object_id
                );
            }
            Ok(NotificationOutcome::Skipped) => {
                debug!("Change of {:?} {} already notified", message.object_type, message.object_id);
            }
            Ok(NotificationOutcome::Discarded(reason)) => {
                debug!(
                    "Change of {:?} {} discarded: {:?}",
                    message.object_type, message.object_id, reason
                );
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    "Requeueing change of {:?} {} after {} attempts: {}",
                    message.object_type, message.object_id, self.retry.max_attempts, e
                );
                return Some(message);
            }
            Err(e) => {
                error!(
                    "Failed to process change of {:?} {}: {}",
                    message.object_type, message.object_id, e
                );
            }
        }
        None
    }
}
