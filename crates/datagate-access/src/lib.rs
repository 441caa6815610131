//! Datagate Access - Controlled Data Access Workflows
//!
//! The business rules of the request → submission → approval lifecycle:
//!
//! - `ResearchProjectManager`: one project per (user, requirement)
//! - `DraftManager`: the mutable request/renewal draft
//! - `SubmissionManager`: submission creation, cancellation and review
//! - `AccessApprovalManager`: the approval ledger and its revocation paths
//! - `RevocationSweep`: scheduled revocation of expired approvals
//! - `NotificationManager` / `NotificationWorker`: deduplicated notifications
//!   driven by approval change messages
//!
//! # Architecture
//!
//! Every manager is generic over an effects parameter `E` that implements the
//! composed traits in [`effects`]. Each mutating operation is a single
//! `AccessStore::transaction`; change messages are buffered in a
//! [`ChangeBatch`] and published only after the transaction committed.
//!
//! ```text
//! DraftManager ──> SubmissionManager ──> AccessApprovalManager ──> ChangeMessage
//!                                              ^                        │
//!                               RevocationSweep┘                        v
//!                                                          NotificationWorker
//! ```

#![forbid(unsafe_code)]

pub mod approval;
pub mod changes;
pub mod draft;
pub mod effects;
mod guards;
pub mod notification;
pub mod research_project;
pub mod retry;
pub mod submission;
pub mod sweep;

pub use approval::{AccessApprovalManager, ApprovalRequest};
pub use changes::ChangeBatch;
pub use draft::DraftManager;
pub use effects::{DataAccessEffects, NotificationEffects};
pub use notification::{
    BuilderRegistry, CooldownResendPolicy, DiscardReason, NotificationBuilder, NotificationManager,
    NotificationOutcome, NotificationWorker, ReminderResendPolicy, RenewalReminderBuilder,
    ResendPolicy, RevocationBuilder,
};
pub use research_project::ResearchProjectManager;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use submission::{AccessRequirementStatus, SubmissionManager, SubmissionStateChange};
pub use sweep::{RevocationSweep, SweepReport};
