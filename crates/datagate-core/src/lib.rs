//! Datagate Core - Controlled Data Access Foundation
//!
//! This crate holds the domain model and the effect interfaces shared by every
//! other datagate crate. It contains no I/O: handlers live in
//! `datagate-effects`, business rules live in `datagate-access`.
//!
//! # Contents
//!
//! ## Domain Model
//! - `AccessRequirement`: versioned requirement definitions and their policy flags
//! - `ResearchProject`: per-(user, requirement) project metadata
//! - `DataAccessRequest`: the mutable draft, either a request or a renewal
//! - `Submission`: the immutable snapshot under review and its state machine
//! - `AccessApproval`: the grant ledger row
//! - `DataAccessNotification`: the dedup record of what was sent to whom
//!
//! ## Effect Interfaces
//! - `PhysicalClockEffects`, `AuthorizationEffects`, `VerificationEffects`
//! - `ChangeMessengerEffects`, `DeliveryEffects`, `EnvironmentEffects`
//! - `AccessStore` / `StoreTransaction`: atomic read-validate-write units
//!
//! ## Invariants Carried by the Types
//! - Submissions leave `SUBMITTED` exactly once; every other state is terminal
//! - Approvals move `APPROVED → REVOKED` only
//! - Every mutable record carries an `Etag` compared inside the write

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Numeric identifiers and etags
pub mod identifiers;

/// Access requirement catalog types
pub mod requirement;

/// Research project records
pub mod research_project;

/// Request and renewal drafts
pub mod request;

/// Submission records and their state machine
pub mod submission;

/// Approval ledger rows
pub mod approval;

/// Notification records and types
pub mod notification;

/// Change messages emitted after commits
pub mod change;

/// Layered configuration
pub mod config;

/// Effect interfaces (no implementations)
pub mod effects;

/// Transactional store contracts
pub mod store;

pub use approval::{AccessApproval, AccessApprovalInfo, ApprovalKey, ApprovalState, NewApproval};
pub use change::{ChangeMessage, ChangeType, ObjectType};
pub use config::AccessConfig;
pub use errors::{AccessError, AccessResult};
pub use identifiers::{
    ApprovalId, Etag, MessageId, NotificationId, PrincipalId, RequestId, RequirementId,
    ResearchProjectId, SubmissionId,
};
pub use notification::{
    DataAccessNotification, Feature, NotificationKey, NotificationRecord, NotificationType,
    RenderedMessage,
};
pub use request::{AccessorChange, AccessorChangeType, DataAccessRequest, DraftKind, NewRequest};
pub use requirement::{
    AccessRequirement, AccessType, AccessorPolicy, ManagedActPolicy, RequirementKind,
    RestrictableKind, RestrictableObject,
};
pub use research_project::{ResearchProject, ResearchProjectDetails};
pub use store::{AccessStore, OpenSubmissionCount, RowLock, StoreTransaction};
pub use submission::{
    NewSubmission, Submission, SubmissionState, SubmissionStatus, SubmissionSubscription,
};

/// Wall-clock instant used throughout the model
pub type Timestamp = chrono::DateTime<chrono::Utc>;
