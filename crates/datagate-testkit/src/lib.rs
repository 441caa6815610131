//! Datagate Testing Infrastructure
//!
//! Common setup for tests across the workspace: a controllable clock, a
//! recording change messenger, requirement and principal fixtures, and
//! `TestEffects`, an effect system wired from in-process handlers.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! datagate-testkit = { workspace = true }
//! ```
//!
//! ```rust,no_run
//! use datagate_testkit::*;
//!
//! # async fn example() {
//! let effects = TestEffects::new().await;
//! let requirement = effects.seed_requirement(RequirementBuilder::managed(1).build()).await;
//! # }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod clock;
pub mod effects;
pub mod fixtures;
pub mod messenger;
pub mod tracing_init;

pub use clock::ManualClock;
pub use effects::TestEffects;
pub use fixtures::*;
pub use messenger::RecordingMessenger;
pub use tracing_init::init_test_tracing;
