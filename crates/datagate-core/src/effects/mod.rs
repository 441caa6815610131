//! Effect Trait Definitions
//!
//! Pure trait definitions for every side effect the access workflow performs.
//! This module defines **what** effects can be performed; handlers in
//! `datagate-effects` and `datagate-testkit` define **how**.
//!
//! # Effect Classification
//!
//! ## Infrastructure Effects
//! - **Clock** (`PhysicalClockEffects`): wall-clock reads for expiry and cooldowns
//! - **Messenger** (`ChangeMessengerEffects`): post-commit change publication
//! - **Delivery** (`DeliveryEffects`): outbound message transport
//! - **Environment** (`EnvironmentEffects`): stack detection, testing group, feature flags
//!
//! ## Application Effects
//! - **Authorization** (`AuthorizationEffects`): reviewer membership
//! - **Verification** (`VerificationEffects`): certification and profile validation
//!
//! Storage is not an effect trait of this module; see [`crate::store`].

mod authorization;
mod clock;
mod delivery;
mod environment;
mod messenger;

pub use authorization::{AuthorizationEffects, VerificationEffects};
pub use clock::PhysicalClockEffects;
pub use delivery::DeliveryEffects;
pub use environment::EnvironmentEffects;
pub use messenger::ChangeMessengerEffects;
