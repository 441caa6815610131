//! Datagate Effects - Effect Handlers
//!
//! Handlers for the effect traits declared in `datagate-core`:
//!
//! - `MemoryAccessStore`: transactional in-memory tables with per-key notification locks
//! - `SystemClockHandler`: wall-clock time
//! - `ChannelMessenger`: publishes committed changes onto a tokio channel
//! - `OutboxDeliveryHandler`: records outbound messages and assigns message ids
//! - `ConfiguredEnvironmentHandler`: stack detection, testing group and feature flags
//! - `DirectoryHandler`: reviewer, certification and profile-validation lookups
//!
//! `AccessEffectSystem` bundles one handler per trait so feature crates can be
//! generic over a single effects parameter.
//!
//! Controllable test doubles live in `datagate-testkit`.

#![forbid(unsafe_code)]

pub mod clock;
pub mod delivery;
pub mod directory;
pub mod environment;
pub mod memory_store;
pub mod messenger;
pub mod system;

pub use clock::SystemClockHandler;
pub use delivery::{DeliveredMessage, OutboxDeliveryHandler};
pub use directory::DirectoryHandler;
pub use environment::ConfiguredEnvironmentHandler;
pub use memory_store::MemoryAccessStore;
pub use messenger::ChannelMessenger;
pub use system::{AccessEffectSystem, AccessEffectSystemBuilder};
