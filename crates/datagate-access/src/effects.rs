//! Composed effect traits
//!
//! Convenience supertraits naming the handler set each manager needs. Any
//! type implementing the parts implements the composite.

use datagate_core::effects::{
    AuthorizationEffects, ChangeMessengerEffects, DeliveryEffects, EnvironmentEffects,
    PhysicalClockEffects, VerificationEffects,
};
use datagate_core::store::AccessStore;

/// Effects used by the draft, submission and approval workflows
pub trait DataAccessEffects:
    AccessStore
    + PhysicalClockEffects
    + AuthorizationEffects
    + VerificationEffects
    + ChangeMessengerEffects
    + Send
    + Sync
{
}

impl<T> DataAccessEffects for T where
    T: AccessStore
        + PhysicalClockEffects
        + AuthorizationEffects
        + VerificationEffects
        + ChangeMessengerEffects
        + Send
        + Sync
{
}

/// Effects used by the notification engine
pub trait NotificationEffects:
    DataAccessEffects + DeliveryEffects + EnvironmentEffects + Send + Sync
{
}

impl<T> NotificationEffects for T where
    T: DataAccessEffects + DeliveryEffects + EnvironmentEffects + Send + Sync
{
}
