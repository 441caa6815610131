//! Identifier types
//!
//! Every record is keyed by a `u64` newtype so ids of different tables cannot
//! be mixed up. Etags are opaque strings regenerated on every write.

use crate::errors::AccessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw value
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// The raw value
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = AccessError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| AccessError::validation(format!("Invalid {}: {s}", $label)))
            }
        }
    };
}

numeric_id!(
    /// A user or team principal
    PrincipalId,
    "principal id"
);
numeric_id!(
    /// An access requirement (all versions share the id)
    RequirementId,
    "access requirement id"
);
numeric_id!(
    /// A research project
    ResearchProjectId,
    "research project id"
);
numeric_id!(
    /// A request or renewal draft
    RequestId,
    "request id"
);
numeric_id!(
    /// A submission
    SubmissionId,
    "submission id"
);
numeric_id!(
    /// An access approval ledger row
    ApprovalId,
    "access approval id"
);
numeric_id!(
    /// A notification dedup row
    NotificationId,
    "notification id"
);
numeric_id!(
    /// A message handed to the delivery transport
    MessageId,
    "message id"
);

impl PrincipalId {
    /// The anonymous principal; never a valid accessor
    pub const ANONYMOUS: PrincipalId = PrincipalId(273_950);

    /// Principal that system-initiated operations and notifications act as
    pub const DATA_ACCESS_NOTIFICATIONS_SENDER: PrincipalId = PrincipalId(3_421_893);

    /// Whether this is the anonymous principal
    pub fn is_anonymous(self) -> bool {
        self == Self::ANONYMOUS
    }
}

/// Opaque version token compared on every write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    /// Wrap an existing token
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The token text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
