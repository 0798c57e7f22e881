//! Type-safe identifier wrappers around `u64`.
//!
//! Every entity the gravity subsystem talks about has a strongly-typed ID
//! to prevent accidental mixing of identifiers at compile time. All IDs are
//! plain 64-bit integers because that is what the host world hands out and
//! what travels on the wire.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw `u64` identifier.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the inner `u64` value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a gravity field. Assigned by the host and stable for
    /// the lifetime of the session; equal to the id of the backing anchor
    /// object in the host world.
    FieldId
}

define_id! {
    /// Identifier of a movable physics body in the host world.
    BodyId
}

define_id! {
    /// Identifier of an asteroid (voxel map) in the host world.
    AsteroidId
}

define_id! {
    /// Identifier of a session participant (host or follower).
    ParticipantId
}
