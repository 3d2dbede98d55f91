// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type-safe record identifiers.
//!
//! Every record kind gets its own newtype around [`Uuid`] so that an event id
//! can never be compared against a user id by accident. All ids serialise
//! transparently as UUID strings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new id from a UUID.
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a new random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the inner UUID value.
            pub fn into_inner(self) -> Uuid {
                self.0
            }

            /// Get a reference to the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(CategoryId, "Unique identifier for a category.");
define_id_type!(EventId, "Unique identifier for an event.");
define_id_type!(InvitationId, "Unique identifier for an invitation.");
define_id_type!(PostId, "Unique identifier for a post.");
