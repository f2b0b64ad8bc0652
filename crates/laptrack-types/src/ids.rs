//! Typed identifier wrappers.
//!
//! Tags and teams are keyed by the integer ids the storage layer assigns
//! (RFID readers emit the tag number as decimal text). Display subscribers
//! get a UUID v7 minted when their connection is accepted; a subscriber id
//! is never handed out twice.

use core::num::ParseIntError;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an `i64` storage key.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(#[ts(type = "number")] pub i64);

        impl $name {
            /// Return the inner storage key.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(key: i64) -> Self {
                Self(key)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_key! {
    /// Identifier of a physical RFID tag carried by a runner.
    TagId
}

define_key! {
    /// Identifier of a relay team.
    TeamId
}

/// A tag frame that is not a decimal integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tag id {frame:?}: {source}")]
pub struct ParseTagIdError {
    /// The offending frame text (trimmed).
    pub frame: String,
    /// The underlying integer parse failure.
    pub source: ParseIntError,
}

impl FromStr for TagId {
    type Err = ParseTagIdError;

    /// Parse a reader frame. Surrounding whitespace (a trailing newline
    /// from serial-to-websocket bridges) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let frame = s.trim();
        frame.parse::<i64>().map(Self).map_err(|source| ParseTagIdError {
            frame: frame.to_owned(),
            source,
        })
    }
}

/// Identity of one registered display connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub Uuid);

impl SubscriberId {
    /// Mint a fresh identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
