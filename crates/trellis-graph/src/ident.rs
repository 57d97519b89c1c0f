// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identity types: client IDs, full entity IDs, and arena handles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relay-assigned client identifier. Each client owns a disjoint counter namespace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique vertex/edge identifier: `(creator, counter)`.
///
/// Serialized as `"creator-counter"`. Ordering is by creator first, then
/// counter, which keeps canonical snapshots stable across replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FullId {
    /// Client that minted the ID.
    pub creator: ClientId,
    /// Creator-local counter value (starts at 1).
    pub counter: u64,
}

impl FullId {
    /// Builds a full ID from its parts.
    pub const fn new(creator: ClientId, counter: u64) -> Self {
        Self { creator, counter }
    }
}

impl fmt::Display for FullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.creator.0, self.counter)
    }
}

/// Errors produced when parsing a `"creator-counter"` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFullIdError {
    /// The `-` separator is absent.
    #[error("missing '-' separator in {0:?}")]
    MissingSeparator(String),
    /// The creator half is not a decimal integer.
    #[error("invalid creator component {0:?}")]
    InvalidCreator(String),
    /// The counter half is not a decimal integer.
    #[error("invalid counter component {0:?}")]
    InvalidCounter(String),
}

/// Parses a non-empty run of ASCII digits. Rejects signs and whitespace that
/// `u64::from_str` would otherwise tolerate.
pub(crate) fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for FullId {
    type Err = ParseFullIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (creator, counter) = s
            .split_once('-')
            .ok_or_else(|| ParseFullIdError::MissingSeparator(s.to_string()))?;
        let creator = parse_digits(creator)
            .ok_or_else(|| ParseFullIdError::InvalidCreator(creator.to_string()))?;
        let counter = parse_digits(counter)
            .ok_or_else(|| ParseFullIdError::InvalidCounter(counter.to_string()))?;
        Ok(Self::new(ClientId(creator), counter))
    }
}

/// Arena handle for an edge-line record. Never reused within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineId(pub(crate) u64);

/// Arena handle for a bend record. Stays valid until the bend is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BendId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_form() {
        let id = FullId::new(ClientId(7), 3);
        assert_eq!(id.to_string(), "7-3");
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(matches!(
            "73".parse::<FullId>(),
            Err(ParseFullIdError::MissingSeparator(_))
        ));
        assert!(matches!(
            "+7-3".parse::<FullId>(),
            Err(ParseFullIdError::InvalidCreator(_))
        ));
        assert!(matches!(
            "7-".parse::<FullId>(),
            Err(ParseFullIdError::InvalidCounter(_))
        ));
        assert!(matches!(
            "7-3-1".parse::<FullId>(),
            Err(ParseFullIdError::InvalidCounter(_))
        ));
    }

    #[test]
    fn ordering_is_creator_major() {
        let a = FullId::new(ClientId(1), 99);
        let b = FullId::new(ClientId(2), 1);
        assert!(a < b);
    }
}
