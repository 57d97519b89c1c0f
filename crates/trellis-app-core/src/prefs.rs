// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved preferences for Trellis clients and the relay.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Config key for [`SyncPrefs`].
pub const SYNC_PREFS_KEY: &str = "sync";
/// Config key for [`RelayPrefs`].
pub const RELAY_PREFS_KEY: &str = "relay";

/// Client sync loop tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPrefs {
    /// Delay between `get_commands` polls.
    pub poll_interval_ms: u64,
    /// Delay between outgoing drain passes (and submit retries).
    pub drain_interval_ms: u64,
    /// Relay socket; `None` uses the protocol default.
    pub socket_path: Option<String>,
}

impl Default for SyncPrefs {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            drain_interval_ms: 50,
            socket_path: None,
        }
    }
}

impl SyncPrefs {
    /// Poll interval as a duration (at least 1 ms).
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Drain interval as a duration (at least 1 ms).
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms.max(1))
    }
}

/// Relay host settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayPrefs {
    /// Listening socket; `None` uses the protocol default.
    pub socket_path: Option<String>,
}
