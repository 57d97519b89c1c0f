// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Trellis tools (config, prefs).
//! Keeps transport and runtime adapters thin.

pub mod config;
pub mod prefs;
