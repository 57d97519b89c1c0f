// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Trellis relay: the authority that sequences every accepted command.
//!
//! [`RelayHub`] holds the per-graph logs. [`LocalRelay`] exposes a hub to
//! sessions in the same process, and [`server`] serves it over a Unix socket.

mod hub;
mod local;
pub mod server;

pub use hub::{RelayError, RelayHub};
pub use local::LocalRelay;
