// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-side sync for Trellis graphs.
//!
//! A [`SyncSession`] owns a replica, applies local edits optimistically and
//! publishes them in order through a [`RelayTransport`]. A second task polls
//! the relay for commands from every client and applies them.

mod session;
mod socket;
mod transport;

pub use session::{SessionMode, SyncError, SyncEvent, SyncSession};
pub use socket::{read_frame, SocketRelay, REQUEST_TIMEOUT};
pub use transport::{RelayTransport, SubmitError, TransportError};
