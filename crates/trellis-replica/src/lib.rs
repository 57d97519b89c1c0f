// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-side replica of a Trellis graph.
//!
//! Every mutation (relay command, local edit, undo, redo) goes through
//! [`Replica`]. Before an operation touches the graph its complement is
//! derived from the current state; history-bearing commands record that
//! complement so the cursor can walk back and forth.

mod allocator;
mod complement;
mod event;
mod history;
mod replica;

pub use allocator::IdAllocator;
pub use event::GraphEvent;
pub use history::{History, HistoryEntry};
pub use replica::{ApplyResult, Replica, ReplicaError};
