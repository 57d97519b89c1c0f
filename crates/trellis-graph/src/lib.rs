// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Graph topology shared by Trellis replicas and the relay.
//! Pure data (vertices, edges, edge-line chains, bends) with deterministic
//! snapshot hashing. Mutation is single-writer; synchronization lives above.

mod ident;
mod math;
mod selection;
mod snapshot;
mod store;

pub use ident::{BendId, ClientId, FullId, LineId, ParseFullIdError};
pub use math::{Camera, Quat, Vec3};
pub use selection::{Selectable, SelectionType};
pub use snapshot::{EdgeSnapshot, GraphSnapshot, Hash32, SnapshotError, VertexSnapshot};
pub use store::{
    Bend, Edge, EdgeLine, EdgeLines, Endpoint, GraphError, GraphStore, Properties, RemovedEdge,
    RemovedVertex, RenderFlags, Vertex,
};

/// Parses a bare decimal counter (ASCII digits only, no sign).
pub fn parse_counter(s: &str) -> Option<u64> {
    ident::parse_digits(s)
}
