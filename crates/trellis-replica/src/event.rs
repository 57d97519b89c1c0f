// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change notifications for rendering and UI collaborators.

use trellis_graph::{ClientId, FullId};

/// One applied mutation, in apply order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A vertex was created.
    VertexAdded(FullId),
    /// A vertex was removed (after its incident edges).
    VertexRemoved(FullId),
    /// A vertex moved, was rescaled or was rotated.
    VertexChanged(FullId),
    /// An edge was created.
    EdgeAdded(FullId),
    /// An edge and its bends were removed.
    EdgeRemoved(FullId),
    /// A bend was inserted at `index`.
    BendAdded {
        /// Owning edge.
        edge: FullId,
        /// Chain index of the new bend.
        index: usize,
    },
    /// The bend at `index` was removed.
    BendRemoved {
        /// Owning edge.
        edge: FullId,
        /// Former chain index.
        index: usize,
    },
    /// The bend at `index` moved.
    BendMoved {
        /// Owning edge.
        edge: FullId,
        /// Chain index.
        index: usize,
    },
    /// A custom property was written or deleted.
    PropertyChanged {
        /// Vertex or edge.
        target: FullId,
        /// Property list.
        list: String,
        /// Property key.
        key: String,
    },
    /// The shared camera moved or rotated.
    CameraChanged,
    /// The selection changed.
    SelectionChanged,
    /// An opaque application command arrived.
    Custom {
        /// Issuing client.
        origin: ClientId,
        /// Application-defined name.
        name: String,
        /// Application-defined payload.
        payload: String,
    },
}
