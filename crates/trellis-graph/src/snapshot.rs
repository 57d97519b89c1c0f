// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical snapshot of graph state with deterministic hashing.
//!
//! Arena handles, render flags, selection and incident ordering are local
//! bookkeeping and are excluded; two replicas that applied the same commands
//! hash identically.

use blake3::Hash;
use ciborium::ser::into_writer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::FullId;
use crate::math::{Camera, Quat, Vec3};
use crate::store::{GraphStore, Properties};

/// Blake3 state hash (32 bytes).
pub type Hash32 = [u8; 32];

/// Canonical encoding failure.
#[derive(Debug, Error)]
#[error("canonical encoding failed: {0}")]
pub struct SnapshotError(String);

/// Vertex as captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexSnapshot {
    /// Identity.
    pub id: FullId,
    /// Position.
    pub position: Vec3,
    /// Rotation.
    pub rotation: Quat,
    /// Scale.
    pub scale: f64,
    /// Custom properties.
    pub properties: Properties,
}

/// Edge as captured in a snapshot, bends in chain order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    /// Identity.
    pub id: FullId,
    /// Start vertex.
    pub start: FullId,
    /// End vertex.
    pub end: FullId,
    /// Bend positions.
    pub bends: Vec<Vec3>,
    /// Custom properties.
    pub properties: Properties,
}

/// Full graph state, sorted by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Vertices by ascending ID.
    pub vertices: Vec<VertexSnapshot>,
    /// Edges by ascending ID.
    pub edges: Vec<EdgeSnapshot>,
    /// Camera pose.
    pub camera: Camera,
}

impl GraphSnapshot {
    /// Canonical CBOR serialization for hashing/comparison.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut bytes = Vec::new();
        into_writer(self, &mut bytes).map_err(|e| SnapshotError(e.to_string()))?;
        Ok(bytes)
    }

    /// Compute blake3 hash of the canonical form.
    pub fn compute_hash(&self) -> Result<Hash32, SnapshotError> {
        let h: Hash = blake3::hash(&self.to_canonical_bytes()?);
        Ok(h.into())
    }
}

impl GraphStore {
    /// Captures the replicated state.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            vertices: self
                .vertices()
                .map(|v| VertexSnapshot {
                    id: v.id,
                    position: v.position,
                    rotation: v.rotation,
                    scale: v.scale,
                    properties: v.properties.clone(),
                })
                .collect(),
            edges: self
                .edges()
                .map(|e| EdgeSnapshot {
                    id: e.id,
                    start: e.start,
                    end: e.end,
                    bends: self.edge_bends(e.id).map(|b| b.position).collect(),
                    properties: e.properties.clone(),
                })
                .collect(),
            camera: self.camera(),
        }
    }

    /// Hash of [`GraphStore::snapshot`].
    pub fn state_hash(&self) -> Result<Hash32, SnapshotError> {
        self.snapshot().compute_hash()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::ident::ClientId;

    #[test]
    fn hash_ignores_arena_handles() {
        let a = FullId::new(ClientId(1), 1);
        let b = FullId::new(ClientId(1), 2);
        let e = FullId::new(ClientId(1), 3);

        let mut left = GraphStore::new();
        left.insert_vertex(a, Vec3::ZERO).unwrap();
        left.insert_vertex(b, Vec3::ZERO).unwrap();
        left.insert_edge(e, a, b).unwrap();
        left.break_edge_line(e, 0, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        let mut right = GraphStore::new();
        right.insert_vertex(a, Vec3::ZERO).unwrap();
        right.insert_vertex(b, Vec3::ZERO).unwrap();
        right.insert_edge(e, a, b).unwrap();
        right.break_edge_line(e, 0, Vec3::new(9.0, 0.0, 0.0)).unwrap();
        right.break_edge_line(e, 0, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        right.remove_bend(e, 1).unwrap();

        assert_eq!(left.state_hash().unwrap(), right.state_hash().unwrap());
    }

    #[test]
    fn hash_tracks_positions() {
        let a = FullId::new(ClientId(1), 1);
        let mut g = GraphStore::new();
        g.insert_vertex(a, Vec3::ZERO).unwrap();
        let before = g.state_hash().unwrap();
        g.move_vertex(a, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        assert_ne!(before, g.state_hash().unwrap());
    }
}
