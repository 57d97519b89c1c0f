// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-local ID allocation.

use trellis_graph::{ClientId, FullId};

/// Mints vertex and edge IDs in one client's namespace.
///
/// Vertices and edges share a single counter, so `7-1`, `7-2`, `7-3` may be
/// two vertices and an edge. Allocation never talks to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
    client: ClientId,
    counter: u64,
}

impl IdAllocator {
    /// Fresh allocator; the first ID it mints has counter 1.
    pub const fn new(client: ClientId) -> Self {
        Self { client, counter: 0 }
    }

    /// Namespace owner.
    pub const fn client(&self) -> ClientId {
        self.client
    }

    /// Last counter handed out or observed.
    pub const fn last_counter(&self) -> u64 {
        self.counter
    }

    fn next(&mut self) -> FullId {
        self.counter += 1;
        FullId::new(self.client, self.counter)
    }

    /// Next vertex ID.
    pub fn allocate_vertex_id(&mut self) -> FullId {
        self.next()
    }

    /// Next edge ID.
    pub fn allocate_edge_id(&mut self) -> FullId {
        self.next()
    }

    /// Advances past `id` when it belongs to this namespace, so replayed
    /// history never collides with future allocations.
    pub fn observe(&mut self, id: FullId) {
        if id.creator == self.client {
            self.counter = self.counter.max(id.counter);
        }
    }
}
