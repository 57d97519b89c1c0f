// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Topology store: vertices, edges, and the edge-line chain each edge owns.
//!
//! Every edge owns a doubly linked chain of edge-lines kept in an arena:
//!
//! ```text
//! start ──line0──▶ bend ──line1──▶ bend ──line2──▶ end
//! ```
//!
//! Breaking a line and removing a bend are O(1) relinks once the target line
//! is located. Bend handles ([`BendId`]) survive splices elsewhere in the
//! chain; a bend's index is derived by walking from the first line.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::{BendId, FullId, LineId};
use crate::math::{Camera, Quat, Vec3};
use crate::selection::Selection;

/// Errors returned by store mutators when a reference does not resolve.
///
/// The replica turns these into silent no-ops; the relay uses them to reject
/// commands before sequencing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No live vertex with this ID.
    #[error("vertex not found: {0}")]
    MissingVertex(FullId),
    /// No live edge with this ID.
    #[error("edge not found: {0}")]
    MissingEdge(FullId),
    /// The edge has fewer than `index + 1` edge-lines.
    #[error("edge {edge} has no edge-line at index {index}")]
    LineOutOfRange {
        /// Edge that was addressed.
        edge: FullId,
        /// Requested edge-line index.
        index: usize,
    },
    /// The edge has fewer than `index + 1` bends.
    #[error("edge {edge} has no bend at index {index}")]
    BendOutOfRange {
        /// Edge that was addressed.
        edge: FullId,
        /// Requested bend index.
        index: usize,
    },
    /// A vertex or edge with this ID is already live.
    #[error("id already in use: {0}")]
    IdInUse(FullId),
}

/// Custom properties: `list name -> (key -> value)`.
///
/// Empty values delete; lists that become empty are dropped so that a
/// set-then-unset pair leaves no trace in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, BTreeMap<String, String>>);

impl Properties {
    /// Looks up a single value.
    pub fn get(&self, list: &str, key: &str) -> Option<&str> {
        self.0.get(list)?.get(key).map(String::as_str)
    }

    /// Writes `value` (or deletes the key when `value` is empty) and returns
    /// the previous value, `""` when absent.
    pub fn set(&mut self, list: &str, key: &str, value: &str) -> String {
        if value.is_empty() {
            let Some(entries) = self.0.get_mut(list) else {
                return String::new();
            };
            let previous = entries.remove(key).unwrap_or_default();
            if entries.is_empty() {
                self.0.remove(list);
            }
            return previous;
        }
        self.0
            .entry(list.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string())
            .unwrap_or_default()
    }

    /// Iterates `(list, key, value)` triples in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.0.iter().flat_map(|(list, entries)| {
            entries
                .iter()
                .map(move |(k, v)| (list.as_str(), k.as_str(), v.as_str()))
        })
    }

    /// True when no list holds any key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Render dirty flags consumed (and cleared) by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlags {
    /// Geometry must be rebuilt.
    pub mesh: bool,
    /// Labels/texture must be redrawn.
    pub texture: bool,
}

impl RenderFlags {
    const DIRTY: Self = Self {
        mesh: true,
        texture: true,
    };

    fn touch(&mut self, mesh: bool) {
        self.texture = true;
        self.mesh |= mesh;
    }
}

/// One end of an edge-line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Chain terminal at a vertex.
    Vertex(FullId),
    /// Interior chain node.
    Bend(BendId),
}

/// Live vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Identity.
    pub id: FullId,
    /// Position.
    pub position: Vec3,
    /// Rotation.
    pub rotation: Quat,
    /// Uniform scale.
    pub scale: f64,
    /// Custom properties.
    pub properties: Properties,
    /// Incident edges ordered by ID. Within one client this is creation
    /// order, and a re-created edge lands back in its old slot.
    pub incident: Vec<FullId>,
    /// Render dirty flags.
    pub render: RenderFlags,
}

/// Live edge. The chain itself is reached through [`GraphStore::edge_lines`].
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Identity.
    pub id: FullId,
    /// Start vertex.
    pub start: FullId,
    /// End vertex.
    pub end: FullId,
    /// Custom properties.
    pub properties: Properties,
    first_line: LineId,
    last_line: LineId,
    line_count: usize,
}

impl Edge {
    /// Number of edge-lines in the chain (always at least one).
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Number of interior bends.
    pub fn bend_count(&self) -> usize {
        self.line_count - 1
    }

    /// True when the edge joins `a` and `b` in either direction.
    pub fn connects(&self, a: FullId, b: FullId) -> bool {
        (self.start == a && self.end == b) || (self.start == b && self.end == a)
    }
}

/// One straight segment of an edge's chain.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLine {
    /// Arena handle.
    pub id: LineId,
    /// Owning edge.
    pub edge: FullId,
    /// Segment start.
    pub start: Endpoint,
    /// Segment end.
    pub end: Endpoint,
    /// Render dirty flags.
    pub render: RenderFlags,
    prev: Option<LineId>,
    next: Option<LineId>,
}

/// Interior waypoint of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Bend {
    /// Arena handle.
    pub id: BendId,
    /// Owning edge.
    pub edge: FullId,
    /// Position.
    pub position: Vec3,
    incoming: LineId,
}

/// Everything needed to re-create an edge exactly as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedEdge {
    /// Original identity.
    pub id: FullId,
    /// Original start vertex.
    pub start: FullId,
    /// Original end vertex.
    pub end: FullId,
    /// Bend positions in chain order.
    pub bends: Vec<Vec3>,
    /// Properties at removal time.
    pub properties: Properties,
}

/// Everything needed to re-create a vertex and the edges that cascaded with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedVertex {
    /// Original identity.
    pub id: FullId,
    /// Position at removal time.
    pub position: Vec3,
    /// Rotation at removal time.
    pub rotation: Quat,
    /// Scale at removal time.
    pub scale: f64,
    /// Properties at removal time.
    pub properties: Properties,
    /// Incident edges, in the order they were removed.
    pub edges: Vec<RemovedEdge>,
}

/// In-memory graph topology.
///
/// Not synchronized: callers serialize mutation through a single writer.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    vertices: BTreeMap<FullId, Vertex>,
    edges: BTreeMap<FullId, Edge>,
    lines: FxHashMap<LineId, EdgeLine>,
    bends: FxHashMap<BendId, Bend>,
    next_handle: u64,
    camera: Camera,
    pub(crate) selection: Selection,
}

/// Iterator over an edge's chain, start to end.
#[derive(Debug, Clone)]
pub struct EdgeLines<'a> {
    store: &'a GraphStore,
    cursor: Option<LineId>,
}

impl<'a> Iterator for EdgeLines<'a> {
    type Item = &'a EdgeLine;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.store.lines.get(&self.cursor?)?;
        self.cursor = line.next;
        Some(line)
    }
}

impl GraphStore {
    /// Empty store with the default camera.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a vertex.
    pub fn vertex(&self, id: FullId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    /// Looks up an edge.
    pub fn edge(&self, id: FullId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Looks up a bend by handle.
    pub fn bend(&self, id: BendId) -> Option<&Bend> {
        self.bends.get(&id)
    }

    /// Looks up an edge-line by handle.
    pub fn line(&self, id: LineId) -> Option<&EdgeLine> {
        self.lines.get(&id)
    }

    /// All vertices ordered by ID.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.vertices.values()
    }

    /// All edges ordered by ID.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.values()
    }

    /// Live vertex count.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Live edge count.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Live bend count across all edges.
    pub fn bend_count(&self) -> usize {
        self.bends.len()
    }

    /// Live edge-line count across all edges.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// True when a vertex or an edge currently holds `id`.
    pub fn contains_id(&self, id: FullId) -> bool {
        self.vertices.contains_key(&id) || self.edges.contains_key(&id)
    }

    /// Shared camera pose.
    pub fn camera(&self) -> Camera {
        self.camera
    }

    fn alloc_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Adds a vertex with default rotation and unit scale.
    pub fn insert_vertex(&mut self, id: FullId, position: Vec3) -> Result<(), GraphError> {
        if self.contains_id(id) {
            return Err(GraphError::IdInUse(id));
        }
        self.vertices.insert(
            id,
            Vertex {
                id,
                position,
                rotation: Quat::VERTEX_DEFAULT,
                scale: 1.0,
                properties: Properties::default(),
                incident: Vec::new(),
                render: RenderFlags::DIRTY,
            },
        );
        Ok(())
    }

    /// Adds an edge with a single edge-line spanning `start -> end`.
    ///
    /// Parallel edges and self-loops are allowed.
    pub fn insert_edge(&mut self, id: FullId, start: FullId, end: FullId) -> Result<(), GraphError> {
        if self.contains_id(id) {
            return Err(GraphError::IdInUse(id));
        }
        for v in [start, end] {
            if !self.vertices.contains_key(&v) {
                return Err(GraphError::MissingVertex(v));
            }
        }
        let line_id = LineId(self.alloc_handle());
        self.lines.insert(
            line_id,
            EdgeLine {
                id: line_id,
                edge: id,
                start: Endpoint::Vertex(start),
                end: Endpoint::Vertex(end),
                render: RenderFlags::DIRTY,
                prev: None,
                next: None,
            },
        );
        self.edges.insert(
            id,
            Edge {
                id,
                start,
                end,
                properties: Properties::default(),
                first_line: line_id,
                last_line: line_id,
                line_count: 1,
            },
        );
        self.attach_incident(start, id);
        if start != end {
            self.attach_incident(end, id);
        }
        Ok(())
    }

    fn attach_incident(&mut self, vertex: FullId, edge: FullId) {
        if let Some(v) = self.vertices.get_mut(&vertex) {
            if let Err(at) = v.incident.binary_search(&edge) {
                v.incident.insert(at, edge);
            }
        }
    }

    /// Removes an edge together with its whole chain and returns a snapshot
    /// sufficient to rebuild it.
    pub fn remove_edge(&mut self, id: FullId) -> Result<RemovedEdge, GraphError> {
        let edge = self.edges.remove(&id).ok_or(GraphError::MissingEdge(id))?;
        self.selection.forget_edge(id);
        let mut bends = Vec::with_capacity(edge.bend_count());
        let mut cursor = Some(edge.first_line);
        while let Some(line_id) = cursor {
            let Some(line) = self.lines.remove(&line_id) else {
                break;
            };
            if let Endpoint::Bend(bend_id) = line.end {
                self.selection.forget_bend(bend_id);
                if let Some(bend) = self.bends.remove(&bend_id) {
                    bends.push(bend.position);
                }
            }
            cursor = line.next;
        }
        for v in [edge.start, edge.end] {
            if let Some(vertex) = self.vertices.get_mut(&v) {
                vertex.incident.retain(|e| *e != id);
            }
        }
        Ok(RemovedEdge {
            id,
            start: edge.start,
            end: edge.end,
            bends,
            properties: edge.properties,
        })
    }

    /// Removes a vertex after removing every incident edge.
    pub fn remove_vertex(&mut self, id: FullId) -> Result<RemovedVertex, GraphError> {
        let incident = match self.vertices.get(&id) {
            Some(v) => v.incident.clone(),
            None => return Err(GraphError::MissingVertex(id)),
        };
        self.selection.forget_vertex(id);
        let mut edges = Vec::with_capacity(incident.len());
        for edge in incident {
            if let Ok(removed) = self.remove_edge(edge) {
                edges.push(removed);
            }
        }
        let vertex = self
            .vertices
            .remove(&id)
            .ok_or(GraphError::MissingVertex(id))?;
        Ok(RemovedVertex {
            id,
            position: vertex.position,
            rotation: vertex.rotation,
            scale: vertex.scale,
            properties: vertex.properties,
            edges,
        })
    }

    /// Iterates the chain of `edge`; empty if the edge does not exist.
    pub fn edge_lines(&self, edge: FullId) -> EdgeLines<'_> {
        EdgeLines {
            store: self,
            cursor: self.edges.get(&edge).map(|e| e.first_line),
        }
    }

    /// Iterates the bends of `edge` in chain order.
    pub fn edge_bends(&self, edge: FullId) -> impl Iterator<Item = &Bend> + '_ {
        self.edge_lines(edge).filter_map(|line| match line.end {
            Endpoint::Bend(b) => self.bends.get(&b),
            Endpoint::Vertex(_) => None,
        })
    }

    /// Handle of the `index`-th edge-line of `edge`.
    pub fn line_at(&self, edge: FullId, index: usize) -> Result<LineId, GraphError> {
        let e = self.edges.get(&edge).ok_or(GraphError::MissingEdge(edge))?;
        if index >= e.line_count {
            return Err(GraphError::LineOutOfRange { edge, index });
        }
        self.edge_lines(edge)
            .nth(index)
            .map(|line| line.id)
            .ok_or(GraphError::LineOutOfRange { edge, index })
    }

    /// Handle of the bend ending the `index`-th edge-line of `edge`.
    pub fn bend_at(&self, edge: FullId, index: usize) -> Result<BendId, GraphError> {
        let e = self.edges.get(&edge).ok_or(GraphError::MissingEdge(edge))?;
        if index >= e.bend_count() {
            return Err(GraphError::BendOutOfRange { edge, index });
        }
        match self.edge_lines(edge).nth(index).map(|line| line.end) {
            Some(Endpoint::Bend(b)) => Ok(b),
            _ => Err(GraphError::BendOutOfRange { edge, index }),
        }
    }

    /// Derived chain index of a bend.
    pub fn bend_index(&self, bend: BendId) -> Option<usize> {
        let b = self.bends.get(&bend)?;
        self.edge_lines(b.edge).position(|line| line.id == b.incoming)
    }

    fn relink_after(&mut self, next: Option<LineId>, line: LineId, edge: FullId) {
        match next {
            Some(n) => {
                if let Some(l) = self.lines.get_mut(&n) {
                    l.prev = Some(line);
                }
            }
            None => {
                if let Some(e) = self.edges.get_mut(&edge) {
                    e.last_line = line;
                }
            }
        }
    }

    fn retarget_bend(&mut self, end: Endpoint, incoming: LineId) {
        if let Endpoint::Bend(b) = end {
            if let Some(bend) = self.bends.get_mut(&b) {
                bend.incoming = incoming;
            }
        }
    }

    /// Splits the `index`-th edge-line at a new bend. The new bend's index is
    /// `index` and the chain grows by one.
    pub fn break_edge_line(
        &mut self,
        edge: FullId,
        index: usize,
        position: Vec3,
    ) -> Result<BendId, GraphError> {
        let old_id = self.line_at(edge, index)?;
        let bend_id = BendId(self.alloc_handle());
        let new_id = LineId(self.alloc_handle());
        let old = self
            .lines
            .get_mut(&old_id)
            .ok_or(GraphError::LineOutOfRange { edge, index })?;
        let new_line = EdgeLine {
            id: new_id,
            edge,
            start: Endpoint::Bend(bend_id),
            end: old.end,
            render: RenderFlags::DIRTY,
            prev: Some(old_id),
            next: old.next,
        };
        old.end = Endpoint::Bend(bend_id);
        old.next = Some(new_id);
        old.render.touch(true);

        self.relink_after(new_line.next, new_id, edge);
        self.retarget_bend(new_line.end, new_id);
        self.lines.insert(new_id, new_line);
        self.bends.insert(
            bend_id,
            Bend {
                id: bend_id,
                edge,
                position,
                incoming: old_id,
            },
        );
        if let Some(e) = self.edges.get_mut(&edge) {
            e.line_count += 1;
        }
        Ok(bend_id)
    }

    /// Heals the chain around the `index`-th bend and returns its position.
    /// The chain shrinks by one; a selection holding the bend is cleared.
    pub fn remove_bend(&mut self, edge: FullId, index: usize) -> Result<Vec3, GraphError> {
        let out_of_range = GraphError::BendOutOfRange { edge, index };
        let bend_id = self.bend_at(edge, index)?;
        let before_id = self
            .bends
            .get(&bend_id)
            .map(|b| b.incoming)
            .ok_or_else(|| out_of_range.clone())?;
        let after_id = self
            .lines
            .get(&before_id)
            .and_then(|l| l.next)
            .ok_or_else(|| out_of_range.clone())?;
        let after = self
            .lines
            .remove(&after_id)
            .ok_or_else(|| out_of_range.clone())?;
        let before = self
            .lines
            .get_mut(&before_id)
            .ok_or_else(|| out_of_range.clone())?;
        before.end = after.end;
        before.next = after.next;
        before.render.touch(true);

        self.relink_after(after.next, before_id, edge);
        self.retarget_bend(after.end, before_id);
        let bend = self.bends.remove(&bend_id).ok_or(out_of_range)?;
        if let Some(e) = self.edges.get_mut(&edge) {
            e.line_count -= 1;
        }
        self.selection.forget_bend(bend_id);
        Ok(bend.position)
    }

    fn touch_incident_lines(&mut self, vertex: FullId, mesh: bool) {
        let incident = match self.vertices.get(&vertex) {
            Some(v) => v.incident.clone(),
            None => return,
        };
        for edge in incident {
            self.touch_edge_lines(edge, mesh);
        }
    }

    fn touch_edge_lines(&mut self, edge: FullId, mesh: bool) {
        let mut cursor = self.edges.get(&edge).map(|e| e.first_line);
        while let Some(line) = cursor.and_then(|id| self.lines.get_mut(&id)) {
            line.render.touch(mesh);
            cursor = line.next;
        }
    }

    fn vertex_mut(&mut self, id: FullId) -> Result<&mut Vertex, GraphError> {
        self.vertices
            .get_mut(&id)
            .ok_or(GraphError::MissingVertex(id))
    }

    /// Moves a vertex; returns the previous position.
    pub fn move_vertex(&mut self, id: FullId, position: Vec3) -> Result<Vec3, GraphError> {
        let vertex = self.vertex_mut(id)?;
        let previous = std::mem::replace(&mut vertex.position, position);
        vertex.render.touch(true);
        self.touch_incident_lines(id, true);
        Ok(previous)
    }

    /// Sets a vertex's scale; returns the previous scale.
    pub fn set_vertex_scale(&mut self, id: FullId, scale: f64) -> Result<f64, GraphError> {
        let vertex = self.vertex_mut(id)?;
        vertex.render.touch(true);
        Ok(std::mem::replace(&mut vertex.scale, scale))
    }

    /// Sets a vertex's rotation; returns the previous rotation.
    pub fn set_vertex_rotation(&mut self, id: FullId, rotation: Quat) -> Result<Quat, GraphError> {
        let vertex = self.vertex_mut(id)?;
        vertex.render.touch(true);
        Ok(std::mem::replace(&mut vertex.rotation, rotation))
    }

    /// Moves the `index`-th bend of `edge`; returns the previous position.
    pub fn move_bend(&mut self, edge: FullId, index: usize, position: Vec3) -> Result<Vec3, GraphError> {
        let bend_id = self.bend_at(edge, index)?;
        let bend = self
            .bends
            .get_mut(&bend_id)
            .ok_or(GraphError::BendOutOfRange { edge, index })?;
        let previous = std::mem::replace(&mut bend.position, position);
        self.touch_edge_lines(edge, true);
        Ok(previous)
    }

    /// Writes a vertex property; returns the previous value (`""` if absent).
    ///
    /// Marks the vertex and every incident edge-line for a texture refresh,
    /// and the vertex mesh too when `remesh` is set.
    pub fn set_vertex_property(
        &mut self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
        remesh: bool,
    ) -> Result<String, GraphError> {
        let vertex = self.vertex_mut(id)?;
        let previous = vertex.properties.set(list, key, value);
        vertex.render.touch(remesh);
        self.touch_incident_lines(id, false);
        Ok(previous)
    }

    /// Writes an edge property; returns the previous value (`""` if absent).
    pub fn set_edge_property(
        &mut self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
        remesh: bool,
    ) -> Result<String, GraphError> {
        let edge = self.edges.get_mut(&id).ok_or(GraphError::MissingEdge(id))?;
        let previous = edge.properties.set(list, key, value);
        self.touch_edge_lines(id, remesh);
        Ok(previous)
    }

    /// Sets the camera position; returns the previous one.
    pub fn set_camera_position(&mut self, position: Vec3) -> Vec3 {
        std::mem::replace(&mut self.camera.position, position)
    }

    /// Sets the camera rotation; returns the previous one.
    pub fn set_camera_rotation(&mut self, rotation: Quat) -> Quat {
        std::mem::replace(&mut self.camera.rotation, rotation)
    }

    /// Clears every render dirty flag after the renderer has caught up.
    pub fn clear_render_flags(&mut self) {
        for v in self.vertices.values_mut() {
            v.render = RenderFlags::default();
        }
        for l in self.lines.values_mut() {
            l.render = RenderFlags::default();
        }
    }

    /// Edges joining `a` and `b` in either direction, in the incident order
    /// of the lower-ID endpoint.
    pub fn edges_between(&self, a: FullId, b: FullId) -> Vec<FullId> {
        let Some(anchor) = self.vertices.get(&a.min(b)) else {
            return Vec::new();
        };
        anchor
            .incident
            .iter()
            .copied()
            .filter(|id| self.edges.get(id).is_some_and(|e| e.connects(a, b)))
            .collect()
    }

    /// First edge joining `a` and `b`, if any.
    pub fn connecting_edge(&self, a: FullId, b: FullId) -> Option<FullId> {
        self.edges_between(a, b).first().copied()
    }

    /// Position of `edge` among the edges sharing its endpoint pair.
    pub fn parallel_index(&self, edge: FullId) -> Option<usize> {
        let e = self.edges.get(&edge)?;
        self.edges_between(e.start, e.end)
            .iter()
            .position(|id| *id == edge)
    }

    /// Next edge (cyclically) among those sharing `edge`'s endpoint pair.
    pub fn next_parallel_edge(&self, edge: FullId) -> Option<FullId> {
        let e = self.edges.get(&edge)?;
        let siblings = self.edges_between(e.start, e.end);
        let index = siblings.iter().position(|id| *id == edge)?;
        siblings.get((index + 1) % siblings.len()).copied()
    }

    /// Checks the chain invariants of `edge`: contiguous endpoints, terminals
    /// at the edge's vertices, consistent back links and bend ownership.
    pub fn chain_is_valid(&self, edge: FullId) -> bool {
        let Some(e) = self.edges.get(&edge) else {
            return false;
        };
        let mut expected_start = Endpoint::Vertex(e.start);
        let mut prev: Option<LineId> = None;
        let mut count = 0usize;
        for line in self.edge_lines(edge) {
            if line.edge != edge || line.start != expected_start || line.prev != prev {
                return false;
            }
            if let Endpoint::Bend(b) = line.end {
                match self.bends.get(&b) {
                    Some(bend) if bend.edge == edge && bend.incoming == line.id => {}
                    _ => return false,
                }
            }
            expected_start = match line.end {
                Endpoint::Bend(b) => Endpoint::Bend(b),
                Endpoint::Vertex(_) => Endpoint::Vertex(e.end),
            };
            prev = Some(line.id);
            count += 1;
        }
        count == e.line_count && prev == Some(e.last_line) && expected_start == Endpoint::Vertex(e.end)
    }
}
