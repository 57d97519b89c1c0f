// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Complement derivation. Runs against the state *before* an operation is
//! applied and yields the commands that restore that state.

use trellis_graph::{ClientId, FullId, GraphError, GraphStore, Properties};
use trellis_proto::{Command, IdSlot, Operation};

use crate::replica::ReplicaError;

/// Full ID named by an insert slot.
pub(crate) fn slot_id(slot: IdSlot, origin: ClientId) -> Result<FullId, ReplicaError> {
    slot.resolve(origin).ok_or(ReplicaError::OpenIdSlot)
}

struct Restore<'a> {
    graph: &'a GraphStore,
    issuer: ClientId,
    out: Vec<Command>,
}

impl Restore<'_> {
    fn push(&mut self, op: Operation) {
        self.out.push(op.into_command(self.issuer));
    }

    fn properties(&mut self, target: FullId, props: &Properties, vertex: bool) {
        for (list, key, value) in props.iter() {
            let (list, key, value) = (list.to_string(), key.to_string(), value.to_string());
            self.push(if vertex {
                Operation::SetVertexProperty {
                    vertex: target,
                    list,
                    key,
                    value,
                    remesh: true,
                }
            } else {
                Operation::SetEdgeProperty {
                    edge: target,
                    list,
                    key,
                    value,
                    remesh: true,
                }
            });
        }
    }

    fn edge(&mut self, id: FullId) -> Result<(), GraphError> {
        let graph = self.graph;
        let edge = graph.edge(id).ok_or(GraphError::MissingEdge(id))?;
        self.push(Operation::InsertEdge {
            from: edge.start,
            to: edge.end,
            id: IdSlot::for_id(id, self.issuer),
        });
        for (index, bend) in graph.edge_bends(id).enumerate() {
            self.push(Operation::BreakEdgeLine {
                edge: id,
                index,
                position: bend.position,
            });
        }
        self.properties(id, &edge.properties, false);
        Ok(())
    }

    fn vertex(&mut self, id: FullId) -> Result<(), GraphError> {
        let graph = self.graph;
        let vertex = graph.vertex(id).ok_or(GraphError::MissingVertex(id))?;
        self.push(Operation::InsertVertex {
            id: IdSlot::for_id(id, self.issuer),
            position: vertex.position,
        });
        self.push(Operation::ChangeVertexScale {
            vertex: id,
            scale: vertex.scale,
        });
        self.push(Operation::ChangeVertexRotation {
            vertex: id,
            rotation: vertex.rotation,
        });
        self.properties(id, &vertex.properties, true);
        for edge in &vertex.incident {
            self.edge(*edge)?;
        }
        Ok(())
    }
}

/// Commands reversing `op` on `graph`, issued by `issuer`.
///
/// `origin` is the client that issued `op` and scopes its insert slots.
/// Kinds without history (custom, selection) yield an empty list. Fails
/// when `op` would not resolve, in which case nothing should be applied.
pub(crate) fn complement(
    graph: &GraphStore,
    op: &Operation,
    origin: ClientId,
    issuer: ClientId,
) -> Result<Vec<Command>, ReplicaError> {
    let vertex = |id: FullId| graph.vertex(id).ok_or(GraphError::MissingVertex(id));
    let edge = |id: FullId| graph.edge(id).ok_or(GraphError::MissingEdge(id));
    let bend_position = |edge: FullId, index: usize| {
        let bend = graph.bend_at(edge, index)?;
        graph
            .bend(bend)
            .map(|b| b.position)
            .ok_or(GraphError::BendOutOfRange { edge, index })
    };
    let fresh = |id: FullId| {
        if graph.contains_id(id) {
            Err(GraphError::IdInUse(id))
        } else {
            Ok(id)
        }
    };

    let mut restore = Restore {
        graph,
        issuer,
        out: Vec::new(),
    };
    match op {
        Operation::InsertVertex { id, .. } => {
            let vertex = fresh(slot_id(*id, origin)?)?;
            restore.push(Operation::RemoveVertex { vertex });
        }
        Operation::InsertEdge { from, to, id } => {
            let edge = fresh(slot_id(*id, origin)?)?;
            vertex(*from)?;
            vertex(*to)?;
            restore.push(Operation::RemoveEdge { edge });
        }
        Operation::BreakEdgeLine { edge, index, .. } => {
            graph.line_at(*edge, *index)?;
            restore.push(Operation::RemoveBend {
                edge: *edge,
                index: *index,
            });
        }
        Operation::RemoveVertex { vertex } => restore.vertex(*vertex)?,
        Operation::RemoveEdge { edge } => restore.edge(*edge)?,
        Operation::RemoveBend { edge, index } => {
            let position = bend_position(*edge, *index)?;
            restore.push(Operation::BreakEdgeLine {
                edge: *edge,
                index: *index,
                position,
            });
        }
        Operation::MoveVertex { vertex: id, .. } => {
            let position = vertex(*id)?.position;
            restore.push(Operation::MoveVertex {
                vertex: *id,
                position,
            });
        }
        Operation::ChangeVertexScale { vertex: id, .. } => {
            let scale = vertex(*id)?.scale;
            restore.push(Operation::ChangeVertexScale { vertex: *id, scale });
        }
        Operation::ChangeVertexRotation { vertex: id, .. } => {
            let rotation = vertex(*id)?.rotation;
            restore.push(Operation::ChangeVertexRotation {
                vertex: *id,
                rotation,
            });
        }
        Operation::MoveBend { edge, index, .. } => {
            let position = bend_position(*edge, *index)?;
            restore.push(Operation::MoveBend {
                edge: *edge,
                index: *index,
                position,
            });
        }
        Operation::ChangeCameraPosition { .. } => {
            restore.push(Operation::ChangeCameraPosition {
                position: graph.camera().position,
            });
        }
        Operation::ChangeCameraRotation { .. } => {
            restore.push(Operation::ChangeCameraRotation {
                rotation: graph.camera().rotation,
            });
        }
        Operation::SetVertexProperty {
            vertex: id,
            list,
            key,
            remesh,
            ..
        } => {
            let value = vertex(*id)?.properties.get(list, key).unwrap_or_default();
            restore.push(Operation::SetVertexProperty {
                vertex: *id,
                list: list.clone(),
                key: key.clone(),
                value: value.to_string(),
                remesh: *remesh,
            });
        }
        Operation::SetEdgeProperty {
            edge: id,
            list,
            key,
            remesh,
            ..
        } => {
            let value = edge(*id)?.properties.get(list, key).unwrap_or_default();
            restore.push(Operation::SetEdgeProperty {
                edge: *id,
                list: list.clone(),
                key: key.clone(),
                value: value.to_string(),
                remesh: *remesh,
            });
        }
        Operation::CustomCommand { .. }
        | Operation::SelectVertex { .. }
        | Operation::SelectBend { .. }
        | Operation::ClearSelection => {}
    }
    Ok(restore.out)
}
