// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The apply engine: one mutation path for relay commands, local edits,
//! undo and redo.

use thiserror::Error;
use tracing::{debug, trace};
use trellis_graph::{ClientId, FullId, GraphError, GraphStore, Selectable};
use trellis_proto::{Command, CommandKind, IdSlot, Operation, ValidationError};

use crate::allocator::IdAllocator;
use crate::complement::{complement, slot_id};
use crate::event::GraphEvent;
use crate::history::{History, HistoryEntry};

/// Errors surfaced by local edits and history navigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
    /// The command does not match its kind's schema.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// A referenced entity or index does not resolve.
    #[error(transparent)]
    Unresolved(#[from] GraphError),
    /// An insert reached the apply path without a resolved ID.
    #[error("insert command has an empty id slot")]
    OpenIdSlot,
    /// The history cursor is at the start.
    #[error("nothing to undo")]
    NothingToUndo,
    /// The history cursor is at the end.
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Outcome of [`Replica::apply`]. None of these are failures of the replica.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// State changed.
    Applied,
    /// Own command seen outside the loading phase; already applied locally.
    EchoSuppressed,
    /// A reference did not resolve (concurrent deletion); nothing changed.
    Unresolved,
    /// Camera or selection command this replica does not follow.
    Ignored,
    /// The command failed schema validation.
    Invalid(ValidationError),
}

/// One client's replica of a shared graph.
#[derive(Debug, Clone)]
pub struct Replica {
    client: ClientId,
    graph: GraphStore,
    ids: IdAllocator,
    history: History,
    receive_camera: bool,
    follow_selection: bool,
    events: Vec<GraphEvent>,
}

impl Replica {
    /// Empty replica for `client`. Camera and selection commands from other
    /// clients are ignored until enabled.
    pub fn new(client: ClientId) -> Self {
        Self {
            client,
            graph: GraphStore::new(),
            ids: IdAllocator::new(client),
            history: History::new(),
            receive_camera: false,
            follow_selection: false,
            events: Vec::new(),
        }
    }

    /// Local client ID.
    pub const fn client(&self) -> ClientId {
        self.client
    }

    /// Read-only graph state.
    pub const fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Graph access for UI-local state (highlight, render flags). Shared
    /// state must change through commands.
    pub fn graph_mut(&mut self) -> &mut GraphStore {
        &mut self.graph
    }

    /// ID allocator.
    pub const fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// History and cursor.
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// Whether camera commands from other clients are applied.
    pub fn set_receive_camera(&mut self, on: bool) {
        self.receive_camera = on;
    }

    /// Whether selection commands from other clients are applied.
    pub fn set_follow_selection(&mut self, on: bool) {
        self.follow_selection = on;
    }

    /// Takes every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    /// Applies a command received from the relay.
    ///
    /// Own commands are skipped unless `is_loading`. With `keep_history` the
    /// command and its complement are recorded.
    pub fn apply(&mut self, command: &Command, is_loading: bool, keep_history: bool) -> ApplyResult {
        if !is_loading && command.origin == self.client {
            trace!(%command, "echo suppressed");
            return ApplyResult::EchoSuppressed;
        }
        let op = match command.validate().and_then(|()| Operation::decode(command)) {
            Ok(op) => op,
            Err(err) => {
                debug!(%command, %err, "invalid command");
                return ApplyResult::Invalid(err);
            }
        };
        let gated = match command.kind {
            CommandKind::ChangeCameraPosition | CommandKind::ChangeCameraRotation => {
                !(self.receive_camera || is_loading)
            }
            CommandKind::SelectVertex | CommandKind::SelectBend | CommandKind::ClearSelection => {
                !self.follow_selection
            }
            _ => false,
        };
        if gated {
            return ApplyResult::Ignored;
        }
        match self.execute(&op, command.origin) {
            Ok(complement) => {
                if keep_history && !complement.is_empty() {
                    self.history.record(HistoryEntry {
                        command: command.clone(),
                        complement,
                    });
                }
                ApplyResult::Applied
            }
            Err(err) => {
                debug!(%command, %err, "unresolved command skipped");
                ApplyResult::Unresolved
            }
        }
    }

    /// Applies a locally issued operation and returns the command to publish.
    ///
    /// Empty insert slots are filled from the allocator first. Nothing is
    /// applied when the command is invalid or does not resolve.
    pub fn apply_local(&mut self, op: Operation, keep_history: bool) -> Result<Command, ReplicaError> {
        let op = self.allocate(op);
        let command = op.clone().into_command(self.client);
        command.validate()?;
        let complement = self.execute(&op, self.client)?;
        if keep_history && !complement.is_empty() {
            self.history.record(HistoryEntry {
                command: command.clone(),
                complement,
            });
        }
        Ok(command)
    }

    fn allocate(&mut self, op: Operation) -> Operation {
        match op {
            Operation::InsertVertex {
                id: IdSlot::Allocate,
                position,
            } => Operation::InsertVertex {
                id: IdSlot::Counter(self.ids.allocate_vertex_id().counter),
                position,
            },
            Operation::InsertEdge {
                from,
                to,
                id: IdSlot::Allocate,
            } => Operation::InsertEdge {
                from,
                to,
                id: IdSlot::Counter(self.ids.allocate_edge_id().counter),
            },
            other => other,
        }
    }

    /// Steps the history back. Returns the complement commands applied.
    pub fn undo(&mut self) -> Result<Vec<Command>, ReplicaError> {
        let complement = self.history.step_back().ok_or(ReplicaError::NothingToUndo)?;
        for command in &complement {
            self.replay(command);
        }
        Ok(complement)
    }

    /// Steps the history forward. Returns the command re-applied.
    pub fn redo(&mut self) -> Result<Command, ReplicaError> {
        let mut command = self.history.step_forward().ok_or(ReplicaError::NothingToRedo)?;
        self.replay(&command);
        command.sequence = None;
        Ok(command)
    }

    fn replay(&mut self, command: &Command) {
        let result = Operation::decode(command)
            .map_err(ReplicaError::from)
            .and_then(|op| self.execute(&op, command.origin));
        if let Err(err) = result {
            debug!(%command, %err, "history step did not resolve");
        }
    }

    /// Computes the complement, then mutates the graph.
    fn execute(&mut self, op: &Operation, origin: ClientId) -> Result<Vec<Command>, ReplicaError> {
        let complement = complement(&self.graph, op, origin, self.client)?;
        self.mutate(op, origin)?;
        Ok(complement)
    }

    fn inserted(&mut self, id: FullId, event: GraphEvent) {
        self.ids.observe(id);
        self.events.push(event);
    }

    fn mutate(&mut self, op: &Operation, origin: ClientId) -> Result<(), ReplicaError> {
        let g = &mut self.graph;
        match op {
            Operation::InsertVertex { id, position } => {
                let id = slot_id(*id, origin)?;
                g.insert_vertex(id, *position)?;
                self.inserted(id, GraphEvent::VertexAdded(id));
            }
            Operation::InsertEdge { from, to, id } => {
                let id = slot_id(*id, origin)?;
                g.insert_edge(id, *from, *to)?;
                self.inserted(id, GraphEvent::EdgeAdded(id));
            }
            Operation::BreakEdgeLine {
                edge,
                index,
                position,
            } => {
                g.break_edge_line(*edge, *index, *position)?;
                self.events.push(GraphEvent::BendAdded {
                    edge: *edge,
                    index: *index,
                });
            }
            Operation::RemoveVertex { vertex } => {
                let removed = g.remove_vertex(*vertex)?;
                self.events
                    .extend(removed.edges.iter().map(|e| GraphEvent::EdgeRemoved(e.id)));
                self.events.push(GraphEvent::VertexRemoved(*vertex));
            }
            Operation::RemoveEdge { edge } => {
                g.remove_edge(*edge)?;
                self.events.push(GraphEvent::EdgeRemoved(*edge));
            }
            Operation::RemoveBend { edge, index } => {
                g.remove_bend(*edge, *index)?;
                self.events.push(GraphEvent::BendRemoved {
                    edge: *edge,
                    index: *index,
                });
            }
            Operation::MoveVertex { vertex, position } => {
                g.move_vertex(*vertex, *position)?;
                self.events.push(GraphEvent::VertexChanged(*vertex));
            }
            Operation::ChangeVertexScale { vertex, scale } => {
                g.set_vertex_scale(*vertex, *scale)?;
                self.events.push(GraphEvent::VertexChanged(*vertex));
            }
            Operation::ChangeVertexRotation { vertex, rotation } => {
                g.set_vertex_rotation(*vertex, *rotation)?;
                self.events.push(GraphEvent::VertexChanged(*vertex));
            }
            Operation::MoveBend {
                edge,
                index,
                position,
            } => {
                g.move_bend(*edge, *index, *position)?;
                self.events.push(GraphEvent::BendMoved {
                    edge: *edge,
                    index: *index,
                });
            }
            Operation::ChangeCameraPosition { position } => {
                g.set_camera_position(*position);
                self.events.push(GraphEvent::CameraChanged);
            }
            Operation::ChangeCameraRotation { rotation } => {
                g.set_camera_rotation(*rotation);
                self.events.push(GraphEvent::CameraChanged);
            }
            Operation::SetVertexProperty {
                vertex: target,
                list,
                key,
                value,
                remesh,
            } => {
                g.set_vertex_property(*target, list, key, value, *remesh)?;
                self.events.push(GraphEvent::PropertyChanged {
                    target: *target,
                    list: list.clone(),
                    key: key.clone(),
                });
            }
            Operation::SetEdgeProperty {
                edge: target,
                list,
                key,
                value,
                remesh,
            } => {
                g.set_edge_property(*target, list, key, value, *remesh)?;
                self.events.push(GraphEvent::PropertyChanged {
                    target: *target,
                    list: list.clone(),
                    key: key.clone(),
                });
            }
            Operation::CustomCommand { name, payload } => {
                self.events.push(GraphEvent::Custom {
                    origin,
                    name: name.clone(),
                    payload: payload.clone(),
                });
            }
            Operation::SelectVertex { vertex } => {
                if g.vertex(*vertex).is_none() {
                    return Err(GraphError::MissingVertex(*vertex).into());
                }
                if g.select(Selectable::Vertex(*vertex)) {
                    self.events.push(GraphEvent::SelectionChanged);
                }
            }
            Operation::SelectBend { edge, index } => {
                let bend = g.bend_at(*edge, *index)?;
                if g.select(Selectable::Bend(bend)) {
                    self.events.push(GraphEvent::SelectionChanged);
                }
            }
            Operation::ClearSelection => {
                if !g.selection().is_empty() {
                    g.clear_selection();
                    self.events.push(GraphEvent::SelectionChanged);
                }
            }
        }
        Ok(())
    }
}
