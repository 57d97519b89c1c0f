// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed view of a [`Command`]. Decoding validates against the schema table
//! first, so every string slot has already been checked when it is parsed.

use trellis_graph::{ClientId, FullId, Quat, Vec3};

use crate::command::{Command, CommandKind, ValidationError};

/// ID slot of an insert command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSlot {
    /// Empty slot: the issuing replica allocates a counter before sending.
    Allocate,
    /// Counter in the origin's namespace.
    Counter(u64),
    /// Full ID in any namespace; used when restoring a removed entity.
    Explicit(FullId),
}

impl IdSlot {
    /// Full ID this slot names when issued by `origin`.
    pub const fn resolve(self, origin: ClientId) -> Option<FullId> {
        match self {
            Self::Allocate => None,
            Self::Counter(counter) => Some(FullId::new(origin, counter)),
            Self::Explicit(id) => Some(id),
        }
    }

    /// Slot for `id` as issued by `origin`: a bare counter when `origin`
    /// minted it, the full ID otherwise.
    pub fn for_id(id: FullId, origin: ClientId) -> Self {
        if id.creator == origin {
            Self::Counter(id.counter)
        } else {
            Self::Explicit(id)
        }
    }

    fn encode(self) -> String {
        match self {
            Self::Allocate => String::new(),
            Self::Counter(counter) => counter.to_string(),
            Self::Explicit(id) => id.to_string(),
        }
    }
}

/// Decoded command. Field names follow the parameter names of each kind.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Operation {
    /// Create a vertex.
    InsertVertex { id: IdSlot, position: Vec3 },
    /// Create an edge with a single edge-line.
    InsertEdge { from: FullId, to: FullId, id: IdSlot },
    /// Split an edge-line at a new bend.
    BreakEdgeLine { edge: FullId, index: usize, position: Vec3 },
    /// Remove a vertex and its incident edges.
    RemoveVertex { vertex: FullId },
    /// Remove an edge and its bends.
    RemoveEdge { edge: FullId },
    /// Heal the chain around a bend.
    RemoveBend { edge: FullId, index: usize },
    /// Reposition a vertex.
    MoveVertex { vertex: FullId, position: Vec3 },
    /// Rescale a vertex.
    ChangeVertexScale { vertex: FullId, scale: f64 },
    /// Rotate a vertex.
    ChangeVertexRotation { vertex: FullId, rotation: Quat },
    /// Reposition a bend.
    MoveBend { edge: FullId, index: usize, position: Vec3 },
    /// Move the shared camera.
    ChangeCameraPosition { position: Vec3 },
    /// Rotate the shared camera.
    ChangeCameraRotation { rotation: Quat },
    /// Write or delete a vertex property.
    SetVertexProperty { vertex: FullId, list: String, key: String, value: String, remesh: bool },
    /// Write or delete an edge property.
    SetEdgeProperty { edge: FullId, list: String, key: String, value: String, remesh: bool },
    /// Opaque application command.
    CustomCommand { name: String, payload: String },
    /// Add a vertex to the selection.
    SelectVertex { vertex: FullId },
    /// Add a bend to the selection.
    SelectBend { edge: FullId, index: usize },
    /// Drop the selection.
    ClearSelection,
}

struct Slots<'a>(&'a Command);

impl Slots<'_> {
    fn id(&self, i: usize) -> Result<FullId, ValidationError> {
        self.0
            .param(i)
            .parse()
            .map_err(|_| ValidationError::BadId { slot: i + 1 })
    }

    fn index(&self, i: usize) -> Result<usize, ValidationError> {
        trellis_graph::parse_counter(self.0.param(i))
            .and_then(|v| usize::try_from(v).ok())
            .ok_or(ValidationError::TooManyDigits { slot: i + 1 })
    }

    fn float(&self, i: usize) -> Result<f64, ValidationError> {
        self.0
            .param(i)
            .parse()
            .map_err(|_| ValidationError::BadFloat { slot: i + 1 })
    }

    fn vec3(&self, i: usize) -> Result<Vec3, ValidationError> {
        Ok(Vec3::new(self.float(i)?, self.float(i + 1)?, self.float(i + 2)?))
    }

    fn quat(&self, i: usize) -> Result<Quat, ValidationError> {
        Ok(Quat::new(
            self.float(i)?,
            self.float(i + 1)?,
            self.float(i + 2)?,
            self.float(i + 3)?,
        ))
    }

    fn text(&self, i: usize) -> String {
        self.0.param(i).to_string()
    }

    fn id_slot(&self, i: usize) -> Result<IdSlot, ValidationError> {
        let raw = self.0.param(i);
        if raw.is_empty() {
            Ok(IdSlot::Allocate)
        } else if raw.contains('-') {
            self.id(i).map(IdSlot::Explicit)
        } else {
            trellis_graph::parse_counter(raw)
                .map(IdSlot::Counter)
                .ok_or(ValidationError::NotDigits { slot: i + 1 })
        }
    }
}

fn num(v: f64) -> String {
    v.to_string()
}

impl Operation {
    /// Kind of this operation.
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::InsertVertex { .. } => CommandKind::InsertVertex,
            Self::InsertEdge { .. } => CommandKind::InsertEdge,
            Self::BreakEdgeLine { .. } => CommandKind::BreakEdgeLine,
            Self::RemoveVertex { .. } => CommandKind::RemoveVertex,
            Self::RemoveEdge { .. } => CommandKind::RemoveEdge,
            Self::RemoveBend { .. } => CommandKind::RemoveBend,
            Self::MoveVertex { .. } => CommandKind::MoveVertex,
            Self::ChangeVertexScale { .. } => CommandKind::ChangeVertexScale,
            Self::ChangeVertexRotation { .. } => CommandKind::ChangeVertexRotation,
            Self::MoveBend { .. } => CommandKind::MoveBend,
            Self::ChangeCameraPosition { .. } => CommandKind::ChangeCameraPosition,
            Self::ChangeCameraRotation { .. } => CommandKind::ChangeCameraRotation,
            Self::SetVertexProperty { .. } => CommandKind::SetVertexProperty,
            Self::SetEdgeProperty { .. } => CommandKind::SetEdgeProperty,
            Self::CustomCommand { .. } => CommandKind::CustomCommand,
            Self::SelectVertex { .. } => CommandKind::SelectVertex,
            Self::SelectBend { .. } => CommandKind::SelectBend,
            Self::ClearSelection => CommandKind::ClearSelection,
        }
    }

    /// Decodes a command.
    ///
    /// An empty insert ID slot is accepted here (it means "allocate") even
    /// though [`Command::validate`] rejects it; only resolved commands are
    /// ever sent.
    pub fn decode(command: &Command) -> Result<Self, ValidationError> {
        let is_open_insert = match command.kind {
            CommandKind::InsertVertex => command.param(0).is_empty(),
            CommandKind::InsertEdge => command.param(2).is_empty(),
            _ => false,
        };
        if is_open_insert {
            let mut probe = command.clone();
            let slot = if command.kind == CommandKind::InsertEdge { 2 } else { 0 };
            probe.params[slot] = "0".to_string();
            probe.validate()?;
        } else {
            command.validate()?;
        }

        let s = Slots(command);
        Ok(match command.kind {
            CommandKind::InsertVertex => Self::InsertVertex {
                id: s.id_slot(0)?,
                position: s.vec3(1)?,
            },
            CommandKind::InsertEdge => Self::InsertEdge {
                from: s.id(0)?,
                to: s.id(1)?,
                id: s.id_slot(2)?,
            },
            CommandKind::BreakEdgeLine => Self::BreakEdgeLine {
                edge: s.id(0)?,
                index: s.index(1)?,
                position: s.vec3(2)?,
            },
            CommandKind::RemoveVertex => Self::RemoveVertex { vertex: s.id(0)? },
            CommandKind::RemoveEdge => Self::RemoveEdge { edge: s.id(0)? },
            CommandKind::RemoveBend => Self::RemoveBend {
                edge: s.id(0)?,
                index: s.index(1)?,
            },
            CommandKind::MoveVertex => Self::MoveVertex {
                vertex: s.id(0)?,
                position: s.vec3(1)?,
            },
            CommandKind::ChangeVertexScale => Self::ChangeVertexScale {
                vertex: s.id(0)?,
                scale: s.float(1)?,
            },
            CommandKind::ChangeVertexRotation => Self::ChangeVertexRotation {
                vertex: s.id(0)?,
                rotation: s.quat(1)?,
            },
            CommandKind::MoveBend => Self::MoveBend {
                edge: s.id(0)?,
                index: s.index(1)?,
                position: s.vec3(2)?,
            },
            CommandKind::ChangeCameraPosition => Self::ChangeCameraPosition {
                position: s.vec3(0)?,
            },
            CommandKind::ChangeCameraRotation => Self::ChangeCameraRotation {
                rotation: s.quat(0)?,
            },
            CommandKind::SetVertexProperty => Self::SetVertexProperty {
                vertex: s.id(0)?,
                list: s.text(1),
                key: s.text(2),
                value: s.text(3),
                remesh: command.param(4) != "0",
            },
            CommandKind::SetEdgeProperty => Self::SetEdgeProperty {
                edge: s.id(0)?,
                list: s.text(1),
                key: s.text(2),
                value: s.text(3),
                remesh: command.param(4) != "0",
            },
            CommandKind::CustomCommand => Self::CustomCommand {
                name: s.text(0),
                payload: s.text(1),
            },
            CommandKind::SelectVertex => Self::SelectVertex { vertex: s.id(0)? },
            CommandKind::SelectBend => Self::SelectBend {
                edge: s.id(0)?,
                index: s.index(1)?,
            },
            CommandKind::ClearSelection => Self::ClearSelection,
        })
    }

    /// Encodes this operation as an unsequenced command from `origin`.
    pub fn into_command(self, origin: ClientId) -> Command {
        let kind = self.kind();
        let flag = |remesh: bool| String::from(if remesh { "1" } else { "0" });
        let params: Vec<String> = match self {
            Self::InsertVertex { id, position: p } => vec![id.encode(), num(p.x), num(p.y), num(p.z)],
            Self::InsertEdge { from, to, id } => vec![from.to_string(), to.to_string(), id.encode()],
            Self::BreakEdgeLine {
                edge,
                index,
                position: p,
            }
            | Self::MoveBend {
                edge,
                index,
                position: p,
            } => vec![edge.to_string(), index.to_string(), num(p.x), num(p.y), num(p.z)],
            Self::RemoveVertex { vertex } | Self::SelectVertex { vertex } => vec![vertex.to_string()],
            Self::RemoveEdge { edge } => vec![edge.to_string()],
            Self::RemoveBend { edge, index } | Self::SelectBend { edge, index } => {
                vec![edge.to_string(), index.to_string()]
            }
            Self::MoveVertex { vertex, position: p } => {
                vec![vertex.to_string(), num(p.x), num(p.y), num(p.z)]
            }
            Self::ChangeVertexScale { vertex, scale } => vec![vertex.to_string(), num(scale)],
            Self::ChangeVertexRotation { vertex, rotation: q } => {
                vec![vertex.to_string(), num(q.x), num(q.y), num(q.z), num(q.w)]
            }
            Self::ChangeCameraPosition { position: p } => vec![num(p.x), num(p.y), num(p.z)],
            Self::ChangeCameraRotation { rotation: q } => vec![num(q.x), num(q.y), num(q.z), num(q.w)],
            Self::SetVertexProperty {
                vertex: target,
                list,
                key,
                value,
                remesh,
            }
            | Self::SetEdgeProperty {
                edge: target,
                list,
                key,
                value,
                remesh,
            } => vec![target.to_string(), list, key, value, flag(remesh)],
            Self::CustomCommand { name, payload } => vec![name, payload],
            Self::ClearSelection => Vec::new(),
        };
        Command::new(kind, origin, params)
    }
}
