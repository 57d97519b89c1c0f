// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The 5-slot command tuple and the single schema table both client and relay
//! validate against.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trellis_graph::ClientId;

/// Number of string parameter slots on every command.
pub const PARAM_SLOTS: usize = 5;
/// Longest accepted counter/ID component, in digits.
pub const MAX_DIGITS: usize = 18;
/// Longest accepted text parameter, in bytes.
pub const MAX_TEXT_LEN: usize = 50;

/// Type of one parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Full ID `creator-counter`.
    Id,
    /// Non-negative integer of at most 18 digits.
    Counter,
    /// ID slot of an insert: a counter (creator = origin) or a full ID.
    IdSlot,
    /// Finite floating point number.
    Float,
    /// String of at most 50 bytes; may be empty.
    Text,
}

macro_rules! command_kinds {
    ($($(#[$doc:meta])* $kind:ident => [$($param:ident),*],)*) => {
        /// Closed set of command kinds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum CommandKind {
            $($(#[$doc])* $kind,)*
        }

        impl CommandKind {
            /// Every kind, in schema order.
            pub const ALL: &'static [Self] = &[$(Self::$kind,)*];

            /// Wire name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$kind => stringify!($kind),)*
                }
            }

            /// Parameter schema; slots past its length are always empty.
            pub const fn schema(self) -> &'static [ParamType] {
                match self {
                    $(Self::$kind => &[$(ParamType::$param),*],)*
                }
            }
        }
    };
}

command_kinds! {
    /// `InsertVertex(idSlot, x, y, z)`
    InsertVertex => [IdSlot, Float, Float, Float],
    /// `InsertEdge(fromId, toId, idSlot)`
    InsertEdge => [Id, Id, IdSlot],
    /// `BreakEdgeLine(edgeId, index, x, y, z)`
    BreakEdgeLine => [Id, Counter, Float, Float, Float],
    /// `RemoveVertex(vertexId)`
    RemoveVertex => [Id],
    /// `RemoveEdge(edgeId)`
    RemoveEdge => [Id],
    /// `RemoveBend(edgeId, index)`
    RemoveBend => [Id, Counter],
    /// `MoveVertex(vertexId, x, y, z)`
    MoveVertex => [Id, Float, Float, Float],
    /// `ChangeVertexScale(vertexId, scale)`
    ChangeVertexScale => [Id, Float],
    /// `ChangeVertexRotation(vertexId, qx, qy, qz, qw)`
    ChangeVertexRotation => [Id, Float, Float, Float, Float],
    /// `MoveBend(edgeId, index, x, y, z)`
    MoveBend => [Id, Counter, Float, Float, Float],
    /// `ChangeCameraPosition(x, y, z)`
    ChangeCameraPosition => [Float, Float, Float],
    /// `ChangeCameraRotation(qx, qy, qz, qw)`
    ChangeCameraRotation => [Float, Float, Float, Float],
    /// `SetVertexProperty(vertexId, list, key, value, remesh)`
    SetVertexProperty => [Id, Text, Text, Text, Counter],
    /// `SetEdgeProperty(edgeId, list, key, value, remesh)`
    SetEdgeProperty => [Id, Text, Text, Text, Counter],
    /// `CustomCommand(name, payload)`
    CustomCommand => [Text, Text],
    /// `SelectVertex(vertexId)`
    SelectVertex => [Id],
    /// `SelectBend(edgeId, index)`
    SelectBend => [Id, Counter],
    /// `ClearSelection()`
    ClearSelection => [],
}

impl CommandKind {
    /// True for kinds that change vertices, edges or bends.
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::InsertVertex
                | Self::InsertEdge
                | Self::BreakEdgeLine
                | Self::RemoveVertex
                | Self::RemoveEdge
                | Self::RemoveBend
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| ValidationError::UnknownCommand(s.to_string()))
    }
}

/// Schema violation. `slot` values are 1-based, matching `Param1..Param5`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Name is not in the schema table.
    #[error("invalid command name {0:?}")]
    UnknownCommand(String),
    /// Required slot absent on the wire.
    #[error("Param{slot} is not specified")]
    MissingParam {
        /// Slot number.
        slot: usize,
    },
    /// Not of the form `digits-digits`.
    #[error("Param{slot} is not a full id")]
    BadId {
        /// Slot number.
        slot: usize,
    },
    /// Not a run of ASCII digits.
    #[error("Param{slot} is not a non-negative integer")]
    NotDigits {
        /// Slot number.
        slot: usize,
    },
    /// More than 18 digits.
    #[error("Param{slot} has more than 18 digits")]
    TooManyDigits {
        /// Slot number.
        slot: usize,
    },
    /// Not a finite float.
    #[error("Param{slot} is not a finite number")]
    BadFloat {
        /// Slot number.
        slot: usize,
    },
    /// Longer than 50 bytes.
    #[error("Param{slot} is longer than 50 bytes")]
    TextTooLong {
        /// Slot number.
        slot: usize,
    },
}

impl ValidationError {
    /// Stable error code reported to submitters.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "E5003",
            Self::MissingParam { .. } => "E5004",
            Self::BadId { .. } => "E5005",
            Self::NotDigits { .. } => "E5006",
            Self::TooManyDigits { .. } => "E5007",
            Self::BadFloat { .. } => "E5008",
            Self::TextTooLong { .. } => "E5009",
        }
    }
}

fn check_counter(s: &str, slot: usize) -> Result<(), ValidationError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotDigits { slot });
    }
    if s.len() > MAX_DIGITS {
        return Err(ValidationError::TooManyDigits { slot });
    }
    Ok(())
}

/// Any malformed component is an identifier format error.
fn check_id(s: &str, slot: usize) -> Result<(), ValidationError> {
    match s.split_once('-') {
        Some((creator, counter))
            if check_counter(creator, slot).is_ok() && check_counter(counter, slot).is_ok() =>
        {
            Ok(())
        }
        _ => Err(ValidationError::BadId { slot }),
    }
}

impl ParamType {
    /// Checks one parameter value against this type.
    pub fn check(self, value: &str, slot: usize) -> Result<(), ValidationError> {
        match self {
            Self::Id => check_id(value, slot),
            Self::Counter => check_counter(value, slot),
            Self::IdSlot if value.contains('-') => check_id(value, slot),
            Self::IdSlot => check_counter(value, slot),
            Self::Float => match value.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(()),
                _ => Err(ValidationError::BadFloat { slot }),
            },
            Self::Text if value.len() > MAX_TEXT_LEN => Err(ValidationError::TextTooLong { slot }),
            Self::Text => Ok(()),
        }
    }
}

/// A command as exchanged with the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Kind.
    pub kind: CommandKind,
    /// Parameters; slots past the kind's arity are empty.
    pub params: [String; PARAM_SLOTS],
    /// Client that issued the command.
    pub origin: ClientId,
    /// Relay sequence number, set once accepted.
    pub sequence: Option<u64>,
}

impl Command {
    /// Builds an unsequenced command, padding or truncating to the kind's arity.
    pub fn new<I, S>(kind: CommandKind, origin: ClientId, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots: [String; PARAM_SLOTS] = Default::default();
        let arity = kind.schema().len();
        for (slot, value) in slots.iter_mut().zip(params).take(arity) {
            *slot = value.into();
        }
        Self {
            kind,
            params: slots,
            origin,
            sequence: None,
        }
    }

    /// Parameter `index` (0-based); empty past the arity.
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).map_or("", String::as_str)
    }

    /// Checks every slot against the kind's schema.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (index, ty) in self.kind.schema().iter().enumerate() {
            ty.check(self.param(index), index + 1)?;
        }
        Ok(())
    }

    /// Wire form.
    pub fn to_wire(&self) -> WireCommand {
        let arity = self.kind.schema().len();
        let slot = |i: usize| (i < arity).then(|| self.params[i].clone());
        WireCommand {
            name: self.kind.name().to_string(),
            param1: slot(0),
            param2: slot(1),
            param3: slot(2),
            param4: slot(3),
            param5: slot(4),
            client_id: self.origin.0,
            id: self.sequence,
        }
    }

    /// Parses and validates a wire command.
    pub fn from_wire(wire: WireCommand) -> Result<Self, ValidationError> {
        let kind: CommandKind = wire.name.parse()?;
        let arity = kind.schema().len();
        let raw = [wire.param1, wire.param2, wire.param3, wire.param4, wire.param5];
        let mut params: [String; PARAM_SLOTS] = Default::default();
        for (index, (slot, value)) in params.iter_mut().zip(raw).enumerate().take(arity) {
            *slot = value.ok_or(ValidationError::MissingParam { slot: index + 1 })?;
        }
        let command = Self {
            kind,
            params,
            origin: ClientId(wire.client_id),
            sequence: wire.id,
        };
        command.validate()?;
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arity = self.kind.schema().len();
        write!(f, "{}(", self.kind)?;
        for (i, p) in self.params.iter().take(arity).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p:?}")?;
        }
        write!(f, ") from {}", self.origin)?;
        if let Some(seq) = self.sequence {
            write!(f, " #{seq}")?;
        }
        Ok(())
    }
}

/// Transport shape: `{Name, Param1..Param5, ClientID, ID}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCommand {
    /// Command name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Slot 1.
    #[serde(rename = "Param1", default, skip_serializing_if = "Option::is_none")]
    pub param1: Option<String>,
    /// Slot 2.
    #[serde(rename = "Param2", default, skip_serializing_if = "Option::is_none")]
    pub param2: Option<String>,
    /// Slot 3.
    #[serde(rename = "Param3", default, skip_serializing_if = "Option::is_none")]
    pub param3: Option<String>,
    /// Slot 4.
    #[serde(rename = "Param4", default, skip_serializing_if = "Option::is_none")]
    pub param4: Option<String>,
    /// Slot 5.
    #[serde(rename = "Param5", default, skip_serializing_if = "Option::is_none")]
    pub param5: Option<String>,
    /// Issuing client.
    #[serde(rename = "ClientID")]
    pub client_id: u64,
    /// Relay sequence number; absent on submit.
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}
