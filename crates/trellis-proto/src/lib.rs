// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Relay wire schema for Trellis: the command tuple, its schema table, and
//! the request/response messages carried in framed CBOR `OpEnvelope`s.

pub use trellis_graph::{ClientId, FullId, Quat, Vec3};

mod command;
mod operation;
pub mod wire;

pub use command::{
    Command, CommandKind, ParamType, ValidationError, WireCommand, MAX_DIGITS, MAX_TEXT_LEN,
    PARAM_SLOTS,
};
pub use operation::{IdSlot, Operation};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of a shared graph on the relay.
pub type GraphId = u64;

/// Most commands a relay returns for one `get_commands` request.
pub const BATCH_LIMIT: usize = 100;

/// Default Unix socket path for the relay.
///
/// Prefers a per-user runtime dir (XDG_RUNTIME_DIR) and falls back to `/tmp`
/// when unavailable.
pub fn default_socket_path() -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
    base.join("trellis-relay.sock")
}

/// Canonical OpEnvelope carried as the payload of a packet.
///
/// * `op` – operation name.
/// * `ts` – logical timestamp (authoritative on the relay side).
/// * `payload` – operation specific body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpEnvelope<P> {
    /// Operation name (e.g., "submit_command", "command_batch", "error").
    pub op: String,
    /// Logical timestamp (monotonic per-relay clock).
    pub ts: u64,
    /// Operation-specific body.
    pub payload: P,
}

/// Error payload used in error responses.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ErrorPayload {
    /// Numeric error class (400 validation, 403 access, 409 resolution, 500 internal).
    pub code: u32,
    /// Stable identifier (e.g., "E5003").
    pub name: String,
    /// Optional machine-readable details.
    pub details: Option<ciborium::value::Value>,
    /// Human readable message.
    pub message: String,
}

impl ErrorPayload {
    /// Builds a payload without details.
    pub fn new(code: u32, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            details: None,
            message: message.into(),
        }
    }
}

impl From<&ValidationError> for ErrorPayload {
    fn from(err: &ValidationError) -> Self {
        Self::new(400, err.code(), err.to_string())
    }
}

impl serde::Serialize for ErrorPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut m = serializer.serialize_map(Some(4))?;
        m.serialize_entry("code", &self.code)?;
        m.serialize_entry("name", &self.name)?;
        m.serialize_entry("details", &self.details)?;
        m.serialize_entry("message", &self.message)?;
        m.end()
    }
}

/// Register request payload (client → relay).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterClientPayload {
    /// Graph the client is about to open.
    pub graph_id: GraphId,
}

/// Register response payload (relay → client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientRegisteredPayload {
    /// Freshly minted client ID.
    pub client_id: ClientId,
}

/// Submit request payload (client → relay).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitCommandPayload {
    /// Target graph.
    pub graph_id: GraphId,
    /// Command without a sequence number.
    pub command: WireCommand,
}

/// Submit acknowledgement payload (relay → client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandAcceptedPayload {
    /// Sequence number assigned to the command.
    pub sequence: u64,
}

/// Poll request payload (client → relay).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetCommandsPayload {
    /// Target graph.
    pub graph_id: GraphId,
    /// Highest sequence number already seen (0 for none).
    pub after: u64,
    /// Also return commands superseded by compaction (history playback).
    pub include_ineffective: bool,
}

/// Poll response payload (relay → client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandBatchPayload {
    /// Commands in sequence order, at most [`BATCH_LIMIT`].
    pub commands: Vec<WireCommand>,
}

/// Wire message kinds carried inside OpEnvelope payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Client registration (op = "register_client").
    RegisterClient(RegisterClientPayload),
    /// Registration answer (op = "client_registered").
    ClientRegistered(ClientRegisteredPayload),
    /// Command submission (op = "submit_command").
    SubmitCommand(SubmitCommandPayload),
    /// Submission accepted (op = "command_accepted").
    CommandAccepted(CommandAcceptedPayload),
    /// Poll for new commands (op = "get_commands").
    GetCommands(GetCommandsPayload),
    /// Poll answer (op = "command_batch").
    CommandBatch(CommandBatchPayload),
    /// Protocol, validation or processing error (op = "error").
    Error(ErrorPayload),
}

impl Message {
    /// Canonical op string for this message variant.
    pub const fn op_name(&self) -> &'static str {
        match self {
            Self::RegisterClient(_) => "register_client",
            Self::ClientRegistered(_) => "client_registered",
            Self::SubmitCommand(_) => "submit_command",
            Self::CommandAccepted(_) => "command_accepted",
            Self::GetCommands(_) => "get_commands",
            Self::CommandBatch(_) => "command_batch",
            Self::Error(_) => "error",
        }
    }
}
