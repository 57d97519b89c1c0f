// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic framing and CBOR helpers.
//!
//! Packet layout:
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * PAYLOAD is a CBOR `OpEnvelope`
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || PAYLOAD

use blake3::Hasher;
use ciborium::value::Value;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    ClientRegisteredPayload, CommandAcceptedPayload, CommandBatchPayload, ErrorPayload,
    GetCommandsPayload, Message, OpEnvelope, RegisterClientPayload, SubmitCommandPayload,
};

/// Protocol magic constant "TRL1".
pub const MAGIC: [u8; 4] = [0x54, 0x52, 0x4c, 0x31];
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (set to zero for v1).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes.
pub const HEADER_LEN: usize = 12;
/// Checksum length in bytes.
pub const CHECKSUM_LEN: usize = 32;
/// Largest payload either side accepts.
pub const MAX_PAYLOAD: usize = 8 * 1024 * 1024;

/// Framing or codec failure.
#[derive(Debug, Error)]
pub enum WireError {
    /// Fewer bytes than the header announces.
    #[error("incomplete packet")]
    Incomplete,
    /// First four bytes are not [`MAGIC`].
    #[error("bad magic")]
    BadMagic,
    /// Header carries an unknown version.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    /// Payload exceeds [`MAX_PAYLOAD`].
    #[error("payload too large: {0} bytes")]
    TooLarge(usize),
    /// Checksum does not cover header and payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// CBOR serialization failed.
    #[error("cbor encode: {0}")]
    Encode(String),
    /// CBOR deserialization failed.
    #[error("cbor decode: {0}")]
    Decode(String),
    /// Envelope names an op this version does not know.
    #[error("unknown op {0}")]
    UnknownOp(String),
}

/// Encode to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(out)
}

/// Decode from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, WireError> {
    Value::serialized(value).map_err(|e| WireError::Encode(e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, WireError> {
    value
        .deserialized()
        .map_err(|e| WireError::Decode(e.to_string()))
}

/// Payload length announced by a header.
pub fn payload_len(header: &[u8; HEADER_LEN]) -> usize {
    let len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    usize::try_from(len).unwrap_or(usize::MAX)
}

/// Total frame length for a header, or `TooLarge` past [`MAX_PAYLOAD`].
pub fn frame_len(header: &[u8; HEADER_LEN]) -> Result<usize, WireError> {
    let len = payload_len(header);
    if len > MAX_PAYLOAD {
        return Err(WireError::TooLarge(len));
    }
    Ok(HEADER_LEN + len + CHECKSUM_LEN)
}

/// A full packet (header + payload + checksum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw header (12 bytes).
    pub header: [u8; HEADER_LEN],
    /// CBOR payload bytes.
    pub payload: Vec<u8>,
    /// blake3 checksum over header||payload.
    pub checksum: [u8; CHECKSUM_LEN],
}

impl Packet {
    /// Build a packet from a CBOR payload.
    pub fn from_payload(payload: Vec<u8>) -> Result<Self, WireError> {
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|_| payload.len() <= MAX_PAYLOAD)
            .ok_or(WireError::TooLarge(payload.len()))?;
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_be_bytes());
        header[6..8].copy_from_slice(&FLAGS.to_be_bytes());
        header[8..12].copy_from_slice(&len.to_be_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&header);
        hasher.update(&payload);
        let checksum = *hasher.finalize().as_bytes();

        Ok(Self {
            header,
            payload,
            checksum,
        })
    }

    /// Concatenated packet bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + CHECKSUM_LEN);
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum);
        out
    }

    /// Encode an `OpEnvelope` into a full packet byte vector.
    pub fn encode_envelope<P: Serialize>(env: &OpEnvelope<P>) -> Result<Vec<u8>, WireError> {
        Ok(Self::from_payload(to_cbor(env)?)?.to_bytes())
    }

    /// Decode a packet from a byte slice, returning the envelope and bytes consumed.
    pub fn decode_envelope<P: DeserializeOwned>(
        bytes: &[u8],
    ) -> Result<(OpEnvelope<P>, usize), WireError> {
        let Some(header) = bytes.first_chunk::<HEADER_LEN>() else {
            return Err(WireError::Incomplete);
        };
        if header[0..4] != MAGIC {
            return Err(WireError::BadMagic);
        }
        let version = u16::from_be_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let total = frame_len(header)?;
        if bytes.len() < total {
            return Err(WireError::Incomplete);
        }
        let payload = &bytes[HEADER_LEN..total - CHECKSUM_LEN];
        let checksum = &bytes[total - CHECKSUM_LEN..total];

        let mut hasher = Hasher::new();
        hasher.update(header);
        hasher.update(payload);
        if hasher.finalize().as_bytes() != checksum {
            return Err(WireError::ChecksumMismatch);
        }

        let env: OpEnvelope<P> = from_cbor(payload)?;
        Ok((env, total))
    }
}

/// Encode a `Message` into a packet with the provided logical timestamp.
pub fn encode_message(msg: &Message, ts: u64) -> Result<Vec<u8>, WireError> {
    let payload = match msg {
        Message::RegisterClient(p) => to_value(p)?,
        Message::ClientRegistered(p) => to_value(p)?,
        Message::SubmitCommand(p) => to_value(p)?,
        Message::CommandAccepted(p) => to_value(p)?,
        Message::GetCommands(p) => to_value(p)?,
        Message::CommandBatch(p) => to_value(p)?,
        Message::Error(p) => to_value(p)?,
    };
    let env = OpEnvelope {
        op: msg.op_name().to_string(),
        ts,
        payload,
    };
    Packet::encode_envelope(&env)
}

/// Decode bytes into (Message, ts, bytes_consumed).
pub fn decode_message(bytes: &[u8]) -> Result<(Message, u64, usize), WireError> {
    let (env, used) = Packet::decode_envelope::<Value>(bytes)?;
    let ts = env.ts;
    let msg = match env.op.as_str() {
        "register_client" => Message::RegisterClient(from_value::<RegisterClientPayload>(env.payload)?),
        "client_registered" => {
            Message::ClientRegistered(from_value::<ClientRegisteredPayload>(env.payload)?)
        }
        "submit_command" => Message::SubmitCommand(from_value::<SubmitCommandPayload>(env.payload)?),
        "command_accepted" => {
            Message::CommandAccepted(from_value::<CommandAcceptedPayload>(env.payload)?)
        }
        "get_commands" => Message::GetCommands(from_value::<GetCommandsPayload>(env.payload)?),
        "command_batch" => Message::CommandBatch(from_value::<CommandBatchPayload>(env.payload)?),
        "error" => Message::Error(from_value::<ErrorPayload>(env.payload)?),
        other => return Err(WireError::UnknownOp(other.to_string())),
    };
    Ok((msg, ts, used))
}

// --- Unit tests -----------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{Command, CommandKind, WireCommand};
    use rand::{Rng, SeedableRng};
    use trellis_graph::ClientId;

    fn submit() -> Message {
        let command = Command::new(
            CommandKind::MoveVertex,
            ClientId(3),
            ["3-1", "1.5", "0", "-2"],
        );
        Message::SubmitCommand(SubmitCommandPayload {
            graph_id: 9,
            command: command.to_wire(),
        })
    }

    #[test]
    fn header_layout_is_stable() {
        let bytes = encode_message(&submit(), 5).unwrap();
        let header = hex::encode(&bytes[..8]);
        assert_eq!(header, "54524c3100010000");
        let len = payload_len(bytes.first_chunk::<HEADER_LEN>().unwrap());
        assert_eq!(bytes.len(), HEADER_LEN + len + CHECKSUM_LEN);
    }

    #[test]
    fn message_survives_framing_with_trailing_bytes() {
        let mut bytes = encode_message(&submit(), 41).unwrap();
        let frame = bytes.len();
        bytes.extend_from_slice(&[0xAA; 7]);
        let (msg, ts, used) = decode_message(&bytes).unwrap();
        assert_eq!(msg, submit());
        assert_eq!(ts, 41);
        assert_eq!(used, frame);
    }

    #[test]
    fn wire_command_uses_relay_field_names() {
        let Message::SubmitCommand(p) = submit() else {
            unreachable!()
        };
        let value = Value::serialized(&p.command).unwrap();
        let keys: Vec<String> = value
            .as_map()
            .unwrap()
            .iter()
            .filter_map(|(k, _)| k.as_text().map(str::to_string))
            .collect();
        assert_eq!(
            keys,
            ["Name", "Param1", "Param2", "Param3", "Param4", "ClientID"]
        );
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bytes = encode_message(&submit(), 0).unwrap();
        bytes[HEADER_LEN + 2] ^= 0xFF;
        assert!(matches!(
            decode_message(&bytes),
            Err(WireError::ChecksumMismatch)
        ));
    }

    #[test]
    fn truncated_and_oversized_frames_are_rejected() {
        let bytes = encode_message(&submit(), 0).unwrap();
        assert!(matches!(
            decode_message(&bytes[..bytes.len() - 1]),
            Err(WireError::Incomplete)
        ));
        let mut huge = bytes;
        huge[8..12].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(decode_message(&huge), Err(WireError::TooLarge(_))));
    }

    #[test]
    fn random_garbage_never_panics() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x7e11);
        for _ in 0..256 {
            let len = rng.gen_range(0..96);
            let mut bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            if rng.gen_bool(0.5) && bytes.len() >= 4 {
                bytes[..4].copy_from_slice(&MAGIC);
            }
            assert!(decode_message(&bytes).is_err());
        }
    }

    #[test]
    fn error_payload_round_trips() {
        let err = Message::Error(ErrorPayload::new(400, "E5003", "invalid command name"));
        let (msg, _, _) = decode_message(&encode_message(&err, 1).unwrap()).unwrap();
        assert_eq!(msg, err);
        let empty = Message::CommandBatch(CommandBatchPayload {
            commands: Vec::<WireCommand>::new(),
        });
        let (msg, _, _) = decode_message(&encode_message(&empty, 2).unwrap()).unwrap();
        assert_eq!(msg, empty);
    }
}
