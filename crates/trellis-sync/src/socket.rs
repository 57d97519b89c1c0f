// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Unix-socket transport (CBOR-framed) to the relay.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::debug;
use trellis_proto::{
    wire::{decode_message, encode_message, frame_len, HEADER_LEN},
    ClientId, Command, GetCommandsPayload, GraphId, Message, RegisterClientPayload,
    SubmitCommandPayload, WireCommand,
};

use crate::transport::{RelayTransport, SubmitError, TransportError};

/// Default per-request deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Reads one full frame. Returns `Ok(None)` when the peer closed the stream
/// before any byte of the next frame arrived.
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Message>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut read = 0usize;
    while read < header.len() {
        let n = stream.read(&mut header[read..]).await?;
        if n == 0 {
            if read == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("truncated frame header: read {read} of {HEADER_LEN} bytes"),
            )
            .into());
        }
        read += n;
    }
    let total = frame_len(&header)?;
    let mut packet = vec![0u8; total];
    packet[..HEADER_LEN].copy_from_slice(&header);
    stream.read_exact(&mut packet[HEADER_LEN..]).await?;
    let (msg, _ts, _) = decode_message(&packet)?;
    Ok(Some(msg))
}

/// Relay client over a Unix socket.
///
/// One request is in flight at a time. Any failure drops the connection;
/// the next request reconnects.
pub struct SocketRelay {
    path: PathBuf,
    timeout: Duration,
    conn: Mutex<Option<UnixStream>>,
    ts: AtomicU64,
}

impl SocketRelay {
    /// Transport for the relay listening at `path`. Connects lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: REQUEST_TIMEOUT,
            conn: Mutex::new(None),
            ts: AtomicU64::new(0),
        }
    }

    /// Overrides the per-request deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn exchange(stream: &mut UnixStream, packet: &[u8]) -> Result<Message, TransportError> {
        stream.write_all(packet).await?;
        read_frame(stream).await?.ok_or(TransportError::Closed)
    }

    async fn request(&self, msg: &Message) -> Result<Message, TransportError> {
        let ts = self.ts.fetch_add(1, Ordering::Relaxed);
        let packet = encode_message(msg, ts)?;
        let mut conn = self.conn.lock().await;
        let mut stream = match conn.take() {
            Some(stream) => stream,
            None => UnixStream::connect(&self.path).await?,
        };
        let reply = match tokio::time::timeout(self.timeout, Self::exchange(&mut stream, &packet)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };
        match reply {
            Ok(reply) => {
                *conn = Some(stream);
                Ok(reply)
            }
            Err(err) => {
                debug!(op = msg.op_name(), %err, "dropping relay connection");
                Err(err)
            }
        }
    }
}

impl RelayTransport for SocketRelay {
    async fn register_client(&self, graph: GraphId) -> Result<ClientId, TransportError> {
        let msg = Message::RegisterClient(RegisterClientPayload { graph_id: graph });
        match self.request(&msg).await? {
            Message::ClientRegistered(p) => Ok(p.client_id),
            Message::Error(err) => Err(TransportError::Relay(err)),
            other => Err(TransportError::UnexpectedReply(other.op_name())),
        }
    }

    async fn submit(&self, graph: GraphId, command: &Command) -> Result<u64, SubmitError> {
        let msg = Message::SubmitCommand(SubmitCommandPayload {
            graph_id: graph,
            command: command.to_wire(),
        });
        match self.request(&msg).await? {
            Message::CommandAccepted(p) => Ok(p.sequence),
            Message::Error(err) => Err(SubmitError::Rejected(err)),
            other => Err(TransportError::UnexpectedReply(other.op_name()).into()),
        }
    }

    async fn fetch(
        &self,
        graph: GraphId,
        after: u64,
        include_ineffective: bool,
    ) -> Result<Vec<WireCommand>, TransportError> {
        let msg = Message::GetCommands(GetCommandsPayload {
            graph_id: graph,
            after,
            include_ineffective,
        });
        match self.request(&msg).await? {
            Message::CommandBatch(p) => Ok(p.commands),
            Message::Error(err) => Err(TransportError::Relay(err)),
            other => Err(TransportError::UnexpectedReply(other.op_name())),
        }
    }
}
