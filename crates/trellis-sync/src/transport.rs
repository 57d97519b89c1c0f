// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transport port between a sync session and the relay.

use std::future::Future;

use thiserror::Error;
use trellis_proto::{wire::WireError, ClientId, Command, ErrorPayload, GraphId, WireCommand};

/// Failure to complete an exchange with the relay. Always retryable.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Framing or CBOR failure.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    /// The relay did not answer in time.
    #[error("relay did not answer within {0:?}")]
    Timeout(std::time::Duration),
    /// The relay answered with an error.
    #[error("relay error {}: {}", .0.name, .0.message)]
    Relay(ErrorPayload),
    /// The relay answered with the wrong message kind.
    #[error("unexpected reply {0}")]
    UnexpectedReply(&'static str),
    /// The relay is gone.
    #[error("relay closed")]
    Closed,
}

/// Outcome of a failed submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The relay refused the command; it will never be sequenced.
    #[error("rejected with {}: {}", .0.name, .0.message)]
    Rejected(ErrorPayload),
    /// The exchange failed; the command may be retried.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Request/response channel to the relay.
///
/// Implementations serialize their own requests; callers may share one
/// transport between the drain and poll tasks.
pub trait RelayTransport: Send + Sync + 'static {
    /// Obtains a fresh client ID for `graph`.
    fn register_client(
        &self,
        graph: GraphId,
    ) -> impl Future<Output = Result<ClientId, TransportError>> + Send;

    /// Submits one command; returns its sequence number.
    fn submit(
        &self,
        graph: GraphId,
        command: &Command,
    ) -> impl Future<Output = Result<u64, SubmitError>> + Send;

    /// Commands with a sequence number above `after`, in order.
    fn fetch(
        &self,
        graph: GraphId,
        after: u64,
        include_ineffective: bool,
    ) -> impl Future<Output = Result<Vec<WireCommand>, TransportError>> + Send;
}
