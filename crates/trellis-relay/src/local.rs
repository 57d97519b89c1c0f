// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-process transport: sessions talk to a shared [`RelayHub`] directly.

use std::sync::Arc;

use tokio::sync::Mutex;
use trellis_proto::{ClientId, Command, ErrorPayload, GraphId, WireCommand};
use trellis_sync::{RelayTransport, SubmitError, TransportError};

use crate::hub::RelayHub;

/// Handle to a hub shared by several sessions in one process.
#[derive(Clone, Default)]
pub struct LocalRelay {
    hub: Arc<Mutex<RelayHub>>,
}

impl LocalRelay {
    /// Transport over a fresh hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport over an existing hub (e.g. one also served on a socket).
    pub const fn with_hub(hub: Arc<Mutex<RelayHub>>) -> Self {
        Self { hub }
    }

    /// The shared hub.
    pub fn hub(&self) -> &Arc<Mutex<RelayHub>> {
        &self.hub
    }
}

impl RelayTransport for LocalRelay {
    async fn register_client(&self, graph: GraphId) -> Result<ClientId, TransportError> {
        Ok(self.hub.lock().await.register_client(graph))
    }

    async fn submit(&self, graph: GraphId, command: &Command) -> Result<u64, SubmitError> {
        self.hub
            .lock()
            .await
            .submit(graph, command.clone())
            .map_err(|err| SubmitError::Rejected(ErrorPayload::from(&err)))
    }

    async fn fetch(
        &self,
        graph: GraphId,
        after: u64,
        include_ineffective: bool,
    ) -> Result<Vec<WireCommand>, TransportError> {
        Ok(self.hub.lock().await.commands(graph, after, include_ineffective))
    }
}
