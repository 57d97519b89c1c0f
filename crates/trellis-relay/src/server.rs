// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Unix-socket front end for a [`RelayHub`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use trellis_proto::wire::encode_message;
use trellis_sync::read_frame;

use crate::hub::RelayHub;

/// Binds `path`, replacing a stale socket file left by a previous run.
pub fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "relay listening");
    Ok(listener)
}

/// Accepts connections forever, one task per client.
pub async fn serve(listener: UnixListener, hub: Arc<Mutex<RelayHub>>) -> Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, hub).await {
                warn!(?err, "client handler error");
            }
        });
    }
}

/// Answers requests from one connection in arrival order until it closes.
pub async fn handle_client(mut stream: UnixStream, hub: Arc<Mutex<RelayHub>>) -> Result<()> {
    loop {
        let msg = match read_frame(&mut stream).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "dropping connection after bad frame");
                break;
            }
        };
        let op = msg.op_name();
        let packet = {
            let mut h = hub.lock().await;
            let reply = h.handle_message(msg);
            let ts = h.alloc_ts();
            encode_message(&reply, ts)?
        };
        stream.write_all(&packet).await?;
        debug!(op, "request answered");
    }
    Ok(())
}
