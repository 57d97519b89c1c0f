// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Trellis relay daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::Mutex;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use trellis_app_core::config::ConfigService;
use trellis_app_core::prefs::{RelayPrefs, RELAY_PREFS_KEY};
use trellis_config_fs::FsConfigStore;
use trellis_proto::default_socket_path;
use trellis_relay::{server, RelayHub};

#[derive(Parser, Debug)]
#[command(author, version, about = "Trellis command relay")]
struct Args {
    /// Unix socket to listen on (overrides the saved relay preference)
    #[arg(long)]
    socket: Option<PathBuf>,
}

fn load_prefs() -> RelayPrefs {
    // Best effort: a missing or unwritable config dir falls back to defaults.
    match FsConfigStore::new().map(ConfigService::new) {
        Ok(config) => config.load_or_init(RELAY_PREFS_KEY).unwrap_or_else(|err| {
            warn!(%err, "relay preferences unreadable; using defaults");
            RelayPrefs::default()
        }),
        Err(err) => {
            warn!(%err, "no config directory; using defaults");
            RelayPrefs::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let prefs = load_prefs();
    let socket_path = args
        .socket
        .or_else(|| prefs.socket_path.map(PathBuf::from))
        .unwrap_or_else(default_socket_path);

    let hub = Arc::new(Mutex::new(RelayHub::new()));
    let listener = server::bind(&socket_path)?;
    server::serve(listener, hub).await
}
