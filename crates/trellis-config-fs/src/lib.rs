// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for Trellis tools (uses platform config dir).

use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use trellis_app_core::config::{ConfigError, ConfigStore};

/// Store configs as JSON files under the platform config directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/trellis`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Trellis")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory holding the JSON files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use trellis_app_core::config::ConfigService;
    use trellis_app_core::prefs::{RelayPrefs, RELAY_PREFS_KEY};

    #[test]
    fn prefs_round_trip_through_json_files() {
        let dir = std::env::temp_dir().join(format!("trellis-config-fs-{}", std::process::id()));
        let store = FsConfigStore::at(&dir).unwrap();
        assert!(matches!(store.load_raw("absent"), Err(ConfigError::NotFound)));

        let svc = ConfigService::new(store);
        let prefs = RelayPrefs {
            socket_path: Some("/tmp/relay.sock".into()),
        };
        svc.save(RELAY_PREFS_KEY, &prefs).unwrap();
        assert!(dir.join("relay.json").is_file());
        assert_eq!(svc.load::<RelayPrefs>(RELAY_PREFS_KEY).unwrap(), Some(prefs));
        fs::remove_dir_all(dir).unwrap();
    }
}
