//! Persisted node settings and the file they live in.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

pub const DEFAULT_PORT: u16 = 6881;

pub const DEFAULT_BOOTSTRAP_NODES: [&str; 1] = ["82.221.103.244:6881"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Node Configurations
pub struct Config {
    /// Node Id as 40 hex characters.
    ///
    /// Defaults to None, where a random Id is generated and written back here.
    pub id: Option<String>,
    /// UDP port both sockets bind to.
    ///
    /// Defaults to [DEFAULT_PORT]
    pub port: u16,
    /// Bind an IPv4 socket.
    ///
    /// Defaults to true
    pub ipv4: bool,
    /// Bind an IPv6-only socket.
    ///
    /// Defaults to false
    pub ipv6: bool,
    /// Bootstrap nodes as `host:port`, replaced with the known good nodes on shutdown.
    ///
    /// Defaults to [DEFAULT_BOOTSTRAP_NODES]
    pub nodes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: None,
            port: DEFAULT_PORT,
            ipv4: true,
            ipv6: false,
            nodes: DEFAULT_BOOTSTRAP_NODES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
/// JSON file backed [Config] store.
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ConfigFile { path: path.into() }
    }

    /// `$HOME/.config/dht-explorer/default.json`, or relative to the working
    /// directory if `HOME` isn't set.
    pub fn default_location() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default();

        Self::new(home.join(".config/dht-explorer/default.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config, a missing file yields [Config::default].
    pub fn load(&self) -> Result<Config> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "No config file, using defaults");
                Ok(Config::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, serde_json::to_vec_pretty(config)?)?;

        Ok(())
    }
}
