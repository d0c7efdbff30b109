use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_port() -> u16 {
    3001
}

fn default_timeout_sec() -> u64 {
    30
}

/// Connection settings of the sync client, read from TOML.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    /// Trust the server certificate on first use and pin it afterwards.
    #[serde(default)]
    pub self_signed: bool,
    pub username: String,
    pub password: String,
    /// Holds the pinned certificate.
    pub data_dir: PathBuf,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("self_signed", &self.self_signed)
            .field("username", &self.username)
            .field("data_dir", &self.data_dir)
            .field("timeout_sec", &self.timeout_sec)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.hostname, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    pub fn pinned_cert_path(&self) -> PathBuf {
        self.data_dir.join("server.pem")
    }
}
