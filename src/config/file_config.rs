use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub token_ttl_sec: Option<u64>,
    pub prune_interval_hours: Option<u64>,

    pub ssl: Option<SslConfig>,
    pub bootstrap_user: Option<BootstrapUserConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SslConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// User created on startup when the store has no user with that name.
#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapUserConfig {
    pub name: String,
    pub password: String,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let config: FileConfig = toml::from_str(
            r#"
            db_path = "/var/lib/library.db"
            port = 4000
            logging_level = "headers"
            token_ttl_sec = 60

            [ssl]
            cert_path = "/etc/cert.pem"
            key_path = "/etc/key.pem"

            [bootstrap_user]
            name = "admin"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.db_path.as_deref(), Some("/var/lib/library.db"));
        assert_eq!(config.port, Some(4000));
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.token_ttl_sec, Some(60));
        assert_eq!(config.ssl.unwrap().key_path, "/etc/key.pem");
        assert_eq!(config.bootstrap_user.unwrap().name, "admin");
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.db_path.is_none());
        assert!(config.ssl.is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/library.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
