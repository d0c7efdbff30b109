mod file_config;

pub use file_config::{BootstrapUserConfig, FileConfig, SslConfig};

use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub token_ttl_sec: u64,
    pub prune_interval_hours: u64,
    pub ssl_cert: Option<PathBuf>,
    pub ssl_key: Option<PathBuf>,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub token_ttl_sec: u64,
    pub prune_interval_hours: u64,

    // SSL/TLS configuration
    pub ssl: Option<SslSettings>,

    pub bootstrap_user: Option<BootstrapUser>,
}

#[derive(Debug, Clone)]
pub struct SslSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone)]
pub struct BootstrapUser {
    pub name: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapUser")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        // The database file may not exist yet, its directory must.
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ, both are {}", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or(cli.logging_level);

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        let token_ttl_sec = file.token_ttl_sec.unwrap_or(cli.token_ttl_sec);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);

        // SSL settings - TOML [ssl] section takes precedence over CLI args
        let ssl = if let Some(ssl_file) = file.ssl {
            let cert_path = PathBuf::from(&ssl_file.cert_path);
            let key_path = PathBuf::from(&ssl_file.key_path);
            if !cert_path.exists() {
                bail!("SSL certificate file not found: {:?}", cert_path);
            }
            if !key_path.exists() {
                bail!("SSL key file not found: {:?}", key_path);
            }
            Some(SslSettings {
                cert_path,
                key_path,
            })
        } else if let (Some(cert), Some(key)) = (&cli.ssl_cert, &cli.ssl_key) {
            if !cert.exists() {
                bail!("SSL certificate file not found: {:?}", cert);
            }
            if !key.exists() {
                bail!("SSL key file not found: {:?}", key);
            }
            Some(SslSettings {
                cert_path: cert.clone(),
                key_path: key.clone(),
            })
        } else if cli.ssl_cert.is_some() || cli.ssl_key.is_some() {
            bail!("Both --ssl-cert and --ssl-key must be provided together");
        } else {
            None
        };

        let bootstrap_user = match (file.bootstrap_user, &cli.admin_user, &cli.admin_password) {
            (Some(user), _, _) => Some(BootstrapUser {
                name: user.name,
                password: user.password,
            }),
            (None, Some(name), Some(password)) => Some(BootstrapUser {
                name: name.clone(),
                password: password.clone(),
            }),
            (None, None, None) => None,
            (None, _, _) => bail!("Both --admin-user and --admin-password must be provided together"),
        };

        Ok(Self {
            db_path,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            token_ttl_sec,
            prune_interval_hours,
            ssl,
            bootstrap_user,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level,
            port: self.port,
            metrics_port: self.metrics_port,
            frontend_dir_path: self.frontend_dir_path.clone(),
            token_ttl_sec: self.token_ttl_sec,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
