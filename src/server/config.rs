use super::RequestsLoggingLevel;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub frontend_dir_path: Option<String>,
    /// Tokens older than this are rejected and removed on use.
    pub token_ttl_sec: u64,
}

impl ServerConfig {
    pub fn token_ttl_nanos(&self) -> i64 {
        (self.token_ttl_sec as i64).saturating_mul(1_000_000_000)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            frontend_dir_path: None,
            token_ttl_sec: 7 * 24 * 3600,
        }
    }
}
