mod api_error;
mod auth_routes;
pub mod config;
mod http_layers;
mod library_routes;
pub mod metrics;
pub mod server;
pub(self) mod session;
pub mod state;
mod sync_routes;
pub mod tls;

pub use api_error::{ApiError, ApiErrorCode};
pub use auth_routes::{LoginBody, TokenResponse};
pub use config::ServerConfig;
pub use http_layers::*;
pub use library_routes::AddSongBody;
pub use server::{make_app, run_server, HealthResponse, ServerStats};
pub use tls::load_tls_config;
