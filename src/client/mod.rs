mod config;
mod error;
mod rest_client;
mod retry;
pub mod tls;

pub use config::ClientConfig;
pub use error::{certificate_error_kind, CertificateErrorKind, ClientError, ClientResult, PinningError};
pub use rest_client::{kind_path, LibraryClient};
pub use retry::TokenRetryPolicy;
