use reqwest::StatusCode;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateErrorKind {
    /// The server certificate does not cover the configured hostname.
    BadHostname,
    /// The server presented a certificate other than the pinned one.
    CertificateChanged,
    /// Anything else the TLS layer refused (expired, malformed, ...).
    InvalidCertificate,
}

impl std::fmt::Display for CertificateErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CertificateErrorKind::BadHostname => "certificate does not match the hostname",
            CertificateErrorKind::CertificateChanged => {
                "server certificate changed since it was pinned"
            }
            CertificateErrorKind::InvalidCertificate => "invalid server certificate",
        };
        f.write_str(s)
    }
}

/// Raised by the pinning verifier, found again in the reqwest source chain.
#[derive(Debug, Error)]
pub enum PinningError {
    #[error("presented certificate differs from the pinned one")]
    CertificateChanged,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("token missing, expired or revoked")]
    InvalidToken,

    #[error("wrong user name or password")]
    InvalidCredentials,

    #[error("server replied {status} ({code}): {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("TLS: {0}")]
    Certificate(CertificateErrorKind),

    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        match certificate_error_kind(&err) {
            Some(kind) => ClientError::Certificate(kind),
            None => ClientError::Transport(err),
        }
    }
}

fn classify_rustls(err: &rustls::Error) -> Option<CertificateErrorKind> {
    use rustls::CertificateError;

    match err {
        rustls::Error::InvalidCertificate(cert_err) => Some(match cert_err {
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. } => {
                CertificateErrorKind::BadHostname
            }
            CertificateError::UnknownIssuer => CertificateErrorKind::CertificateChanged,
            CertificateError::Other(other) => {
                match other.0.downcast_ref::<PinningError>() {
                    Some(PinningError::CertificateChanged) => {
                        CertificateErrorKind::CertificateChanged
                    }
                    None => CertificateErrorKind::InvalidCertificate,
                }
            }
            _ => CertificateErrorKind::InvalidCertificate,
        }),
        _ => None,
    }
}

/// Walks the source chain looking for a certificate rejection. A custom
/// `io::Error` reports its payload's source rather than the payload itself,
/// so the walk steps into the payload instead, through any number of
/// nested `io::Error` layers.
pub fn certificate_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<CertificateErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(err) = current {
        if let Some(tls_err) = err.downcast_ref::<rustls::Error>() {
            return classify_rustls(tls_err);
        }
        current = match err.downcast_ref::<std::io::Error>() {
            Some(io_err) => match io_err.get_ref() {
                Some(inner) => Some(inner as &(dyn std::error::Error + 'static)),
                None => err.source(),
            },
            None => err.source(),
        };
    }
    None
}
