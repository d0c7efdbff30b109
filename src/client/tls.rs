//! Trust-on-first-use pinning of a self-signed server certificate.
//!
//! The first connection captures the leaf certificate with an unverified
//! probe and stores it as PEM. From then on the pinned certificate is the
//! only trust root and any other certificate fails the handshake with
//! [`PinningError::CertificateChanged`].

use super::error::{ClientError, ClientResult, PinningError};

use base64::{engine::general_purpose::STANDARD, Engine};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, OtherError, RootCertStore, SignatureScheme};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug)]
pub struct PinnedCertVerifier {
    pinned: CertificateDer<'static>,
    inner: Arc<WebPkiServerVerifier>,
}

impl PinnedCertVerifier {
    pub fn new(
        pinned: CertificateDer<'static>,
        provider: Arc<rustls::crypto::CryptoProvider>,
    ) -> ClientResult<Self> {
        let mut roots = RootCertStore::empty();
        roots
            .add(pinned.clone())
            .map_err(|err| ClientError::Config(format!("unusable pinned certificate: {}", err)))?;
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|err| ClientError::Config(format!("cannot build verifier: {}", err)))?;
        Ok(PinnedCertVerifier { pinned, inner })
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if end_entity.as_ref() != self.pinned.as_ref() {
            return Err(rustls::Error::InvalidCertificate(CertificateError::Other(
                OtherError(Arc::new(PinningError::CertificateChanged)),
            )));
        }
        // Same bytes, still check the name and validity period.
        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// A rustls client config trusting exactly `pinned`.
pub fn pinned_client_config(pinned: CertificateDer<'static>) -> ClientResult<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PinnedCertVerifier::new(pinned, provider.clone())?;
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|err| ClientError::Config(err.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(config)
}

pub fn fingerprint(cert: &CertificateDer<'_>) -> String {
    Sha256::digest(cert.as_ref())
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

pub fn to_pem(cert: &CertificateDer<'_>) -> String {
    let encoded = STANDARD.encode(cert.as_ref());
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for line in encoded.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

pub fn save_pinned_cert(path: &Path, cert: &CertificateDer<'_>) -> ClientResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_pem(cert))?;
    Ok(())
}

pub fn load_pinned_cert(path: &Path) -> ClientResult<CertificateDer<'static>> {
    CertificateDer::from_pem_file(path).map_err(|err| {
        ClientError::Config(format!("cannot read pinned certificate {:?}: {:?}", path, err))
    })
}

/// Fetches the server leaf certificate without verifying it. Only the
/// certificate is used; the response body is discarded.
pub async fn probe_certificate(
    base_url: &str,
    timeout: Duration,
) -> ClientResult<CertificateDer<'static>> {
    debug!("Probing {} for its certificate", base_url);
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .tls_info(true)
        .timeout(timeout)
        .build()
        .map_err(ClientError::Transport)?;
    let response = client
        .get(format!("{}/v1/health", base_url))
        .send()
        .await
        .map_err(ClientError::Transport)?;
    let der = response
        .extensions()
        .get::<reqwest::tls::TlsInfo>()
        .and_then(|info| info.peer_certificate())
        .ok_or_else(|| ClientError::Config("server presented no certificate".to_string()))?;
    Ok(CertificateDer::from(der.to_vec()))
}

/// Loads the pinned certificate, capturing and persisting it first if there
/// is none yet.
pub async fn pinned_or_probe(
    path: &Path,
    base_url: &str,
    timeout: Duration,
) -> ClientResult<CertificateDer<'static>> {
    if path.exists() {
        let cert = load_pinned_cert(path)?;
        debug!("Using pinned certificate {}", fingerprint(&cert));
        return Ok(cert);
    }
    let cert = probe_certificate(base_url, timeout).await?;
    save_pinned_cert(path, &cert)?;
    info!(
        "Pinned server certificate {} into {:?}",
        fingerprint(&cert),
        path
    );
    Ok(cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{certificate_error_kind, CertificateErrorKind};
    use tempfile::TempDir;

    fn self_signed(name: &str) -> CertificateDer<'static> {
        let rcgen::CertifiedKey { cert, .. } =
            rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap();
        cert.der().clone()
    }

    fn verify(
        pinned: &CertificateDer<'static>,
        presented: &CertificateDer<'_>,
        host: &str,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verifier = PinnedCertVerifier::new(
            pinned.clone(),
            Arc::new(rustls::crypto::ring::default_provider()),
        )
        .unwrap();
        let server_name = ServerName::try_from(host.to_string()).unwrap();
        verifier.verify_server_cert(presented, &[], &server_name, &[], UnixTime::now())
    }

    #[test]
    fn pem_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("server.pem");
        let cert = self_signed("localhost");

        save_pinned_cert(&path, &cert).unwrap();
        let loaded = load_pinned_cert(&path).unwrap();
        assert_eq!(loaded, cert);
    }

    #[test]
    fn fingerprint_is_colon_separated_sha256() {
        let fp = fingerprint(&CertificateDer::from(vec![1u8, 2, 3]));
        assert_eq!(fp.split(':').count(), 32);
        assert!(fp.starts_with("03:90:58:C6"));
    }

    #[test]
    fn pinned_certificate_is_accepted() {
        let cert = self_signed("localhost");
        assert!(verify(&cert, &cert, "localhost").is_ok());
    }

    #[test]
    fn different_certificate_is_rejected_as_changed() {
        let pinned = self_signed("localhost");
        let rotated = self_signed("localhost");
        let err = verify(&pinned, &rotated, "localhost").unwrap_err();
        assert_eq!(
            certificate_error_kind(&err),
            Some(CertificateErrorKind::CertificateChanged)
        );
    }

    #[test]
    fn pinned_certificate_for_other_host_is_bad_hostname() {
        let cert = self_signed("localhost");
        let err = verify(&cert, &cert, "music.example.com").unwrap_err();
        assert_eq!(
            certificate_error_kind(&err),
            Some(CertificateErrorKind::BadHostname)
        );
    }

    #[test]
    fn missing_pem_is_config_error() {
        let dir = TempDir::new().unwrap();
        let result = load_pinned_cert(&dir.path().join("none.pem"));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
