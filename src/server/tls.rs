//! Server-side TLS from a single PEM file.

use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::{self, ServerConfig, crypto::ring};
use tracing::debug;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read certificate file: {0}")]
    Read(#[from] io::Error),

    #[error("no certificate found in PEM file")]
    NoCertificate,

    #[error("no private key found in PEM file")]
    NoPrivateKey,

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Builds an acceptor from a PEM file holding the certificate chain followed
/// or preceded by its private key.
///
/// # Errors
///
/// Any [`TlsError`]; a server must not start when this fails.
pub async fn load_acceptor(path: &Path) -> Result<TlsAcceptor, TlsError> {
    let pem = tokio::fs::read(path).await?;

    let certs = rustls_pemfile::certs(&mut &pem[..]).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate);
    }
    let key = rustls_pemfile::private_key(&mut &pem[..])?.ok_or(TlsError::NoPrivateKey)?;

    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    debug!(path = %path.display(), "loaded TLS certificate");
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file() {
        let err = load_acceptor(Path::new("/definitely/not/here.pem"))
            .await
            .err().unwrap();
        assert!(matches!(err, TlsError::Read(_)));
    }

    #[tokio::test]
    async fn file_without_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "not a pem file\n").unwrap();
        let err = load_acceptor(&path).await.err().unwrap();
        assert!(matches!(err, TlsError::NoCertificate));
    }

    #[tokio::test]
    async fn certificate_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert-only.pem");
        std::fs::write(
            &path,
            "-----BEGIN CERTIFICATE-----\nMAA=\n-----END CERTIFICATE-----\n",
        )
        .unwrap();
        let err = load_acceptor(&path).await.err().unwrap();
        assert!(matches!(err, TlsError::NoPrivateKey));
    }
}
