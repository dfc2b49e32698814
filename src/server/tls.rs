//! TLS acceptor construction from PEM files.

use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use super::ServerError;

/// ALPN protocol advertised during the handshake.
const ALPN_HTTP_1_1: &[u8] = b"http/1.1";

/// Builds a [`TlsAcceptor`] from a PEM certificate chain and private key.
///
/// # Errors
///
/// - [`ServerError::Io`] when either file cannot be read.
/// - [`ServerError::MissingCertificate`] when `cert_file` holds no certificate.
/// - [`ServerError::MissingPrivateKey`] when `key_file` holds no private key.
/// - [`ServerError::Tls`] when rustls rejects the pair.
pub async fn acceptor(cert_file: &Path, key_file: &Path) -> Result<TlsAcceptor, ServerError> {
    let certs = load_certs(cert_file).await?;
    let key = load_private_key(key_file).await?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![ALPN_HTTP_1_1.to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

async fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let pem = tokio::fs::read(path).await?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice()).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(ServerError::MissingCertificate {
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

async fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let pem = tokio::fs::read(path).await?;
    rustls_pemfile::private_key(&mut pem.as_slice())?.ok_or_else(|| ServerError::MissingPrivateKey {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const FAKE_CERT: &str = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pathmux-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn unreadable_certificate_is_io_error() {
        let missing = std::env::temp_dir().join("pathmux-definitely-missing.pem");
        let Err(err) = acceptor(&missing, &missing).await else {
            panic!("missing file accepted");
        };
        assert!(matches!(err, ServerError::Io(_)));
    }

    #[tokio::test]
    async fn empty_certificate_file() {
        let cert = temp_file("empty-cert.pem", "");
        let Err(err) = acceptor(&cert, &cert).await else {
            panic!("empty certificate accepted");
        };
        assert!(matches!(err, ServerError::MissingCertificate { path } if path == cert));
        std::fs::remove_file(cert).unwrap();
    }

    #[tokio::test]
    async fn certificate_without_key() {
        let cert = temp_file("cert-only.pem", FAKE_CERT);
        let key = temp_file("no-key.pem", FAKE_CERT);
        let Err(err) = acceptor(&cert, &key).await else {
            panic!("missing key accepted");
        };
        assert!(matches!(err, ServerError::MissingPrivateKey { path } if path == key));
        std::fs::remove_file(cert).unwrap();
        std::fs::remove_file(key).unwrap();
    }
}
