//! TLS handshake setup (§1 Non-goals: "the TLS handshake (delegate to a TLS
//! library)"; §4.12/§6 "tls cert / key / dh paths").
//!
//! Loads a certificate chain and private key off disk and builds a
//! `tokio_rustls::TlsAcceptor`. The handshake itself, and everything past
//! the completed stream, is `mcpd-transport`'s [`mcpd_transport::TlsListener`]
//! — this module's entire job is turning file paths into a `rustls`
//! `ServerConfig`, which is genuinely out of scope for the core per the
//! specification's non-goals.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::config::Config;

/// Errors building a TLS acceptor from configured cert/key paths.
#[derive(Debug, thiserror::Error)]
pub enum TlsSetupError {
    /// The certificate or key file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The PEM content had no certificates, or no private key.
    #[error("{0}")]
    Empty(String),

    /// `rustls` rejected the assembled certificate chain or key.
    #[error("invalid TLS material: {0}")]
    Rustls(#[from] rustls::Error),
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let file = std::fs::File::open(path).map_err(|source| TlsSetupError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsSetupError::Io {
            path: path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsSetupError::Empty(format!("no certificates found in {}", path.display())));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    let file = std::fs::File::open(path).map_err(|source| TlsSetupError::Io {
        path: path.display().to_string(),
        source,
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|source| TlsSetupError::Io {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsSetupError::Empty(format!("no private key found in {}", path.display())))
}

/// Build a `TlsAcceptor` from the certificate/key paths in `config`. Callers
/// only invoke this when `config.https_port != 0`; validation in
/// [`crate::config::load`] already guarantees both paths are present.
pub fn build_acceptor(config: &Config) -> Result<TlsAcceptor, TlsSetupError> {
    let cert_path = config.tls_cert_path.as_deref().expect("validated: cert path present");
    let key_path = config.tls_key_path.as_deref().expect("validated: key path present");

    let certs = read_certs(cert_path)?;
    let key = read_private_key(key_path)?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn self_signed_pem_pair() -> (tempfile::NamedTempFile, tempfile::NamedTempFile) {
        // A fixed, well-formed self-signed cert/key pair for the sole
        // purpose of exercising the PEM-parsing path in `read_certs`/
        // `read_private_key` without a real CA. Not used for any live
        // handshake in tests.
        let cert_pem = include_str!("../testdata/dev_cert.pem");
        let key_pem = include_str!("../testdata/dev_key.pem");
        let mut cert_file = tempfile::NamedTempFile::new().unwrap();
        cert_file.write_all(cert_pem.as_bytes()).unwrap();
        let mut key_file = tempfile::NamedTempFile::new().unwrap();
        key_file.write_all(key_pem.as_bytes()).unwrap();
        (cert_file, key_file)
    }

    #[test]
    fn missing_cert_file_is_an_io_error() {
        let err = read_certs(Path::new("/nonexistent/path/cert.pem")).unwrap_err();
        assert!(matches!(err, TlsSetupError::Io { .. }));
    }

    #[test]
    fn empty_pem_has_no_certificates() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = read_certs(file.path()).unwrap_err();
        assert!(matches!(err, TlsSetupError::Empty(_)));
    }

    #[test]
    fn loads_valid_cert_and_key_pair() {
        let (cert_file, key_file) = self_signed_pem_pair();
        let certs = read_certs(cert_file.path()).unwrap();
        assert_eq!(certs.len(), 1);
        read_private_key(key_file.path()).unwrap();
    }
}
