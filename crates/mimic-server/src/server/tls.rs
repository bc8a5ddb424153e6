//! TLS listener setup: certificate and private key loading.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

/// Error loading the TLS identity for the listener.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to open {role} file '{path}': {source}")]
    Open {
        role: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {role} file '{path}': {source}")]
    Parse {
        role: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[error("no certificates found in '{0}'")]
    NoCertificates(String),
    #[error("no private key found in '{0}'")]
    NoPrivateKey(String),
    #[error("rejected certificate/key pair: {0}")]
    Config(#[from] rustls::Error),
}

/// Build a TLS acceptor from PEM certificate and key files.
pub fn create_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = std::fs::File::open(path).map_err(|source| TlsError::Open {
        role: "certificate",
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|source| TlsError::Parse {
            role: "certificate",
            path: path.display().to_string(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.display().to_string()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = std::fs::File::open(path).map_err(|source| TlsError::Open {
        role: "private key",
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    // Accepts PKCS#8, RSA (PKCS#1), and SEC1 EC keys
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Parse {
            role: "private key",
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_certificate_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.crt");
        let key = dir.path().join("server.key");
        fs::write(&key, "irrelevant").unwrap();

        let Err(err) = create_acceptor(&missing, &key) else {
            panic!("expected create_acceptor to fail");
        };
        assert!(matches!(err, TlsError::Open { role: "certificate", .. }));
    }

    #[test]
    fn test_certificate_file_without_pem_blocks() {
        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        fs::write(&cert, "this is not PEM").unwrap();
        fs::write(&key, "this is not PEM either").unwrap();

        let Err(err) = create_acceptor(&cert, &key) else {
            panic!("expected create_acceptor to fail");
        };
        assert!(matches!(err, TlsError::NoCertificates(_)));
    }

    #[test]
    fn test_key_file_without_pem_blocks() {
        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        // A syntactically valid PEM block that decodes, so certificate
        // loading succeeds and the failure is attributed to the key file.
        fs::write(
            &cert,
            "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
        )
        .unwrap();
        fs::write(&key, "no key material here").unwrap();

        let Err(err) = create_acceptor(&cert, &key) else {
            panic!("expected create_acceptor to fail");
        };
        assert!(matches!(err, TlsError::NoPrivateKey(_)));
    }
}
