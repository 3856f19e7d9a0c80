//! Certificate and key loading from PEM files.
//!
//! An authority is supplied as two files, a certificate and a PKCS#8 private
//! key. Both are read and parsed up front so that a missing or malformed
//! authority is reported before anything is generated.

use crate::cert::builder::verifying_key_from_spki;
use crate::crypto::ed25519::{keypair_from_pkcs8_der, Keypair};
use crate::error::{CaError, Result};
use der::Decode;
use rustls_pemfile::Item;
use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use x509_cert::certificate::Certificate;
use zeroize::Zeroizing;

/// Locations of an authority's certificate and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// A loaded authority, kept in PEM form for the toolkit.
#[derive(Debug)]
pub struct Authority {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub cert_pem: String,
    pub key_pem: Zeroizing<String>,
    pub certificate: Certificate,
}

/// Read and parse both authority files.
///
/// A file that does not exist or cannot be read is `NotFound`, naming which
/// of the two it was. Contents that are not a certificate / PKCS#8 key are a
/// `PemError`.
pub fn load_authority(paths: &AuthorityPaths) -> Result<Authority> {
    let cert_pem = read_authority_file(&paths.cert, "authority certificate")?;
    let key_pem = Zeroizing::new(read_authority_file(&paths.key, "authority key")?);

    let certificate = load_certificate_from_pem(&cert_pem)?;
    load_private_key_from_pem(&key_pem)?;

    Ok(Authority {
        cert_path: paths.cert.clone(),
        key_path: paths.key.clone(),
        cert_pem,
        key_pem,
        certificate,
    })
}

fn read_authority_file(path: &Path, what: &str) -> Result<String> {
    if !path.is_file() {
        return Err(CaError::NotFound(format!("{} '{}' does not exist", what, path.display())));
    }

    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            CaError::NotFound(format!("{} '{}' does not exist", what, path.display()))
        }
        _ => CaError::NotFound(format!("{} '{}' is not readable: {}", what, path.display(), e)),
    })
}

/// Load the first certificate from a PEM string.
///
/// # Example
///
/// ```rust,no_run
/// use edca::cert::loader::load_certificate_from_pem;
///
/// # fn example() -> edca::error::Result<()> {
/// let pem = std::fs::read_to_string("ca.crt")?;
/// let cert = load_certificate_from_pem(&pem)?;
/// # Ok(())
/// # }
/// ```
pub fn load_certificate_from_pem(pem_str: &str) -> Result<Certificate> {
    let mut cursor = Cursor::new(pem_str.as_bytes());

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| CaError::PemError(format!("Failed to read PEM: {}", e)))?
        {
            Some(Item::X509Certificate(cert_der)) => {
                return Certificate::from_der(&cert_der).map_err(|e| {
                    CaError::PemError(format!("Failed to decode certificate: {}", e))
                });
            }
            Some(_) => continue,
            None => {
                return Err(CaError::PemError(
                    "PEM file does not contain a certificate".to_string(),
                ))
            }
        }
    }
}

/// Load the first PKCS#8 Ed25519 private key from a PEM string.
pub fn load_private_key_from_pem(pem_str: &str) -> Result<Keypair> {
    let mut cursor = Cursor::new(pem_str.as_bytes());

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| CaError::PemError(format!("Failed to read PEM: {}", e)))?
        {
            Some(Item::Pkcs8Key(key)) => return keypair_from_pkcs8_der(key.secret_pkcs8_der()),
            Some(Item::Pkcs1Key(_)) | Some(Item::Sec1Key(_)) => {
                return Err(CaError::PemError(
                    "Only PKCS#8 Ed25519 private keys are supported".to_string(),
                ))
            }
            Some(_) => continue,
            None => {
                return Err(CaError::PemError(
                    "PEM file does not contain a private key".to_string(),
                ))
            }
        }
    }
}

/// Whether the public half of `key_pem` is the key certified by `cert_pem`.
pub fn key_matches_certificate(key_pem: &str, cert_pem: &str) -> Result<bool> {
    let keypair = load_private_key_from_pem(key_pem)?;
    let cert = load_certificate_from_pem(cert_pem)?;
    let certified = verifying_key_from_spki(&cert.tbs_certificate.subject_public_key_info)?;

    Ok(certified.to_bytes() == keypair.public_bytes())
}
