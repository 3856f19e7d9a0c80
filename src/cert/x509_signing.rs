//! X.509 certificate and PKCS#10 request signing using x509-cert.
//!
//! This module implements the five toolkit operations the issuance procedure
//! sequences: key generation, self-signed certificate creation, signing
//! request creation, request signing by an authority, and certificate
//! description. [`Toolkit`] is the seam; [`NativeToolkit`] is the in-process
//! Ed25519 implementation.

use crate::cert::builder::{
    create_subject_public_key_info, create_validity, ed25519_algorithm, parse_subject,
    role_extensions, verifying_key_from_spki,
};
use crate::cert::describe::describe_certificate;
use crate::config::{DigestAlgorithm, Role, SignatureAlgorithm};
use crate::crypto::ed25519::{
    generate_ed25519_keypair, keypair_from_pkcs8_pem, keypair_to_pkcs8_pem, Keypair,
};
use crate::error::{CaError, Result};
use const_oid::db::rfc8410;
use der::asn1::{BitString, SetOfVec};
use der::{Decode, Encode};
use ed25519_dalek::{Signature, VerifyingKey};
use spki::AlgorithmIdentifierOwned;
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo};
use x509_cert::serial_number::SerialNumber;
use zeroize::Zeroizing;

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// PEM label of a PKCS#10 certification request.
pub const CERTIFICATE_REQUEST_TAG: &str = "CERTIFICATE REQUEST";

/// Parameters of a single signing operation.
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub serial: SerialNumber,
    pub validity_days: u32,
    pub digest: DigestAlgorithm,
    pub role: Role,
}

/// The cryptography collaborator driven by the issuance procedure.
///
/// All artifacts cross this boundary as PEM text, the same form they take on
/// disk.
pub trait Toolkit {
    /// Generate a private key and return it as PKCS#8 PEM.
    fn generate_key(&self, algorithm: SignatureAlgorithm) -> Result<Zeroizing<String>>;

    /// Create a self-issued certificate for `key_pem`.
    fn create_self_signed_cert(
        &self,
        key_pem: &str,
        subject: &str,
        options: &SignOptions,
    ) -> Result<String>;

    /// Create a certification request binding `subject` to the key's public half.
    fn create_signing_request(&self, key_pem: &str, subject: &str) -> Result<String>;

    /// Issue a certificate for `csr_pem`, signed by the authority key.
    fn sign_request(
        &self,
        csr_pem: &str,
        issuer_key_pem: &str,
        issuer_cert_pem: &str,
        options: &SignOptions,
    ) -> Result<String>;

    /// Human-readable description of a certificate.
    fn describe_cert(&self, cert_pem: &str) -> Result<String>;
}

/// Ed25519 toolkit implemented with `ed25519-dalek` and `x509-cert`.
///
/// The digest in [`SignOptions`] is accepted but not applied: Ed25519 signs
/// the message itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeToolkit;

impl Toolkit for NativeToolkit {
    fn generate_key(&self, algorithm: SignatureAlgorithm) -> Result<Zeroizing<String>> {
        match algorithm {
            SignatureAlgorithm::Ed25519 => {
                let keypair = generate_ed25519_keypair()?;
                keypair_to_pkcs8_pem(&keypair)
            }
        }
    }

    fn create_self_signed_cert(
        &self,
        key_pem: &str,
        subject: &str,
        options: &SignOptions,
    ) -> Result<String> {
        let keypair = keypair_from_pkcs8_pem(key_pem)?;
        let cert = create_self_signed_ca(&keypair, subject, options)?;
        cert_to_pem(&cert)
    }

    fn create_signing_request(&self, key_pem: &str, subject: &str) -> Result<String> {
        let keypair = keypair_from_pkcs8_pem(key_pem)?;
        let csr = create_certification_request(&keypair, subject)?;
        csr_to_pem(&csr)
    }

    fn sign_request(
        &self,
        csr_pem: &str,
        issuer_key_pem: &str,
        issuer_cert_pem: &str,
        options: &SignOptions,
    ) -> Result<String> {
        let csr = csr_from_pem(csr_pem)?;
        let issuer_keypair = keypair_from_pkcs8_pem(issuer_key_pem)?;
        let issuer_cert = cert_from_pem(issuer_cert_pem)?;
        let cert = sign_certification_request(&csr, &issuer_keypair, &issuer_cert, options)?;
        cert_to_pem(&cert)
    }

    fn describe_cert(&self, cert_pem: &str) -> Result<String> {
        let cert = cert_from_pem(cert_pem)?;
        describe_certificate(&cert)
    }
}

/// Create a self-signed authority certificate.
///
/// # Example
///
/// ```
/// use edca::cert::builder::generate_serial_number;
/// use edca::cert::x509_signing::{create_self_signed_ca, SignOptions};
/// use edca::config::{DigestAlgorithm, Role};
/// use edca::crypto::ed25519::generate_ed25519_keypair;
///
/// # fn example() -> edca::error::Result<()> {
/// let keypair = generate_ed25519_keypair()?;
/// let options = SignOptions {
///     serial: generate_serial_number()?,
///     validity_days: 365,
///     digest: DigestAlgorithm::Sha256,
///     role: Role::Authority,
/// };
/// let cert = create_self_signed_ca(&keypair, "Root CA", &options)?;
/// assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
/// # Ok(())
/// # }
/// ```
pub fn create_self_signed_ca(
    keypair: &Keypair,
    subject: &str,
    options: &SignOptions,
) -> Result<Certificate> {
    let subject = parse_subject(subject)?;
    let issuer = subject.clone();

    build_certificate(keypair, subject, issuer, &keypair.public, options)
}

/// Create a PKCS#10 certification request signed by the subject key.
pub fn create_certification_request(keypair: &Keypair, subject: &str) -> Result<CertReq> {
    let info = CertReqInfo {
        version: x509_cert::request::Version::V1,
        subject: parse_subject(subject)?,
        public_key: create_subject_public_key_info(&keypair.public)?,
        attributes: SetOfVec::new(),
    };

    let info_der = info
        .to_der()
        .map_err(|e| CaError::GenerationError(format!("Failed to encode request: {}", e)))?;
    let signature = signature_bits(&keypair.sign(&info_der))?;

    Ok(CertReq {
        info,
        algorithm: ed25519_algorithm(),
        signature,
    })
}

/// Issue a certificate for a certification request.
///
/// The request's own signature is checked first. The issuer name is taken
/// from the authority certificate and the certificate is signed with
/// `issuer_keypair`. Nothing here checks that the key belongs to the
/// certificate; that is what [`verify_certificate_signature`] is for.
pub fn sign_certification_request(
    csr: &CertReq,
    issuer_keypair: &Keypair,
    issuer_cert: &Certificate,
    options: &SignOptions,
) -> Result<Certificate> {
    verify_certification_request(csr)?;

    let subject_key = verifying_key_from_spki(&csr.info.public_key)
        .map_err(|e| CaError::GenerationError(format!("Unusable request key: {}", e)))?;
    let issuer = issuer_cert.tbs_certificate.subject.clone();

    build_certificate(
        issuer_keypair,
        csr.info.subject.clone(),
        issuer,
        &subject_key,
        options,
    )
}

/// Check the self-signature of a certification request.
pub fn verify_certification_request(csr: &CertReq) -> Result<()> {
    check_signature_algorithm(&csr.algorithm)
        .map_err(|e| CaError::GenerationError(format!("Request rejected: {}", e)))?;

    let public_key = verifying_key_from_spki(&csr.info.public_key)
        .map_err(|e| CaError::GenerationError(format!("Request rejected: {}", e)))?;
    let info_der = csr
        .info
        .to_der()
        .map_err(|e| CaError::GenerationError(format!("Failed to encode request: {}", e)))?;

    verify_raw(&public_key, &info_der, &csr.signature).map_err(|_| {
        CaError::GenerationError("Request signature does not match its public key".to_string())
    })
}

/// Verify that `cert` was signed by the key certified in `issuer_cert`.
///
/// # Example
///
/// ```
/// use edca::cert::builder::generate_serial_number;
/// use edca::cert::x509_signing::{
///     create_self_signed_ca, verify_certificate_signature, SignOptions,
/// };
/// use edca::config::{DigestAlgorithm, Role};
/// use edca::crypto::ed25519::generate_ed25519_keypair;
///
/// # fn example() -> edca::error::Result<()> {
/// let keypair = generate_ed25519_keypair()?;
/// let options = SignOptions {
///     serial: generate_serial_number()?,
///     validity_days: 365,
///     digest: DigestAlgorithm::Sha256,
///     role: Role::Authority,
/// };
/// let root = create_self_signed_ca(&keypair, "Root CA", &options)?;
/// verify_certificate_signature(&root, &root)?;
/// # Ok(())
/// # }
/// ```
pub fn verify_certificate_signature(cert: &Certificate, issuer_cert: &Certificate) -> Result<()> {
    check_signature_algorithm(&cert.signature_algorithm)?;

    if cert.tbs_certificate.issuer != issuer_cert.tbs_certificate.subject {
        return Err(CaError::VerificationError(
            "Certificate issuer does not match the authority subject".to_string(),
        ));
    }

    let issuer_key = verifying_key_from_spki(&issuer_cert.tbs_certificate.subject_public_key_info)?;
    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| CaError::VerificationError(format!("Failed to encode TBS: {}", e)))?;

    verify_raw(&issuer_key, &tbs_der, &cert.signature)
}

/// Convert a Certificate to PEM format.
pub fn cert_to_pem(cert: &Certificate) -> Result<String> {
    let der = cert
        .to_der()
        .map_err(|e| CaError::GenerationError(format!("Failed to encode certificate: {}", e)))?;

    Ok(pem::encode(&pem::Pem::new(CERTIFICATE_TAG, der)))
}

/// Load a Certificate from PEM format.
pub fn cert_from_pem(pem_str: &str) -> Result<Certificate> {
    let der = pem_contents(pem_str, CERTIFICATE_TAG)?;

    Certificate::from_der(&der)
        .map_err(|e| CaError::ParseError(format!("Failed to decode certificate: {}", e)))
}

/// Convert a certification request to PEM format.
pub fn csr_to_pem(csr: &CertReq) -> Result<String> {
    let der = csr
        .to_der()
        .map_err(|e| CaError::GenerationError(format!("Failed to encode request: {}", e)))?;

    Ok(pem::encode(&pem::Pem::new(CERTIFICATE_REQUEST_TAG, der)))
}

/// Load a certification request from PEM format.
pub fn csr_from_pem(pem_str: &str) -> Result<CertReq> {
    let der = pem_contents(pem_str, CERTIFICATE_REQUEST_TAG)?;

    CertReq::from_der(&der)
        .map_err(|e| CaError::ParseError(format!("Failed to decode request: {}", e)))
}

// Helper functions

fn pem_contents(pem_str: &str, expected_tag: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str)
        .map_err(|e| CaError::PemError(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != expected_tag {
        return Err(CaError::PemError(format!(
            "Expected {}, got {}",
            expected_tag,
            pem.tag()
        )));
    }

    Ok(pem.into_contents())
}

fn build_certificate(
    signing_keypair: &Keypair,
    subject: Name,
    issuer: Name,
    subject_key: &VerifyingKey,
    options: &SignOptions,
) -> Result<Certificate> {
    let signature_algorithm = ed25519_algorithm();

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: options.serial.clone(),
        signature: signature_algorithm.clone(),
        issuer,
        validity: create_validity(options.validity_days)?,
        subject,
        subject_public_key_info: create_subject_public_key_info(subject_key)?,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(role_extensions(options.role)?),
    };

    let tbs_der = tbs
        .to_der()
        .map_err(|e| CaError::GenerationError(format!("Failed to encode TBS: {}", e)))?;
    let signature = signature_bits(&signing_keypair.sign(&tbs_der))?;

    Ok(Certificate {
        tbs_certificate: tbs,
        signature_algorithm,
        signature,
    })
}

fn signature_bits(signature: &Signature) -> Result<BitString> {
    BitString::from_bytes(&signature.to_bytes()).map_err(|e| {
        CaError::GenerationError(format!("Failed to create signature bitstring: {}", e))
    })
}

fn check_signature_algorithm(algorithm: &AlgorithmIdentifierOwned) -> Result<()> {
    if algorithm.oid != rfc8410::ID_ED_25519 {
        return Err(CaError::VerificationError(format!(
            "Signature algorithm {} is not Ed25519",
            algorithm.oid
        )));
    }
    Ok(())
}

fn verify_raw(key: &VerifyingKey, message: &[u8], signature: &BitString) -> Result<()> {
    let bytes = signature.as_bytes().ok_or_else(|| {
        CaError::VerificationError("Signature has unused bits".to_string())
    })?;
    let signature = Signature::from_slice(bytes)
        .map_err(|e| CaError::VerificationError(format!("Malformed signature: {}", e)))?;

    key.verify_strict(message, &signature)
        .map_err(|e| CaError::VerificationError(format!("Signature verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::{common_name, generate_serial_number};

    fn options(role: Role) -> SignOptions {
        SignOptions {
            serial: generate_serial_number().unwrap(),
            validity_days: 365,
            digest: DigestAlgorithm::Sha256,
            role,
        }
    }

    #[test]
    fn test_create_self_signed_ca() {
        let keypair = generate_ed25519_keypair().unwrap();
        let cert = create_self_signed_ca(&keypair, "Test CA", &options(Role::Authority)).unwrap();

        assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
        assert_eq!(cert.signature_algorithm.oid, rfc8410::ID_ED_25519);
        assert!(verify_certificate_signature(&cert, &cert).is_ok());
    }

    #[test]
    fn test_cert_pem_roundtrip() {
        let keypair = generate_ed25519_keypair().unwrap();
        let cert = create_self_signed_ca(&keypair, "Test CA", &options(Role::Authority)).unwrap();
        let pem = cert_to_pem(&cert).unwrap();

        assert!(pem.contains("BEGIN CERTIFICATE"));
        assert_eq!(cert_from_pem(&pem).unwrap(), cert);
    }

    #[test]
    fn test_cert_from_pem_wrong_tag() {
        let keypair = generate_ed25519_keypair().unwrap();
        let csr = create_certification_request(&keypair, "example.com").unwrap();
        let pem = csr_to_pem(&csr).unwrap();

        assert!(matches!(cert_from_pem(&pem), Err(CaError::PemError(_))));
    }

    #[test]
    fn test_certification_request_is_self_signed() {
        let keypair = generate_ed25519_keypair().unwrap();
        let csr = create_certification_request(&keypair, "example.com").unwrap();

        assert!(verify_certification_request(&csr).is_ok());
        assert_eq!(common_name(&csr.info.subject).as_deref(), Some("example.com"));

        let reloaded = csr_from_pem(&csr_to_pem(&csr).unwrap()).unwrap();
        assert!(verify_certification_request(&reloaded).is_ok());
    }

    #[test]
    fn test_sign_request_rejects_forged_request() {
        let keypair = generate_ed25519_keypair().unwrap();
        let other = generate_ed25519_keypair().unwrap();
        let mut csr = create_certification_request(&keypair, "example.com").unwrap();
        csr.info.public_key = create_subject_public_key_info(&other.public).unwrap();

        let ca_keypair = generate_ed25519_keypair().unwrap();
        let ca = create_self_signed_ca(&ca_keypair, "Root CA", &options(Role::Authority)).unwrap();

        let result = sign_certification_request(&csr, &ca_keypair, &ca, &options(Role::Server));
        assert!(matches!(result, Err(CaError::GenerationError(_))));
    }

    #[test]
    fn test_sign_server_certificate() {
        let ca_keypair = generate_ed25519_keypair().unwrap();
        let ca = create_self_signed_ca(&ca_keypair, "Root CA", &options(Role::Authority)).unwrap();

        let leaf_keypair = generate_ed25519_keypair().unwrap();
        let csr = create_certification_request(&leaf_keypair, "example.com").unwrap();
        let leaf =
            sign_certification_request(&csr, &ca_keypair, &ca, &options(Role::Server)).unwrap();

        assert_eq!(leaf.tbs_certificate.issuer, ca.tbs_certificate.subject);
        assert!(verify_certificate_signature(&leaf, &ca).is_ok());

        let leaf_key =
            verifying_key_from_spki(&leaf.tbs_certificate.subject_public_key_info).unwrap();
        assert_eq!(leaf_key.to_bytes(), leaf_keypair.public_bytes());
    }

    #[test]
    fn test_mismatched_issuer_key_fails_verification() {
        let ca_keypair = generate_ed25519_keypair().unwrap();
        let ca = create_self_signed_ca(&ca_keypair, "Root CA", &options(Role::Authority)).unwrap();
        let impostor = generate_ed25519_keypair().unwrap();

        let leaf_keypair = generate_ed25519_keypair().unwrap();
        let csr = create_certification_request(&leaf_keypair, "client-1").unwrap();
        let leaf =
            sign_certification_request(&csr, &impostor, &ca, &options(Role::Client)).unwrap();

        let result = verify_certificate_signature(&leaf, &ca);
        assert!(matches!(result, Err(CaError::VerificationError(_))));
    }

    #[test]
    fn test_native_toolkit_pem_flow() {
        let toolkit = NativeToolkit;
        let ca_key = toolkit.generate_key(SignatureAlgorithm::Ed25519).unwrap();
        let ca_cert = toolkit
            .create_self_signed_cert(&ca_key, "Root CA", &options(Role::Authority))
            .unwrap();

        let leaf_key = toolkit.generate_key(SignatureAlgorithm::Ed25519).unwrap();
        let csr = toolkit.create_signing_request(&leaf_key, "example.com").unwrap();
        assert!(csr.contains("BEGIN CERTIFICATE REQUEST"));

        let leaf = toolkit
            .sign_request(&csr, &ca_key, &ca_cert, &options(Role::Server))
            .unwrap();
        let text = toolkit.describe_cert(&leaf).unwrap();

        assert!(text.contains("Signature Algorithm: ED25519"));
        assert!(text.contains("Subject: CN = example.com"));
        assert!(text.contains("Issuer: CN = Root CA"));
    }
}
