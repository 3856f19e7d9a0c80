//! The shared issuance procedure.
//!
//! One function covers every command: validate, generate the key, produce the
//! certificate (directly when self-signed, through a signing request when an
//! authority is supplied), verify it and report. Any failure after the first
//! file is written removes every file this run created.

use crate::cert::builder::{common_name, generate_serial_number, name_to_string, parse_subject};
use crate::cert::describe::{validity_window, ED25519_SIGNATURE_LINE};
use crate::cert::loader::{key_matches_certificate, load_authority, Authority, AuthorityPaths};
use crate::cert::x509_signing::{cert_from_pem, verify_certificate_signature, SignOptions, Toolkit};
use crate::config::{DigestAlgorithm, IssuanceSettings, Role, SignatureAlgorithm};
use crate::error::{CaError, Result};
use crate::storage::files::{ensure_destination, ArtifactGuard, FileMode};
use crate::storage::serial::{format_serial_hex, next_serial, record_serial};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What to issue and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRequest {
    pub role: Role,
    pub subject: String,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Signing authority; `None` issues a self-signed authority certificate.
    pub authority: Option<AuthorityPaths>,
}

impl IssuanceRequest {
    /// Request for a self-signed root authority.
    pub fn authority(subject: impl Into<String>, cert_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            role: Role::Authority,
            subject: subject.into(),
            cert_path,
            key_path,
            authority: None,
        }
    }

    /// Request for a server or client certificate signed by `authority`.
    pub fn leaf(
        role: Role,
        subject: impl Into<String>,
        cert_path: PathBuf,
        key_path: PathBuf,
        authority: AuthorityPaths,
    ) -> Self {
        Self {
            role,
            subject: subject.into(),
            cert_path,
            key_path,
            authority: Some(authority),
        }
    }

    /// Where the transient signing request is written for leaf issuance.
    pub fn request_path(&self) -> PathBuf {
        self.cert_path.with_extension("csr")
    }
}

/// Summary of a successful issuance.
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceReport {
    pub role: Role,
    pub subject: String,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    /// Authority certificate the leaf was signed with; `None` when self-signed.
    pub issuer_certificate: Option<PathBuf>,
    pub issuer: String,
    pub serial: String,
    pub validity_days: u32,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub algorithm: SignatureAlgorithm,
    pub digest: DigestAlgorithm,
}

impl fmt::Display for IssuanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.role {
            Role::Authority => "Root CA",
            Role::Server => "server",
            Role::Client => "client",
        };

        writeln!(f, "✓ Created {} certificate: {}", kind, self.certificate.display())?;
        writeln!(f, "  Private key: {}", self.private_key.display())?;
        writeln!(f, "  Subject: {}", self.subject)?;
        match &self.issuer_certificate {
            Some(path) => writeln!(f, "  Signed by: {} ({})", self.issuer, path.display())?,
            None => writeln!(f, "  Signed by: self ({})", self.issuer)?,
        }
        writeln!(f, "  Serial: {}", self.serial)?;
        writeln!(
            f,
            "  Valid for: {} days ({} to {})",
            self.validity_days,
            self.not_before.format("%Y-%m-%d %H:%M:%S UTC"),
            self.not_after.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f, "  Signature algorithm: {}", self.algorithm)?;
        write!(f, "  Digest: {}", self.digest)
    }
}

/// Run one issuance.
///
/// On error no file created by this call remains on disk, and the
/// authority's serial file is left as it was.
///
/// # Example
///
/// ```rust,no_run
/// use edca::cert::x509_signing::NativeToolkit;
/// use edca::config::IssuanceSettings;
/// use edca::issuance::{issue, IssuanceRequest};
///
/// # fn example() -> edca::error::Result<()> {
/// let request = IssuanceRequest::authority("Example CA", "ca.crt".into(), "ca.key".into());
/// let report = issue(&NativeToolkit, &request, &IssuanceSettings::default())?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub fn issue<T: Toolkit>(
    toolkit: &T,
    request: &IssuanceRequest,
    settings: &IssuanceSettings,
) -> Result<IssuanceReport> {
    debug!(role = %request.role, subject = %request.subject, "starting issuance");

    match run(toolkit, request, settings) {
        Ok(report) => {
            info!(
                role = %report.role,
                subject = %report.subject,
                certificate = %report.certificate.display(),
                serial = %report.serial,
                "issued certificate"
            );
            Ok(report)
        }
        Err(e) => {
            warn!(role = %request.role, class = e.class(), error = %e, "issuance failed");
            Err(e)
        }
    }
}

fn run<T: Toolkit>(
    toolkit: &T,
    request: &IssuanceRequest,
    settings: &IssuanceSettings,
) -> Result<IssuanceReport> {
    // Step 1: validation, no side effects
    let subject = request.subject.trim();
    parse_subject(subject)?;

    let authority = validate(request)?;

    // Step 2: private key
    let mut guard = ArtifactGuard::new();

    let key_pem = toolkit
        .generate_key(settings.algorithm)
        .map_err(|e| generation_failure("key generation", e))?;
    guard.create(&request.key_path, key_pem.as_bytes(), FileMode::OwnerOnly, "private key")?;
    debug!(path = %request.key_path.display(), "generated private key");

    // Step 3: certificate
    let (cert_pem, serial) = match &authority {
        None => {
            let options = sign_options(generate_serial_number()?, request.role, settings);
            let cert_pem = toolkit
                .create_self_signed_cert(&key_pem, subject, &options)
                .map_err(|e| generation_failure("self-signed certificate", e))?;
            (cert_pem, options.serial)
        }
        Some(authority) => {
            let request_path = request.request_path();
            let csr_pem = toolkit
                .create_signing_request(&key_pem, subject)
                .map_err(|e| generation_failure("signing request", e))?;
            guard.create(&request_path, csr_pem.as_bytes(), FileMode::Public, "signing request")?;
            debug!(path = %request_path.display(), "created signing request");

            let signed = next_serial(&authority.cert_path).and_then(|serial| {
                let options = sign_options(serial, request.role, settings);
                toolkit
                    .sign_request(&csr_pem, &authority.key_pem, &authority.cert_pem, &options)
                    .map(|cert_pem| (cert_pem, options.serial))
                    .map_err(|e| generation_failure("certificate signing", e))
            });

            // The request never outlives the signing step
            guard.remove(&request_path)?;
            signed?
        }
    };

    guard.create(&request.cert_path, cert_pem.as_bytes(), FileMode::Public, "certificate")?;
    debug!(path = %request.cert_path.display(), "wrote certificate");

    // Step 4: verification
    let cert = verify(toolkit, &cert_pem, &key_pem, authority.as_ref())?;
    let (not_before, not_after) = validity_window(&cert)?;
    if let Some(authority) = &authority {
        record_serial(&authority.cert_path, &serial)?;
    }

    // Step 5: report
    guard.commit();

    let issuer = common_name(&cert.tbs_certificate.issuer)
        .unwrap_or_else(|| name_to_string(&cert.tbs_certificate.issuer));

    Ok(IssuanceReport {
        role: request.role,
        subject: subject.to_string(),
        certificate: request.cert_path.clone(),
        private_key: request.key_path.clone(),
        issuer_certificate: authority.map(|a| a.cert_path),
        issuer,
        serial: format_serial_hex(&serial),
        validity_days: settings.validity_days,
        not_before,
        not_after,
        algorithm: settings.algorithm,
        digest: settings.digest,
    })
}

fn validate(request: &IssuanceRequest) -> Result<Option<Authority>> {
    let authority = match (&request.authority, request.role) {
        (None, Role::Authority) => None,
        (Some(paths), Role::Server | Role::Client) => Some(load_authority(paths)?),
        (None, role) => {
            return Err(CaError::InvalidInput(format!(
                "{} certificates require an authority certificate and key",
                role
            )))
        }
        (Some(_), Role::Authority) => {
            return Err(CaError::InvalidInput(
                "root authority certificates are self-signed and take no authority".to_string(),
            ))
        }
    };

    if request.cert_path == request.key_path {
        return Err(CaError::InvalidInput(
            "certificate and key paths must differ".to_string(),
        ));
    }
    if authority.is_some() && request.key_path == request.request_path() {
        return Err(CaError::InvalidInput(format!(
            "key path '{}' collides with the signing request file",
            request.key_path.display()
        )));
    }

    if let Some(authority) = &authority {
        if !key_matches_certificate(&authority.key_pem, &authority.cert_pem)? {
            return Err(CaError::VerificationError(format!(
                "authority key '{}' does not belong to authority certificate '{}'",
                authority.key_path.display(),
                authority.cert_path.display()
            )));
        }
    }

    ensure_destination(&request.key_path, "private key")?;
    ensure_destination(&request.cert_path, "certificate")?;
    if authority.is_some() {
        ensure_destination(&request.request_path(), "signing request")?;
    }

    Ok(authority)
}

fn verify<T: Toolkit>(
    toolkit: &T,
    cert_pem: &str,
    key_pem: &str,
    authority: Option<&Authority>,
) -> Result<x509_cert::Certificate> {
    let description = toolkit
        .describe_cert(cert_pem)
        .map_err(|e| CaError::VerificationError(format!("cannot describe certificate: {}", e)))?;
    if !description.contains(ED25519_SIGNATURE_LINE) {
        return Err(CaError::VerificationError(
            "certificate does not report an ED25519 signature".to_string(),
        ));
    }

    let cert = cert_from_pem(cert_pem)
        .map_err(|e| CaError::VerificationError(format!("cannot parse certificate: {}", e)))?;

    let issuer_cert = authority.map(|a| &a.certificate).unwrap_or(&cert);
    verify_certificate_signature(&cert, issuer_cert).map_err(|e| match e {
        CaError::VerificationError(msg) => CaError::VerificationError(format!(
            "certificate does not verify against its issuer: {}",
            msg
        )),
        other => other,
    })?;

    let key_matches = key_matches_certificate(key_pem, cert_pem).map_err(|e| {
        CaError::VerificationError(format!("cannot compare key and certificate: {}", e))
    })?;
    if !key_matches {
        return Err(CaError::VerificationError(
            "certificate does not certify the generated key".to_string(),
        ));
    }

    debug!("certificate verified");
    Ok(cert)
}

fn sign_options(
    serial: x509_cert::serial_number::SerialNumber,
    role: Role,
    settings: &IssuanceSettings,
) -> SignOptions {
    SignOptions {
        serial,
        validity_days: settings.validity_days,
        digest: settings.digest,
        role,
    }
}

fn generation_failure(step: &str, err: CaError) -> CaError {
    match err {
        CaError::GenerationError(_) | CaError::StorageError(_) => err,
        other => CaError::GenerationError(format!("{}: {}", step, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::x509_signing::NativeToolkit;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn root_request(dir: &Path) -> IssuanceRequest {
        IssuanceRequest::authority("Example CA", dir.join("ca.crt"), dir.join("ca.key"))
    }

    #[test]
    fn test_issue_root_authority() {
        let temp_dir = TempDir::new().unwrap();
        let request = root_request(temp_dir.path());

        let report = issue(&NativeToolkit, &request, &IssuanceSettings::default()).unwrap();

        assert_eq!(report.role, Role::Authority);
        assert_eq!(report.issuer, "Example CA");
        assert!(report.issuer_certificate.is_none());
        assert_eq!((report.not_after - report.not_before).num_days(), 365);
        assert!(request.cert_path.exists());
        assert!(request.key_path.exists());
    }

    #[test]
    fn test_issue_rejects_empty_subject() {
        let temp_dir = TempDir::new().unwrap();
        let mut request = root_request(temp_dir.path());
        request.subject = "  ".to_string();

        let result = issue(&NativeToolkit, &request, &IssuanceSettings::default());
        assert!(matches!(result, Err(CaError::InvalidInput(_))));
        assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_issue_rejects_same_output_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("both.pem");
        let request = IssuanceRequest::authority("Root CA", path.clone(), path);

        let result = issue(&NativeToolkit, &request, &IssuanceSettings::default());
        assert!(matches!(result, Err(CaError::InvalidInput(_))));
    }

    #[test]
    fn test_issue_rejects_key_at_request_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_request(temp_dir.path());
        issue(&NativeToolkit, &root, &IssuanceSettings::default()).unwrap();

        let request = IssuanceRequest::leaf(
            Role::Server,
            "example.com",
            temp_dir.path().join("server.crt"),
            temp_dir.path().join("server.csr"),
            AuthorityPaths {
                cert: root.cert_path.clone(),
                key: root.key_path.clone(),
            },
        );

        let result = issue(&NativeToolkit, &request, &IssuanceSettings::default());
        assert!(matches!(result, Err(CaError::InvalidInput(_))));
        assert!(!request.key_path.exists());
        assert!(!request.cert_path.exists());
    }

    #[test]
    fn test_leaf_requires_authority() {
        let temp_dir = TempDir::new().unwrap();
        let request = IssuanceRequest {
            role: Role::Server,
            subject: "example.com".to_string(),
            cert_path: temp_dir.path().join("server.crt"),
            key_path: temp_dir.path().join("server.key"),
            authority: None,
        };

        let result = issue(&NativeToolkit, &request, &IssuanceSettings::default());
        assert!(matches!(result, Err(CaError::InvalidInput(_))));
    }

    #[test]
    fn test_verify_reports_unreadable_key_as_verification_failure() {
        use crate::cert::x509_signing::{cert_to_pem, create_self_signed_ca};
        use crate::crypto::ed25519::generate_ed25519_keypair;

        let keypair = generate_ed25519_keypair().unwrap();
        let options = sign_options(
            generate_serial_number().unwrap(),
            Role::Authority,
            &IssuanceSettings::default(),
        );
        let cert = create_self_signed_ca(&keypair, "Root CA", &options).unwrap();
        let cert_pem = cert_to_pem(&cert).unwrap();

        let result = verify(&NativeToolkit, &cert_pem, "not a key", None);
        assert!(matches!(result, Err(CaError::VerificationError(_))));
    }

    #[test]
    fn test_request_path() {
        let request = IssuanceRequest::leaf(
            Role::Client,
            "client-1",
            PathBuf::from("out/client.crt"),
            PathBuf::from("out/client.key"),
            AuthorityPaths {
                cert: PathBuf::from("ca.crt"),
                key: PathBuf::from("ca.key"),
            },
        );
        assert_eq!(request.request_path(), PathBuf::from("out/client.csr"));
    }

    #[test]
    fn test_report_display() {
        let temp_dir = TempDir::new().unwrap();
        let request = root_request(temp_dir.path());
        let report = issue(&NativeToolkit, &request, &IssuanceSettings::default()).unwrap();

        let text = report.to_string();
        assert!(text.contains("Created Root CA certificate"));
        assert!(text.contains("Subject: Example CA"));
        assert!(text.contains("Valid for: 365 days"));
        assert!(text.contains("Signature algorithm: ED25519"));
        assert!(text.contains("Digest: sha256"));
    }
}
