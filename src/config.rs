//! Fixed issuance parameters and per-role defaults.
//!
//! The algorithm, digest and validity length are not configurable from the
//! command line; they live here so that every code path reports the same
//! values it used.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Validity of every issued certificate, in days.
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Subject used by `init-authority` when none is given.
pub const DEFAULT_AUTHORITY_SUBJECT: &str = "Root CA";

/// Default tracing filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Tracing filter used with `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "edca=debug,info";

/// Signature algorithm used for keys and certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ED25519")]
    Ed25519,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureAlgorithm::Ed25519 => write!(f, "ED25519"),
        }
    }
}

/// Digest algorithm requested from the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "sha256")]
    Sha256,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Parameters applied to every issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceSettings {
    pub algorithm: SignatureAlgorithm,
    pub digest: DigestAlgorithm,
    pub validity_days: u32,
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        Self {
            algorithm: SignatureAlgorithm::Ed25519,
            digest: DigestAlgorithm::Sha256,
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }
}

/// What kind of identity is being issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Authority,
    Server,
    Client,
}

impl Role {
    /// Default certificate output path for this role.
    pub fn default_cert_path(self) -> PathBuf {
        PathBuf::from(match self {
            Role::Authority => "ca.crt",
            Role::Server => "server.crt",
            Role::Client => "client.crt",
        })
    }

    /// Default private key output path for this role.
    pub fn default_key_path(self) -> PathBuf {
        PathBuf::from(match self {
            Role::Authority => "ca.key",
            Role::Server => "server.key",
            Role::Client => "client.key",
        })
    }

    pub fn is_authority(self) -> bool {
        matches!(self, Role::Authority)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Authority => write!(f, "authority"),
            Role::Server => write!(f, "server"),
            Role::Client => write!(f, "client"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = IssuanceSettings::default();
        assert_eq!(settings.algorithm, SignatureAlgorithm::Ed25519);
        assert_eq!(settings.digest, DigestAlgorithm::Sha256);
        assert_eq!(settings.validity_days, 365);
    }

    #[test]
    fn test_role_default_paths() {
        assert_eq!(Role::Authority.default_cert_path(), PathBuf::from("ca.crt"));
        assert_eq!(Role::Authority.default_key_path(), PathBuf::from("ca.key"));
        assert_eq!(Role::Server.default_cert_path(), PathBuf::from("server.crt"));
        assert_eq!(Role::Client.default_key_path(), PathBuf::from("client.key"));
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(SignatureAlgorithm::Ed25519.to_string(), "ED25519");
        assert_eq!(DigestAlgorithm::Sha256.to_string(), "sha256");
        assert_eq!(
            serde_json::to_string(&SignatureAlgorithm::Ed25519).unwrap(),
            "\"ED25519\""
        );
        assert_eq!(serde_json::to_string(&Role::Server).unwrap(), "\"server\"");
    }
}
