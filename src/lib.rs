//! edca: a minimal Ed25519 certificate authority
//!
//! This library creates a self-signed root authority and issues server and
//! client leaf certificates signed by it. Every command goes through the same
//! issuance procedure:
//!
//! - validate the subject, the authority files and the output paths
//! - generate an Ed25519 key, written owner-only
//! - self-sign, or create a signing request and have the authority sign it
//! - verify the certificate and report
//!
//! A failed run leaves none of its output files behind, and existing files
//! are never overwritten.
//!
//! # Architecture
//!
//! The cryptographic operations sit behind the [`cert::x509_signing::Toolkit`]
//! trait; the issuance procedure in [`issuance`] only sequences and checks
//! them. All operations return `Result` types, no `unwrap()` or panic.
//!
//! # Example
//!
//! ```rust,no_run
//! use edca::cert::loader::AuthorityPaths;
//! use edca::cert::x509_signing::NativeToolkit;
//! use edca::config::{IssuanceSettings, Role};
//! use edca::issuance::{issue, IssuanceRequest};
//!
//! fn example() -> edca::Result<()> {
//!     let settings = IssuanceSettings::default();
//!
//!     let root = IssuanceRequest::authority("Example CA", "ca.crt".into(), "ca.key".into());
//!     issue(&NativeToolkit, &root, &settings)?;
//!
//!     let server = IssuanceRequest::leaf(
//!         Role::Server,
//!         "example.com",
//!         "server.crt".into(),
//!         "server.key".into(),
//!         AuthorityPaths { cert: "ca.crt".into(), key: "ca.key".into() },
//!     );
//!     let report = issue(&NativeToolkit, &server, &settings)?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod issuance;
pub mod storage;

// Re-export commonly used types
pub use error::{CaError, Result};
