//! Certificate generation module.
//!
//! Building, signing, describing and loading Ed25519 X.509 certificates and
//! PKCS#10 signing requests.

pub mod builder;
pub mod describe;
pub mod loader;
pub mod x509_signing;
