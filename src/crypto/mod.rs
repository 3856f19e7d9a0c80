//! Cryptographic operations module.
//!
//! Ed25519 is the only algorithm this crate issues with. Keys are generated
//! from the operating system RNG and stored as PKCS#8 PEM.
//!
//! # Example
//!
//! ```rust
//! use edca::crypto::ed25519::{
//!     generate_ed25519_keypair, keypair_from_pkcs8_pem, keypair_to_pkcs8_pem,
//! };
//!
//! # fn example() -> edca::error::Result<()> {
//! let keypair = generate_ed25519_keypair()?;
//! let pem = keypair_to_pkcs8_pem(&keypair)?;
//! let loaded = keypair_from_pkcs8_pem(&pem)?;
//! assert_eq!(keypair.public_bytes(), loaded.public_bytes());
//! # Ok(())
//! # }
//! ```

pub mod ed25519;
