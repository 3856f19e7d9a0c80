//! Serial-number tracking file of an authority.
//!
//! Each authority certificate `ca.crt` has a companion `ca.srl` holding the
//! last serial it issued, as uppercase hex. The first signing starts from a
//! random serial; later signings increment it. A serial is only recorded once
//! the certificate carrying it has been issued and verified.

use crate::cert::builder::{generate_serial_number, serial_from_bytes};
use crate::error::{CaError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use x509_cert::serial_number::SerialNumber;

/// Path of the serial file that belongs to an authority certificate.
///
/// # Example
///
/// ```
/// use edca::storage::serial::serial_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(serial_path(Path::new("pki/ca.crt")), PathBuf::from("pki/ca.srl"));
/// ```
pub fn serial_path(authority_cert: &Path) -> PathBuf {
    authority_cert.with_extension("srl")
}

/// Serial to use for the next certificate signed by `authority_cert`.
///
/// Reads the serial file without changing it; see [`record_serial`].
pub fn next_serial(authority_cert: &Path) -> Result<SerialNumber> {
    let path = serial_path(authority_cert);
    if !path.exists() {
        return generate_serial_number();
    }

    let contents = fs::read_to_string(&path)?;
    let current = parse_serial_hex(&contents).map_err(|e| match e {
        CaError::ParseError(msg) => {
            CaError::ParseError(format!("serial file '{}': {}", path.display(), msg))
        }
        other => other,
    })?;
    serial_from_bytes(&increment(current))
}

/// Store `serial` as the last one issued by `authority_cert`.
pub fn record_serial(authority_cert: &Path, serial: &SerialNumber) -> Result<()> {
    let path = serial_path(authority_cert);
    fs::write(&path, format!("{}\n", format_serial_hex(serial)))?;
    debug!(path = %path.display(), serial = %format_serial_hex(serial), "recorded serial");
    Ok(())
}

/// Uppercase hex of a serial's encoded bytes.
pub fn format_serial_hex(serial: &SerialNumber) -> String {
    hex::encode_upper(serial.as_bytes())
}

fn parse_serial_hex(contents: &str) -> Result<Vec<u8>> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(CaError::ParseError("empty serial".to_string()));
    }

    let padded = if trimmed.len() % 2 == 1 {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    };

    hex::decode(&padded).map_err(|e| CaError::ParseError(format!("invalid serial hex: {}", e)))
}

/// Add one to a big-endian positive integer and re-normalize it to a
/// minimal two's-complement encoding.
fn increment(mut bytes: Vec<u8>) -> Vec<u8> {
    let mut carry = true;
    for byte in bytes.iter_mut().rev() {
        if !carry {
            break;
        }
        let (value, overflow) = byte.overflowing_add(1);
        *byte = value;
        carry = overflow;
    }
    if carry {
        bytes.insert(0, 1);
    }

    let first_significant = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    let mut normalized = bytes.split_off(first_significant);
    if normalized.first().is_some_and(|b| b & 0x80 != 0) {
        normalized.insert(0, 0);
    }
    normalized
}
