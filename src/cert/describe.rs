//! Textual certificate description.
//!
//! Produces the same layout `openssl x509 -text` uses, restricted to the
//! fields this crate writes. The issuance procedure inspects this text to
//! confirm the signature algorithm.

use crate::cert::builder::name_to_string;
use crate::error::{CaError, Result};
use chrono::{DateTime, Utc};
use const_oid::db::{rfc5280, rfc8410};
use const_oid::ObjectIdentifier;
use der::Decode;
use std::fmt::{self, Write};
use x509_cert::certificate::{Certificate, Version};
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage};
use x509_cert::ext::Extension;
use x509_cert::time::Time;

/// Line in a description that names the Ed25519 signature algorithm.
pub const ED25519_SIGNATURE_LINE: &str = "Signature Algorithm: ED25519";

const TIME_FORMAT: &str = "%b %e %H:%M:%S %Y GMT";

/// Describe a certificate in openssl text form.
pub fn describe_certificate(cert: &Certificate) -> Result<String> {
    let (not_before, not_after) = validity_window(cert)?;
    let mut out = String::new();
    write_description(&mut out, cert, not_before, not_after)
        .map_err(|e| CaError::GenerationError(format!("Failed to describe certificate: {}", e)))?;
    Ok(out)
}

fn write_description(
    out: &mut String,
    cert: &Certificate,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> fmt::Result {
    let tbs = &cert.tbs_certificate;

    writeln!(out, "Certificate:")?;
    writeln!(out, "    Data:")?;
    writeln!(out, "        Version: {}", version_label(&tbs.version))?;
    writeln!(out, "        Serial Number:")?;
    writeln!(out, "            {}", colon_hex(tbs.serial_number.as_bytes()))?;
    writeln!(out, "        Signature Algorithm: {}", algorithm_label(&tbs.signature.oid))?;
    writeln!(out, "        Issuer: {}", name_to_string(&tbs.issuer))?;
    writeln!(out, "        Validity")?;
    writeln!(out, "            Not Before: {}", not_before.format(TIME_FORMAT))?;
    writeln!(out, "            Not After : {}", not_after.format(TIME_FORMAT))?;
    writeln!(out, "        Subject: {}", name_to_string(&tbs.subject))?;
    writeln!(out, "        Subject Public Key Info:")?;

    let spki = &tbs.subject_public_key_info;
    let key_label = algorithm_label(&spki.algorithm.oid);
    writeln!(out, "            Public Key Algorithm: {}", key_label)?;
    writeln!(out, "                {} Public-Key:", key_label)?;
    writeln!(out, "                pub:")?;
    for chunk in spki.subject_public_key.raw_bytes().chunks(15) {
        writeln!(out, "                    {}", colon_hex(chunk))?;
    }

    if let Some(extensions) = &tbs.extensions {
        writeln!(out, "        X509v3 extensions:")?;
        for extension in extensions {
            write_extension(out, extension)?;
        }
    }

    let signature_label = algorithm_label(&cert.signature_algorithm.oid);
    writeln!(out, "    Signature Algorithm: {}", signature_label)?;
    writeln!(out, "    Signature Value:")?;
    for chunk in cert.signature.raw_bytes().chunks(18) {
        writeln!(out, "        {}", colon_hex(chunk))?;
    }

    Ok(())
}

/// Start and end of the certificate's validity window.
pub fn validity_window(cert: &Certificate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let validity = &cert.tbs_certificate.validity;
    Ok((to_datetime(&validity.not_before)?, to_datetime(&validity.not_after)?))
}

fn to_datetime(time: &Time) -> Result<DateTime<Utc>> {
    let secs = time.to_unix_duration().as_secs();
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| CaError::ParseError(format!("Timestamp {} out of range", secs)))
}

fn write_extension(out: &mut String, extension: &Extension) -> fmt::Result {
    let critical = if extension.critical { " critical" } else { "" };
    let value = extension.extn_value.as_bytes();

    if extension.extn_id == rfc5280::ID_CE_BASIC_CONSTRAINTS {
        writeln!(out, "            X509v3 Basic Constraints:{}", critical)?;
        let text = match BasicConstraints::from_der(value) {
            Ok(bc) if bc.ca => "CA:TRUE",
            Ok(_) => "CA:FALSE",
            Err(_) => "<malformed>",
        };
        writeln!(out, "                {}", text)
    } else if extension.extn_id == rfc5280::ID_CE_EXT_KEY_USAGE {
        writeln!(out, "            X509v3 Extended Key Usage:{}", critical)?;
        let text = match ExtendedKeyUsage::from_der(value) {
            Ok(eku) => eku.0.iter().map(purpose_label).collect::<Vec<_>>().join(", "),
            Err(_) => "<malformed>".to_string(),
        };
        writeln!(out, "                {}", text)
    } else {
        writeln!(out, "            {}:{}", extension.extn_id, critical)?;
        writeln!(out, "                {}", colon_hex(value))
    }
}

fn version_label(version: &Version) -> &'static str {
    match version {
        Version::V1 => "1 (0x0)",
        Version::V2 => "2 (0x1)",
        Version::V3 => "3 (0x2)",
    }
}

fn algorithm_label(oid: &ObjectIdentifier) -> String {
    if *oid == rfc8410::ID_ED_25519 {
        "ED25519".to_string()
    } else {
        oid.to_string()
    }
}

fn purpose_label(oid: &ObjectIdentifier) -> String {
    if *oid == rfc5280::ID_KP_SERVER_AUTH {
        "TLS Web Server Authentication".to_string()
    } else if *oid == rfc5280::ID_KP_CLIENT_AUTH {
        "TLS Web Client Authentication".to_string()
    } else {
        oid.to_string()
    }
}

fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}
