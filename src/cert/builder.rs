//! Certificate builder utilities.
//!
//! Small functions that produce the individual pieces of a TBS certificate or
//! a certification request: names, validity windows, serials, public key info
//! and the per-role extensions.

use crate::config::Role;
use crate::error::{CaError, Result};
use const_oid::db::{rfc4519, rfc5280, rfc8410};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, OctetString, PrintableStringRef, SetOfVec, Utf8StringRef};
use der::{Any, Encode};
use ed25519_dalek::VerifyingKey;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage};
use x509_cert::ext::Extension;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;

/// Length in bytes of freshly generated serial numbers.
pub const SERIAL_LENGTH: usize = 20;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Parse a subject into an X.509 name.
///
/// A string without `=` is taken as a bare common name. Otherwise it is read
/// as a comma separated list of `TYPE=value` pairs with the types CN, C, O,
/// OU, ST and L.
///
/// # Example
///
/// ```
/// use edca::cert::builder::parse_subject;
///
/// let name = parse_subject("CN=example.com,O=Example Org").unwrap();
/// assert_eq!(name.0.len(), 2);
///
/// let bare = parse_subject("example.com").unwrap();
/// assert_eq!(bare.0.len(), 1);
/// ```
pub fn parse_subject(subject: &str) -> Result<RdnSequence> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(CaError::InvalidInput("Subject cannot be empty".to_string()));
    }

    if !subject.contains('=') {
        return Ok(RdnSequence(vec![single_attribute_rdn(rfc4519::CN, subject)?]));
    }

    let mut rdns = Vec::new();
    for part in subject.split(',') {
        let part = part.trim();
        let (key, value) = part.split_once('=').ok_or_else(|| {
            CaError::InvalidInput(format!("Invalid subject format: {}", part))
        })?;
        let key = key.trim();
        let value = value.trim();

        if value.is_empty() {
            return Err(CaError::InvalidInput(format!(
                "Empty value for subject attribute {}",
                key
            )));
        }

        let oid = match key.to_uppercase().as_str() {
            "CN" => rfc4519::CN,
            "C" => rfc4519::C,
            "O" => rfc4519::O,
            "OU" => rfc4519::OU,
            "ST" => rfc4519::ST,
            "L" => rfc4519::L,
            _ => return Err(CaError::InvalidInput(format!("Unknown DN type: {}", key))),
        };

        rdns.push(single_attribute_rdn(oid, value)?);
    }

    Ok(RdnSequence(rdns))
}

fn single_attribute_rdn(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    // countryName is a PrintableString, everything else is UTF8String
    let encoded = if oid == rfc4519::C {
        let printable = PrintableStringRef::new(value).map_err(|e| {
            CaError::InvalidInput(format!("Invalid country code '{}': {}", value, e))
        })?;
        Any::encode_from(&printable)
    } else {
        let utf8 = Utf8StringRef::new(value).map_err(|e| {
            CaError::InvalidInput(format!("Invalid subject value '{}': {}", value, e))
        })?;
        Any::encode_from(&utf8)
    }
    .map_err(|e| CaError::GenerationError(format!("Failed to encode attribute: {}", e)))?;

    let attr = AttributeTypeAndValue {
        oid,
        value: encoded,
    };

    let attr_set = SetOfVec::try_from(vec![attr])
        .map_err(|e| CaError::GenerationError(format!("Failed to add attribute: {}", e)))?;

    Ok(RelativeDistinguishedName::from(attr_set))
}

/// Extract the first common name of an X.509 name, if any.
pub fn common_name(name: &RdnSequence) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == rfc4519::CN)
        .and_then(|atv| attribute_to_string(&atv.value))
}

/// Render an X.509 name as `CN = value, O = value`, the way openssl prints it.
pub fn name_to_string(name: &RdnSequence) -> String {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .map(|atv| {
            let label = attribute_label(&atv.oid);
            let value = attribute_to_string(&atv.value).unwrap_or_else(|| "<binary>".to_string());
            format!("{} = {}", label, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn attribute_label(oid: &ObjectIdentifier) -> String {
    const LABELS: [(ObjectIdentifier, &str); 6] = [
        (rfc4519::CN, "CN"),
        (rfc4519::C, "C"),
        (rfc4519::O, "O"),
        (rfc4519::OU, "OU"),
        (rfc4519::ST, "ST"),
        (rfc4519::L, "L"),
    ];

    LABELS
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| oid.to_string())
}

fn attribute_to_string(value: &Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<Utf8StringRef<'_>>() {
        return Some(s.as_str().to_string());
    }
    value
        .decode_as::<PrintableStringRef<'_>>()
        .ok()
        .map(|s| s.as_str().to_string())
}

/// Validity window starting now and lasting exactly `days` days.
pub fn create_validity(days: u32) -> Result<Validity> {
    Validity::from_now(std::time::Duration::from_secs(days as u64 * SECONDS_PER_DAY))
        .map_err(|e| CaError::GenerationError(format!("Failed to create validity: {}", e)))
}

/// Generate a random, positive serial number.
pub fn generate_serial_number() -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_LENGTH];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    // positive, and no leading zero octet to keep the INTEGER minimal
    bytes[0] = (bytes[0] & 0x7F) | 0x01;

    serial_from_bytes(&bytes)
}

/// Build a serial number from its big-endian magnitude.
pub fn serial_from_bytes(bytes: &[u8]) -> Result<SerialNumber> {
    SerialNumber::new(bytes)
        .map_err(|e| CaError::GenerationError(format!("Failed to create serial number: {}", e)))
}

/// Subject public key info of an Ed25519 verifying key.
pub fn create_subject_public_key_info(
    public_key: &VerifyingKey,
) -> Result<SubjectPublicKeyInfoOwned> {
    let public_key_bytes = public_key.to_bytes();
    let subject_public_key = BitString::from_bytes(&public_key_bytes)
        .map_err(|e| CaError::GenerationError(format!("Failed to create bit string: {}", e)))?;

    Ok(SubjectPublicKeyInfoOwned {
        algorithm: ed25519_algorithm(),
        subject_public_key,
    })
}

/// Extract the Ed25519 verifying key from a subject public key info.
pub fn verifying_key_from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<VerifyingKey> {
    if spki.algorithm.oid != rfc8410::ID_ED_25519 {
        return Err(CaError::VerificationError(format!(
            "Public key algorithm {} is not Ed25519",
            spki.algorithm.oid
        )));
    }

    let bytes: [u8; 32] = spki
        .subject_public_key
        .as_bytes()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            CaError::VerificationError("Ed25519 public key must be 32 bytes".to_string())
        })?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| CaError::VerificationError(format!("Invalid Ed25519 public key: {}", e)))
}

/// Algorithm identifier for Ed25519 signatures and keys.
pub fn ed25519_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: rfc8410::ID_ED_25519,
        parameters: None,
    }
}

/// Extensions placed in a certificate issued for `role`.
///
/// Authorities get a critical `basicConstraints CA:TRUE`. Leaves get
/// `CA:FALSE` and an extended key usage matching their role.
pub fn role_extensions(role: Role) -> Result<Vec<Extension>> {
    let basic_constraints = BasicConstraints {
        ca: role.is_authority(),
        path_len_constraint: None,
    };

    let mut extensions = vec![encode_extension(
        rfc5280::ID_CE_BASIC_CONSTRAINTS,
        true,
        &basic_constraints,
    )?];

    let usage = match role {
        Role::Authority => None,
        Role::Server => Some(rfc5280::ID_KP_SERVER_AUTH),
        Role::Client => Some(rfc5280::ID_KP_CLIENT_AUTH),
    };

    if let Some(purpose) = usage {
        extensions.push(encode_extension(
            rfc5280::ID_CE_EXT_KEY_USAGE,
            false,
            &ExtendedKeyUsage(vec![purpose]),
        )?);
    }

    Ok(extensions)
}

fn encode_extension<T: Encode>(
    oid: ObjectIdentifier,
    critical: bool,
    value: &T,
) -> Result<Extension> {
    let der = value.to_der().map_err(|e| {
        CaError::GenerationError(format!("Failed to encode extension {}: {}", oid, e))
    })?;
    let extn_value = OctetString::new(der)
        .map_err(|e| CaError::GenerationError(format!("Failed to wrap extension {}: {}", oid, e)))?;

    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value,
    })
}
