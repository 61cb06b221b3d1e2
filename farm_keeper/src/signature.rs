//! Verification of Bitcoin signed messages.
//!
//! A request is authorized when the submitter signs the raw timestamp string
//! with the key behind their P2PKH address, and the timestamp is no older
//! than the freshness window. Timestamps in the future are accepted.

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use thiserror::Error;

const MESSAGE_MAGIC: &[u8] = b"Bitcoin Signed Message:\n";

/// Version bytes of mainnet and testnet P2PKH addresses.
const P2PKH_VERSIONS: [u8; 2] = [0x00, 0x6f];

const COMPACT_SIGNATURE_LEN: usize = 65;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid Timestamp")]
    InvalidTimestamp,
    #[error("Expired Timestamp")]
    ExpiredTimestamp,
    #[error("Invalid address or signature: {0}")]
    InvalidAddressOrSignature(&'static str),
}

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    max_age: chrono::Duration,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self {
            max_age: chrono::Duration::hours(1),
        }
    }
}

impl SignatureVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that `signature` over `timestamp` was produced by the key of
    /// `address`, and that `timestamp` is fresh.
    pub fn verify(
        &self,
        address: &str,
        signature: &str,
        timestamp: &str,
    ) -> Result<(), VerificationError> {
        self.verify_at(Utc::now(), address, signature, timestamp)
    }

    pub fn verify_at(
        &self,
        now: DateTime<Utc>,
        address: &str,
        signature: &str,
        timestamp: &str,
    ) -> Result<(), VerificationError> {
        let signed_at = parse_timestamp(timestamp).ok_or(VerificationError::InvalidTimestamp)?;
        if signed_at < now - self.max_age {
            return Err(VerificationError::ExpiredTimestamp);
        }
        verify_message(address, signature, timestamp)
    }
}

/// Accepts RFC 3339, RFC 2822 and naive `YYYY-MM-DD[ T]HH:MM:SS` times,
/// the latter read as UTC.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let timestamp = timestamp.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(timestamp) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(timestamp, format).ok())
        .map(|naive| naive.and_utc())
}

/// Verifies a base64 compact signature of `message` against a P2PKH address.
pub fn verify_message(
    address: &str,
    signature: &str,
    message: &str,
) -> Result<(), VerificationError> {
    let expected = decode_p2pkh(address)?;

    let raw = base64::engine::general_purpose::STANDARD
        .decode(signature.trim())
        .map_err(|_| VerificationError::InvalidAddressOrSignature("signature is not base64"))?;
    if raw.len() != COMPACT_SIGNATURE_LEN {
        return Err(VerificationError::InvalidAddressOrSignature(
            "signature has the wrong length",
        ));
    }

    let header = raw[0];
    if !(27..=34).contains(&header) {
        return Err(VerificationError::InvalidAddressOrSignature(
            "unsupported signature header",
        ));
    }
    let compressed = header >= 31;
    let recovery_id = RecoveryId::from_byte((header - 27) & 3)
        .ok_or(VerificationError::InvalidAddressOrSignature("bad recovery id"))?;

    let signature = Signature::from_slice(&raw[1..])
        .map_err(|_| VerificationError::InvalidAddressOrSignature("malformed signature"))?;
    // Recovery only accepts low-S; negating S mirrors R, so flip its parity.
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    };

    let digest = message_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).map_err(
        |_| VerificationError::InvalidAddressOrSignature("public key recovery failed"),
    )?;

    if hash160(key.to_encoded_point(compressed).as_bytes()) != expected {
        return Err(VerificationError::InvalidAddressOrSignature(
            "no message verification",
        ));
    }
    Ok(())
}

/// Double SHA-256 of the magic-prefixed message, as signed by wallets.
pub fn message_digest(message: &str) -> [u8; 32] {
    let mut data = Vec::with_capacity(MESSAGE_MAGIC.len() + message.len() + 10);
    write_compact_size(&mut data, MESSAGE_MAGIC.len() as u64);
    data.extend_from_slice(MESSAGE_MAGIC);
    write_compact_size(&mut data, message.len() as u64);
    data.extend_from_slice(message.as_bytes());
    Sha256::digest(Sha256::digest(&data)).into()
}

fn write_compact_size(buf: &mut Vec<u8>, len: u64) {
    match len {
        0..=0xfc => buf.push(len as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(len as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(len as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&len.to_le_bytes());
        }
    }
}

fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

fn decode_p2pkh(address: &str) -> Result<[u8; 20], VerificationError> {
    let payload = bs58::decode(address.trim())
        .with_check(None)
        .into_vec()
        .map_err(|_| VerificationError::InvalidAddressOrSignature("malformed address"))?;

    match payload.split_first() {
        Some((version, hash)) if P2PKH_VERSIONS.contains(version) => hash
            .try_into()
            .map_err(|_| VerificationError::InvalidAddressOrSignature("malformed address")),
        _ => Err(VerificationError::InvalidAddressOrSignature(
            "not a P2PKH address",
        )),
    }
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::test_helpers::*;
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn signed_at(minutes_ago: i64) -> (String, String, String) {
        let key = signing_key(7);
        let timestamp = (fixed_now() - chrono::Duration::minutes(minutes_ago)).to_rfc3339();
        let signature = sign_message(&key, &timestamp, true);
        (p2pkh_address(&key, true), signature, timestamp)
    }

    #[test]
    fn fifty_nine_minutes_old_is_fresh() {
        let (address, signature, timestamp) = signed_at(59);
        assert_eq!(
            SignatureVerifier::new().verify_at(fixed_now(), &address, &signature, &timestamp),
            Ok(())
        );
    }

    #[test]
    fn sixty_one_minutes_old_is_expired() {
        let (address, signature, timestamp) = signed_at(61);
        assert_eq!(
            SignatureVerifier::new().verify_at(fixed_now(), &address, &signature, &timestamp),
            Err(VerificationError::ExpiredTimestamp)
        );
    }

    #[test]
    fn future_timestamps_are_accepted() {
        let (address, signature, timestamp) = signed_at(-180);
        assert_eq!(
            SignatureVerifier::new().verify_at(fixed_now(), &address, &signature, &timestamp),
            Ok(())
        );
    }

    #[test]
    fn unparseable_timestamp_fails_before_signature_check() {
        assert_eq!(
            SignatureVerifier::new().verify_at(fixed_now(), "not an address", "garbage", "soon"),
            Err(VerificationError::InvalidTimestamp)
        );
    }

    #[test]
    fn uncompressed_keys_verify() {
        let key = signing_key(9);
        let message = "2024-03-01 11:30:00";
        let signature = sign_message(&key, message, false);
        assert_eq!(
            verify_message(&p2pkh_address(&key, false), &signature, message),
            Ok(())
        );
    }

    #[test]
    fn signature_by_another_key_is_rejected() {
        let (_, signature, timestamp) = signed_at(5);
        let other_address = p2pkh_address(&signing_key(8), true);
        assert_eq!(
            SignatureVerifier::new().verify_at(fixed_now(), &other_address, &signature, &timestamp),
            Err(VerificationError::InvalidAddressOrSignature(
                "no message verification"
            ))
        );
    }

    #[test]
    fn signature_over_another_message_is_rejected() {
        let key = signing_key(7);
        let signature = sign_message(&key, "2024-03-01T11:00:00Z", true);
        let result = verify_message(
            &p2pkh_address(&key, true),
            &signature,
            "2024-03-01T11:00:01Z",
        );
        assert!(matches!(
            result,
            Err(VerificationError::InvalidAddressOrSignature(_))
        ));
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        let (address, signature, timestamp) = signed_at(1);
        let mut tampered = address.clone();
        tampered.pop();
        tampered.push(if address.ends_with('z') { 'y' } else { 'z' });

        for bad in ["", "0OIl", tampered.as_str()] {
            assert_eq!(
                verify_message(bad, &signature, &timestamp),
                Err(VerificationError::InvalidAddressOrSignature("malformed address"))
            );
        }
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        let (address, _, timestamp) = signed_at(1);
        for bad in ["%%%", "c2hvcnQ="] {
            assert!(matches!(
                verify_message(&address, bad, &timestamp),
                Err(VerificationError::InvalidAddressOrSignature(_))
            ));
        }
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 11, 30, 0).unwrap();
        for shape in [
            "2024-03-01T11:30:00Z",
            "2024-03-01T12:30:00+01:00",
            "2024-03-01 11:30:00",
            "2024-03-01T11:30:00",
            "Fri, 01 Mar 2024 11:30:00 +0000",
        ] {
            assert_eq!(parse_timestamp(shape), Some(expected), "{shape}");
        }
        assert_eq!(parse_timestamp("yesterday-ish"), None);
    }

    #[test]
    fn compact_size_prefixes_lengths() {
        let mut buf = Vec::new();
        write_compact_size(&mut buf, 24);
        write_compact_size(&mut buf, 300);
        assert_eq!(buf, vec![24, 0xfd, 0x2c, 0x01]);
    }
}
