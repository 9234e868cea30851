//! Key derivation and request signing
//!
//! All functions here are pure: the only inputs are the app code, the
//! caller-supplied timestamp and (for session calls) the session sign key.
//!
//! # Derivation
//!
//! 1. `upper(md5(app_code + package_id))`
//! 2. `lower(md5(step1 + SIGNATURE_MD5))`
//!
//! The static decryption key is `step2[4..20]`. The temporary sign key is
//! `step2[20..32] + step2[0..10] + step2[4..6]`.

use crate::constants::{APP_PACKAGE_ID, SIGNATURE_MD5};
use crate::error::MazdaError;
use md5::Md5;
use sha2::{Digest, Sha256};

fn app_code_digest(app_code: &str) -> String {
    let val1 = hex::encode_upper(Md5::digest(format!("{app_code}{APP_PACKAGE_ID}")));
    hex::encode(Md5::digest(format!("{val1}{SIGNATURE_MD5}")))
}

/// Static key used to decrypt the key-exchange (check version) response
pub fn decryption_key_from_app_code(app_code: &str) -> String {
    let digest = app_code_digest(app_code);
    digest[4..20].to_string()
}

/// Sign key for the unauthenticated key-exchange call
pub fn temporary_sign_key(app_code: &str) -> String {
    let digest = app_code_digest(app_code);
    format!("{}{}{}", &digest[20..32], &digest[0..10], &digest[4..6])
}

/// Signature for the key-exchange call, bound only to the timestamp
pub fn sign_from_timestamp(app_code: &str, timestamp: &str) -> String {
    if timestamp.is_empty() {
        return String::new();
    }

    let extended = format!("{timestamp}{}{}", tail(timestamp, 6), tail(timestamp, 3)).to_uppercase();
    sign(&extended, &temporary_sign_key(app_code))
}

/// Signature over an already encrypted payload (query or body) and timestamp
pub fn sign_from_payload_and_timestamp(
    encrypted_payload: &str,
    timestamp: &str,
    sign_key: Option<&str>,
) -> Result<String, MazdaError> {
    let sign_key = sign_key.filter(|k| !k.is_empty()).ok_or_else(|| MazdaError::missing("sign key"))?;
    if timestamp.is_empty() {
        return Ok(String::new());
    }

    let message = format!(
        "{encrypted_payload}{timestamp}{}{}",
        tail(timestamp, 6),
        tail(timestamp, 3)
    );
    Ok(sign(&message, sign_key))
}

/// `upper(sha256(message + key))`
pub fn sign(message: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    hasher.update(key.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Suffix starting at `from`, empty when the string is shorter
fn tail(s: &str, from: usize) -> &str {
    s.get(from..).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_CODE: &str = "202007270941270111799";
    const TIMESTAMP: &str = "1620000000000";

    #[test]
    fn test_decryption_key_from_app_code() {
        assert_eq!(decryption_key_from_app_code(APP_CODE), "a19e6e2de0e07d4a");
        assert_eq!(decryption_key_from_app_code(APP_CODE).len(), 16);
    }

    #[test]
    fn test_temporary_sign_key_offsets() {
        // Second-stage digest is f4bca19e6e2de0e07d4a3c5ce1dac489
        assert_eq!(temporary_sign_key(APP_CODE), "3c5ce1dac489f4bca19e6ea1");
    }

    #[test]
    fn test_sign_known_answer() {
        assert_eq!(
            sign("hello", "world"),
            "936A185CAAA266BB9CBE981E9E05CB78CD732B0B3280EB944412BB6F8F8F07AF"
        );
    }

    #[test]
    fn test_sign_is_fixed_length_uppercase_hex() {
        let signature = sign("payload", "key");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(signature, sign("payload", "key"));
    }

    #[test]
    fn test_sign_from_timestamp() {
        assert_eq!(
            sign_from_timestamp(APP_CODE, TIMESTAMP),
            "FF3560D15FE8E5185509E9DAACB75F79CE092A2E88BF339DEEA3011DEF82300D"
        );
        assert_eq!(sign_from_timestamp(APP_CODE, ""), "");
    }

    #[test]
    fn test_sign_from_payload_and_timestamp() {
        let signature = sign_from_payload_and_timestamp("ENC", TIMESTAMP, Some("SIGNKEY")).unwrap();
        assert_eq!(
            signature,
            "69BEB14929FB00BD5788F627497BD52A4EC5DFEFF7493C6F9D0FE5A99BA20F16"
        );
        // No hidden clock dependency
        assert_eq!(
            signature,
            sign_from_payload_and_timestamp("ENC", TIMESTAMP, Some("SIGNKEY")).unwrap()
        );
    }

    #[test]
    fn test_sign_from_payload_requires_sign_key() {
        assert!(matches!(
            sign_from_payload_and_timestamp("ENC", TIMESTAMP, None),
            Err(MazdaError::Configuration(_))
        ));
        assert!(matches!(
            sign_from_payload_and_timestamp("ENC", TIMESTAMP, Some("")),
            Err(MazdaError::Configuration(_))
        ));
    }
}
