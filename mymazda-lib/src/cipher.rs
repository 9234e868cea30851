//! Payload encryption for the MyMazda API
//!
//! Request and response bodies are AES-128-CBC encrypted with PKCS#7 padding
//! and a fixed, protocol-wide IV ([`IV`]), then base64 encoded. The login
//! password is RSA (PKCS#1 v1.5) encrypted under a one-time public key.
//!
//! # Keys
//!
//! - Session payloads: `encKey` from the key-exchange response
//! - Key-exchange response: static key derived from the app code
//!   (see [`crate::keys::decryption_key_from_app_code`])

use crate::constants::IV;
use crate::error::MazdaError;
use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey as _};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde_json::Value;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Encrypt a UTF-8 payload with the given session key, returning base64.
///
/// Empty input yields an empty string without touching the cipher.
pub fn encrypt_payload(plaintext: &str, key: Option<&str>) -> Result<String, MazdaError> {
    let key = aes_key(key, "encryption key")?;
    if plaintext.is_empty() {
        return Ok(String::new());
    }

    let ciphertext = aes_cbc_encrypt(plaintext.as_bytes(), &key, IV);
    Ok(BASE64.encode(ciphertext))
}

/// Decrypt a base64 payload with the given key, returning the unpadded bytes.
///
/// Empty input yields empty output without touching the cipher.
pub fn decrypt_payload(ciphertext: &str, key: Option<&str>) -> Result<Vec<u8>, MazdaError> {
    let key = aes_key(key, "encryption key")?;
    if ciphertext.is_empty() {
        return Ok(Vec::new());
    }

    let buf = BASE64.decode(ciphertext)?;
    aes_cbc_decrypt(&buf, &key, IV)
}

/// Decrypt a base64 payload and parse it as JSON
pub fn decrypt_json(ciphertext: &str, key: Option<&str>) -> Result<Value, MazdaError> {
    let plaintext = decrypt_payload(ciphertext, key)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Encrypt `secret:<unix seconds>` under the login public key, returning base64.
///
/// The timestamp is taken fresh on every call; the server rejects stale ones.
pub fn encrypt_credential(secret: &str, public_key: &str) -> Result<String, MazdaError> {
    encrypt_credential_at(secret, public_key, chrono::Utc::now().timestamp())
}

/// Same as [`encrypt_credential`] with an explicit timestamp
pub fn encrypt_credential_at(secret: &str, public_key: &str, unix_secs: i64) -> Result<String, MazdaError> {
    let key = parse_public_key(public_key)?;
    let message = format!("{secret}:{unix_secs}");
    let encrypted = rsa_encrypt(&key, message.as_bytes())?;
    Ok(BASE64.encode(encrypted))
}

/// Parse an RSA public key given as PEM or as base64 DER.
///
/// Both SubjectPublicKeyInfo and PKCS#1 encodings are accepted.
pub fn parse_public_key(public_key: &str) -> Result<RsaPublicKey, MazdaError> {
    let trimmed = public_key.trim();
    if trimmed.starts_with("-----BEGIN") {
        return match RsaPublicKey::from_public_key_pem(trimmed) {
            Ok(key) => Ok(key),
            Err(_) => Ok(RsaPublicKey::from_pkcs1_pem(trimmed)?),
        };
    }

    let der = BASE64.decode(trimmed)?;
    match RsaPublicKey::from_public_key_der(&der) {
        Ok(key) => Ok(key),
        Err(_) => Ok(RsaPublicKey::from_pkcs1_der(&der)?),
    }
}

/// RSA PKCS#1 v1.5 encryption
pub(crate) fn rsa_encrypt(key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>, MazdaError> {
    let mut rng = rand::thread_rng();
    Ok(key.encrypt(&mut rng, Pkcs1v15Encrypt, data)?)
}

/// Re-encode a key as base64 PKCS#1 DER
pub fn public_key_to_base64(key: &RsaPublicKey) -> Result<String, MazdaError> {
    let der = key.to_pkcs1_der()?;
    Ok(BASE64.encode(der.as_bytes()))
}

/// Validate a textual AES-128 key and turn it into bytes
fn aes_key(key: Option<&str>, what: &str) -> Result<[u8; BLOCK_SIZE], MazdaError> {
    let key = key.filter(|k| !k.is_empty()).ok_or_else(|| MazdaError::missing(what))?;
    key.as_bytes()
        .try_into()
        .map_err(|_| MazdaError::Configuration(format!("{what} must be {BLOCK_SIZE} bytes, got {}", key.len())))
}

/// AES-128-CBC encrypt with PKCS#7 padding
pub fn aes_cbc_encrypt(plaintext: &[u8], key: &[u8; BLOCK_SIZE], iv: &[u8; BLOCK_SIZE]) -> Vec<u8> {
    let cipher = Aes128::new(key.into());

    let mut output = pkcs7_pad(plaintext);
    let mut previous = *iv;

    for chunk in output.chunks_mut(BLOCK_SIZE) {
        for (byte, prev) in chunk.iter_mut().zip(previous.iter()) {
            *byte ^= prev;
        }
        cipher.encrypt_block(chunk.into());
        previous.copy_from_slice(chunk);
    }

    output
}

/// AES-128-CBC decrypt and strip PKCS#7 padding
pub fn aes_cbc_decrypt(
    ciphertext: &[u8],
    key: &[u8; BLOCK_SIZE],
    iv: &[u8; BLOCK_SIZE],
) -> Result<Vec<u8>, MazdaError> {
    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(BLOCK_SIZE) {
        return Err(MazdaError::MalformedResponse(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }

    let cipher = Aes128::new(key.into());
    let mut output = ciphertext.to_vec();
    let mut previous = *iv;

    for chunk in output.chunks_mut(BLOCK_SIZE) {
        let mut saved = [0u8; BLOCK_SIZE];
        saved.copy_from_slice(chunk);
        cipher.decrypt_block(chunk.into());
        for (byte, prev) in chunk.iter_mut().zip(previous.iter()) {
            *byte ^= prev;
        }
        previous = saved;
    }

    pkcs7_unpad(output)
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let padding_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + padding_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding_len, padding_len as u8);
    padded
}

fn pkcs7_unpad(mut data: Vec<u8>) -> Result<Vec<u8>, MazdaError> {
    let padding_len = *data.last().ok_or(MazdaError::InvalidPadding)? as usize;
    if padding_len == 0 || padding_len > BLOCK_SIZE.min(data.len()) {
        return Err(MazdaError::InvalidPadding);
    }
    if !data[data.len() - padding_len..].iter().all(|&b| b as usize == padding_len) {
        return Err(MazdaError::InvalidPadding);
    }

    data.truncate(data.len() - padding_len);
    Ok(data)
}
