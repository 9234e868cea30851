use crate::cipher::{BLOCK_SIZE, aes_cbc_encrypt, parse_public_key, rsa_encrypt};
use crate::error::MazdaError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::Instant;

type HmacSha256 = Hmac<Sha256>;

pub const HMAC_KEY_SIZE: usize = 32;

/// Turns a plaintext fingerprint blob into the `X-acf-sensor-data` header value
pub trait SensorDataEncryptor: Send + Sync {
    fn encrypt(&self, sensor_data: &str) -> Result<String, MazdaError>;
}

/// AES-128-CBC + HMAC-SHA256 with both keys wrapped under an RSA public key.
///
/// Keys are generated once per encryptor; each call uses a fresh IV.
pub struct HybridSensorEncryptor {
    aes_key: [u8; BLOCK_SIZE],
    hmac_key: [u8; HMAC_KEY_SIZE],
    encrypted_aes_key: String,
    encrypted_hmac_key: String,
    rsa_micros: u128,
}

impl HybridSensorEncryptor {
    /// Create an encryptor from a PEM or base64 DER RSA public key
    pub fn new(public_key: &str) -> Result<Self, MazdaError> {
        let public_key = parse_public_key(public_key)?;
        let mut rng = rand::thread_rng();

        let mut aes_key = [0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut aes_key);
        let mut hmac_key = [0u8; HMAC_KEY_SIZE];
        rng.fill_bytes(&mut hmac_key);

        let started = Instant::now();
        let encrypted_aes_key = BASE64.encode(rsa_encrypt(&public_key, &aes_key)?);
        let encrypted_hmac_key = BASE64.encode(rsa_encrypt(&public_key, &hmac_key)?);
        let rsa_micros = started.elapsed().as_micros();

        Ok(Self {
            aes_key,
            hmac_key,
            encrypted_aes_key,
            encrypted_hmac_key,
            rsa_micros,
        })
    }
}

impl SensorDataEncryptor for HybridSensorEncryptor {
    fn encrypt(&self, sensor_data: &str) -> Result<String, MazdaError> {
        let mut iv = [0u8; BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let aes_started = Instant::now();
        let ciphertext = aes_cbc_encrypt(sensor_data.as_bytes(), &self.aes_key, &iv);
        let mut blob = Vec::with_capacity(BLOCK_SIZE + ciphertext.len() + 32);
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);
        let aes_micros = aes_started.elapsed().as_micros();

        let hmac_started = Instant::now();
        let mut mac = HmacSha256::new_from_slice(&self.hmac_key)
            .map_err(|e| MazdaError::Configuration(format!("HMAC key: {e}")))?;
        mac.update(&blob);
        blob.extend_from_slice(&mac.finalize().into_bytes());
        let hmac_micros = hmac_started.elapsed().as_micros();

        Ok(format!(
            "1,a,{},{}${}${},{},{}",
            self.encrypted_aes_key,
            self.encrypted_hmac_key,
            BASE64.encode(&blob),
            aes_micros,
            hmac_micros,
            self.rsa_micros
        ))
    }
}

impl std::fmt::Debug for HybridSensorEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSensorEncryptor").finish_non_exhaustive()
    }
}
