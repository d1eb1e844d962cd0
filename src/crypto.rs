// Encryption for credentials kept on disk
// Uses AES-256-GCM with a PBKDF2-SHA256 derived key

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{AppError, Result};

const SALT_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32;
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Encrypt plaintext with a passphrase
/// Returns base64-encoded string: salt (16) + nonce (12) + ciphertext
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(passphrase, &salt);

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| AppError::Crypto(format!("cipher creation failed: {}", e)))?;

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| AppError::Crypto(format!("encryption failed: {}", e)))?;

    let mut combined = Vec::with_capacity(SALT_LENGTH + NONCE_LENGTH + ciphertext.len());
    combined.extend_from_slice(&salt);
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
}

/// Decrypt the output of [`encrypt`]
pub fn decrypt(encrypted: &str, passphrase: &str) -> Result<String> {
    let combined = base64::engine::general_purpose::STANDARD
        .decode(encrypted.trim())
        .map_err(|e| AppError::Crypto(format!("base64 decode failed: {}", e)))?;

    if combined.len() < SALT_LENGTH + NONCE_LENGTH {
        return Err(AppError::Crypto("encrypted data is too short".to_string()));
    }

    let salt = &combined[..SALT_LENGTH];
    let nonce_bytes = &combined[SALT_LENGTH..SALT_LENGTH + NONCE_LENGTH];
    let ciphertext = &combined[SALT_LENGTH + NONCE_LENGTH..];

    let key = derive_key(passphrase, salt);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| AppError::Crypto(format!("cipher creation failed: {}", e)))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| AppError::Crypto("wrong key or corrupted data".to_string()))?;

    String::from_utf8(plaintext).map_err(|e| AppError::Crypto(format!("invalid UTF-8: {}", e)))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Random 256-bit key as hex, written once to the key file
pub fn generate_key() -> String {
    let mut key = [0u8; KEY_LENGTH];
    OsRng.fill_bytes(&mut key);
    hex::encode(key)
}
