// ── UIConfig Encryption ──────────────────────────────────────────────────
// PBKDF2-SHA256 key derivation + AES-256-GCM AEAD, framed as
// `IV || TAG || CIPHERTEXT`, base64-encoded. Grounded on the teacher's
// `engine/skills/crypto.rs` AES-GCM envelope and `engine/engram/
// encryption.rs`'s `prefix + base64(nonce||ciphertext)` framing; `pbkdf2`
// is new alongside the teacher's existing `sha2`/`hmac` stack (the
// teacher derives keys from a fixed master secret, never from a
// per-user passphrase, so PBKDF2 has no equivalent to reuse — see
// DESIGN.md).

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::atoms::constants::{AES_GCM_NONCE_LEN, AES_GCM_TAG_LEN, AES_KEY_LEN, PBKDF2_SALT_LEN};
use crate::atoms::error::{CoreError, CoreResult};

/// A per-user random salt, always transmitted alongside the ciphertext;
/// clients never derive it from the key alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt(pub [u8; PBKDF2_SALT_LEN]);

impl Salt {
    pub fn generate() -> Self {
        let mut bytes = [0u8; PBKDF2_SALT_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(s: &str) -> CoreResult<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| CoreError::crypto(format!("invalid salt encoding: {e}")))?;
        if bytes.len() != PBKDF2_SALT_LEN {
            return Err(CoreError::crypto("salt has wrong length"));
        }
        let mut arr = [0u8; PBKDF2_SALT_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// Derive a 256-bit key from a user passphrase via PBKDF2-HMAC-SHA256.
fn derive_key(passphrase: &str, salt: &Salt, iterations: u32) -> [u8; AES_KEY_LEN] {
    let mut key = [0u8; AES_KEY_LEN];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt.0, iterations, &mut key);
    key
}

/// Encrypt `plaintext` under a key derived from `passphrase` + `salt`.
/// Returns base64(IV || TAG || CIPHERTEXT).
pub fn encrypt(plaintext: &[u8], passphrase: &str, salt: &Salt, iterations: u32) -> CoreResult<String> {
    let mut key_bytes = derive_key(passphrase, salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    key_bytes.zeroize();

    let mut nonce_bytes = [0u8; AES_GCM_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext_and_tag = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
        .map_err(|_| CoreError::crypto("encryption failed"))?;

    // aes-gcm appends the tag after the ciphertext; re-frame as
    // IV || TAG || CIPHERTEXT for the wire format.
    let split = ciphertext_and_tag.len() - AES_GCM_TAG_LEN;
    let (ct, tag) = ciphertext_and_tag.split_at(split);

    let mut framed = Vec::with_capacity(AES_GCM_NONCE_LEN + AES_GCM_TAG_LEN + ct.len());
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(tag);
    framed.extend_from_slice(ct);

    Ok(BASE64.encode(framed))
}

/// Decrypt a base64(IV || TAG || CIPHERTEXT) blob produced by `encrypt`.
pub fn decrypt(encoded: &str, passphrase: &str, salt: &Salt, iterations: u32) -> CoreResult<Vec<u8>> {
    let framed = BASE64
        .decode(encoded)
        .map_err(|e| CoreError::crypto(format!("invalid ciphertext encoding: {e}")))?;
    if framed.len() < AES_GCM_NONCE_LEN + AES_GCM_TAG_LEN {
        return Err(CoreError::crypto("ciphertext too short"));
    }
    let (nonce_bytes, rest) = framed.split_at(AES_GCM_NONCE_LEN);
    let (tag, ct) = rest.split_at(AES_GCM_TAG_LEN);

    let mut key_bytes = derive_key(passphrase, salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    key_bytes.zeroize();

    let mut ct_and_tag = Vec::with_capacity(ct.len() + tag.len());
    ct_and_tag.extend_from_slice(ct);
    ct_and_tag.extend_from_slice(tag);

    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, Payload { msg: &ct_and_tag, aad: &[] })
        .map_err(|_| CoreError::crypto("decryption failed: wrong key, salt, or tampered ciphertext"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_plaintext() {
        let salt = Salt::generate();
        let plaintext = b"{\"theme\":\"stable\"}";
        let encrypted = encrypt(plaintext, "correct horse battery staple", &salt, 10_000).unwrap();
        let decrypted = decrypt(&encrypted, "correct horse battery staple", &salt, 10_000).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let salt = Salt::generate();
        let encrypted = encrypt(b"secret payload", "right passphrase", &salt, 10_000).unwrap();
        let result = decrypt(&encrypted, "wrong passphrase", &salt, 10_000);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_salt_fails_to_decrypt() {
        let salt = Salt::generate();
        let other_salt = Salt::generate();
        let encrypted = encrypt(b"secret payload", "passphrase", &salt, 10_000).unwrap();
        let result = decrypt(&encrypted, "passphrase", &other_salt, 10_000);
        assert!(result.is_err());
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let salt = Salt::generate();
        let a = encrypt(b"same plaintext", "passphrase", &salt, 10_000).unwrap();
        let b = encrypt(b"same plaintext", "passphrase", &salt, 10_000).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn salt_base64_round_trips() {
        let salt = Salt::generate();
        let encoded = salt.to_base64();
        let decoded = Salt::from_base64(&encoded).unwrap();
        assert_eq!(salt, decoded);
    }
}
