use chacha20poly1305::{
    aead::{Aead, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// XChaCha20 nonce size.
pub const NONCE_SIZE: usize = 24;
/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid key length")]
    InvalidKeyLength,
    #[error("Key derivation failed")]
    KeyDerivationFailed,
}

pub type Result<T> = std::result::Result<T, EncryptionError>;

/// Seal `plaintext` with XChaCha20-Poly1305.
///
/// # Arguments
/// * `plaintext` - Data to encrypt
/// * `key` - 32-byte key
///
/// # Returns
/// `nonce (24 bytes) || ciphertext || tag`
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(EncryptionError::InvalidKeyLength);
    }

    let cipher =
        XChaCha20Poly1305::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Open data produced by [`seal`]. Fails on any authentication error.
pub fn open(sealed: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(EncryptionError::InvalidKeyLength);
    }

    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(EncryptionError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher =
        XChaCha20Poly1305::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| EncryptionError::DecryptionFailed)
}

/// Derive a 32-byte key from a Diffie-Hellman output using HKDF-SHA256.
///
/// # Arguments
/// * `shared_secret` - 32-byte X25519 shared secret
/// * `info` - Domain separation label (e.g. `b"mixnode-sphinx-layer-v1"`)
pub fn derive_key(shared_secret: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    if shared_secret.len() != 32 {
        return Err(EncryptionError::InvalidKeyLength);
    }

    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = [0u8; 32];
    hkdf.expand(info, &mut key)
        .map_err(|_| EncryptionError::KeyDerivationFailed)?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = [7u8; 32];
        let sealed = seal(b"loop payload", &key).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 12 + TAG_SIZE);
        assert_eq!(open(&sealed, &key).unwrap(), b"loop payload");
    }

    #[test]
    fn test_open_wrong_key() {
        let sealed = seal(b"loop payload", &[1u8; 32]).unwrap();
        assert_eq!(
            open(&sealed, &[2u8; 32]),
            Err(EncryptionError::DecryptionFailed)
        );
    }

    #[test]
    fn test_open_truncated() {
        assert_eq!(
            open(&[0u8; NONCE_SIZE + TAG_SIZE - 1], &[1u8; 32]),
            Err(EncryptionError::DecryptionFailed)
        );
    }

    #[test]
    fn test_invalid_key_length() {
        assert_eq!(seal(b"x", &[0u8; 16]), Err(EncryptionError::InvalidKeyLength));
        assert_eq!(derive_key(&[0u8; 31], b"info"), Err(EncryptionError::InvalidKeyLength));
    }

    #[test]
    fn test_derive_key_domain_separation() {
        let shared = [9u8; 32];
        let a = derive_key(&shared, b"layer").unwrap();
        let b = derive_key(&shared, b"payload").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, derive_key(&shared, b"layer").unwrap());
    }
}
