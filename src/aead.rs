//! Authenticated encryption using AES-256-GCM
//!
//! Keys are 32 bytes, nonces 12 bytes and the authentication tag 16 bytes.
//! The tag is kept detached from the ciphertext so that the container
//! layout can place it ahead of the ciphertext. Associated data is always
//! empty.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::random::RandomSource;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as GcmNonce, Tag};
use zeroize::Zeroizing;

/// Length of the key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// A 256-bit encryption key. Wiped from memory when dropped.
pub struct VaultKey(Zeroizing<[u8; KEY_LEN]>);

impl VaultKey {
    /// Generate a fresh random key.
    pub fn generate(rng: &mut dyn RandomSource) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rng.fill(&mut key[..])?;
        Ok(Self(key))
    }

    /// Build a key from raw bytes, as read back from a key artifact.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedContainer,
                format!("key must be {} bytes, got {}", KEY_LEN, bytes.len()),
            ));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// A 96-bit nonce. Not secret, but must never repeat under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// Generate a fresh random nonce.
    pub fn generate(rng: &mut dyn RandomSource) -> Result<Self> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce)?;
        Ok(Self(nonce))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// A 128-bit GCM authentication tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthTag(pub [u8; TAG_LEN]);

impl AuthTag {
    pub fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }
}

fn cipher_for(key: &[u8], nonce: &[u8]) -> Result<Aes256Gcm> {
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::CryptoEngine,
            format!("nonce must be {} bytes, got {}", NONCE_LEN, nonce.len()),
        ));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| {
        VaultError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::CryptoEngine,
            format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        )
    })
}

/// Encrypt `plaintext` under `key` and `nonce`.
///
/// Returns the ciphertext, which is exactly as long as the plaintext, and
/// the detached authentication tag. Output is deterministic for identical
/// inputs.
pub fn encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, AuthTag)> {
    let cipher = cipher_for(key, nonce)?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GcmNonce::from_slice(nonce), b"", &mut buffer)
        .map_err(|e| {
            VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CryptoEngine,
                format!("encryption failed: {}", e),
            )
        })?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);
    Ok((buffer, AuthTag(tag_bytes)))
}

/// Decrypt `ciphertext` and verify it against `tag`.
///
/// No plaintext is released unless the tag verifies against the key, the
/// nonce and every ciphertext byte.
pub fn decrypt(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = cipher_for(key, nonce)?;
    if tag.len() != TAG_LEN {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            format!("authentication tag must be {} bytes, got {}", TAG_LEN, tag.len()),
        ));
    }

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            GcmNonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, or wrong key",
            )
        })?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::OsRandomSource;

    fn fresh() -> (VaultKey, Nonce) {
        let mut rng = OsRandomSource::new();
        (
            VaultKey::generate(&mut rng).unwrap(),
            Nonce::generate(&mut rng).unwrap(),
        )
    }

    #[test]
    fn test_empty_plaintext() {
        let (key, nonce) = fresh();
        let (ct, tag) = encrypt(key.as_bytes(), nonce.as_bytes(), b"").unwrap();
        assert!(ct.is_empty());

        let pt = decrypt(key.as_bytes(), nonce.as_bytes(), &ct, tag.as_bytes()).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn test_all_byte_values() {
        let (key, nonce) = fresh();
        let plaintext: Vec<u8> = (0..=255).collect();

        let (ct, tag) = encrypt(key.as_bytes(), nonce.as_bytes(), &plaintext).unwrap();
        assert_eq!(ct.len(), plaintext.len());
        assert_ne!(ct, plaintext);

        let pt = decrypt(key.as_bytes(), nonce.as_bytes(), &ct, tag.as_bytes()).unwrap();
        assert_eq!(&pt[..], &plaintext[..]);
    }

    #[test]
    fn test_large_plaintext() {
        let (key, nonce) = fresh();
        let plaintext = vec![0x42u8; 128 * 1024];

        let (ct, tag) = encrypt(key.as_bytes(), nonce.as_bytes(), &plaintext).unwrap();
        let pt = decrypt(key.as_bytes(), nonce.as_bytes(), &ct, tag.as_bytes()).unwrap();
        assert_eq!(&pt[..], &plaintext[..]);
    }

    #[test]
    fn test_deterministic_encryption() {
        let key = [1u8; KEY_LEN];
        let nonce = [2u8; NONCE_LEN];

        let (ct1, tag1) = encrypt(&key, &nonce, b"hello world").unwrap();
        let (ct2, tag2) = encrypt(&key, &nonce, b"hello world").unwrap();
        assert_eq!(ct1, ct2);
        assert_eq!(tag1, tag2);
    }

    #[test]
    fn test_different_nonce_different_ciphertext() {
        let key = [1u8; KEY_LEN];

        let (ct1, tag1) = encrypt(&key, &[2u8; NONCE_LEN], b"hello world").unwrap();
        let (ct2, tag2) = encrypt(&key, &[3u8; NONCE_LEN], b"hello world").unwrap();
        assert_ne!(ct1, ct2);
        assert_ne!(tag1, tag2);
    }

    #[test]
    fn test_wrong_key_length() {
        let err = encrypt(&[0u8; 16], &[0u8; NONCE_LEN], b"x").expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::CryptoEngine));

        let err = decrypt(&[0u8; 33], &[0u8; NONCE_LEN], b"x", &[0u8; TAG_LEN])
            .expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::CryptoEngine));
    }

    #[test]
    fn test_wrong_nonce_length() {
        let err = encrypt(&[0u8; KEY_LEN], &[0u8; 24], b"x").expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::CryptoEngine));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (key, nonce) = fresh();
        let (other, _) = fresh();
        let (ct, tag) = encrypt(key.as_bytes(), nonce.as_bytes(), b"secret data").unwrap();

        let err = decrypt(other.as_bytes(), nonce.as_bytes(), &ct, tag.as_bytes())
            .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_single_bit_flips_rejected() {
        let (key, nonce) = fresh();
        let plaintext = b"Hello Acto-Sphere!";
        let (ct, tag) = encrypt(key.as_bytes(), nonce.as_bytes(), plaintext).unwrap();

        for byte in 0..ct.len() {
            for bit in 0..8 {
                let mut bad = ct.clone();
                bad[byte] ^= 1 << bit;
                let err = decrypt(key.as_bytes(), nonce.as_bytes(), &bad, tag.as_bytes())
                    .expect_err("tampered ciphertext must not decrypt");
                assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
            }
        }

        for byte in 0..TAG_LEN {
            for bit in 0..8 {
                let mut bad = tag.0;
                bad[byte] ^= 1 << bit;
                let err = decrypt(key.as_bytes(), nonce.as_bytes(), &ct, &bad)
                    .expect_err("tampered tag must not verify");
                assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
            }
        }

        for byte in 0..NONCE_LEN {
            let mut bad = nonce.0;
            bad[byte] ^= 0x01;
            let err = decrypt(key.as_bytes(), &bad, &ct, tag.as_bytes())
                .expect_err("tampered nonce must not verify");
            assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        }
    }

    #[test]
    fn test_truncated_tag_rejected() {
        let (key, nonce) = fresh();
        let (ct, tag) = encrypt(key.as_bytes(), nonce.as_bytes(), b"abc").unwrap();

        let err = decrypt(key.as_bytes(), nonce.as_bytes(), &ct, &tag.0[..8])
            .expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_key_and_nonce_uniqueness() {
        use std::collections::HashSet;

        let mut rng = OsRandomSource::new();
        let mut pairs = HashSet::new();
        for _ in 0..1000 {
            let key = VaultKey::generate(&mut rng).unwrap();
            let nonce = Nonce::generate(&mut rng).unwrap();
            assert_ne!(&key.as_bytes()[..NONCE_LEN], nonce.as_bytes());
            assert!(pairs.insert((*key.as_bytes(), nonce)));
        }
    }

    #[test]
    fn test_key_from_slice_length() {
        assert!(VaultKey::from_slice(&[7u8; KEY_LEN]).is_ok());
        let err = VaultKey::from_slice(&[7u8; 31]).expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::MalformedContainer));
    }
}
