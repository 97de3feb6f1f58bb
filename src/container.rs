//! On-disk container layout
//!
//! The binary format is:
//! - nonce: 12 bytes
//! - tag: 16 bytes
//! - ciphertext: all remaining bytes (same length as the plaintext)
//!
//! There are no length prefixes or version markers; the two leading fields
//! are fixed size and the ciphertext consumes the remainder.

use crate::aead::{AuthTag, NONCE_LEN, Nonce, TAG_LEN};
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Smallest valid container: nonce and tag around an empty ciphertext.
pub const HEADER_LEN: usize = NONCE_LEN + TAG_LEN;

/// A parsed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub nonce: Nonce,
    pub tag: AuthTag,
    pub ciphertext: Vec<u8>,
}

impl Container {
    pub fn new(nonce: Nonce, tag: AuthTag, ciphertext: Vec<u8>) -> Self {
        Self {
            nonce,
            tag,
            ciphertext,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serialize(&self.nonce, &self.tag, &self.ciphertext)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        deserialize(bytes)
    }
}

/// Concatenate nonce, tag and ciphertext in that order.
pub fn serialize(nonce: &Nonce, tag: &AuthTag, ciphertext: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    output.extend_from_slice(nonce.as_bytes());
    output.extend_from_slice(tag.as_bytes());
    output.extend_from_slice(ciphertext);
    output
}

/// Split a container back into its fields.
pub fn deserialize(bytes: &[u8]) -> Result<Container> {
    if bytes.len() < HEADER_LEN {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedContainer,
            format!(
                "container is {} bytes, shorter than the {} byte minimum; likely truncated",
                bytes.len(),
                HEADER_LEN
            ),
        ));
    }

    let (nonce_bytes, rest) = bytes.split_at(NONCE_LEN);
    let (tag_bytes, ciphertext) = rest.split_at(TAG_LEN);

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(tag_bytes);

    Ok(Container {
        nonce: Nonce(nonce),
        tag: AuthTag(tag),
        ciphertext: ciphertext.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order() {
        let nonce = Nonce([0x24u8; NONCE_LEN]);
        let tag = AuthTag([0x42u8; TAG_LEN]);
        let bytes = serialize(&nonce, &tag, b"abc");

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
            0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42,
            0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42,
            b'a', b'b', b'c',
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_size_law() {
        let nonce = Nonce([1u8; NONCE_LEN]);
        let tag = AuthTag([2u8; TAG_LEN]);
        for len in [0usize, 1, 19, 255, 4096] {
            let ciphertext = vec![0xAAu8; len];
            assert_eq!(serialize(&nonce, &tag, &ciphertext).len(), 12 + 16 + len);
        }
    }

    #[test]
    fn test_empty_ciphertext_is_legal() {
        let bytes = vec![0u8; HEADER_LEN];
        let container = deserialize(&bytes).unwrap();
        assert!(container.ciphertext.is_empty());
        assert_eq!(container.to_bytes(), bytes);
    }

    #[test]
    fn test_short_input_rejected() {
        for len in 0..HEADER_LEN {
            let err = deserialize(&vec![0u8; len]).expect_err("expected malformed container");
            assert_eq!(err.kind, Some(ErrorKind::MalformedContainer));
        }
    }

    #[test]
    fn test_parse_splits_fields() {
        let mut bytes = vec![0x11u8; NONCE_LEN];
        bytes.extend_from_slice(&[0x22u8; TAG_LEN]);
        bytes.extend_from_slice(b"payload");

        let container = Container::from_bytes(&bytes).unwrap();
        assert_eq!(container.nonce, Nonce([0x11u8; NONCE_LEN]));
        assert_eq!(container.tag, AuthTag([0x22u8; TAG_LEN]));
        assert_eq!(container.ciphertext, b"payload");
        assert_eq!(container.to_bytes(), bytes);
    }
}
