//! Built-in encrypt/decrypt check, run with `--test`

use crate::aead::{self, Nonce, VaultKey};
use crate::container::Container;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::random::RandomSource;
use tracing::info;

/// Plaintext used by the self-test.
pub const SELF_TEST_MESSAGE: &[u8] = b"Hello Acto-Sphere!";

/// Encrypt a known message under a fresh key and nonce, pass it through the
/// container codec, decrypt it and compare. A flipped tag bit must then be
/// rejected.
pub fn run_self_test(rng: &mut dyn RandomSource) -> Result<()> {
    let key = VaultKey::generate(rng)?;
    let nonce = Nonce::generate(rng)?;

    let (ciphertext, tag) = aead::encrypt(key.as_bytes(), nonce.as_bytes(), SELF_TEST_MESSAGE)?;
    let bytes = Container::new(nonce, tag, ciphertext).to_bytes();
    let parsed = Container::from_bytes(&bytes)?;

    let decrypted = aead::decrypt(
        key.as_bytes(),
        parsed.nonce.as_bytes(),
        &parsed.ciphertext,
        parsed.tag.as_bytes(),
    )?;
    if &decrypted[..] != SELF_TEST_MESSAGE {
        return Err(VaultError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Unclassified,
            "decrypted content does not match original",
        ));
    }
    info!(" - Encryption/Decryption Cycle: OK");

    let mut forged = parsed.tag;
    forged.0[0] ^= 0x01;
    match aead::decrypt(
        key.as_bytes(),
        parsed.nonce.as_bytes(),
        &parsed.ciphertext,
        forged.as_bytes(),
    ) {
        Err(e) if e.is(ErrorKind::AuthenticationFailed) => {}
        Err(e) => return Err(e.with_context("tampered tag rejected for the wrong reason")),
        Ok(_) => {
            return Err(VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Unclassified,
                "tampered tag was accepted",
            ));
        }
    }
    info!(" - Tamper Detection: OK");

    Ok(())
}
