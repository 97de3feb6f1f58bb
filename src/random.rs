//! Sources of cryptographically secure random bytes

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use rand::RngCore;
use rand::rngs::OsRng;

/// Trait for obtaining random bytes from various sources
pub trait RandomSource {
    /// Fill `buf` entirely with random bytes, or fail without a partial result.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Returns `n` freshly generated bytes.
    fn generate(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; n];
        self.fill(&mut out)?;
        Ok(out)
    }
}

/// The operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomSource;

impl OsRandomSource {
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for OsRandomSource {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(buf).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::RandomSourceUnavailable,
                "operating system entropy source unavailable",
                e,
            )
        })
    }
}
