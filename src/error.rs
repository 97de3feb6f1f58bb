use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// due to a user error. It merely cannot be confidently determined.
    Internal,

    /// The user provided invalid input or asked for something that is
    /// impossible to complete (such as encrypting a file that does not exist).
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The file to encrypt (or the vault artifact to restore) does not exist
    /// or is not a readable regular file.
    SourceNotFound,
    /// The vault or key directory could not be created, or an artifact could
    /// not be fully written.
    StorageUnavailable,
    /// The AEAD engine refused its inputs (wrong key or nonce length).
    CryptoEngine,
    /// The authentication tag did not verify: wrong key, tampering or corruption.
    AuthenticationFailed,
    /// A container or key artifact does not have the expected binary layout.
    MalformedContainer,
    /// Artifacts were persisted, but the plaintext original could not be removed.
    CleanupFailed,
    /// The operating system entropy source could not be used.
    RandomSourceUnavailable,
    /// Anything not covered by the other kinds.
    Unclassified,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct VaultError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag. Consumers MUST handle the absence
    /// of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl VaultError {
    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Returns true if this error is tagged with `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Renders the message followed by every source in the chain, separated
    /// by `: `, suitable for a single log line.
    pub fn chain(&self) -> String {
        let mut out = self.msg.clone();
        let mut next: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_context_preserves_kind_and_category() {
        let err = VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::SourceNotFound,
            "no such file",
        )
        .with_context("validation failed");

        assert_eq!(err.kind, Some(ErrorKind::SourceNotFound));
        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(err.message(), "validation failed");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("no such file".to_string())
        );
    }

    #[test]
    fn test_chain_includes_every_source() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = VaultError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::StorageUnavailable,
            "failed to create vault directory",
            io_err,
        )
        .with_context("setup failed");

        assert_eq!(
            err.chain(),
            "setup failed: failed to create vault directory: denied"
        );
    }

    #[test]
    fn test_is() {
        let err = VaultError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::CleanupFailed,
            "original not deleted",
        );
        assert!(err.is(ErrorKind::CleanupFailed));
        assert!(!err.is(ErrorKind::Unclassified));
    }
}
