//! Vault configuration

use std::env;
use std::path::{Path, PathBuf};

/// Directory name used when no vault directory is given.
pub const DEFAULT_VAULT_DIR_NAME: &str = "vault_storage";

/// Where artifacts go and what happens to the source afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Destination of `.enc` containers.
    pub vault_dir: PathBuf,
    /// Destination of `.key` artifacts. `None` stores keys next to the
    /// containers.
    pub key_dir: Option<PathBuf>,
    /// Keep the plaintext original after a successful seal.
    pub retain_source: bool,
}

impl VaultConfig {
    pub fn new(vault_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
            key_dir: None,
            retain_source: false,
        }
    }

    pub fn with_key_dir(mut self, key_dir: impl Into<PathBuf>) -> Self {
        self.key_dir = Some(key_dir.into());
        self
    }

    pub fn retaining_source(mut self, retain: bool) -> Self {
        self.retain_source = retain;
        self
    }

    /// Directory that receives key artifacts.
    pub fn key_dir(&self) -> &Path {
        self.key_dir.as_deref().unwrap_or(&self.vault_dir)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::new(default_vault_dir())
    }
}

/// `vault_storage` next to the running executable, falling back to the
/// current directory when the executable location is unknown.
pub fn default_vault_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_VAULT_DIR_NAME)
}
