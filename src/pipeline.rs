//! Seal and restore pipelines
//!
//! Sealing moves one plaintext file into the vault: validate the source,
//! make sure the destination directories exist, encrypt under a fresh key
//! and nonce, persist the container and the key, then delete the original.
//! The original is only deleted once both artifacts are on disk.

use crate::aead::{self, Nonce, VaultKey};
use crate::config::VaultConfig;
use crate::container::Container;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::random::RandomSource;
use crate::store;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Where a seal run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Validating,
    DirectoryReady,
    Encrypting,
    Persisting,
    Finalizing,
    Done,
    Failed(ErrorKind),
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }
}

/// What a successful seal produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealReport {
    pub container_path: PathBuf,
    pub key_path: PathBuf,
    pub plaintext_len: usize,
    /// False when the configuration asked to keep the original.
    pub source_removed: bool,
}

/// One seal of one source file.
pub struct Sealer<'a> {
    source: PathBuf,
    config: &'a VaultConfig,
    rng: &'a mut dyn RandomSource,
    remove_source: fn(&Path) -> io::Result<()>,
    stage: Stage,
}

impl<'a> Sealer<'a> {
    pub fn new(
        source: impl Into<PathBuf>,
        config: &'a VaultConfig,
        rng: &'a mut dyn RandomSource,
    ) -> Self {
        Self {
            source: source.into(),
            config,
            rng,
            remove_source: remove_file,
            stage: Stage::Idle,
        }
    }

    /// Replace how the original is deleted once both artifacts are written.
    pub fn with_source_remover(mut self, remove: fn(&Path) -> io::Result<()>) -> Self {
        self.remove_source = remove;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Drive the run to a terminal stage.
    ///
    /// A `CleanupFailed` error means both artifacts were persisted and the
    /// sealed data is usable; only the deletion of the original failed.
    pub fn run(&mut self) -> Result<SealReport> {
        if self.stage != Stage::Idle {
            return Err(VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Unclassified,
                format!("seal already ran (stage {:?})", self.stage),
            ));
        }
        let result = self.seal();
        match &result {
            Ok(_) => self.advance(Stage::Done),
            Err(e) => self.advance(Stage::Failed(e.kind.unwrap_or(ErrorKind::Unclassified))),
        }
        result
    }

    fn advance(&mut self, next: Stage) {
        debug!("seal {}: {:?} -> {:?}", self.source.display(), self.stage, next);
        self.stage = next;
    }

    fn seal(&mut self) -> Result<SealReport> {
        self.advance(Stage::Validating);
        let (name, source_file) = self.validate()?;

        self.advance(Stage::DirectoryReady);
        let vault_dir = store::ensure_vault_directory(&self.config.vault_dir)?;
        let key_dir = match &self.config.key_dir {
            Some(dir) => store::ensure_vault_directory(dir)?,
            None => vault_dir.clone(),
        };

        self.advance(Stage::Encrypting);
        info!("Encrypting {}...", name.to_string_lossy());
        let plaintext = read_plaintext(source_file, &self.source)?;
        let key = VaultKey::generate(self.rng)?;
        let nonce = Nonce::generate(self.rng)?;
        let (ciphertext, tag) = aead::encrypt(key.as_bytes(), nonce.as_bytes(), &plaintext)?;
        let sealed = Container::new(nonce, tag, ciphertext).to_bytes();

        self.advance(Stage::Persisting);
        let container_path = store::write_container(&vault_dir, &name, &sealed)?;
        let key_path = match store::write_key(&key_dir, &name, key.as_bytes()) {
            Ok(path) => path,
            Err(e) => return Err(roll_back(&container_path, e)),
        };
        drop(key);
        info!("Success! Encrypted file saved to: {}", container_path.display());
        info!("Key saved to: {} (Keep this safe!)", key_path.display());

        self.advance(Stage::Finalizing);
        let source_removed = if self.config.retain_source {
            info!("Original file kept: {}", self.source.display());
            false
        } else {
            (self.remove_source)(&self.source).map_err(|e| {
                VaultError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::CleanupFailed,
                    format!(
                        "file encrypted to {}, but original {} was not deleted",
                        container_path.display(),
                        self.source.display()
                    ),
                    e,
                )
            })?;
            info!("Original file deleted: {}", self.source.display());
            true
        };

        Ok(SealReport {
            container_path,
            key_path,
            plaintext_len: plaintext.len(),
            source_removed,
        })
    }

    fn validate(&self) -> Result<(OsString, File)> {
        let not_found = |e: io::Error| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::SourceNotFound,
                format!("File not found: {}", self.source.display()),
                e,
            )
        };

        let metadata = fs::metadata(&self.source).map_err(not_found)?;
        if !metadata.is_file() {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::SourceNotFound,
                format!("{} is not a regular file", self.source.display()),
            ));
        }
        let name = store::artifact_name(&self.source)?;
        let file = File::open(&self.source).map_err(not_found)?;
        Ok((name, file))
    }
}

/// Seal `source` into the vault described by `config`.
pub fn seal_file(
    source: &Path,
    config: &VaultConfig,
    rng: &mut dyn RandomSource,
) -> Result<SealReport> {
    Sealer::new(source, config, rng).run()
}

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

fn read_plaintext(mut file: File, path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let mut plaintext = Zeroizing::new(Vec::new());
    file.read_to_end(&mut plaintext).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::SourceNotFound,
            format!("failed to read from {}", path.display()),
            e,
        )
    })?;
    Ok(plaintext)
}

/// Remove a container whose key could not be written, so that no
/// ciphertext is left without its key.
fn roll_back(container_path: &Path, cause: VaultError) -> VaultError {
    match store::remove_artifact(container_path) {
        Ok(()) => cause.with_context(format!(
            "key could not be saved; removed {}",
            container_path.display()
        )),
        Err(_) => cause.with_context(format!(
            "key could not be saved; {} is left without its key",
            container_path.display()
        )),
    }
}

/// What a successful restore produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub output_path: PathBuf,
    pub plaintext_len: usize,
}

/// Decrypt the vault entry `name` into `output`.
///
/// The vault artifacts are left untouched.
pub fn restore(name: &OsStr, config: &VaultConfig, output: &Path) -> Result<RestoreReport> {
    store::check_entry_name(name)?;
    let bytes = store::read_container(&config.vault_dir, name)?;
    let key_bytes = store::read_key(config.key_dir(), name)?;
    let key = VaultKey::from_slice(&key_bytes)
        .map_err(|e| e.with_context(format!("invalid key for {}", name.to_string_lossy())))?;
    let sealed = Container::from_bytes(&bytes)
        .map_err(|e| e.with_context(format!("invalid container for {}", name.to_string_lossy())))?;

    let plaintext = aead::decrypt(
        key.as_bytes(),
        sealed.nonce.as_bytes(),
        &sealed.ciphertext,
        sealed.tag.as_bytes(),
    )
    .map_err(|e| e.with_context(format!("failed to decrypt {}", name.to_string_lossy())))?;

    store::write_file_secure(output, &plaintext)?;
    info!(
        "Restored {} to: {}",
        name.to_string_lossy(),
        output.display()
    );

    Ok(RestoreReport {
        output_path: output.to_path_buf(),
        plaintext_len: plaintext.len(),
    })
}
