//! Vault directory and artifact files
//!
//! Each sealed source produces `<name>.enc` in the vault directory and
//! `<name>.key` in the key directory (the vault directory unless configured
//! otherwise). `<name>` is the base name of the source, so sealing two
//! same-named files from different directories overwrites the first pair.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Extension appended to the source name for containers.
pub const CONTAINER_EXT: &str = "enc";

/// Extension appended to the source name for key artifacts.
pub const KEY_EXT: &str = "key";

/// Create `path` (and parents) if absent and return its absolute form.
///
/// Calling this on an existing directory is a no-op.
pub fn ensure_vault_directory(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        fs::create_dir_all(path).map_err(|e| {
            storage_error(format!("failed to create directory {}", path.display()), e)
        })?;
        info!("Created vault directory at: {}", path.display());
    }
    fs::canonicalize(path)
        .map_err(|e| storage_error(format!("failed to resolve {}", path.display()), e))
}

/// The artifact base name for `source`: its final path component.
pub fn artifact_name(source: &Path) -> Result<OsString> {
    source
        .file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::SourceNotFound,
                format!("{} does not name a file", source.display()),
            )
        })
}

/// Reject entry names that are not a single plain file name, so lookups
/// cannot leave the vault or key directory.
pub fn check_entry_name(name: &OsStr) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(single)), None) if single == name => Ok(()),
        _ => Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::SourceNotFound,
            format!("{:?} is not a vault entry name", name),
        )),
    }
}

pub fn container_path(dir: &Path, name: &OsStr) -> PathBuf {
    with_extension_appended(dir, name, CONTAINER_EXT)
}

pub fn key_path(dir: &Path, name: &OsStr) -> PathBuf {
    with_extension_appended(dir, name, KEY_EXT)
}

fn with_extension_appended(dir: &Path, name: &OsStr, ext: &str) -> PathBuf {
    let mut file_name = name.to_os_string();
    file_name.push(".");
    file_name.push(ext);
    dir.join(file_name)
}

/// Write (or replace) `dir/<name>.enc` with `bytes`.
pub fn write_container(dir: &Path, name: &OsStr, bytes: &[u8]) -> Result<PathBuf> {
    let path = container_path(dir, name);
    write_atomic(&path, bytes)?;
    Ok(path)
}

/// Write (or replace) `dir/<name>.key` with the raw key bytes.
pub fn write_key(dir: &Path, name: &OsStr, key: &[u8]) -> Result<PathBuf> {
    let path = key_path(dir, name);
    write_atomic(&path, key)?;
    Ok(path)
}

pub fn read_container(dir: &Path, name: &OsStr) -> Result<Vec<u8>> {
    let path = container_path(dir, name);
    fs::read(&path).map_err(|e| read_error(&path, e))
}

pub fn read_key(dir: &Path, name: &OsStr) -> Result<Zeroizing<Vec<u8>>> {
    let path = key_path(dir, name);
    fs::read(&path)
        .map(Zeroizing::new)
        .map_err(|e| read_error(&path, e))
}

/// Remove an artifact written earlier in the same run.
pub fn remove_artifact(path: &Path) -> Result<()> {
    fs::remove_file(path)
        .map_err(|e| storage_error(format!("failed to remove {}", path.display()), e))?;
    debug!("removed {}", path.display());
    Ok(())
}

/// Write `contents` to `path` such that `path` either keeps its old content
/// or holds all of `contents`, never a prefix.
///
/// The data goes to a temporary file in the same directory, is flushed and
/// fsync'd, restricted to mode 0o600 on Unix, then renamed over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::StorageUnavailable,
            format!("{} has no parent directory", path.display()),
        )
    })?;
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| storage_error("failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| storage_error("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a complete file.
    temp_file
        .flush()
        .map_err(|e| storage_error("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| storage_error("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| storage_error("failed to get tempfile metadata", e))?
            .permissions();
        perms.set_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|e| storage_error("failed to set tempfile permissions", e))?;
    }

    temp_file.persist(path).map_err(|e| {
        storage_error(
            format!("failed to rename to target file {}", path.display()),
            e.error,
        )
    })?;
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
pub fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| storage_error(format!("failed to open {}", path.display()), e))?;

        file.write_all(contents)
            .map_err(|e| storage_error(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)
            .map_err(|e| storage_error(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }
}

fn storage_error(msg: impl Into<String>, err: io::Error) -> VaultError {
    let category = if err.kind() == io::ErrorKind::PermissionDenied {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    VaultError::with_kind_and_source(category, ErrorKind::StorageUnavailable, msg, err)
}

fn read_error(path: &Path, err: io::Error) -> VaultError {
    if err.kind() == io::ErrorKind::NotFound {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::SourceNotFound,
            format!("{} not found", path.display()),
            err,
        )
    } else {
        storage_error(format!("failed to read from {}", path.display()), err)
    }
}
