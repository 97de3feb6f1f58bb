//! Actovault - single-file at-rest encryption with AES-256-GCM
//!
//! A source file is encrypted under a fresh random key, stored as a
//! `<name>.enc` container next to a `<name>.key` artifact, and the
//! plaintext original is removed.

#![forbid(unsafe_code)]

pub mod aead;
pub mod config;
pub mod container;
pub mod error;
pub mod pipeline;
pub mod random;
pub mod selftest;
pub mod store;

pub use config::VaultConfig;
pub use error::{ErrorCategory, ErrorKind, Result, VaultError};
pub use pipeline::{RestoreReport, SealReport, Sealer, Stage, restore, seal_file};
