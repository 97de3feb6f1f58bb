//! Actovault CLI - move a file into the encrypted vault
//!
//! `actovault <FILE>` encrypts FILE into the vault and deletes the original.
//! `actovault --test` runs the built-in self-test.
//! `actovault --restore <NAME> -o <FILE>` decrypts a vault entry.

use clap::{CommandFactory, Parser};
use std::any::Any;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info};

use actovault::config::{VaultConfig, default_vault_dir};
use actovault::random::OsRandomSource;
use actovault::{ErrorKind, pipeline, selftest};

/// Sealed, self-test passed, or nothing asked of us.
const EXIT_OK: i32 = 0;
/// Nothing was sealed (or restored, or the self-test failed).
const EXIT_FAILURE: i32 = 1;
/// Artifacts were written but the original could not be deleted.
const EXIT_CLEANUP_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "actovault")]
#[command(version)]
#[command(about = "Encrypt a file into the vault and remove the original.", long_about = None)]
struct Cli {
    /// Path to the file to encrypt
    #[arg(value_name = "FILE", conflicts_with_all = ["test", "restore"])]
    file: Option<PathBuf>,

    /// Run the built-in encryption self-test and exit
    #[arg(long, conflicts_with = "restore")]
    test: bool,

    /// Decrypt the vault entry with this name (the original file name)
    #[arg(long, value_name = "NAME", requires = "output")]
    restore: Option<OsString>,

    /// Where to write the restored plaintext
    #[arg(short, long, value_name = "FILE", requires = "restore")]
    output: Option<PathBuf>,

    /// Directory holding encrypted containers [default: vault_storage next to the executable]
    #[arg(long, value_name = "DIR")]
    vault_dir: Option<PathBuf>,

    /// Directory holding keys, if they should not live next to the containers
    #[arg(long, value_name = "DIR")]
    key_dir: Option<PathBuf>,

    /// Do not delete the original after encrypting it
    #[arg(long)]
    keep_source: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn vault_config(&self) -> VaultConfig {
        let mut config = VaultConfig::new(self.vault_dir.clone().unwrap_or_else(default_vault_dir))
            .retaining_source(self.keep_source);
        if let Some(dir) = &self.key_dir {
            config = config.with_key_dir(dir);
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    install_panic_hook();

    // The hook has already logged the panic by the time it is caught here.
    let code = panic::catch_unwind(AssertUnwindSafe(|| run(cli))).unwrap_or(EXIT_FAILURE);
    process::exit(code);
}

/// Report panics as one ERROR line instead of the default multi-line message.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!(" at {}:{}", l.file(), l.line()))
            .unwrap_or_default();
        error!(
            "Critical Failure: {}{}",
            panic_message(info.payload()).replace('\n', " "),
            location
        );
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unclassified failure"
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(io::stdout().is_terminal())
        .init();
}

fn run(cli: Cli) -> i32 {
    let config = cli.vault_config();

    if cli.test {
        return run_self_test();
    }

    if let (Some(name), Some(output)) = (&cli.restore, &cli.output) {
        return match pipeline::restore(name, &config, output) {
            Ok(_) => EXIT_OK,
            Err(e) => {
                error!("Restore failed: {}", e.chain());
                EXIT_FAILURE
            }
        };
    }

    let Some(file) = cli.file else {
        if let Err(e) = Cli::command().print_help() {
            error!("failed to print usage: {}", e);
        }
        return EXIT_OK;
    };

    let mut rng = OsRandomSource::new();
    match pipeline::seal_file(&file, &config, &mut rng) {
        Ok(_) => EXIT_OK,
        Err(e) if e.is(ErrorKind::CleanupFailed) => {
            error!("Encrypted, but original not deleted: {}", e.chain());
            EXIT_CLEANUP_FAILED
        }
        Err(e) => {
            error!("Encryption did not complete: {}", e.chain());
            EXIT_FAILURE
        }
    }
}

fn run_self_test() -> i32 {
    info!("Running self-test...");
    match selftest::run_self_test(&mut OsRandomSource::new()) {
        Ok(()) => {
            info!("All Tests Passed!");
            EXIT_OK
        }
        Err(e) => {
            error!("Test Failed: {}", e.chain());
            EXIT_FAILURE
        }
    }
}
