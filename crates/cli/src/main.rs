//! `serac` command-line entry point (§6, §7).
//!
//! Thin dispatch layer: parses arguments, wires up logging and the
//! config-file lock, then hands off to `serac-core`. All the actual
//! archive/restore logic lives there; this binary only knows how to read a
//! config, pick a storage backend, and map a `Result` to a process exit
//! code.

mod error;
mod lock;
mod reporter;
mod timestamp;

use crate::error::{ErrorKind, Result};
use crate::lock::ConfigLock;
use crate::reporter::StdoutReporter;
use clap::{Parser, Subcommand};
use exn::ResultExt;
use serac_config::{Backend, Config};
use serac_core::{NullReporter, Reporter};
use serac_index::{Database, Repository};
use serac_storage::StorageBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Incremental, point-in-time encrypted file archiver.
#[derive(Debug, Parser)]
#[command(name = "serac", version)]
struct Cli {
    /// Path to the config file describing what to archive and where.
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Checks that the config file parses and the storage backend is reachable.
    Test,
    /// Creates a new, empty index database at the path named in the config.
    Init,
    /// Scans the configured source paths and archives whatever has changed.
    Archive {
        #[arg(short, long)]
        verbose: bool,
    },
    /// Lists the files live at a point in time.
    Ls {
        /// A POSIX timestamp or date; defaults to now.
        #[arg(long)]
        at: Option<String>,
        /// Restrict to a path or its subtree.
        pattern: Option<String>,
    },
    /// Restores the files live at a point in time into a destination directory.
    Restore {
        destination: PathBuf,
        /// A POSIX timestamp or date; defaults to now.
        #[arg(long)]
        at: Option<String>,
        /// Restrict to a path or its subtree.
        pattern: Option<String>,
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = matches!(
        &cli.command,
        Command::Archive { verbose: true } | Command::Restore { verbose: true, .. }
    );
    init_tracing(verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(_) => return ExitCode::from(1),
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("serac: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "serac=debug,serac_core=debug" } else { "serac=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
}

async fn run(cli: Cli) -> std::result::Result<(), crate::error::Error> {
    // `init` creates the database the lock file itself assumes exists, so it
    // runs before the lock is acquired.
    if matches!(cli.command, Command::Init) {
        let config = error::from_config(Config::load(&cli.config))?;
        return run_init(&config).await;
    }

    let _lock = ConfigLock::acquire(&cli.config)?;
    let config = error::from_config(Config::load(&cli.config))?;

    match cli.command {
        Command::Init => unreachable!("handled above"),
        Command::Test => run_test(&config).await,
        Command::Archive { verbose } => run_archive(&config, verbose).await,
        Command::Ls { at, pattern } => run_ls(&config, at, pattern).await,
        Command::Restore { destination, at, pattern, verbose } => {
            run_restore(&config, destination, at, pattern, verbose).await
        }
    }
}

async fn run_init(config: &Config) -> Result<()> {
    if tokio::fs::try_exists(&config.index.path).await.or_raise(|| ErrorKind::Io)? {
        exn::bail!(ErrorKind::AlreadyExists(config.index.path.clone()));
    }
    let db = Database::create(&config.index.path).await;
    error::from_index(db)?.disconnect().await;
    Ok(())
}

async fn run_test(_config: &Config) -> Result<()> {
    // Reaching this point means `Config::load` above already succeeded.
    println!("config file syntax is correct");
    Ok(())
}

async fn run_archive(config: &Config, verbose: bool) -> Result<()> {
    let db = error::from_index(Database::connect(&config.index.path).await)?;
    let repo = Repository::from(&db);
    let storage = build_storage(&config.archive.backend)?;

    let now = current_timestamp()?;
    let changeset = error::from_core(serac_core::scan(&repo, &config.source.include, &config.source.exclude, now).await)?;

    if changeset.is_empty() {
        db.disconnect().await;
        println!("nothing to archive");
        return Ok(());
    }

    let reporter: Box<dyn Reporter> = if verbose { Box::new(StdoutReporter::new()) } else { Box::new(NullReporter) };
    let report = error::from_core(changeset.commit(storage.as_ref(), &repo, &config.archive, reporter.as_ref()).await)?;
    db.disconnect().await;

    if report.has_failures() {
        for (path, message) in report.failures() {
            eprintln!("serac: failed to archive {}: {message}", path.display());
        }
    }
    Ok(())
}

async fn run_ls(config: &Config, at: Option<String>, pattern: Option<String>) -> Result<()> {
    let db = error::from_index(Database::connect(&config.index.path).await)?;
    let repo = Repository::from(&db);
    let timestamp = resolve_timestamp(at)?;
    let pattern = serac_core::Pattern::new(pattern);
    let state = error::from_core(serac_core::search(&repo, timestamp, &pattern).await)?;

    for (path, file) in state.iter() {
        let size = file.archived.as_ref().map(|a| a.size).unwrap_or(0);
        println!("{:o} {:>6} {:>10} {}", file.permissions, file.owner, size, path.display());
    }
    let found = state.len();
    db.disconnect().await;

    if found == 0 {
        exn::bail!(ErrorKind::Core(serac_core::ErrorKind::NotFound));
    }
    Ok(())
}

async fn run_restore(
    config: &Config,
    destination: PathBuf,
    at: Option<String>,
    pattern: Option<String>,
    verbose: bool,
) -> Result<()> {
    let db = error::from_index(Database::connect(&config.index.path).await)?;
    let repo = Repository::from(&db);
    let storage = build_storage(&config.archive.backend)?;
    let timestamp = resolve_timestamp(at)?;
    let pattern = serac_core::Pattern::new(pattern);

    let report = error::from_core(
        serac_core::restore(&repo, storage.as_ref(), &config.archive.password, timestamp, &destination, &pattern).await,
    )?;
    db.disconnect().await;

    if verbose {
        println!("restored {} file(s)", report.0.len());
    }
    for (path, outcome) in &report.0 {
        if let serac_core::RestoreOutcome::Failed(message) = outcome {
            eprintln!("serac: failed to restore {}: {message}", path.display());
        }
    }
    Ok(())
}

fn build_storage(backend: &Backend) -> Result<Box<dyn StorageBackend>> {
    match backend {
        Backend::Local { path } => {
            let backend = error::from_storage(serac_storage::backend::LocalBackend::new(path.clone()))?;
            Ok(Box::new(backend))
        }
        #[cfg(feature = "s3")]
        Backend::S3 { key, secret, bucket, path } => {
            let prefix = if path.is_empty() { None } else { Some(path.clone()) };
            // Region is not a separate config key; `path` carries the prefix
            // and the default region is read from the environment the way
            // the AWS SDK normally resolves it.
            let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            let backend = serac_storage::backend::S3Backend::new(bucket.clone(), region, key.clone(), secret.clone(), prefix);
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "s3"))]
        Backend::S3 { .. } => {
            exn::bail!(ErrorKind::Core(serac_core::ErrorKind::Io));
        }
    }
}

fn current_timestamp() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .or_raise(|| ErrorKind::Io)?
        .as_secs() as i64)
}

fn resolve_timestamp(at: Option<String>) -> Result<i64> {
    match at {
        Some(input) => timestamp::parse_timestamp(&input),
        None => current_timestamp(),
    }
}
