//! Backup orchestration for Safekeep.
//!
//! Ties the local snapshot store and the remote mirror together:
//! - [`StateProvider`]: how the application's state is read and written back
//! - [`BackupContext`]: one backup cycle, manual backups and restores, all
//!   behind a single in-flight guard
//! - [`BackupScheduler`]: runs cycles on a fixed interval

mod config;
mod context;
mod error;
mod provider;
mod scheduler;

pub use config::BackupConfig;
pub use context::{BackupContext, BackupStatus, CycleOutcome, CycleReport, RemoteOutcome};
pub use error::{BackupError, BackupResult};
pub use provider::{KvSectionProvider, SectionKind, StateProvider};
pub use scheduler::BackupScheduler;

/// Installs a stderr `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`). Later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
