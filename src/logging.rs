//! Subscriber setup for the `instacam` binary

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::{InstacamError, Result};

/// Logger configuration
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Path to log file, stderr when `None`
    pub log_file: Option<PathBuf>,
    /// Record debug events
    pub verbose: bool,
}

impl LogConfig {
    fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }
}

/// Opens (appends to) the log file, creating parent directories as needed
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global subscriber. `RUST_LOG` overrides the level.
///
/// Stdout is left alone since the terminal surface draws on it.
pub fn init(config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level().into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match &config.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_thread_names(true),
                )
                .try_init()
        }
        None => registry
            .with(fmt::layer().with_writer(io::stderr).compact())
            .try_init(),
    };

    result.map_err(|e| InstacamError::Io(io::Error::other(e)))
}
