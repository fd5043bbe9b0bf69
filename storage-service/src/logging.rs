// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::{Result, ServiceError};

const DEFAULT_LOG_FILE: &str = "storage-poold.log";

/// Filter used when `RUST_LOG` is unset.
pub fn default_directives(level: &str) -> String {
    format!("storage_service={level},storage_engine={level},warn")
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live as long as
/// the daemon does.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(config.level.trim()))
            .map_err(|e| ServiceError::Logging(format!("bad level '{}': {e}", config.level)))?,
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let Some(file) = config.file.as_deref() else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .try_init()
            .map_err(|e| ServiceError::Logging(e.to_string()))?;
        return Ok(None);
    };

    let (writer, guard) = file_writer(file)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ServiceError::Logging(e.to_string()))?;
    Ok(Some(guard))
}

fn file_writer(file: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = file
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(DEFAULT_LOG_FILE));

    fs::create_dir_all(dir).map_err(|e| {
        ServiceError::Logging(format!("create log directory {} failed: {e}", dir.display()))
    })?;

    let appender = tracing_appender::rolling::never(dir, name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_both_crates() {
        let directives = default_directives("debug");
        assert_eq!(directives, "storage_service=debug,storage_engine=debug,warn");
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
