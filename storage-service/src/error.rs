// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use storage_contracts::StorageErrorKind;
use storage_engine::EngineError;
use thiserror::Error;
use zbus::fdo;

/// Service-specific errors
///
/// Engine outcomes never travel through this type; they are reported in-band
/// as a result code. These are startup and transport failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config value for {key}: {message}")]
    ConfigValue { key: &'static str, message: String },

    #[error("Invalid object path: {0}")]
    InvalidObjectPath(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("D-Bus error: {0}")]
    DBus(String),
}

impl From<ServiceError> for fdo::Error {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidObjectPath(msg) => fdo::Error::InvalidArgs(msg),
            _ => fdo::Error::Failed(err.to_string()),
        }
    }
}

impl From<zbus::Error> for ServiceError {
    fn from(err: zbus::Error) -> Self {
        ServiceError::DBus(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// `(rc, message)` pair carried by every method reply.
pub type Status = (u16, String);

pub fn ok_status() -> Status {
    let kind = StorageErrorKind::Ok;
    (kind.code(), kind.description().to_string())
}

/// Status for a refused engine operation, logged once at the boundary.
pub fn refused(operation: &str, err: &EngineError) -> Status {
    let kind = err.kind();
    match kind {
        StorageErrorKind::InternalError => tracing::error!("{operation} failed: {err}"),
        StorageErrorKind::IoError => tracing::warn!("{operation} failed: {err}"),
        _ => tracing::debug!("{operation} refused ({}): {err}", kind.name()),
    }
    (kind.code(), err.to_string())
}
