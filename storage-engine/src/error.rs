// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{StorageError, StorageErrorKind};
use thiserror::Error;

/// Outcome of a rejected lifecycle operation.
///
/// Every variant is detected before any registry mutation is committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Pool already exists: {0}")]
    PoolExists(String),

    #[error("Filesystem(s) already exist: {}", .0.join(", "))]
    FilesystemsExist(Vec<String>),

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Filesystem not found: {0}")]
    FilesystemNotFound(String),

    #[error("Pool {pool} still owns {count} filesystem(s)")]
    PoolBusy { pool: String, count: usize },

    #[error("Invalid {what} name '{name}': {reason}")]
    InvalidName {
        what: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("Unsupported redundancy value: {0}")]
    UnsupportedRedundancy(u16),

    #[error("No devices given and creation was not forced")]
    EmptyDeviceSet,

    #[error("Device listed more than once: {0}")]
    DuplicateDevice(String),

    #[error("Device {device} already belongs to pool {pool}")]
    DeviceInUse { device: String, pool: String },

    #[error("Device path must be absolute: {0}")]
    RelativeDevicePath(String),

    #[error(transparent)]
    Backend(#[from] StorageError),

    #[error("Internal inconsistency: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            Self::PoolExists(_) | Self::FilesystemsExist(_) => StorageErrorKind::AlreadyExists,
            Self::PoolNotFound(_) => StorageErrorKind::PoolNotFound,
            Self::FilesystemNotFound(_) => StorageErrorKind::FilesystemNotFound,
            Self::PoolBusy { .. } => StorageErrorKind::Busy,
            Self::InvalidName { .. }
            | Self::UnsupportedRedundancy(_)
            | Self::RelativeDevicePath(_) => StorageErrorKind::BadParam,
            Self::EmptyDeviceSet => StorageErrorKind::EmptyDeviceSet,
            Self::DuplicateDevice(_) => StorageErrorKind::DuplicateDevice,
            Self::DeviceInUse { .. } => StorageErrorKind::DevInUse,
            Self::Backend(error) => error.kind,
            Self::Internal(_) => StorageErrorKind::InternalError,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().code()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
