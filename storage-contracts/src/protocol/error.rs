// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result codes reported by every service operation.
///
/// The numeric values are part of the wire protocol and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum StorageErrorKind {
    Ok = 0,
    Error = 1,
    AlreadyExists = 2,
    Busy = 3,
    IoError = 4,
    InternalError = 5,
    NotFound = 6,
    PoolNotFound = 7,
    FilesystemNotFound = 8,
    DevNotFound = 9,
    BadParam = 10,
    EmptyDeviceSet = 11,
    DuplicateDevice = 12,
    DevInUse = 13,
}

impl StorageErrorKind {
    pub const ALL: [StorageErrorKind; 14] = [
        Self::Ok,
        Self::Error,
        Self::AlreadyExists,
        Self::Busy,
        Self::IoError,
        Self::InternalError,
        Self::NotFound,
        Self::PoolNotFound,
        Self::FilesystemNotFound,
        Self::DevNotFound,
        Self::BadParam,
        Self::EmptyDeviceSet,
        Self::DuplicateDevice,
        Self::DevInUse,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Busy => "BUSY",
            Self::IoError => "IO_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotFound => "NOTFOUND",
            Self::PoolNotFound => "POOL_NOTFOUND",
            Self::FilesystemNotFound => "FILESYSTEM_NOTFOUND",
            Self::DevNotFound => "DEV_NOTFOUND",
            Self::BadParam => "BAD_PARAM",
            Self::EmptyDeviceSet => "EMPTY_DEVICE_SET",
            Self::DuplicateDevice => "DUPLICATE_DEVICE",
            Self::DevInUse => "DEV_IN_USE",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Error => "A general error happened",
            Self::AlreadyExists => "Already exists",
            Self::Busy => "Operation can not be performed at this time",
            Self::IoError => "I/O error",
            Self::InternalError => "Internal error",
            Self::NotFound => "Not found",
            Self::PoolNotFound => "Pool not found",
            Self::FilesystemNotFound => "Filesystem not found",
            Self::DevNotFound => "Device not found",
            Self::BadParam => "Bad parameter",
            Self::EmptyDeviceSet => "No devices given and creation was not forced",
            Self::DuplicateDevice => "Device listed more than once",
            Self::DevInUse => "Device already belongs to a pool",
        }
    }

    /// `(name, code, description)` for every kind, in code order.
    pub fn table() -> Vec<(String, u16, String)> {
        Self::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind.name().to_string(),
                    kind.code(),
                    kind.description().to_string(),
                )
            })
            .collect()
    }
}

/// Failure reported across the lower-layer contract.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}: {message}", kind.name())]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::IoError, message)
    }
}
