// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod version;

pub use error::{StorageError, StorageErrorKind};
pub use version::{PROTOCOL_MAJOR, major_component};
