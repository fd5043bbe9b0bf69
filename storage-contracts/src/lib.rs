// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{PROTOCOL_MAJOR, StorageError, StorageErrorKind};
pub use traits::{PoolOpsAdapter, PoolSetup};
