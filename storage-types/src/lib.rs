// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the storage pool service
//!
//! These types are shared by every layer of the stack:
//!
//! - **storage-engine**: owns live pools and filesystems and reports them as
//!   [`PoolInfo`] / [`FilesystemInfo`] snapshots
//! - **storage-service**: marshals these types onto the D-Bus surface
//!
//! ## Identity
//!
//! Entities carry two identities. The *name* is what callers create things by
//! and is unique within its scope (all pools, or one pool's filesystems). The
//! [`Identifier`] is assigned at creation, never reused, and is what callers
//! destroy things by.

pub mod filesystem;
pub mod id;
pub mod objects;
pub mod pool;

pub use filesystem::{FilesystemInfo, FilesystemSpec};
pub use id::Identifier;
pub use objects::ManagedObjects;
pub use pool::{PoolInfo, Redundancy};
