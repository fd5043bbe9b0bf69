// SPDX-License-Identifier: GPL-3.0-only

//! Lifecycle core for storage pools and their filesystems
//!
//! The [`Engine`] is the single owned state object of the daemon. It holds the
//! pool registry, hands each pool its own filesystem registry, assigns
//! identifiers, and calls the lower layer ([`PoolOpsAdapter`]) before
//! committing any change.
//!
//! ```text
//! Engine
//! ├── RwLock<PoolRegistry>      name → id, id → pool, device → owner
//! │   └── Pool
//! │       └── Mutex<PoolState>  devices + FilesystemRegistry
//! └── Arc<dyn PoolOpsAdapter>   device I/O, thin provisioning
//! ```
//!
//! [`PoolOpsAdapter`]: storage_contracts::PoolOpsAdapter

pub mod devices;
pub mod engine;
pub mod error;
pub mod filesystem;
pub mod ids;
pub mod names;
pub mod pool;
pub mod sim;

pub use devices::DeviceSet;
pub use engine::{CreatedPool, Engine};
pub use error::{EngineError, Result};
pub use filesystem::{Filesystem, FilesystemRegistry};
pub use ids::IdAllocator;
pub use pool::{Pool, PoolRef, PoolRegistry, PoolState};
pub use sim::SimBackend;

// Re-export shared models
pub use storage_types::{
    FilesystemInfo, FilesystemSpec, Identifier, ManagedObjects, PoolInfo, Redundancy,
};
