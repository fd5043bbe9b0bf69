// SPDX-License-Identifier: GPL-3.0-only

//! In-memory lower layer
//!
//! Stands in for device I/O and thin provisioning. Tracks which pools and
//! filesystems it has been asked to set up, and can be configured to fail
//! device additions at random with probability `1/denominator`. Pool and
//! filesystem lifecycle calls always succeed, so a configured denominator
//! never changes the outcome of creating or destroying either.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rand::Rng;
use storage_contracts::{PoolOpsAdapter, PoolSetup, StorageError, StorageErrorKind};
use storage_types::FilesystemSpec;
use uuid::Uuid;

#[derive(Debug, Default)]
struct SimPool {
    devices: Vec<PathBuf>,
    filesystems: HashSet<Uuid>,
}

#[derive(Debug, Default)]
pub struct SimBackend {
    denominator: AtomicU32,
    pools: Mutex<HashMap<Uuid, SimPool>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_denominator(denominator: u32) -> Self {
        let backend = Self::default();
        backend.configure(denominator);
        backend
    }

    /// Set the fault injection rate for device additions. `0` turns injection off.
    pub fn configure(&self, denominator: u32) {
        self.denominator.store(denominator, Ordering::Relaxed);
        tracing::info!("Simulator fault denominator set to {denominator}");
    }

    pub fn denominator(&self) -> u32 {
        self.denominator.load(Ordering::Relaxed)
    }

    pub fn pool_count(&self) -> usize {
        self.pools().map(|pools| pools.len()).unwrap_or(0)
    }

    pub fn filesystem_count(&self) -> usize {
        self.pools()
            .map(|pools| pools.values().map(|pool| pool.filesystems.len()).sum())
            .unwrap_or(0)
    }

    fn roll(&self, operation: &str) -> Result<(), StorageError> {
        let denominator = self.denominator();
        if denominator > 0 && rand::thread_rng().gen_ratio(1, denominator) {
            tracing::debug!("Simulator injecting failure into {operation}");
            return Err(StorageError::io(format!(
                "simulated failure during {operation}"
            )));
        }
        Ok(())
    }

    fn pools(&self) -> Result<MutexGuard<'_, HashMap<Uuid, SimPool>>, StorageError> {
        self.pools.lock().map_err(|_| {
            StorageError::new(StorageErrorKind::InternalError, "simulator state poisoned")
        })
    }
}

fn pool_missing(pool: Uuid) -> StorageError {
    StorageError::new(
        StorageErrorKind::PoolNotFound,
        format!("simulator has no pool {pool}"),
    )
}

#[async_trait]
impl PoolOpsAdapter for SimBackend {
    async fn setup_pool(&self, setup: &PoolSetup) -> Result<(), StorageError> {
        let mut pools = self.pools()?;
        if pools.contains_key(&setup.uuid) {
            return Err(StorageError::new(
                StorageErrorKind::AlreadyExists,
                format!("simulator already has pool {}", setup.uuid),
            ));
        }
        pools.insert(
            setup.uuid,
            SimPool {
                devices: setup.devices.clone(),
                filesystems: HashSet::new(),
            },
        );
        Ok(())
    }

    async fn teardown_pool(&self, pool: Uuid) -> Result<(), StorageError> {
        let mut pools = self.pools()?;
        let Some(entry) = pools.get(&pool) else {
            return Err(pool_missing(pool));
        };
        if !entry.filesystems.is_empty() {
            return Err(StorageError::new(
                StorageErrorKind::Busy,
                format!("simulator pool {pool} still has filesystems"),
            ));
        }
        if let Some(entry) = pools.remove(&pool) {
            tracing::debug!(
                "Simulator released {} device(s) of pool {pool}",
                entry.devices.len()
            );
        }
        Ok(())
    }

    async fn add_devices(&self, pool: Uuid, devices: &[PathBuf]) -> Result<(), StorageError> {
        self.roll("device add")?;
        let mut pools = self.pools()?;
        let entry = pools.get_mut(&pool).ok_or_else(|| pool_missing(pool))?;
        entry.devices.extend(devices.iter().cloned());
        Ok(())
    }

    async fn create_filesystem(
        &self,
        pool: Uuid,
        filesystem: Uuid,
        _spec: &FilesystemSpec,
    ) -> Result<(), StorageError> {
        let mut pools = self.pools()?;
        let entry = pools.get_mut(&pool).ok_or_else(|| pool_missing(pool))?;
        entry.filesystems.insert(filesystem);
        Ok(())
    }

    async fn destroy_filesystem(&self, pool: Uuid, filesystem: Uuid) -> Result<(), StorageError> {
        let mut pools = self.pools()?;
        let entry = pools.get_mut(&pool).ok_or_else(|| pool_missing(pool))?;
        entry.filesystems.remove(&filesystem);
        Ok(())
    }
}
