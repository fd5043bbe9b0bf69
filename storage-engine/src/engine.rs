// SPDX-License-Identifier: GPL-3.0-only

//! Lifecycle manager
//!
//! Entry points for every pool and filesystem operation. Locking follows one
//! rule: the pool registry lock is always taken before a pool's own lock.
//! Pool-level mutations hold the registry for writing; filesystem-level work
//! holds it only long enough to find and lock the pool, so batches on
//! different pools proceed in parallel. Pool teardown runs with the registry
//! write lock held, so it stalls filesystem work on every pool until the lower
//! layer returns.

use std::path::PathBuf;
use std::sync::Arc;

use storage_contracts::{PoolOpsAdapter, PoolSetup};
use storage_types::{
    FilesystemInfo, FilesystemSpec, Identifier, ManagedObjects, PoolInfo, Redundancy,
};
use tokio::sync::{OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::filesystem::Filesystem;
use crate::ids::IdAllocator;
use crate::names::validate_name;
use crate::pool::{Pool, PoolRef, PoolRegistry, PoolState};

/// Result of a successful pool creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPool {
    pub id: Identifier,
    pub created: bool,
}

pub struct Engine {
    registry: RwLock<PoolRegistry>,
    ids: IdAllocator,
    backend: Arc<dyn PoolOpsAdapter>,
}

impl Engine {
    pub fn new(object_root: &str, backend: Arc<dyn PoolOpsAdapter>) -> Self {
        Self {
            registry: RwLock::new(PoolRegistry::default()),
            ids: IdAllocator::new(object_root),
            backend,
        }
    }

    pub fn object_root(&self) -> &str {
        self.ids.root()
    }

    pub async fn create_pool(
        &self,
        name: &str,
        redundancy: u16,
        devices: &[PathBuf],
        force: bool,
    ) -> Result<CreatedPool> {
        validate_name("pool", name)?;

        let mut registry = self.registry.write().await;
        registry.ensure_name_free(name)?;
        let redundancy =
            Redundancy::try_from(redundancy).map_err(EngineError::UnsupportedRedundancy)?;
        let devices = registry.validate_devices(devices, force)?;

        let uuid = Uuid::new_v4();
        self.backend
            .setup_pool(&PoolSetup {
                uuid,
                name: name.to_string(),
                redundancy,
                devices: devices.paths().to_vec(),
            })
            .await?;

        let id = self.ids.next_id();
        let pool = Pool::new(
            id.clone(),
            uuid,
            name.to_string(),
            redundancy,
            devices.paths().to_vec(),
        );
        if let Err(error) = registry.insert(pool, devices.paths()) {
            tracing::error!("Failed to register pool {name}: {error}");
            if let Err(teardown) = self.backend.teardown_pool(uuid).await {
                tracing::warn!("Could not tear down unregistered pool {name}: {teardown}");
            }
            return Err(error);
        }

        tracing::info!(
            "Created pool {name} ({id}) with {} device(s)",
            devices.len()
        );
        Ok(CreatedPool { id, created: true })
    }

    /// Destroy the pool called `name`. Returns the identifier it had.
    pub async fn destroy_pool(&self, name: &str) -> Result<Identifier> {
        let mut registry = self.registry.write().await;
        let pool = registry
            .get_by_name(name)
            .cloned()
            .ok_or_else(|| EngineError::PoolNotFound(name.to_string()))?;

        let state = pool.state.lock().await;
        if !state.filesystems.is_empty() {
            return Err(EngineError::PoolBusy {
                pool: name.to_string(),
                count: state.filesystems.len(),
            });
        }

        self.backend.teardown_pool(pool.uuid).await?;
        registry.remove(&pool.id, &state.devices);

        tracing::info!("Destroyed pool {name} ({})", pool.id);
        Ok(pool.id.clone())
    }

    pub async fn get_pool_by_name(&self, name: &str) -> Result<Identifier> {
        let registry = self.registry.read().await;
        registry
            .get_by_name(name)
            .map(|pool| pool.id.clone())
            .ok_or_else(|| EngineError::PoolNotFound(name.to_string()))
    }

    pub async fn pool_info(&self, pool: &PoolRef) -> Result<PoolInfo> {
        let (pool, state) = self.lock_pool(pool).await?;
        Ok(pool.info(&state))
    }

    pub async fn list_pools(&self) -> Vec<PoolInfo> {
        let registry = self.registry.read().await;
        let mut pools = Vec::with_capacity(registry.len());
        for pool in registry.iter() {
            let state = pool.state.lock().await;
            pools.push(pool.info(&state));
        }
        pools
    }

    /// Create every filesystem named in `specs`, or none of them.
    ///
    /// Returns `(identifier, name)` for each created filesystem in request
    /// order, after dropping repeated names.
    pub async fn create_filesystems(
        &self,
        pool: &PoolRef,
        specs: &[FilesystemSpec],
    ) -> Result<Vec<(Identifier, String)>> {
        let (pool, mut state) = self.lock_pool(pool).await?;
        let planned = state.filesystems.plan_create(specs)?;
        if planned.is_empty() {
            return Ok(Vec::new());
        }

        let mut created: Vec<Filesystem> = Vec::with_capacity(planned.len());
        for spec in &planned {
            let fs = Filesystem::new(self.ids.next_id(), spec);
            if let Err(error) = self
                .backend
                .create_filesystem(pool.uuid, fs.uuid, spec)
                .await
            {
                tracing::warn!(
                    "Creating filesystem {} in pool {} failed: {error}",
                    spec.name,
                    pool.name
                );
                self.roll_back_filesystems(&pool, &created).await;
                return Err(error.into());
            }
            created.push(fs);
        }

        let result: Vec<(Identifier, String)> = created
            .iter()
            .map(|fs| (fs.id.clone(), fs.name.clone()))
            .collect();
        if let Err(error) = state.filesystems.commit_create(created.clone()) {
            tracing::error!("Failed to register filesystems in pool {}: {error}", pool.name);
            self.roll_back_filesystems(&pool, &created).await;
            return Err(error);
        }

        tracing::info!(
            "Created {} filesystem(s) in pool {}",
            result.len(),
            pool.name
        );
        Ok(result)
    }

    /// Destroy the live filesystems among `targets`; unknown targets are ignored.
    ///
    /// Returns the subsequence of `targets` that was actually destroyed.
    pub async fn destroy_filesystems(
        &self,
        pool: &PoolRef,
        targets: &[Identifier],
    ) -> Result<Vec<Identifier>> {
        let (pool, mut state) = self.lock_pool(pool).await?;
        let live: Vec<(Identifier, Uuid, String)> = state
            .filesystems
            .live_targets(targets)
            .into_iter()
            .map(|fs| (fs.id.clone(), fs.uuid, fs.name.clone()))
            .collect();

        let mut destroyed = Vec::with_capacity(live.len());
        for (id, uuid, name) in live {
            match self.backend.destroy_filesystem(pool.uuid, uuid).await {
                Ok(()) => destroyed.push(id),
                Err(error) => tracing::warn!(
                    "Filesystem {name} in pool {} could not be torn down, keeping it: {error}",
                    pool.name
                ),
            }
        }

        state.filesystems.remove(&destroyed);
        if !destroyed.is_empty() {
            tracing::info!(
                "Destroyed {} filesystem(s) in pool {}",
                destroyed.len(),
                pool.name
            );
        }
        Ok(destroyed)
    }

    pub async fn get_filesystem_by_name(&self, pool: &PoolRef, name: &str) -> Result<Identifier> {
        let (pool, state) = self.lock_pool(pool).await?;
        state
            .filesystems
            .get_by_name(name)
            .map(|fs| fs.id.clone())
            .ok_or_else(|| EngineError::FilesystemNotFound(format!("{}/{name}", pool.name)))
    }

    pub async fn filesystem_info(&self, id: &Identifier) -> Result<FilesystemInfo> {
        let registry = self.registry.read().await;
        for pool in registry.iter() {
            let state = pool.state.lock().await;
            if let Some(fs) = state.filesystems.get(id) {
                return Ok(fs.info(&pool.id));
            }
        }
        Err(EngineError::FilesystemNotFound(id.to_string()))
    }

    /// Rename a filesystem. Returns `false` when it already had `new_name`.
    pub async fn rename_filesystem(
        &self,
        pool: &PoolRef,
        id: &Identifier,
        new_name: &str,
    ) -> Result<bool> {
        let (pool, mut state) = self.lock_pool(pool).await?;
        let changed = state.filesystems.rename(id, new_name)?;
        if changed {
            tracing::info!("Renamed filesystem {id} in pool {} to {new_name}", pool.name);
        }
        Ok(changed)
    }

    /// Add block devices to a live pool, all or none.
    pub async fn add_devices(&self, pool: &PoolRef, devices: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut registry = self.registry.write().await;
        let pool = registry.resolve(pool)?;
        let mut state = pool.state.lock().await;

        let devices = registry.validate_devices(devices, true)?;
        if devices.is_empty() {
            return Ok(Vec::new());
        }

        self.backend.add_devices(pool.uuid, devices.paths()).await?;
        registry.claim_devices(&pool.name, devices.paths());
        state.devices.extend(devices.paths().iter().cloned());

        tracing::info!("Added {} device(s) to pool {}", devices.len(), pool.name);
        Ok(devices.into_paths())
    }

    /// Consistent snapshot of every live pool and filesystem.
    pub async fn managed_objects(&self) -> ManagedObjects {
        let registry = self.registry.read().await;
        let mut objects = ManagedObjects::default();
        for pool in registry.iter() {
            let state = pool.state.lock().await;
            objects.pools.push(pool.info(&state));
            objects
                .filesystems
                .extend(state.filesystems.iter().map(|fs| fs.info(&pool.id)));
        }
        objects
    }

    async fn lock_pool(&self, pool: &PoolRef) -> Result<(Arc<Pool>, OwnedMutexGuard<PoolState>)> {
        let registry = self.registry.read().await;
        let pool = registry.resolve(pool)?;
        let state = pool.state.clone().lock_owned().await;
        Ok((pool, state))
    }

    async fn roll_back_filesystems(&self, pool: &Pool, created: &[Filesystem]) {
        for fs in created.iter().rev() {
            if let Err(error) = self.backend.destroy_filesystem(pool.uuid, fs.uuid).await {
                tracing::warn!(
                    "Rolling back filesystem {} in pool {} failed: {error}",
                    fs.name,
                    pool.name
                );
            }
        }
    }
}
