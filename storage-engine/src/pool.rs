// SPDX-License-Identifier: GPL-3.0-only

//! Pool registry
//!
//! Holds every live pool behind three indices that change together:
//! name → identifier, identifier → pool, and device → owning pool name.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use storage_types::{Identifier, PoolInfo, Redundancy};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::devices::DeviceSet;
use crate::error::{EngineError, Result};
use crate::filesystem::FilesystemRegistry;

/// How a caller names a pool: by its name or by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolRef {
    Name(String),
    Id(Identifier),
}

impl PoolRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn id(id: impl Into<Identifier>) -> Self {
        Self::Id(id.into())
    }
}

impl fmt::Display for PoolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => f.write_str(id.as_str()),
        }
    }
}

impl From<Identifier> for PoolRef {
    fn from(id: Identifier) -> Self {
        Self::Id(id)
    }
}

impl From<&Identifier> for PoolRef {
    fn from(id: &Identifier) -> Self {
        Self::Id(id.clone())
    }
}

/// Mutable part of a pool, guarded by the pool's own lock.
#[derive(Debug, Default)]
pub struct PoolState {
    pub devices: Vec<PathBuf>,
    pub filesystems: FilesystemRegistry,
}

/// A live pool. Name, identifier and UUID never change after creation.
#[derive(Debug)]
pub struct Pool {
    pub id: Identifier,
    pub uuid: Uuid,
    pub name: String,
    pub redundancy: Redundancy,
    pub created: DateTime<Utc>,
    pub state: Arc<Mutex<PoolState>>,
}

impl Pool {
    pub fn new(
        id: Identifier,
        uuid: Uuid,
        name: String,
        redundancy: Redundancy,
        devices: Vec<PathBuf>,
    ) -> Self {
        Self {
            id,
            uuid,
            name,
            redundancy,
            created: Utc::now(),
            state: Arc::new(Mutex::new(PoolState {
                devices,
                filesystems: FilesystemRegistry::default(),
            })),
        }
    }

    /// Build the public view from an already locked state.
    pub fn info(&self, state: &PoolState) -> PoolInfo {
        PoolInfo {
            id: self.id.clone(),
            uuid: self.uuid,
            name: self.name.clone(),
            redundancy: self.redundancy,
            devices: state
                .devices
                .iter()
                .map(|device| device.display().to_string())
                .collect(),
            filesystem_count: state.filesystems.len(),
            created: self.created,
        }
    }
}

#[derive(Debug, Default)]
pub struct PoolRegistry {
    by_name: BTreeMap<String, Identifier>,
    pools: HashMap<Identifier, Arc<Pool>>,
    device_owners: HashMap<PathBuf, String>,
}

impl PoolRegistry {
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn get(&self, id: &Identifier) -> Option<&Arc<Pool>> {
        self.pools.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<Pool>> {
        self.by_name.get(name).and_then(|id| self.pools.get(id))
    }

    /// Live pools in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Pool>> {
        self.by_name.values().filter_map(|id| self.pools.get(id))
    }

    pub fn resolve(&self, pool: &PoolRef) -> Result<Arc<Pool>> {
        let found = match pool {
            PoolRef::Name(name) => self.get_by_name(name),
            PoolRef::Id(id) => self.get(id),
        };
        found
            .cloned()
            .ok_or_else(|| EngineError::PoolNotFound(pool.to_string()))
    }

    pub fn ensure_name_free(&self, name: &str) -> Result<()> {
        if self.by_name.contains_key(name) {
            return Err(EngineError::PoolExists(name.to_string()));
        }
        Ok(())
    }

    pub fn owner_of(&self, device: &Path) -> Option<&str> {
        self.device_owners.get(device).map(String::as_str)
    }

    pub fn validate_devices(&self, requested: &[PathBuf], allow_empty: bool) -> Result<DeviceSet> {
        DeviceSet::validate(requested, allow_empty, |device| self.owner_of(device))
    }

    /// Register a new pool and record it as owner of `devices`.
    pub fn insert(&mut self, pool: Pool, devices: &[PathBuf]) -> Result<Arc<Pool>> {
        if self.pools.contains_key(&pool.id) {
            return Err(EngineError::Internal(format!(
                "identifier {} assigned twice",
                pool.id
            )));
        }
        self.ensure_name_free(&pool.name)?;

        let pool = Arc::new(pool);
        self.claim_devices(&pool.name, devices);
        self.by_name.insert(pool.name.clone(), pool.id.clone());
        self.pools.insert(pool.id.clone(), pool.clone());
        Ok(pool)
    }

    pub fn claim_devices(&mut self, pool_name: &str, devices: &[PathBuf]) {
        for device in devices {
            self.device_owners
                .insert(device.clone(), pool_name.to_string());
        }
    }

    /// Drop a pool from every index and release its devices.
    pub fn remove(&mut self, id: &Identifier, devices: &[PathBuf]) -> Option<Arc<Pool>> {
        let pool = self.pools.remove(id)?;
        self.by_name.remove(&pool.name);
        for device in devices {
            self.device_owners.remove(device);
        }
        Some(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(id: &str, name: &str) -> Pool {
        Pool::new(
            Identifier::from(id),
            Uuid::new_v4(),
            name.to_string(),
            Redundancy::None,
            Vec::new(),
        )
    }

    #[test]
    fn resolves_by_name_and_identifier() {
        let mut registry = PoolRegistry::default();
        let devices = vec![PathBuf::from("/dev/sda")];
        registry
            .insert(pool("/p/1", "deadpool"), &devices)
            .expect("insert");

        let by_name = registry.resolve(&PoolRef::name("deadpool")).expect("by name");
        let by_id = registry.resolve(&PoolRef::id("/p/1")).expect("by id");
        assert!(Arc::ptr_eq(&by_name, &by_id));

        let missing = registry.resolve(&PoolRef::name("livepool")).unwrap_err();
        assert_eq!(missing, EngineError::PoolNotFound("livepool".into()));
    }

    #[test]
    fn insert_refuses_taken_name() {
        let mut registry = PoolRegistry::default();
        registry.insert(pool("/p/1", "tank"), &[]).expect("insert");
        let error = registry.insert(pool("/p/2", "tank"), &[]).unwrap_err();
        assert_eq!(error, EngineError::PoolExists("tank".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn insert_refuses_reused_identifier() {
        let mut registry = PoolRegistry::default();
        registry.insert(pool("/p/1", "tank"), &[]).expect("insert");
        let error = registry.insert(pool("/p/1", "other"), &[]).unwrap_err();
        assert!(matches!(error, EngineError::Internal(_)));
    }

    #[test]
    fn remove_releases_devices() {
        let mut registry = PoolRegistry::default();
        let devices = vec![PathBuf::from("/dev/sda"), PathBuf::from("/dev/sdb")];
        registry.insert(pool("/p/1", "tank"), &devices).expect("insert");
        assert_eq!(registry.owner_of(Path::new("/dev/sdb")), Some("tank"));

        let error = registry.validate_devices(&devices[1..], false).unwrap_err();
        assert!(matches!(error, EngineError::DeviceInUse { .. }));

        registry.remove(&Identifier::from("/p/1"), &devices);
        assert!(registry.is_empty());
        assert!(registry.get_by_name("tank").is_none());
        assert!(registry.validate_devices(&devices, false).is_ok());
    }

    #[test]
    fn iterates_in_name_order() {
        let mut registry = PoolRegistry::default();
        registry.insert(pool("/p/1", "b"), &[]).expect("insert");
        registry.insert(pool("/p/2", "a"), &[]).expect("insert");
        let names: Vec<&str> = registry.iter().map(|pool| pool.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
