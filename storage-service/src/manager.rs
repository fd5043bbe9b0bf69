// SPDX-License-Identifier: GPL-3.0-only

//! Manager interface at the object root.

use std::sync::Arc;

use storage_contracts::StorageErrorKind;
use storage_engine::Redundancy;
use zbus::zvariant::OwnedObjectPath;
use zbus::{fdo, interface};

use crate::service::PoolService;

pub const MANAGER_INTERFACE: &str = "org.storage.Pools1.Manager";

/// Service version string, `major.minor.patch`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn error_values() -> Vec<(String, u16, String)> {
    StorageErrorKind::table()
}

pub fn redundancy_values() -> Vec<(String, u16)> {
    Redundancy::ALL
        .into_iter()
        .map(|redundancy| (redundancy.as_str().to_string(), redundancy.value()))
        .collect()
}

pub struct Manager {
    service: Arc<PoolService>,
}

impl Manager {
    pub fn new(service: Arc<PoolService>) -> Self {
        Self { service }
    }
}

#[interface(name = "org.storage.Pools1.Manager")]
impl Manager {
    /// Create a pool named `name` from `devices`.
    ///
    /// An empty device list is accepted only with `force`. Returns the new
    /// pool's object path.
    async fn create_pool(
        &self,
        name: String,
        redundancy: u16,
        devices: Vec<String>,
        force: bool,
    ) -> fdo::Result<((OwnedObjectPath, bool), u16, String)> {
        Ok(self
            .service
            .create_pool(&name, redundancy, devices, force)
            .await?)
    }

    /// Destroy the pool named `name`. Refused with BUSY while it has filesystems.
    async fn destroy_pool(&self, name: String) -> (u16, String) {
        self.service.destroy_pool(&name).await
    }

    async fn get_pool_object_path(&self, name: String) -> fdo::Result<(OwnedObjectPath, u16, String)> {
        Ok(self.service.get_pool_object_path(&name).await?)
    }

    async fn get_filesystem_object_path(
        &self,
        pool_name: String,
        fs_name: String,
    ) -> fdo::Result<(OwnedObjectPath, u16, String)> {
        Ok(self
            .service
            .get_filesystem_object_path(&pool_name, &fs_name)
            .await?)
    }

    async fn list_pools(&self) -> (Vec<String>, u16, String) {
        self.service.list_pools().await
    }

    /// Set the odds of an injected device-add failure to `1 / denominator`;
    /// `0` disables injection.
    async fn configure_simulator(&self, denominator: u32) -> (u16, String) {
        self.service.configure_simulator(denominator)
    }

    #[zbus(property)]
    async fn version(&self) -> String {
        version().to_string()
    }

    #[zbus(property)]
    async fn error_values(&self) -> Vec<(String, u16, String)> {
        error_values()
    }

    #[zbus(property)]
    async fn redundancy_values(&self) -> Vec<(String, u16)> {
        redundancy_values()
    }
}
