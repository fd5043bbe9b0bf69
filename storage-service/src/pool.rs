// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use storage_engine::{FilesystemSpec, Identifier, PoolInfo, PoolRef};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::OwnedObjectPath;
use zbus::{fdo, interface};

use crate::error::ServiceError;
use crate::service::PoolService;

pub const POOL_INTERFACE: &str = "org.storage.Pools1.Pool";

/// Wire form of a filesystem request: name plus an optional size in bytes.
pub type WireSpec = (String, (bool, u64));

pub fn spec_from_wire((name, (has_size, size)): WireSpec) -> FilesystemSpec {
    FilesystemSpec {
        name,
        size: has_size.then_some(size),
    }
}

/// One exported pool object.
pub struct PoolObject {
    service: Arc<PoolService>,
    id: Identifier,
}

impl PoolObject {
    pub fn new(service: Arc<PoolService>, id: Identifier) -> Self {
        Self { service, id }
    }

    async fn info(&self) -> fdo::Result<PoolInfo> {
        self.service
            .engine()
            .pool_info(&PoolRef::id(self.id.clone()))
            .await
            .map_err(|e| fdo::Error::UnknownObject(e.to_string()))
    }
}

#[interface(name = "org.storage.Pools1.Pool")]
impl PoolObject {
    /// Create filesystems in this pool.
    ///
    /// Repeated names collapse to the first request. If any name is taken,
    /// nothing is created and ALREADY_EXISTS is returned.
    async fn create_filesystems(
        &self,
        specs: Vec<WireSpec>,
    ) -> fdo::Result<(Vec<(OwnedObjectPath, String)>, u16, String)> {
        Ok(self.service.create_filesystems(&self.id, specs).await?)
    }

    /// Destroy filesystems by object path. Unknown paths are ignored.
    async fn destroy_filesystems(&self, filesystems: Vec<String>) -> (Vec<String>, u16, String) {
        self.service.destroy_filesystems(&self.id, filesystems).await
    }

    async fn add_devices(
        &self,
        #[zbus(signal_context)] signal_ctx: SignalEmitter<'_>,
        devices: Vec<String>,
    ) -> fdo::Result<(Vec<String>, u16, String)> {
        let reply = self.service.add_devices(&self.id, devices).await;
        if !reply.0.is_empty() {
            self.devices_changed(&signal_ctx)
                .await
                .map_err(ServiceError::from)?;
        }
        Ok(reply)
    }

    #[zbus(property)]
    async fn name(&self) -> fdo::Result<String> {
        Ok(self.info().await?.name)
    }

    #[zbus(property)]
    async fn uuid(&self) -> fdo::Result<String> {
        Ok(self.info().await?.uuid.to_string())
    }

    #[zbus(property)]
    async fn redundancy(&self) -> fdo::Result<u16> {
        Ok(self.info().await?.redundancy.value())
    }

    #[zbus(property)]
    async fn devices(&self) -> fdo::Result<Vec<String>> {
        Ok(self.info().await?.devices)
    }
}
