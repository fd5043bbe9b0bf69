// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use storage_engine::{FilesystemInfo, Identifier};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::OwnedObjectPath;
use zbus::{fdo, interface};

use crate::error::ServiceError;
use crate::objects::object_path;
use crate::service::PoolService;

pub const FILESYSTEM_INTERFACE: &str = "org.storage.Pools1.Filesystem";

/// One exported filesystem object.
pub struct FilesystemObject {
    service: Arc<PoolService>,
    pool: Identifier,
    id: Identifier,
}

impl FilesystemObject {
    pub fn new(service: Arc<PoolService>, pool: Identifier, id: Identifier) -> Self {
        Self { service, pool, id }
    }

    async fn info(&self) -> fdo::Result<FilesystemInfo> {
        self.service
            .engine()
            .filesystem_info(&self.id)
            .await
            .map_err(|e| fdo::Error::UnknownObject(e.to_string()))
    }
}

#[interface(name = "org.storage.Pools1.Filesystem")]
impl FilesystemObject {
    /// Rename this filesystem. Returns false when the name is unchanged.
    async fn set_name(
        &self,
        #[zbus(signal_context)] signal_ctx: SignalEmitter<'_>,
        name: String,
    ) -> fdo::Result<(bool, u16, String)> {
        let reply = self
            .service
            .rename_filesystem(&self.pool, &self.id, &name)
            .await;
        if reply.0 {
            self.name_changed(&signal_ctx)
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
    async fn pool(&self) -> fdo::Result<OwnedObjectPath> {
        Ok(object_path(&self.pool)?)
    }

    /// Requested size as `(is_set, bytes)`.
    #[zbus(property)]
    async fn size(&self) -> fdo::Result<(bool, u64)> {
        let size = self.info().await?.size;
        Ok((size.is_some(), size.unwrap_or_default()))
    }
}
