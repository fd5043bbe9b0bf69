// SPDX-License-Identifier: GPL-3.0-only

//! Exported object tree
//!
//! Pool and filesystem objects live below the object root. The root also
//! carries `org.freedesktop.DBus.ObjectManager`, whose snapshot is built from
//! the engine rather than from the exported nodes, so a batch is visible
//! either entirely or not at all.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use storage_engine::{FilesystemInfo, Identifier, ManagedObjects, PoolInfo};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, fdo, interface};

use crate::error::{Result, ServiceError};
use crate::filesystem::{FILESYSTEM_INTERFACE, FilesystemObject};
use crate::pool::{POOL_INTERFACE, PoolObject};
use crate::service::PoolService;

pub type Properties = HashMap<String, OwnedValue>;
pub type Interfaces = HashMap<String, Properties>;

/// Payload returned in place of a path when an operation is refused.
pub fn null_path() -> OwnedObjectPath {
    ObjectPath::from_static_str_unchecked("/").into()
}

pub fn object_path(id: &Identifier) -> Result<OwnedObjectPath> {
    OwnedObjectPath::try_from(id.as_str())
        .map_err(|e| ServiceError::InvalidObjectPath(format!("{id}: {e}")))
}

fn owned<'a>(value: impl Into<Value<'a>>) -> Result<OwnedValue> {
    value
        .into()
        .try_to_owned()
        .map_err(|e| ServiceError::DBus(e.to_string()))
}

pub fn pool_interfaces(pool: &PoolInfo) -> Result<Interfaces> {
    let mut properties = Properties::new();
    properties.insert("Name".to_string(), owned(pool.name.clone())?);
    properties.insert("Uuid".to_string(), owned(pool.uuid.to_string())?);
    properties.insert("Redundancy".to_string(), owned(pool.redundancy.value())?);
    properties.insert("Devices".to_string(), owned(pool.devices.clone())?);
    Ok(HashMap::from([(POOL_INTERFACE.to_string(), properties)]))
}

pub fn filesystem_interfaces(fs: &FilesystemInfo) -> Result<Interfaces> {
    let mut properties = Properties::new();
    properties.insert("Name".to_string(), owned(fs.name.clone())?);
    properties.insert("Uuid".to_string(), owned(fs.uuid.to_string())?);
    properties.insert("Pool".to_string(), owned(object_path(&fs.pool)?.into_inner())?);
    properties.insert(
        "Size".to_string(),
        owned((fs.size.is_some(), fs.size.unwrap_or_default()))?,
    );
    Ok(HashMap::from([(FILESYSTEM_INTERFACE.to_string(), properties)]))
}

/// `GetManagedObjects` reply for a snapshot, pools first, each followed by
/// its filesystems.
pub fn managed_tree(objects: &ManagedObjects) -> Result<HashMap<OwnedObjectPath, Interfaces>> {
    let mut tree = HashMap::with_capacity(objects.pools.len() + objects.filesystems.len());
    for pool in objects.pools() {
        tree.insert(object_path(&pool.id)?, pool_interfaces(pool)?);
        for fs in objects.filesystems_of(&pool.id) {
            tree.insert(object_path(&fs.id)?, filesystem_interfaces(fs)?);
        }
    }
    Ok(tree)
}

/// Where pool and filesystem objects get exported.
#[async_trait]
pub trait ObjectTree: Send + Sync {
    async fn publish_pool(&self, service: &Arc<PoolService>, pool: &PoolInfo) -> Result<()>;

    async fn retract_pool(&self, pool: &Identifier) -> Result<()>;

    async fn publish_filesystem(
        &self,
        service: &Arc<PoolService>,
        fs: &FilesystemInfo,
    ) -> Result<()>;

    async fn retract_filesystem(&self, fs: &Identifier) -> Result<()>;
}

/// [`ObjectTree`] backed by the connection's object server.
pub struct BusTree {
    connection: Connection,
    root: OwnedObjectPath,
}

impl BusTree {
    pub fn new(connection: Connection, root: &str) -> Result<Self> {
        let root = OwnedObjectPath::try_from(root)
            .map_err(|e| ServiceError::InvalidObjectPath(format!("{root}: {e}")))?;
        Ok(Self { connection, root })
    }

    fn emitter(&self) -> Result<SignalEmitter<'_>> {
        Ok(SignalEmitter::new(&self.connection, self.root.as_str())?)
    }

    async fn announce_added(&self, path: &OwnedObjectPath, interfaces: &Interfaces) -> Result<()> {
        let emitter = self.emitter()?;
        ObjectManager::interfaces_added(&emitter, path.clone().into_inner(), interfaces).await?;
        Ok(())
    }

    async fn announce_removed(&self, path: &OwnedObjectPath, interface: &str) -> Result<()> {
        let emitter = self.emitter()?;
        ObjectManager::interfaces_removed(&emitter, path.clone().into_inner(), &[interface])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectTree for BusTree {
    async fn publish_pool(&self, service: &Arc<PoolService>, pool: &PoolInfo) -> Result<()> {
        let path = object_path(&pool.id)?;
        self.connection
            .object_server()
            .at(path.as_str(), PoolObject::new(service.clone(), pool.id.clone()))
            .await?;
        self.announce_added(&path, &pool_interfaces(pool)?).await?;
        tracing::debug!("Published pool object {path}");
        Ok(())
    }

    async fn retract_pool(&self, pool: &Identifier) -> Result<()> {
        let path = object_path(pool)?;
        self.connection
            .object_server()
            .remove::<PoolObject, _>(path.as_str())
            .await?;
        self.announce_removed(&path, POOL_INTERFACE).await?;
        tracing::debug!("Retracted pool object {path}");
        Ok(())
    }

    async fn publish_filesystem(
        &self,
        service: &Arc<PoolService>,
        fs: &FilesystemInfo,
    ) -> Result<()> {
        let path = object_path(&fs.id)?;
        let object = FilesystemObject::new(service.clone(), fs.pool.clone(), fs.id.clone());
        self.connection
            .object_server()
            .at(path.as_str(), object)
            .await?;
        self.announce_added(&path, &filesystem_interfaces(fs)?).await?;
        tracing::debug!("Published filesystem object {path}");
        Ok(())
    }

    async fn retract_filesystem(&self, fs: &Identifier) -> Result<()> {
        let path = object_path(fs)?;
        self.connection
            .object_server()
            .remove::<FilesystemObject, _>(path.as_str())
            .await?;
        self.announce_removed(&path, FILESYSTEM_INTERFACE).await?;
        tracing::debug!("Retracted filesystem object {path}");
        Ok(())
    }
}

/// `org.freedesktop.DBus.ObjectManager` at the object root.
pub struct ObjectManager {
    service: Arc<PoolService>,
}

impl ObjectManager {
    pub fn new(service: Arc<PoolService>) -> Self {
        Self { service }
    }
}

#[interface(name = "org.freedesktop.DBus.ObjectManager")]
impl ObjectManager {
    async fn get_managed_objects(&self) -> fdo::Result<HashMap<OwnedObjectPath, Interfaces>> {
        let objects = self.service.managed_objects().await;
        Ok(managed_tree(&objects)?)
    }

    #[zbus(signal)]
    async fn interfaces_added(
        signal_ctxt: &SignalEmitter<'_>,
        object_path: ObjectPath<'_>,
        interfaces_and_properties: &Interfaces,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn interfaces_removed(
        signal_ctxt: &SignalEmitter<'_>,
        object_path: ObjectPath<'_>,
        interfaces: &[&str],
    ) -> zbus::Result<()>;
}
