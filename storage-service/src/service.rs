// SPDX-License-Identifier: GPL-3.0-only

//! Reply logic shared by every exported object.
//!
//! Each method turns an engine outcome into its `(payload, rc, message)`
//! reply. Operations that add or remove objects hold the tree lock across the
//! engine call and the matching publish or retract, so the exported tree
//! follows the registries in commit order. Lock order is tree, then engine.

use std::path::PathBuf;
use std::sync::Arc;

use storage_engine::{Engine, Identifier, ManagedObjects, PoolRef, SimBackend};
use tokio::sync::Mutex;
use zbus::zvariant::OwnedObjectPath;

use crate::error::{Result, Status, ok_status, refused};
use crate::objects::{ObjectTree, null_path, object_path};
use crate::pool::{WireSpec, spec_from_wire};

pub struct PoolService {
    engine: Arc<Engine>,
    simulator: Arc<SimBackend>,
    tree: Arc<dyn ObjectTree>,
    tree_lock: Mutex<()>,
}

fn log_tree_failure(action: &str, target: &Identifier, result: Result<()>) {
    if let Err(e) = result {
        tracing::error!("Could not {action} object {target}: {e}");
    }
}

impl PoolService {
    pub fn new(engine: Arc<Engine>, simulator: Arc<SimBackend>, tree: Arc<dyn ObjectTree>) -> Self {
        Self {
            engine,
            simulator,
            tree,
            tree_lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub async fn create_pool(
        self: &Arc<Self>,
        name: &str,
        redundancy: u16,
        devices: Vec<String>,
        force: bool,
    ) -> Result<((OwnedObjectPath, bool), u16, String)> {
        let devices: Vec<PathBuf> = devices.into_iter().map(PathBuf::from).collect();

        let _tree = self.tree_lock.lock().await;
        let created = match self
            .engine
            .create_pool(name, redundancy, &devices, force)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                let (rc, message) = refused("CreatePool", &err);
                return Ok(((null_path(), false), rc, message));
            }
        };

        let path = object_path(&created.id)?;
        match self.engine.pool_info(&PoolRef::id(created.id.clone())).await {
            Ok(info) => log_tree_failure(
                "publish",
                &created.id,
                self.tree.publish_pool(self, &info).await,
            ),
            Err(e) => tracing::error!("Created pool {name} vanished before publishing: {e}"),
        }

        let (rc, message) = ok_status();
        Ok(((path, created.created), rc, message))
    }

    pub async fn destroy_pool(&self, name: &str) -> Status {
        let _tree = self.tree_lock.lock().await;
        match self.engine.destroy_pool(name).await {
            Ok(id) => {
                log_tree_failure("retract", &id, self.tree.retract_pool(&id).await);
                ok_status()
            }
            Err(err) => refused("DestroyPool", &err),
        }
    }

    pub async fn get_pool_object_path(&self, name: &str) -> Result<(OwnedObjectPath, u16, String)> {
        match self.engine.get_pool_by_name(name).await {
            Ok(id) => {
                let (rc, message) = ok_status();
                Ok((object_path(&id)?, rc, message))
            }
            Err(err) => {
                let (rc, message) = refused("GetPoolObjectPath", &err);
                Ok((null_path(), rc, message))
            }
        }
    }

    pub async fn get_filesystem_object_path(
        &self,
        pool_name: &str,
        fs_name: &str,
    ) -> Result<(OwnedObjectPath, u16, String)> {
        let pool = PoolRef::name(pool_name);
        match self.engine.get_filesystem_by_name(&pool, fs_name).await {
            Ok(id) => {
                let (rc, message) = ok_status();
                Ok((object_path(&id)?, rc, message))
            }
            Err(err) => {
                let (rc, message) = refused("GetFilesystemObjectPath", &err);
                Ok((null_path(), rc, message))
            }
        }
    }

    pub async fn list_pools(&self) -> (Vec<String>, u16, String) {
        let names = self
            .engine
            .list_pools()
            .await
            .into_iter()
            .map(|pool| pool.name)
            .collect();
        let (rc, message) = ok_status();
        (names, rc, message)
    }

    pub fn configure_simulator(&self, denominator: u32) -> Status {
        self.simulator.configure(denominator);
        ok_status()
    }

    pub async fn create_filesystems(
        self: &Arc<Self>,
        pool: &Identifier,
        specs: Vec<WireSpec>,
    ) -> Result<(Vec<(OwnedObjectPath, String)>, u16, String)> {
        let specs: Vec<_> = specs.into_iter().map(spec_from_wire).collect();

        let _tree = self.tree_lock.lock().await;
        let created = match self
            .engine
            .create_filesystems(&PoolRef::id(pool.clone()), &specs)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                let (rc, message) = refused("CreateFilesystems", &err);
                return Ok((Vec::new(), rc, message));
            }
        };

        let mut published = Vec::with_capacity(created.len());
        for (id, name) in created {
            match self.engine.filesystem_info(&id).await {
                Ok(info) => log_tree_failure(
                    "publish",
                    &id,
                    self.tree.publish_filesystem(self, &info).await,
                ),
                Err(e) => tracing::error!("Created filesystem {name} vanished before publishing: {e}"),
            }
            published.push((object_path(&id)?, name));
        }
        let (rc, message) = ok_status();
        Ok((published, rc, message))
    }

    pub async fn destroy_filesystems(
        &self,
        pool: &Identifier,
        filesystems: Vec<String>,
    ) -> (Vec<String>, u16, String) {
        let targets: Vec<Identifier> = filesystems.into_iter().map(Identifier::from).collect();

        let _tree = self.tree_lock.lock().await;
        let destroyed = match self
            .engine
            .destroy_filesystems(&PoolRef::id(pool.clone()), &targets)
            .await
        {
            Ok(destroyed) => destroyed,
            Err(err) => {
                let (rc, message) = refused("DestroyFilesystems", &err);
                return (Vec::new(), rc, message);
            }
        };

        for id in &destroyed {
            log_tree_failure("retract", id, self.tree.retract_filesystem(id).await);
        }
        let (rc, message) = ok_status();
        (
            destroyed.into_iter().map(Identifier::into_string).collect(),
            rc,
            message,
        )
    }

    pub async fn add_devices(
        &self,
        pool: &Identifier,
        devices: Vec<String>,
    ) -> (Vec<String>, u16, String) {
        let devices: Vec<PathBuf> = devices.into_iter().map(PathBuf::from).collect();
        match self
            .engine
            .add_devices(&PoolRef::id(pool.clone()), &devices)
            .await
        {
            Ok(added) => {
                let added = added
                    .into_iter()
                    .map(|path| path.display().to_string())
                    .collect();
                let (rc, message) = ok_status();
                (added, rc, message)
            }
            Err(err) => {
                let (rc, message) = refused("AddDevices", &err);
                (Vec::new(), rc, message)
            }
        }
    }

    pub async fn rename_filesystem(
        &self,
        pool: &Identifier,
        fs: &Identifier,
        name: &str,
    ) -> (bool, u16, String) {
        match self
            .engine
            .rename_filesystem(&PoolRef::id(pool.clone()), fs, name)
            .await
        {
            Ok(changed) => {
                let (rc, message) = ok_status();
                (changed, rc, message)
            }
            Err(err) => {
                let (rc, message) = refused("SetName", &err);
                (false, rc, message)
            }
        }
    }

    /// Snapshot taken in tree order, so it matches what has been published.
    pub async fn managed_objects(&self) -> ManagedObjects {
        let _tree = self.tree_lock.lock().await;
        self.engine.managed_objects().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use storage_contracts::StorageErrorKind;
    use storage_engine::{FilesystemInfo, PoolInfo};

    use super::*;
    use crate::error::ServiceError;

    const ROOT: &str = "/org/storage/Pools1";

    /// Object tree that records which objects are exported.
    #[derive(Default)]
    struct RecordingTree {
        live: StdMutex<BTreeSet<String>>,
        refuse_name: StdMutex<Option<String>>,
    }

    impl RecordingTree {
        fn live(&self) -> BTreeSet<String> {
            self.live.lock().unwrap().clone()
        }

        fn refuse(&self, fs_name: &str) {
            *self.refuse_name.lock().unwrap() = Some(fs_name.to_string());
        }
    }

    #[async_trait]
    impl ObjectTree for RecordingTree {
        async fn publish_pool(&self, _: &Arc<PoolService>, pool: &PoolInfo) -> Result<()> {
            assert!(self.live.lock().unwrap().insert(pool.id.to_string()));
            Ok(())
        }

        async fn retract_pool(&self, pool: &Identifier) -> Result<()> {
            assert!(self.live.lock().unwrap().remove(pool.as_str()));
            Ok(())
        }

        async fn publish_filesystem(&self, _: &Arc<PoolService>, fs: &FilesystemInfo) -> Result<()> {
            if self.refuse_name.lock().unwrap().as_deref() == Some(fs.name.as_str()) {
                return Err(ServiceError::DBus("object server unavailable".to_string()));
            }
            assert!(self.live.lock().unwrap().insert(fs.id.to_string()));
            Ok(())
        }

        async fn retract_filesystem(&self, fs: &Identifier) -> Result<()> {
            self.live.lock().unwrap().remove(fs.as_str());
            Ok(())
        }
    }

    fn service() -> (Arc<PoolService>, Arc<RecordingTree>) {
        let sim = Arc::new(SimBackend::new());
        let engine = Arc::new(Engine::new(ROOT, sim.clone()));
        let tree = Arc::new(RecordingTree::default());
        (Arc::new(PoolService::new(engine, sim, tree.clone())), tree)
    }

    fn spec(name: &str) -> WireSpec {
        (name.to_string(), (false, 0))
    }

    async fn engine_paths(service: &PoolService) -> BTreeSet<String> {
        let objects = service.managed_objects().await;
        objects
            .pools()
            .map(|pool| pool.id.to_string())
            .chain(objects.filesystems().map(|fs| fs.id.to_string()))
            .collect()
    }

    async fn with_pool() -> (Arc<PoolService>, Arc<RecordingTree>, Identifier) {
        let (service, tree) = service();
        let ((path, _), rc, _) = service
            .create_pool("deadpool", 0, vec!["/dev/sda".to_string()], false)
            .await
            .expect("create pool");
        assert_eq!(rc, 0);
        (service, tree, Identifier::from(path.as_str()))
    }

    #[tokio::test]
    async fn pool_round_trip_keeps_tree_in_step() {
        let (service, tree, pool) = with_pool().await;
        assert_eq!(tree.live(), BTreeSet::from([pool.to_string()]));
        assert_eq!(tree.live(), engine_paths(&service).await);

        let (rc, message) = service.destroy_pool("deadpool").await;
        assert_eq!((rc, message.as_str()), (0, "Ok"));
        assert!(tree.live().is_empty());

        let (path, rc, _) = service
            .get_pool_object_path("deadpool")
            .await
            .expect("lookup");
        assert_eq!(path.as_str(), "/");
        assert_eq!(rc, StorageErrorKind::PoolNotFound.code());
    }

    #[tokio::test]
    async fn refused_create_pool_returns_neutral_payload() {
        let (service, tree, _) = with_pool().await;

        let ((path, created), rc, message) = service
            .create_pool("deadpool", 0, vec!["/dev/sdb".to_string()], false)
            .await
            .expect("create pool");
        assert_eq!(path.as_str(), "/");
        assert!(!created);
        assert_eq!(rc, StorageErrorKind::AlreadyExists.code());
        assert!(!message.is_empty());

        let ((path, _), rc, _) = service
            .create_pool("empty", 0, Vec::new(), false)
            .await
            .expect("create pool");
        assert_eq!(path.as_str(), "/");
        assert_eq!(rc, StorageErrorKind::EmptyDeviceSet.code());
        assert_eq!(tree.live().len(), 1);
    }

    #[tokio::test]
    async fn busy_destroy_keeps_everything_published() {
        let (service, tree, pool) = with_pool().await;
        service
            .create_filesystems(&pool, vec![spec("vol")])
            .await
            .expect("create");

        let (rc, _) = service.destroy_pool("deadpool").await;
        assert_eq!(rc, StorageErrorKind::Busy.code());
        assert_eq!(tree.live().len(), 2);
        assert_eq!(tree.live(), engine_paths(&service).await);
    }

    #[tokio::test]
    async fn filesystem_batches_publish_and_retract() {
        let (service, tree, pool) = with_pool().await;

        let (created, rc, _) = service
            .create_filesystems(&pool, vec![spec("a"), spec("b"), spec("a")])
            .await
            .expect("create");
        assert_eq!(rc, 0);
        let names: Vec<&str> = created.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(tree.live(), engine_paths(&service).await);

        let (created_again, rc, _) = service
            .create_filesystems(&pool, vec![spec("a"), spec("c")])
            .await
            .expect("create");
        assert!(created_again.is_empty());
        assert_eq!(rc, StorageErrorKind::AlreadyExists.code());

        let target = created[0].0.as_str().to_string();
        let (destroyed, rc, _) = service
            .destroy_filesystems(&pool, vec![target.clone(), "/".to_string()])
            .await;
        assert_eq!((destroyed, rc), (vec![target], 0));
        assert_eq!(tree.live(), engine_paths(&service).await);
    }

    #[tokio::test]
    async fn unknown_destroy_target_is_ignored() {
        let (service, _, pool) = with_pool().await;
        let (destroyed, rc, message) = service
            .destroy_filesystems(&pool, vec!["/".to_string()])
            .await;
        assert!(destroyed.is_empty());
        assert_eq!((rc, message.as_str()), (0, "Ok"));

        let (destroyed, rc, _) = service.destroy_filesystems(&pool, Vec::new()).await;
        assert!(destroyed.is_empty());
        assert_eq!(rc, 0);
    }

    #[tokio::test]
    async fn export_failure_does_not_fail_a_committed_batch() {
        let (service, tree, pool) = with_pool().await;
        tree.refuse("broken");

        let (created, rc, _) = service
            .create_filesystems(&pool, vec![spec("fine"), spec("broken")])
            .await
            .expect("create");
        assert_eq!(rc, 0);
        assert_eq!(created.len(), 2);
        assert_eq!(service.managed_objects().await.filesystems.len(), 2);
    }

    #[tokio::test]
    async fn missing_pool_and_filesystem_lookups() {
        let (service, _, pool) = with_pool().await;
        let (created, _, _) = service
            .create_filesystems(&pool, vec![spec("vol")])
            .await
            .expect("create");

        let (path, rc, _) = service
            .get_filesystem_object_path("deadpool", "vol")
            .await
            .expect("lookup");
        assert_eq!((path, rc), (created[0].0.clone(), 0));

        let (path, rc, _) = service
            .get_filesystem_object_path("deadpool", "nope")
            .await
            .expect("lookup");
        assert_eq!(path.as_str(), "/");
        assert_eq!(rc, StorageErrorKind::FilesystemNotFound.code());

        let (path, rc, _) = service
            .get_filesystem_object_path("nowhere", "vol")
            .await
            .expect("lookup");
        assert_eq!(path.as_str(), "/");
        assert_eq!(rc, StorageErrorKind::PoolNotFound.code());
    }

    #[tokio::test]
    async fn rename_and_device_replies() {
        let (service, _, pool) = with_pool().await;
        let (created, _, _) = service
            .create_filesystems(&pool, vec![spec("old"), spec("taken")])
            .await
            .expect("create");
        let fs = Identifier::from(created[0].0.as_str());

        assert!(service.rename_filesystem(&pool, &fs, "new").await.0);
        assert!(!service.rename_filesystem(&pool, &fs, "new").await.0);
        let (changed, rc, _) = service.rename_filesystem(&pool, &fs, "taken").await;
        assert!(!changed);
        assert_eq!(rc, StorageErrorKind::AlreadyExists.code());

        let (added, rc, _) = service
            .add_devices(&pool, vec!["/dev/sda".to_string()])
            .await;
        assert!(added.is_empty());
        assert_eq!(rc, StorageErrorKind::DevInUse.code());

        let (added, rc, _) = service
            .add_devices(&pool, vec!["/dev/sdb".to_string()])
            .await;
        assert_eq!((added, rc), (vec!["/dev/sdb".to_string()], 0));

        let (names, rc, _) = service.list_pools().await;
        assert_eq!((names, rc), (vec!["deadpool".to_string()], 0));
        assert_eq!(service.configure_simulator(8), (0, "Ok".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_create_and_destroy_leave_tree_matching_engine() {
        let (service, tree) = service();

        let tasks: Vec<_> = (0..32)
            .map(|n| {
                let service = service.clone();
                tokio::spawn(async move {
                    if n % 2 == 0 {
                        let device = format!("/dev/vd{n}");
                        let _ = service.create_pool("contested", 0, vec![device], false).await;
                    } else {
                        let _ = service.destroy_pool("contested").await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("task panicked");
        }

        assert_eq!(tree.live(), engine_paths(&service).await);
    }
}
