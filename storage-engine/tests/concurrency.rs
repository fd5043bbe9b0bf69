// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::sync::Arc;

use storage_contracts::StorageErrorKind;
use storage_engine::{Engine, FilesystemSpec, PoolRef, SimBackend};

fn shared_engine() -> Arc<Engine> {
    Arc::new(Engine::new("/org/storage/Pools1", Arc::new(SimBackend::new())))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_pool_creations_admit_one_winner() {
    let engine = shared_engine();

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let device = PathBuf::from(format!("/dev/loop{n}"));
                engine.create_pool("deadpool", 0, &[device], false).await
            })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => winners += 1,
            Err(error) => assert_eq!(error.kind(), StorageErrorKind::AlreadyExists),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(engine.list_pools().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_batches_on_one_pool_never_duplicate_names() {
    let engine = shared_engine();
    let pool = engine
        .create_pool("deadpool", 0, &[PathBuf::from("/dev/sda")], false)
        .await
        .expect("create pool");
    let pool = PoolRef::id(pool.id);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                engine
                    .create_filesystems(
                        &pool,
                        &[FilesystemSpec::named("shared"), FilesystemSpec::named("other")],
                    )
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(created) => {
                assert_eq!(created.len(), 2);
                winners += 1;
            }
            Err(error) => assert_eq!(error.kind(), StorageErrorKind::AlreadyExists),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(engine.managed_objects().await.filesystems.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn destroy_racing_create_never_strands_a_filesystem() {
    for _ in 0..32 {
        let engine = shared_engine();
        let pool = engine
            .create_pool("deadpool", 0, &[PathBuf::from("/dev/sda")], false)
            .await
            .expect("create pool");
        let pool = PoolRef::id(pool.id);

        let creator = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .create_filesystems(&pool, &[FilesystemSpec::named("vol")])
                    .await
            })
        };
        let destroyer = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.destroy_pool("deadpool").await })
        };

        let created = creator.await.expect("creator panicked");
        let destroyed = destroyer.await.expect("destroyer panicked");
        let objects = engine.managed_objects().await;

        match (created, destroyed) {
            (Ok(_), Err(error)) => {
                assert_eq!(error.kind(), StorageErrorKind::Busy);
                assert_eq!(objects.pools.len(), 1);
                assert_eq!(objects.filesystems.len(), 1);
            }
            (Err(error), Ok(_)) => {
                assert_eq!(error.kind(), StorageErrorKind::PoolNotFound);
                assert!(objects.pools.is_empty());
                assert!(objects.filesystems.is_empty());
            }
            (created, destroyed) => {
                panic!("unexpected outcome: {created:?} / {destroyed:?}")
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_device_adds_leave_no_partial_state() {
    let sim = Arc::new(SimBackend::with_denominator(3));
    let engine = Arc::new(Engine::new("/org/storage/Pools1", sim.clone()));
    let pool = engine
        .create_pool("deadpool", 0, &[PathBuf::from("/dev/sda")], false)
        .await
        .expect("create pool");
    let pool = PoolRef::id(pool.id);

    let tasks: Vec<_> = (0..24)
        .map(|n| {
            let engine = engine.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                let batch = [
                    PathBuf::from(format!("/dev/vd{n}a")),
                    PathBuf::from(format!("/dev/vd{n}b")),
                ];
                (batch.clone(), engine.add_devices(&pool, &batch).await)
            })
        })
        .collect();

    let mut expected = vec![PathBuf::from("/dev/sda")];
    for task in tasks {
        let (batch, outcome) = task.await.expect("task panicked");
        match outcome {
            Ok(added) => {
                assert_eq!(added, batch.to_vec());
                expected.extend(batch);
            }
            Err(error) => assert_eq!(error.kind(), StorageErrorKind::IoError),
        }
    }

    let info = engine.pool_info(&pool).await.expect("pool info");
    let mut owned: Vec<String> = info.devices;
    let mut expected: Vec<String> = expected
        .into_iter()
        .map(|path| path.display().to_string())
        .collect();
    owned.sort();
    expected.sort();
    assert_eq!(owned, expected);

    // A failed add releases nothing it never claimed.
    let error = engine
        .create_pool("other", 0, &[PathBuf::from("/dev/sda")], false)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), StorageErrorKind::DevInUse);
    assert_eq!(sim.pool_count(), 1);
}
