//! End-to-end scenarios against a real temporary directory tree (§8).
//!
//! These exercise the controller the way the demo binary does: a real
//! [`LocalFsProvider`] over [`tempfile::TempDir`], an [`InMemoryStore`]
//! standing in for the triple store, and an accepting extractor so
//! `notify_file` actually fires.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use minerfs_core::config::Config;
use minerfs_core::controller::state::Phase;
use minerfs_core::controller::Controller;
use minerfs_core::data_provider::local_fs::LocalFsProvider;
use minerfs_core::data_provider::DataProvider;
use minerfs_core::extractor::{AcceptAllExtractor, Extractor};
use minerfs_core::monitor::notify_monitor::NotifyMonitor;
use minerfs_core::monitor::MonitorEvent;
use minerfs_core::rules::default_rules;
use minerfs_core::store::{InMemoryStore, Store};
use minerfs_core::Uri;

fn build_controller(store: Arc<InMemoryStore>, extractor: Arc<dyn Extractor>, pool_limit: usize) -> Controller {
    let monitor = NotifyMonitor::new().expect("watcher init");
    let provider: Arc<dyn DataProvider> = Arc::new(LocalFsProvider::new(monitor));
    let config = Config {
        process_pool_limit: pool_limit,
        ..Config::default()
    };
    Controller::new(&config, provider, store, extractor, default_rules(), default_rules())
}

async fn drain_and_complete(controller: &mut Controller, pending: &[Uri]) {
    // Our toy extractors complete synchronously inside `process_file` rather
    // than via an out-of-band callback, so every `Accepted` dispatch here is
    // immediately resolved with `notify_file(uri, None)` to simulate the
    // host driving the real async completion path (§4.6 step 5-6).
    loop {
        let dispatched = controller.drain_tick().await;
        for uri in pending {
            controller.notify_file(uri, None).await;
        }
        if dispatched == 0 {
            break;
        }
    }
}

#[tokio::test]
async fn s1_cold_crawl_indexes_everything_depth_first() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("a.txt"), b"hello").await.unwrap();
    tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
    tokio::fs::write(dir.path().join("sub/b.txt"), b"world").await.unwrap();

    let store = Arc::new(InMemoryStore::new());
    let root = Uri::from_path(dir.path());
    let a = root.join("a.txt");
    let sub = root.join("sub");
    let b = sub.join("b.txt");

    let mut controller = build_controller(Arc::clone(&store), Arc::new(AcceptAllExtractor), 2);
    controller.add_root(root.clone(), true).await.unwrap();
    controller.start().await;
    assert_eq!(*controller.phase(), Phase::Draining);

    // The crawl enqueues the directory itself as well as both files (§4.3).
    drain_and_complete(&mut controller, &[a.clone(), sub.clone(), b.clone()]).await;

    assert_eq!(*controller.phase(), Phase::Idle);
    assert_eq!(store.applied_batches().len(), 3);
    assert_eq!(controller.progress(std::time::Instant::now()), Some(1.0));
}

#[tokio::test]
async fn s2_incremental_crawl_skips_up_to_date_file() {
    let dir = TempDir::new().unwrap();
    let file_path = dir.path().join("a.txt");
    tokio::fs::write(&file_path, b"hello").await.unwrap();
    let mtime = tokio::fs::metadata(&file_path).await.unwrap().modified().unwrap();

    let store = Arc::new(InMemoryStore::new());
    let root = Uri::from_path(dir.path());
    let a = root.join("a.txt");
    store.set_last_modified(&a, mtime).await;

    let mut controller = build_controller(Arc::clone(&store), Arc::new(AcceptAllExtractor), 2);
    controller.add_root(root.clone(), true).await.unwrap();
    controller.start().await;
    drain_and_complete(&mut controller, &[]).await;

    assert_eq!(*controller.phase(), Phase::Idle);
    assert!(store.applied_batches().is_empty());
}

#[tokio::test]
async fn s3_directory_rename_rewrites_descendants_without_re_extraction() {
    let dir = TempDir::new().unwrap();
    tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
    tokio::fs::write(dir.path().join("sub/b.txt"), b"world").await.unwrap();

    let store = Arc::new(InMemoryStore::new());
    let root = Uri::from_path(dir.path());
    let sub = root.join("sub");
    let b = sub.join("b.txt");
    store.set_last_modified(&sub, std::time::SystemTime::now()).await;
    store.set_last_modified(&b, std::time::SystemTime::now()).await;

    tokio::fs::rename(dir.path().join("sub"), dir.path().join("sub2")).await.unwrap();
    let sub2 = root.join("sub2");

    let mut controller = build_controller(Arc::clone(&store), Arc::new(AcceptAllExtractor), 2);
    controller.add_root(root, false).await.unwrap();
    controller.start().await;

    // Simulate the settled monitor signal a real `NotifyMonitor` would have
    // produced for an atomic rename (§4.2).
    controller.handle_monitor_event(MonitorEvent::Moved {
        from: sub.clone(),
        to: sub2.clone(),
        is_dir: true,
        is_source_monitored: true,
    });
    drain_and_complete(&mut controller, &[]).await;

    let batches = store.applied_batches();
    assert!(batches.iter().any(|b| b.contains(sub2.as_str())));
}

#[tokio::test]
async fn s4_delete_during_extraction_cancels_the_in_flight_token() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("a.txt"), b"hello").await.unwrap();

    let store = Arc::new(InMemoryStore::new());
    let root = Uri::from_path(dir.path());
    let a = root.join("a.txt");

    let mut controller = build_controller(Arc::clone(&store), Arc::new(AcceptAllExtractor), 1);
    controller.add_root(root, true).await.unwrap();
    controller.start().await;

    // Dispatch but don't resolve yet -- mimics the extraction being
    // in-flight when a delete arrives for the same URI.
    let dispatched = controller.drain_tick().await;
    assert_eq!(dispatched, 1);

    controller.handle_monitor_event(MonitorEvent::Deleted { uri: a.clone(), is_dir: false });
    controller.notify_file(&a, None).await;
    controller.drain_tick().await;

    assert!(store.applied_batches().iter().any(|b| b.starts_with(&format!("DROP GRAPH <{a}>"))));
}

#[tokio::test]
async fn s6_root_removal_purges_queued_work_under_it() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("a.txt"), b"hello").await.unwrap();

    let store = Arc::new(InMemoryStore::new());
    let root = Uri::from_path(dir.path());

    let mut controller = build_controller(store, Arc::new(AcceptAllExtractor), 1);
    controller.add_root(root.clone(), true).await.unwrap();

    controller.handle_monitor_event(MonitorEvent::Created { uri: root.join("queued.txt"), is_dir: false });
    controller.remove_root(&root).await.unwrap();

    // Nothing left to drain: the queued item and the root itself are gone.
    assert_eq!(controller.drain_tick().await, 0);
}

#[tokio::test]
async fn throttle_of_one_still_makes_forward_progress() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("a.txt"), b"hello").await.unwrap();

    let monitor = NotifyMonitor::new().unwrap();
    let provider: Arc<dyn DataProvider> = Arc::new(LocalFsProvider::new(monitor));
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = Config { throttle: 1.0, ..Config::default() };

    let mut controller = Controller::new(&config, provider, store, Arc::new(AcceptAllExtractor), default_rules(), default_rules());
    assert!(controller.throttle_interval() > Duration::ZERO);

    let root = Uri::from_path(dir.path());
    controller.add_root(root, true).await.unwrap();
    controller.start().await;
    assert_eq!(controller.drain_tick().await, 1);
}

#[tokio::test]
async fn s5_throttle_change_under_load_drops_nothing_and_keeps_fifo_order() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let root = Uri::from_path(dir.path());

    let mut controller = build_controller(Arc::clone(&store), Arc::new(AcceptAllExtractor), 2);
    controller.add_root(root.clone(), true).await.unwrap();
    controller.start().await;
    controller.set_throttle(0.0);

    let uris: Vec<Uri> = (0..100).map(|i| root.join(format!("f{i:03}.txt"))).collect();
    for uri in &uris {
        controller.handle_monitor_event(MonitorEvent::Created { uri: uri.clone(), is_dir: false });
    }

    // Flip the throttle mid-run, after some but not all items have drained.
    for _ in 0..10 {
        controller.drain_tick().await;
        for uri in &uris {
            controller.notify_file(uri, None).await;
        }
    }
    controller.set_throttle(0.5);
    assert!(controller.throttle_interval() > Duration::ZERO);

    drain_and_complete(&mut controller, &uris).await;

    assert_eq!(*controller.phase(), Phase::Idle);
    let batches = store.applied_batches();
    assert_eq!(batches.len(), 100, "no item should be dropped across a throttle change");

    let dispatch_order: Vec<&Uri> = uris.iter().collect();
    for (batch, expected) in batches.iter().zip(dispatch_order) {
        assert!(
            batch.starts_with(&format!("DROP GRAPH <{expected}>")),
            "items must drain in the FIFO order they were created in, regardless of throttle"
        );
    }
}

#[tokio::test]
async fn pool_limit_one_serializes_extraction_under_a_thousand_synthetic_events() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let root = Uri::from_path(dir.path());

    let mut controller = build_controller(Arc::clone(&store), Arc::new(AcceptAllExtractor), 1);
    controller.add_root(root.clone(), true).await.unwrap();
    controller.start().await;
    assert_eq!(*controller.phase(), Phase::Draining);

    let uris: Vec<Uri> = (0..1000).map(|i| root.join(format!("f{i:04}.txt"))).collect();
    for uri in &uris {
        controller.handle_monitor_event(MonitorEvent::Created { uri: uri.clone(), is_dir: false });
    }

    loop {
        let dispatched = controller.drain_tick().await;
        assert!(dispatched <= 1, "pool_limit=1 must never dispatch more than one extraction per tick");
        for uri in &uris {
            controller.notify_file(uri, None).await;
        }
        if dispatched == 0 {
            break;
        }
    }

    assert_eq!(*controller.phase(), Phase::Idle);
    assert_eq!(store.applied_batches().len(), 1000);
}

#[tokio::test]
async fn move_with_untracked_source_behaves_like_a_create() {
    use minerfs_core::controller::move_resolver::{resolve, MoveResolution};

    let store = InMemoryStore::new();
    let cancel = CancellationToken::new();
    let resolution = resolve(&store, &Uri::from_path("/a/old"), &Uri::from_path("/a/new"), true, &cancel).await;
    assert!(matches!(resolution, MoveResolution::FallBackToCreate));
}
