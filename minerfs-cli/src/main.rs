//! Demo binary: wires a [`LocalFsProvider`], a [`NotifyMonitor`], an
//! in-memory [`Store`] and a no-op [`Extractor`] together and runs a single
//! crawl plus a short live-monitoring window against one directory.
//!
//! This is not the daemon: CLI parsing here only covers enough to exercise
//! the library end to end (§6's "CLI surface" names the full daemon flag set
//! as an external collaborator this repo does not reimplement).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use minerfs_core::config::Config;
use minerfs_core::controller::Controller;
use minerfs_core::data_provider::local_fs::LocalFsProvider;
use minerfs_core::data_provider::DataProvider;
use minerfs_core::extractor::{Extractor, NoopExtractor};
use minerfs_core::monitor::debounce::Debouncer;
use minerfs_core::monitor::notify_monitor::{translate, NotifyMonitor};
use minerfs_core::rules::default_rules;
use minerfs_core::store::{InMemoryStore, Store};

#[derive(Parser, Debug)]
#[command(name = "minerfs-demo", about = "Crawl and watch a directory through minerfs-core")]
struct Args {
    /// Directory to crawl and monitor.
    root: PathBuf,

    /// Disables indexing: the crawl and monitor still run, but no batch
    /// update is ever sent to the store.
    #[arg(short = 'n', long)]
    disable_indexing: bool,

    /// How long to keep watching for live changes after the initial crawl.
    #[arg(short, long, default_value_t = 5)]
    watch_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let root = minerfs_core::Uri::from_path(&args.root);

    let monitor = NotifyMonitor::new()?;
    let mut raw_events = monitor.take_raw_events();
    let provider: Arc<dyn DataProvider> = Arc::new(LocalFsProvider::new(monitor));
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let extractor: Arc<dyn Extractor> = Arc::new(NoopExtractor);

    let mut config = Config {
        disable_indexing: args.disable_indexing,
        ..Config::default()
    };
    config.normalize();

    let mut controller = Controller::new(&config, Arc::clone(&provider), store, extractor, default_rules(), default_rules());

    info!(root = %root, "adding root");
    controller.add_root(root.clone(), true).await?;

    info!("starting crawl");
    controller.start().await;
    while controller.drain_tick().await > 0 {}
    info!(phase = ?controller.phase(), "initial crawl drained");

    info!(seconds = args.watch_seconds, "watching for live changes");
    watch_for(args.watch_seconds, &mut controller, &mut raw_events).await;

    controller.remove_root(&root).await?;
    info!("demo complete");
    Ok(())
}

/// Translates and debounces raw `notify` events into the controller's
/// queues for `seconds`, at the same cadence as the throttle-driven queue
/// handler (§4.2, §4.7) — a compressed stand-in for the daemon's lifetime.
async fn watch_for(seconds: u64, controller: &mut Controller, raw_events: &mut tokio::sync::mpsc::UnboundedReceiver<notify::Event>) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
    let mut debouncer = Debouncer::new(Duration::from_secs(2));
    let mut ticker = tokio::time::interval(controller.throttle_interval().max(Duration::from_millis(50)));

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = ticker.tick() => {
                for event in debouncer.drain_settled() {
                    controller.handle_monitor_event(event);
                }
                controller.drain_tick().await;
                if let Some(progress) = controller.progress(std::time::Instant::now()) {
                    info!(progress, "status");
                }
            }
            Some(raw) = raw_events.recv() => {
                for event in translate(&raw) {
                    match &event {
                        minerfs_core::monitor::MonitorEvent::Created { uri, is_dir } => debouncer.record_create(uri.clone(), *is_dir),
                        minerfs_core::monitor::MonitorEvent::Updated { uri, is_dir } => debouncer.record_update(uri.clone(), *is_dir),
                        _ => controller.handle_monitor_event(event),
                    }
                }
            }
        }
    }
}
