use std::sync::Arc;
use std::time::Duration;

use bosswatch_core::clock::{Clock, SystemClock};
use bosswatch_core::config::BosswatchConfig;
use bosswatch_notifier::{DailyNotifier, HttpWebhook, NotifierOptions};
use bosswatch_scheduler::{Promoter, StatusBoard};
use bosswatch_store::{DocumentStore, SqliteStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bosswatch_daemon=info,bosswatch_scheduler=info,bosswatch_notifier=info,bosswatch_store=info"
                    .into()
            }),
        )
        .init();

    // load config: BOSSWATCH_CONFIG env > ~/.bosswatch/bosswatch.toml
    let config_path = std::env::var("BOSSWATCH_CONFIG").ok();
    let config = BosswatchConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        BosswatchConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(SqliteStore::from_connection(conn, Arc::clone(&clock))?);
    info!(bosses = store.list_bosses()?.len(), "catalog loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // pick up writes made by other processes sharing the database file
    let watch_every = Duration::from_millis(config.store.watch_interval_ms.max(50));
    tasks.push(tokio::spawn(watch_store(
        Arc::clone(&store),
        watch_every,
        shutdown_rx.clone(),
    )));

    tasks.push(tokio::spawn(log_status_board(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&clock),
        shutdown_rx.clone(),
    )));

    let promoter = Arc::new(Promoter::new(
        store.clone(),
        Arc::clone(&clock),
        Duration::from_secs(config.promoter.interval_secs.max(1)),
    ));
    tasks.push(tokio::spawn(promoter.run(shutdown_rx.clone())));

    // the operator-present gate; held open for the life of the process
    let (_enabled_tx, enabled_rx) = watch::channel(config.notifier.enabled);
    if !config.notifier.enabled {
        info!("daily notifier disabled by config");
    }
    let transport = HttpWebhook::new(Duration::from_secs(config.notifier.request_timeout_secs))?;
    let notifier = DailyNotifier::new(
        store.clone(),
        Arc::new(transport),
        Arc::clone(&clock),
        enabled_rx,
        NotifierOptions::from(&config.notifier),
    );
    tasks.push(tokio::spawn(notifier.run(shutdown_rx.clone())));

    info!("bosswatch daemon running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("background task ended abnormally: {e}");
        }
    }
    Ok(())
}

/// Poll the store for commits from other connections until shutdown.
async fn watch_store(store: Arc<SqliteStore>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let store = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || store.refresh_if_changed()).await {
                    Ok(Ok(true)) => debug!("store snapshots refreshed"),
                    Ok(Ok(false)) => {}
                    Ok(Err(e)) => warn!("store refresh failed: {e}"),
                    Err(e) => warn!("store refresh task failed: {e}"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Log a status summary whenever the catalog snapshot changes.
async fn log_status_board(
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut bosses = store.subscribe_bosses();
    bosses.mark_changed();
    loop {
        tokio::select! {
            changed = bosses.changed() => {
                if changed.is_err() {
                    break;
                }
                let board = StatusBoard::build(&bosses.borrow_and_update(), &clock.now());
                info!(
                    total = board.total(),
                    alive = board.alive.len(),
                    respawning = board.respawning.len(),
                    dead = board.dead.len(),
                    unknown = board.unknown.len(),
                    "catalog status"
                );
                let soon = board.respawning_names();
                if !soon.is_empty() {
                    info!(bosses = %soon.join(", "), "respawning within 10 minutes");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
