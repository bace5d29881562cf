//! cogito-brain: daemon that runs the cognitive cycles and serves the HTTP API.

mod api;
mod commands;
mod config;
mod cycle;
mod feed;
mod generator;
mod journal;
mod records;
mod scheduler;
mod storage;

use anyhow::Result;
use clap::Parser;
use cogito_types::JournalEventKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cogito-brain", about = "Autonomous thinking simulator daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "cogito.toml")]
    config: PathBuf,

    /// Override log level.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config first (before async runtime) for tracing setup.
    let config = config::MindConfig::load_or_default(&cli.config)?;

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "cogito-brain starting");

    // tokio::spawn panics go to stderr by default.
    std::panic::set_hook(Box::new(|info| {
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".into()
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();
        tracing::error!(payload = %payload, location = %location, "PANIC");
    }));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("cogito-brain")
        .build()?;

    runtime.block_on(async_main(config, cli.config))
}

async fn async_main(config: config::MindConfig, config_path: PathBuf) -> Result<()> {
    let storage = storage::Storage::init(&config.storage)?;
    let state = storage.initialize_state(&config.levels)?;
    info!(mode = %state.mode, generation = state.generation, "storage initialized");

    let records = records::RecordStore::new(storage.db.clone());

    let journal = Arc::new(journal::Journal::open(
        &config.storage.journal_dir,
        config.storage.journal_max_size,
    )?);
    info!(file = %journal.current_file().display(), "journal opened");
    journal.emit(
        JournalEventKind::SystemStartup,
        None,
        None,
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "config_path": config_path.display().to_string(),
            "mode": state.mode,
        }),
    )?;

    let feed = feed::ChangeFeed::new(config.feed.capacity);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mind = Arc::new(MindState {
        config: config.clone(),
        storage,
        records,
        journal: journal.clone(),
        feed,
        provider: Arc::new(generator::CannedContent),
        shutdown_tx,
    });

    let scheduler = scheduler::Scheduler::new(mind.clone(), shutdown_rx.clone());
    let scheduler_sender = scheduler.sender();

    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run().await {
            error!("scheduler exited with error: {e}");
        }
    });

    if config.cycles.resume_on_start {
        if let Err(e) = commands::resume(&mind, &scheduler_sender).await {
            error!("failed to resume persisted cycle: {e:#}");
        }
    }

    let api_handle = tokio::spawn({
        let mind = mind.clone();
        let shutdown = shutdown_rx.clone();
        async move {
            if let Err(e) = api::serve(mind, scheduler_sender, shutdown).await {
                error!("API server exited with error: {e}");
            }
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    // ── Graceful Shutdown Sequence ────────────────────────────────────
    info!("initiating graceful shutdown");

    journal.emit(JournalEventKind::SystemShutdown, None, None, serde_json::json!({}))?;

    // Scheduler stops, pending timers are dropped, API stops accepting.
    let _ = mind.shutdown_tx.send(true);

    let grace = std::time::Duration::from_millis(config.daemon.shutdown_grace_ms);
    let mut scheduler_handle = scheduler_handle;
    if tokio::time::timeout(grace, &mut scheduler_handle).await.is_err() {
        tracing::warn!("scheduler did not stop within grace period");
        scheduler_handle.abort();
    }

    let mut api_handle = api_handle;
    if tokio::time::timeout(grace, &mut api_handle).await.is_err() {
        tracing::warn!("API server did not stop within grace period");
        api_handle.abort();
    }

    info!("cogito-brain shut down cleanly");
    Ok(())
}

/// Shared state accessible to every subsystem.
pub struct MindState {
    pub config: config::MindConfig,
    pub storage: storage::Storage,
    pub records: records::RecordStore,
    pub journal: Arc<journal::Journal>,
    pub feed: feed::ChangeFeed,
    pub provider: Arc<dyn generator::ContentProvider>,
    /// Send `true` to trigger graceful shutdown of all subsystems.
    pub shutdown_tx: tokio::sync::watch::Sender<bool>,
}

/// A mind over temporary storage with the given content provider.
#[cfg(test)]
pub(crate) fn test_mind(
    provider: impl generator::ContentProvider + 'static,
) -> (tempfile::TempDir, Arc<MindState>) {
    let (dir, storage) = storage::test_storage();
    let journal = journal::Journal::open(&dir.path().join("journal"), 1024 * 1024).unwrap();
    let (shutdown_tx, _) = tokio::sync::watch::channel(false);
    let mind = MindState {
        config: config::MindConfig::default(),
        records: records::RecordStore::new(storage.db.clone()),
        storage,
        journal: Arc::new(journal),
        feed: feed::ChangeFeed::new(64),
        provider: Arc::new(provider),
        shutdown_tx,
    };
    (dir, Arc::new(mind))
}
