mod app;
mod persist;

use anyhow::{Context, Result};
use std::{
    env,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use cardvault_core::{
    config::{self, AppConfig},
    CollectionStore, SharedStore, StorageManager,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let import = import_arg()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir)?;

    let storage = StorageManager::from_config(&config);
    let state = match &import {
        Some(path) => storage.import_file(path)?,
        None => storage.load_state()?,
    };

    let (sink, persist_rx, writer) = persist::spawn_writer(storage.clone());
    let store = SharedStore::new(CollectionStore::new(state, config.deck_rules, Box::new(sink)));
    if let Some(path) = import {
        let snapshot = store.read().snapshot();
        storage
            .write_snapshot(&snapshot)
            .with_context(|| format!("failed to store import from {}", path.display()))?;
        info!("imported {}", path.display());
    }

    let mut app = app::CardVaultApp::new(store, storage, config.default_sort);
    app.attach_persistence(persist_rx);
    let result = app.run().await;

    drop(app);
    writer.await.context("persistence writer failed")?;
    result
}

fn import_arg() -> Result<Option<PathBuf>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(None),
        Some("--import") => args
            .next()
            .map(|path| Some(PathBuf::from(path)))
            .context("--import needs a file path"),
        Some(other) => Err(anyhow::anyhow!(
            "unknown argument {other}; usage: cardvault [--import PATH]"
        )),
    }
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("cardvault.log");

    let env_filter = EnvFilter::from_default_env();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
