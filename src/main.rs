mod backend;
mod backends;
mod bridge;
mod config;
mod dashboard;
mod identity;
mod message;
mod session;
mod settings;
mod store;
mod util;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use backend::Backend;
use backends::LoopbackBackend;
use config::Config;
use dashboard::Dashboard;
use session::SessionController;
use store::{MemorySettingsStore, SettingsStore, SqliteSettingsStore};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "parley.toml".to_string());
    let config = Config::load_or_default(Path::new(&config_path))?;

    let store: Arc<dyn SettingsStore> = if config.session.settings_path == ":memory:" {
        log::info!("Using in-memory settings, nothing will be persisted");
        Arc::new(MemorySettingsStore::new())
    } else {
        let store = SqliteSettingsStore::open(Path::new(&config.session.settings_path))?;
        log::info!("Settings store opened at {}", config.session.settings_path);
        Arc::new(store)
    };

    let backend: Arc<dyn Backend> = match config.backend.kind.as_str() {
        "loopback" => LoopbackBackend::start(config.backend.loopback()),
        other => return Err(format!("Unknown backend kind: {}", other).into()),
    };
    log::info!("Using {} backend", backend.name());

    let controller = SessionController::new(backend, store, &config.session)?;
    let (handle, commands) = controller.handle(config.session.command_queue_capacity);
    let session_task = tokio::spawn(controller.run(commands));

    let dashboard_task = if config.dashboard.enabled {
        let dashboard = Dashboard::new(config.dashboard.clone(), handle.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = dashboard.run().await {
                log::error!("Dashboard error: {}", e);
            }
        }))
    } else {
        None
    };

    handle.initialize().await;

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");

    if let Some(task) = dashboard_task {
        task.abort();
    }
    drop(handle);

    // Open SSE connections may still hold handles; don't wait on them forever.
    match tokio::time::timeout(SHUTDOWN_GRACE, session_task).await {
        Ok(Err(e)) => log::error!("Session controller task failed: {}", e),
        Ok(Ok(())) => {}
        Err(_) => log::warn!("Session controller still busy after {:?}, exiting", SHUTDOWN_GRACE),
    }
    Ok(())
}
