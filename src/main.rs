//! duetd - anonymous one-to-one chat pairing daemon.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use duetd::config::Config;
use duetd::hub::Hub;
use duetd::messenger::{LineMessenger, Messenger};
use duetd::net::Gateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "duetd.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) if std::path::Path::new(&config_path).exists() => {
            error!(path = %config_path, error = %e, "Failed to load config");
            return Err(e.into());
        }
        Err(_) => {
            info!(path = %config_path, "No config file, using defaults");
            Config::default()
        }
    };

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        storage = %config.storage.path.display(),
        "Starting duetd"
    );

    let messenger = Arc::new(LineMessenger::new());
    let hub = Hub::bootstrap(config, Arc::clone(&messenger) as Arc<dyn Messenger>);

    let gateway = Gateway::bind(Arc::clone(&hub), messenger).await?;

    // Rate limiter pruning (runs every 5 minutes).
    {
        let limits = gateway.rate_limits();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limits.cleanup();
            }
        });
    }

    tokio::select! {
        result = gateway.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    // Final snapshot so nothing since the last mutation-time save is lost.
    hub.persist().await;
    info!("Shutdown complete");
    Ok(())
}
