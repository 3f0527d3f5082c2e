//! Test server management.
//!
//! Spawns in-process duetd instances on ephemeral ports for integration
//! testing.

// Each test binary uses a different slice of this harness.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use duetd::config::Config;
use duetd::hub::Hub;
use duetd::messenger::{LineMessenger, Messenger};
use duetd::net::Gateway;

/// A test server instance.
pub struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
    storage_path: PathBuf,
    _data_dir: Option<TempDir>,
}

impl TestServer {
    /// Spawn a server with test defaults: ephemeral port, temp storage,
    /// rate limits opened wide so tests can send freely.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn a server with a customized configuration.
    pub async fn spawn_with(mutate: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let mut config = Self::base_config();
        config.storage.path = data_dir.path().join("state.json");
        mutate(&mut config);

        let (addr, task, storage_path) = Self::launch(config).await?;
        Ok(Self {
            addr,
            task,
            storage_path,
            _data_dir: Some(data_dir),
        })
    }

    /// Spawn a server over an existing storage path. Used by restart
    /// tests; the caller owns the directory's lifetime.
    pub async fn spawn_on_storage(
        storage_path: PathBuf,
        mutate: impl FnOnce(&mut Config),
    ) -> anyhow::Result<Self> {
        let mut config = Self::base_config();
        config.storage.path = storage_path;
        mutate(&mut config);

        let (addr, task, storage_path) = Self::launch(config).await?;
        Ok(Self {
            addr,
            task,
            storage_path,
            _data_dir: None,
        })
    }

    fn base_config() -> Config {
        let mut config = Config::default();
        config.server.name = "test.duetd".to_string();
        config.server.listen = "127.0.0.1:0".parse().expect("static test address");
        config.rate_limits.message_rate_per_second = 1000;
        config.rate_limits.connection_burst_per_ip = 1000;
        config
    }

    async fn launch(config: Config) -> anyhow::Result<(SocketAddr, JoinHandle<()>, PathBuf)> {
        let storage_path = config.storage.path.clone();
        let messenger = Arc::new(LineMessenger::new());
        let hub = Hub::bootstrap(config, Arc::clone(&messenger) as Arc<dyn Messenger>);
        let gateway = Gateway::bind(hub, messenger).await?;
        let addr = gateway.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = gateway.run().await;
        });
        Ok((addr, task, storage_path))
    }

    /// The server's bound address.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// The snapshot path this server persists to.
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone()
    }

    /// Create a new test client connected and identified to this server.
    pub async fn connect(&self, user: &str) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(self.addr, user).await
    }

    /// Stop accepting connections. Already-persisted state stays on disk.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
