//! The Hub - central shared state for the daemon.
//!
//! Wires the directory, matchmaker, moderation, relay, and store
//! together and owns the persist-after-mutation path.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::messenger::Messenger;
use crate::moderation::Moderation;
use crate::relay::Relay;
use crate::state::{Matchmaker, UserDirectory};
use crate::storage::{PersistedState, Store};

/// Central shared state container.
pub struct Hub {
    pub config: Config,
    pub directory: Arc<UserDirectory>,
    pub matchmaker: Arc<Matchmaker>,
    pub moderation: Moderation,
    pub relay: Relay,
    pub messenger: Arc<dyn Messenger>,
    pub store: Store,
}

impl Hub {
    /// Build the hub, restoring durable state from the snapshot store.
    pub fn bootstrap(config: Config, messenger: Arc<dyn Messenger>) -> Arc<Hub> {
        let store = Store::new(config.storage.path.clone());
        let snapshot = store.load();
        info!(
            users = snapshot.users.len(),
            sessions = snapshot.active.len() / 2,
            queued = snapshot.queues.values().map(Vec::len).sum::<usize>(),
            "State restored"
        );

        let directory = Arc::new(UserDirectory::restore(snapshot.users));
        let matchmaker = Arc::new(Matchmaker::restore(
            Arc::clone(&directory),
            config.matching.clone(),
            snapshot.queues,
            snapshot.active,
            snapshot.last_partner,
        ));
        let moderation = Moderation::new(
            Arc::clone(&directory),
            Arc::clone(&matchmaker),
            config.moderation.clone(),
        );
        let relay = Relay::new(Arc::clone(&matchmaker), Arc::clone(&messenger));

        Arc::new(Hub {
            config,
            directory,
            matchmaker,
            moderation,
            relay,
            messenger,
            store,
        })
    }

    /// A point-in-time snapshot of all durable state.
    pub fn snapshot(&self) -> PersistedState {
        let (queues, active, last_partner) = self.matchmaker.export();
        PersistedState {
            users: self.directory.export(),
            queues,
            active,
            last_partner,
        }
    }

    /// Persist the current state. Failures are logged, never fatal: the
    /// in-memory state stays authoritative until the next successful
    /// write.
    pub async fn persist(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "Failed to persist snapshot");
        }
    }

    /// Transport-level disconnect: tear down any active session and let
    /// the partner know. Queue membership is left alone; queued users
    /// survive reconnects and restarts.
    pub async fn handle_disconnect(&self, user: &str) {
        if let Some(partner) = self.matchmaker.end_session(user) {
            info!(user = %user, partner = %partner, "Session ended by disconnect");
            if let Err(e) = self
                .messenger
                .send(&partner, "* your partner disconnected, send /find to meet someone new")
                .await
            {
                warn!(user = %partner, error = %e, "Failed to notify partner of disconnect");
            }
            self.persist().await;
        }
    }
}
