//! The matching coordinator.
//!
//! Owns the single mutual-exclusion section that covers the wait queues
//! and the session table. Every pairing decision happens inside one lock
//! acquisition, which is what rules out double-booking, self-matching,
//! and dropped candidates under concurrent `/find` calls. Notifications
//! are the caller's job and happen after the lock is released.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::MatchingConfig;
use crate::state::{Bucket, Profile, QueueSet, SessionTable, UserDirectory, UserId};

/// Outcome of a matching attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// A session with this partner was committed.
    Paired(UserId),
    /// No compatible partner was waiting; the user is now queued.
    Waiting,
    /// The user already has an active session; nothing changed.
    AlreadyPaired,
}

/// Outcome of a skip: teardown plus immediate re-match, as one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipOutcome {
    /// The partner the skipper left, if there was a session.
    pub ex_partner: Option<UserId>,
    /// The skipper's re-match result.
    pub rematch: MatchResult,
    /// Whether policy put the skipped partner back into the queue.
    pub partner_requeued: bool,
}

/// Outcome of `/stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// An active session was torn down; the partner should be notified.
    EndedWith(UserId),
    /// The user was waiting and has been removed from the queue.
    SearchCancelled,
    /// Nothing to stop.
    Idle,
}

#[derive(Debug, Default)]
struct PairingState {
    queues: QueueSet,
    sessions: SessionTable,
}

/// Atomically pairs seekers with queued candidates.
pub struct Matchmaker {
    state: Mutex<PairingState>,
    directory: Arc<UserDirectory>,
    config: MatchingConfig,
}

impl Matchmaker {
    pub fn new(directory: Arc<UserDirectory>, config: MatchingConfig) -> Self {
        Self {
            state: Mutex::new(PairingState::default()),
            directory,
            config,
        }
    }

    /// Restore queues and sessions from a snapshot, enforcing the
    /// queue-xor-session invariant: ids that appear on both sides are
    /// kept paired and dropped from the queue.
    pub fn restore(
        directory: Arc<UserDirectory>,
        config: MatchingConfig,
        queues: BTreeMap<String, Vec<UserId>>,
        active: BTreeMap<UserId, UserId>,
        last_partner: BTreeMap<UserId, UserId>,
    ) -> Self {
        let (sessions, dropped_sessions) = SessionTable::restore(active, last_partner);
        if dropped_sessions > 0 {
            warn!(
                dropped = dropped_sessions,
                "Dropped inconsistent session entries from snapshot"
            );
        }

        let mut queues = QueueSet::restore(queues);
        let mut shadowed = 0;
        for (_, ids) in queues.export() {
            for id in ids {
                if sessions.is_paired(&id) && queues.remove(&id) {
                    shadowed += 1;
                }
            }
        }
        if shadowed > 0 {
            warn!(
                dropped = shadowed,
                "Dropped queued users that were also in a session"
            );
        }

        Self {
            state: Mutex::new(PairingState { queues, sessions }),
            directory,
            config,
        }
    }

    /// Attempt to pair a seeker with a waiting candidate.
    pub fn try_match(&self, seeker: &Profile) -> MatchResult {
        let mut state = self.state.lock();
        Self::match_locked(&mut state, &self.directory, &self.config, seeker)
    }

    /// Tear down the seeker's session (if any) and immediately re-enter
    /// matching, in a single critical section. Re-using the public entry
    /// points here would release the lock between the two steps.
    pub fn skip(&self, seeker: &Profile) -> SkipOutcome {
        let mut state = self.state.lock();

        let ex_partner = state.sessions.remove_pair(&seeker.id);
        let rematch = Self::match_locked(&mut state, &self.directory, &self.config, seeker);

        // Re-queue the skipped partner only after the skipper has been
        // re-matched; the other order would pair the two right back up.
        let mut partner_requeued = false;
        if let Some(partner_id) = &ex_partner
            && self.config.requeue_skipped
            && let Some(partner) = self.directory.get(partner_id)
        {
            let bucket = Bucket::waiting(self.config.pairing, partner.gender);
            partner_requeued = state.queues.enqueue(partner_id, bucket);
        }

        SkipOutcome {
            ex_partner,
            rematch,
            partner_requeued,
        }
    }

    /// End the user's session, recording last-partner both ways.
    /// No-op (`None`) without a session.
    pub fn end_session(&self, id: &str) -> Option<UserId> {
        self.state.lock().sessions.remove_pair(id)
    }

    /// Remove the user from the wait queue.
    pub fn cancel(&self, id: &str) -> bool {
        self.state.lock().queues.remove(id)
    }

    /// End a session or cancel a search, whichever is active.
    pub fn stop(&self, id: &str) -> StopOutcome {
        let mut state = self.state.lock();
        if let Some(partner) = state.sessions.remove_pair(id) {
            StopOutcome::EndedWith(partner)
        } else if state.queues.remove(id) {
            StopOutcome::SearchCancelled
        } else {
            StopOutcome::Idle
        }
    }

    pub fn partner_of(&self, id: &str) -> Option<UserId> {
        self.state.lock().sessions.partner_of(id).cloned()
    }

    pub fn is_paired(&self, id: &str) -> bool {
        self.state.lock().sessions.is_paired(id)
    }

    pub fn is_queued(&self, id: &str) -> bool {
        self.state.lock().queues.position(id).is_some()
    }

    pub fn last_partner_of(&self, id: &str) -> Option<UserId> {
        self.state.lock().sessions.last_partner_of(id).cloned()
    }

    pub fn waiting_count(&self) -> usize {
        self.state.lock().queues.len()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.pair_count()
    }

    /// Export queues, active sessions, and last-partner maps for the
    /// snapshot, in one consistent view.
    #[allow(clippy::type_complexity)]
    pub fn export(
        &self,
    ) -> (
        BTreeMap<String, Vec<UserId>>,
        BTreeMap<UserId, UserId>,
        BTreeMap<UserId, UserId>,
    ) {
        let state = self.state.lock();
        let (active, last_partner) = state.sessions.export();
        (state.queues.export(), active, last_partner)
    }

    fn match_locked(
        state: &mut PairingState,
        directory: &UserDirectory,
        config: &MatchingConfig,
        seeker: &Profile,
    ) -> MatchResult {
        if state.sessions.is_paired(&seeker.id) {
            return MatchResult::AlreadyPaired;
        }

        if let Some(bucket) = Bucket::seeking(config.pairing, seeker.gender) {
            while let Some(candidate) = state.queues.pop_compatible(bucket, &seeker.id) {
                // pop_compatible already skips the seeker; re-check anyway
                // rather than ever committing a self-session.
                if candidate == seeker.id {
                    debug!(user = %seeker.id, "Discarded self candidate");
                    continue;
                }
                if !Self::eligible(directory, state, &candidate) {
                    continue;
                }
                if state.sessions.insert_pair(&seeker.id, &candidate) {
                    return MatchResult::Paired(candidate);
                }
            }
        }

        state
            .queues
            .enqueue(&seeker.id, Bucket::waiting(config.pairing, seeker.gender));
        MatchResult::Waiting
    }

    /// A popped candidate must still exist, must not be mid-ban, and must
    /// not already be in a session.
    fn eligible(directory: &UserDirectory, state: &PairingState, candidate: &str) -> bool {
        if state.sessions.is_paired(candidate) {
            debug!(user = %candidate, "Discarded already-paired queue entry");
            return false;
        }
        match directory.get(candidate) {
            None => {
                debug!(user = %candidate, "Discarded unknown queue entry");
                false
            }
            Some(profile) => {
                let now = chrono::Utc::now().timestamp();
                if profile.banned_until.is_some_and(|until| until > now) {
                    debug!(user = %candidate, "Discarded banned queue entry");
                    false
                } else {
                    true
                }
            }
        }
    }
}
