//! The user directory.
//!
//! Per-user profile and moderation state keyed by user id. Single-record
//! updates are atomic through the map's entry locking; cross-record
//! consistency is the matchmaker's job, not the directory's.

use dashmap::DashMap;
use std::collections::BTreeMap;

use crate::error::HandlerError;
use crate::state::{Profile, UserId};

/// Holds every profile the daemon has ever seen.
#[derive(Debug, Default)]
pub struct UserDirectory {
    profiles: DashMap<UserId, Profile>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a profile, creating it on first contact.
    ///
    /// Idempotent: an existing profile is returned untouched. Empty ids
    /// are rejected.
    pub fn get_or_create(&self, id: &str) -> Result<Profile, HandlerError> {
        if id.is_empty() {
            return Err(HandlerError::EmptyUserId);
        }
        let entry = self
            .profiles
            .entry(id.to_string())
            .or_insert_with(|| Profile::new(id.to_string()));
        Ok(entry.value().clone())
    }

    pub fn get(&self, id: &str) -> Option<Profile> {
        self.profiles.get(id).map(|entry| entry.value().clone())
    }

    /// Apply a mutation to one profile record atomically.
    ///
    /// Returns the updated profile, or `None` if the user is unknown.
    pub fn update<F>(&self, id: &str, mutate: F) -> Option<Profile>
    where
        F: FnOnce(&mut Profile),
    {
        let mut entry = self.profiles.get_mut(id)?;
        mutate(entry.value_mut());
        Some(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Export every profile, sorted by id for a stable snapshot.
    pub fn export(&self) -> BTreeMap<UserId, Profile> {
        self.profiles
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Restore profiles from a snapshot.
    pub fn restore(snapshot: BTreeMap<UserId, Profile>) -> Self {
        let directory = Self::new();
        for (id, profile) in snapshot {
            directory.profiles.insert(id, profile);
        }
        directory
    }
}
