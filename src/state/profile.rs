//! User profile types.

use serde::{Deserialize, Serialize};

use crate::config::{PairingMode, RequiredProfile};

/// Opaque stable user identifier, assigned by the transport platform.
pub type UserId = String;

/// A user's gender attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Unset,
    Male,
    Female,
}

impl Gender {
    /// The bucket a seeker of this gender draws candidates from.
    pub fn opposite(self) -> Option<Gender> {
        match self {
            Gender::Unset => None,
            Gender::Male => Some(Gender::Female),
            Gender::Female => Some(Gender::Male),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Unset => "unset",
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// A wait-queue partition key.
///
/// Under [`PairingMode::Preference`] users wait in the bucket of their own
/// gender and seekers draw from the opposite bucket; under
/// [`PairingMode::Fifo`] everyone shares the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Pool,
    Gender(Gender),
}

impl Bucket {
    /// The bucket a user waits in.
    pub fn waiting(mode: PairingMode, gender: Gender) -> Bucket {
        match mode {
            PairingMode::Fifo => Bucket::Pool,
            PairingMode::Preference => Bucket::Gender(gender),
        }
    }

    /// The bucket a seeker draws candidates from, if their profile
    /// supports one.
    pub fn seeking(mode: PairingMode, gender: Gender) -> Option<Bucket> {
        match mode {
            PairingMode::Fifo => Some(Bucket::Pool),
            PairingMode::Preference => gender.opposite().map(Bucket::Gender),
        }
    }

    /// Stable string key used in the persisted snapshot.
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Pool => "pool",
            Bucket::Gender(Gender::Unset) => "unset",
            Bucket::Gender(Gender::Male) => "male",
            Bucket::Gender(Gender::Female) => "female",
        }
    }

    /// Parse a snapshot key back into a bucket.
    pub fn parse(key: &str) -> Option<Bucket> {
        match key {
            "pool" => Some(Bucket::Pool),
            "unset" => Some(Bucket::Gender(Gender::Unset)),
            "male" => Some(Bucket::Gender(Gender::Male)),
            "female" => Some(Bucket::Gender(Gender::Female)),
            _ => None,
        }
    }
}

/// Per-user profile and moderation state.
///
/// Profiles are created on first contact and never deleted; bans are
/// time-boxed, not destructive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub report_count: u32,
    #[serde(default)]
    pub banned_until: Option<i64>,
    /// Premium flag. Feature stub, always false in practice.
    #[serde(default)]
    pub premium: bool,
    pub created_at: i64,
}

impl Profile {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            gender: Gender::Unset,
            age: None,
            country: None,
            report_count: 0,
            banned_until: None,
            premium: false,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether the profile satisfies the matchmaking prerequisites.
    pub fn is_complete(&self, required: RequiredProfile) -> bool {
        match required {
            RequiredProfile::Gender => self.gender != Gender::Unset,
            RequiredProfile::Full => {
                self.gender != Gender::Unset && self.age.is_some() && self.country.is_some()
            }
        }
    }
}
