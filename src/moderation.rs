//! Report tracking and temporary bans.
//!
//! Reports are attributable only to the reporter's most recent former
//! partner. Crossing the threshold sets a time-boxed ban on the target;
//! expiry is evaluated lazily on read, so no sweeper task is needed.

use std::sync::Arc;
use tracing::info;

use crate::config::ModerationConfig;
use crate::state::{Matchmaker, UserDirectory, UserId};

/// Outcome of filing a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The reporter has no former partner on record.
    NothingToReport,
    /// The report was counted against the target.
    Recorded { target: UserId, count: u32 },
    /// The report crossed the threshold and the target is now banned.
    Banned { target: UserId, until: i64 },
}

/// The moderation subsystem. Exclusively owns mutation of
/// `report_count` and `banned_until`.
pub struct Moderation {
    directory: Arc<UserDirectory>,
    matchmaker: Arc<Matchmaker>,
    config: ModerationConfig,
}

impl Moderation {
    pub fn new(
        directory: Arc<UserDirectory>,
        matchmaker: Arc<Matchmaker>,
        config: ModerationConfig,
    ) -> Self {
        Self {
            directory,
            matchmaker,
            config,
        }
    }

    /// File a report against the reporter's last former partner.
    pub fn file_report(&self, reporter: &str) -> ReportOutcome {
        let Some(target) = self.matchmaker.last_partner_of(reporter) else {
            return ReportOutcome::NothingToReport;
        };

        let threshold = self.config.ban_threshold;
        let duration = self.config.ban_duration_secs;
        let reset = self.config.reset_on_ban;
        let now = chrono::Utc::now().timestamp();

        let mut tripped = None;
        let Some(updated) = self.directory.update(&target, |profile| {
            profile.report_count += 1;
            if profile.report_count >= threshold {
                profile.banned_until = Some(now + duration);
                if reset {
                    profile.report_count = 0;
                }
                tripped = Some(now + duration);
            }
        }) else {
            // Last-partner entry pointing at an unknown user; treat as
            // nothing to report rather than failing the reporter.
            return ReportOutcome::NothingToReport;
        };

        match tripped {
            Some(until) => {
                info!(user = %target, until, "User banned by report threshold");
                ReportOutcome::Banned { target, until }
            }
            None => ReportOutcome::Recorded {
                target,
                count: updated.report_count,
            },
        }
    }

    /// The active ban expiry for a user, if one is in force.
    ///
    /// An expired ban is cleared on read.
    pub fn is_banned(&self, id: &str) -> Option<i64> {
        let profile = self.directory.get(id)?;
        let until = profile.banned_until?;
        let now = chrono::Utc::now().timestamp();
        if until > now {
            return Some(until);
        }
        self.directory.update(id, |profile| {
            profile.banned_until = None;
        });
        info!(user = %id, "Expired ban cleared");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::state::Profile;

    fn fixture(config: ModerationConfig) -> (Arc<UserDirectory>, Arc<Matchmaker>, Moderation) {
        let directory = Arc::new(UserDirectory::new());
        let matchmaker = Arc::new(Matchmaker::new(
            Arc::clone(&directory),
            MatchingConfig {
                pairing: crate::config::PairingMode::Fifo,
                ..Default::default()
            },
        ));
        let moderation = Moderation::new(
            Arc::clone(&directory),
            Arc::clone(&matchmaker),
            config,
        );
        (directory, matchmaker, moderation)
    }

    fn pair_and_end(directory: &UserDirectory, matchmaker: &Matchmaker, a: &str, b: &str) {
        let pa: Profile = directory.get_or_create(a).unwrap();
        let pb: Profile = directory.get_or_create(b).unwrap();
        matchmaker.try_match(&pa);
        matchmaker.try_match(&pb);
        matchmaker.end_session(a);
    }

    #[test]
    fn report_without_history_is_nothing_to_report() {
        let (directory, _, moderation) = fixture(ModerationConfig::default());
        directory.get_or_create("lonely").unwrap();
        assert_eq!(
            moderation.file_report("lonely"),
            ReportOutcome::NothingToReport
        );
    }

    #[test]
    fn reports_accumulate_until_threshold_bans() {
        let (directory, matchmaker, moderation) = fixture(ModerationConfig {
            ban_threshold: 3,
            ..Default::default()
        });
        pair_and_end(&directory, &matchmaker, "target", "reporter");

        assert_eq!(
            moderation.file_report("reporter"),
            ReportOutcome::Recorded {
                target: "target".to_string(),
                count: 1
            }
        );
        assert_eq!(
            moderation.file_report("reporter"),
            ReportOutcome::Recorded {
                target: "target".to_string(),
                count: 2
            }
        );

        let outcome = moderation.file_report("reporter");
        let ReportOutcome::Banned { target, until } = outcome else {
            panic!("expected ban, got {outcome:?}");
        };
        assert_eq!(target, "target");
        let now = chrono::Utc::now().timestamp();
        // Default duration is 24h; allow slack for test scheduling.
        assert!((until - now - 86_400).abs() < 5);

        // Reset-on-ban: the counter starts over.
        assert_eq!(directory.get("target").unwrap().report_count, 0);
        assert!(moderation.is_banned("target").is_some());
    }

    #[test]
    fn expired_ban_clears_lazily() {
        let (directory, _, moderation) = fixture(ModerationConfig::default());
        directory.get_or_create("old").unwrap();
        directory.update("old", |p| {
            p.banned_until = Some(chrono::Utc::now().timestamp() - 10)
        });

        assert_eq!(moderation.is_banned("old"), None);
        assert_eq!(directory.get("old").unwrap().banned_until, None);
    }

    #[test]
    fn active_ban_is_reported_until_expiry() {
        let (directory, _, moderation) = fixture(ModerationConfig::default());
        directory.get_or_create("bad").unwrap();
        let until = chrono::Utc::now().timestamp() + 3600;
        directory.update("bad", |p| p.banned_until = Some(until));

        assert_eq!(moderation.is_banned("bad"), Some(until));
    }

    #[test]
    fn accumulating_policy_keeps_counting() {
        let (directory, matchmaker, moderation) = fixture(ModerationConfig {
            ban_threshold: 2,
            reset_on_ban: false,
            ..Default::default()
        });
        pair_and_end(&directory, &matchmaker, "target", "reporter");

        moderation.file_report("reporter");
        let outcome = moderation.file_report("reporter");
        assert!(matches!(outcome, ReportOutcome::Banned { .. }));
        assert_eq!(directory.get("target").unwrap().report_count, 2);
    }
}
