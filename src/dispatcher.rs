//! The inbound event dispatcher.
//!
//! Every `(user, text)` event from the transport enters through
//! [`Dispatcher::dispatch`]: profile upsert, ban gate, then routing to
//! matchmaking, relay, moderation, or profile updates. User mistakes are
//! answered with corrective prompts; state conflicts get a neutral
//! notice and mutate nothing.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::HandlerResult;
use crate::hub::Hub;
use crate::moderation::ReportOutcome;
use crate::relay::RelayOutcome;
use crate::state::{Gender, MatchResult, StopOutcome};

const WELCOME: &str = "\
* welcome to duetd - anonymous one-on-one chat
*   /gender <male|female>   set your gender
*   /age <years>            set your age
*   /country <name>         set your country
*   /find                   find a partner
*   /next                   skip to a new partner
*   /stop                   end the chat or stop searching
*   /report                 report your last partner
*   /profile                show your profile";

const SEARCHING: &str = "* searching for a partner, hang tight";
const PARTNER_FOUND: &str = "* partner found, say hi";
const PARTNER_LEFT: &str = "* your partner left the chat, send /find to meet someone new";
const ALREADY_PAIRED: &str = "* you are already in a chat, /next to switch or /stop to leave";
const NO_SESSION: &str = "* you are not in a chat, send /find to get matched";
const LINKS_BLOCKED: &str = "* links are not allowed here, message not delivered";
const PROFILE_INCOMPLETE: &str = "* set up your profile first: /gender <male|female>";
const CHAT_ENDED: &str = "* chat ended, send /find when you are ready again";
const SEARCH_STOPPED: &str = "* search stopped";
const NOTHING_TO_STOP: &str = "* nothing to stop, send /find to get matched";
const NOTHING_TO_REPORT: &str = "* no recent partner to report";
const REPORT_RECORDED: &str = "* report recorded, thank you";

/// A parsed inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    SetGender(Option<String>),
    SetAge(Option<String>),
    SetCountry(Option<String>),
    Find,
    Next,
    Stop,
    Report,
    Profile,
    Unknown(String),
    Text(String),
}

impl Command {
    /// Parse one inbound line. Anything that does not start with `/` is
    /// relayed verbatim.
    pub fn parse(text: &str) -> Command {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return Command::Text(trimmed.to_string());
        }

        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts
            .next()
            .map(str::trim)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string);

        match name.as_str() {
            "/start" => Command::Start,
            "/gender" => Command::SetGender(arg),
            "/age" => Command::SetAge(arg),
            "/country" => Command::SetCountry(arg),
            "/find" => Command::Find,
            "/next" => Command::Next,
            "/stop" => Command::Stop,
            "/report" => Command::Report,
            "/profile" => Command::Profile,
            _ => Command::Unknown(name),
        }
    }
}

/// Routes inbound events to the core operations.
pub struct Dispatcher {
    hub: Arc<Hub>,
}

impl Dispatcher {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Handle one inbound `(user, text)` event.
    pub async fn dispatch(&self, user: &str, text: &str) -> HandlerResult {
        let profile = self.hub.directory.get_or_create(user)?;

        // Cross-cutting ban gate: banned users get the notice and
        // nothing else runs.
        if let Some(until) = self.hub.moderation.is_banned(user) {
            debug!(user = %user, until, "Rejected event from banned user");
            self.notify(user, &ban_notice(until)).await;
            return Ok(());
        }

        match Command::parse(text) {
            Command::Start => {
                self.notify(user, WELCOME).await;
                self.hub.persist().await;
            }
            Command::SetGender(arg) => {
                match arg.as_deref().map(str::to_ascii_lowercase).as_deref() {
                    Some("male") | Some("m") => self.set_gender(user, Gender::Male).await,
                    Some("female") | Some("f") => self.set_gender(user, Gender::Female).await,
                    _ => {
                        self.notify(user, "* usage: /gender <male|female>").await;
                    }
                }
            }
            Command::SetAge(arg) => match arg.as_deref().and_then(|a| a.parse::<u8>().ok()) {
                Some(age @ 13..=120) => {
                    self.hub.directory.update(user, |p| p.age = Some(age));
                    self.notify(user, &format!("* age set to {age}")).await;
                    self.hub.persist().await;
                }
                _ => {
                    self.notify(user, "* usage: /age <13-120>").await;
                }
            },
            Command::SetCountry(arg) => match arg {
                Some(country) => {
                    self.hub
                        .directory
                        .update(user, |p| p.country = Some(country.clone()));
                    self.notify(user, &format!("* country set to {country}")).await;
                    self.hub.persist().await;
                }
                None => {
                    self.notify(user, "* usage: /country <name>").await;
                }
            },
            Command::Find => {
                if !profile.is_complete(self.hub.config.matching.required_profile) {
                    self.notify(user, PROFILE_INCOMPLETE).await;
                    return Ok(());
                }
                let result = self.hub.matchmaker.try_match(&profile);
                self.announce_match(user, &result).await;
                self.hub.persist().await;
            }
            Command::Next => {
                if !profile.is_complete(self.hub.config.matching.required_profile) {
                    self.notify(user, PROFILE_INCOMPLETE).await;
                    return Ok(());
                }
                let outcome = self.hub.matchmaker.skip(&profile);
                if let Some(ex) = &outcome.ex_partner {
                    info!(user = %user, ex_partner = %ex, "Session skipped");
                    self.notify(ex, PARTNER_LEFT).await;
                    if outcome.partner_requeued {
                        self.notify(ex, SEARCHING).await;
                    }
                }
                self.announce_match(user, &outcome.rematch).await;
                self.hub.persist().await;
            }
            Command::Stop => match self.hub.matchmaker.stop(user) {
                StopOutcome::EndedWith(partner) => {
                    info!(user = %user, partner = %partner, "Session ended");
                    self.notify(&partner, PARTNER_LEFT).await;
                    self.notify(user, CHAT_ENDED).await;
                    self.hub.persist().await;
                }
                StopOutcome::SearchCancelled => {
                    self.notify(user, SEARCH_STOPPED).await;
                    self.hub.persist().await;
                }
                StopOutcome::Idle => {
                    self.notify(user, NOTHING_TO_STOP).await;
                }
            },
            Command::Report => match self.hub.moderation.file_report(user) {
                ReportOutcome::NothingToReport => {
                    self.notify(user, NOTHING_TO_REPORT).await;
                }
                ReportOutcome::Recorded { target, count } => {
                    debug!(reporter = %user, target = %target, count, "Report recorded");
                    self.notify(user, REPORT_RECORDED).await;
                    self.hub.persist().await;
                }
                ReportOutcome::Banned { target, until } => {
                    self.notify(user, REPORT_RECORDED).await;
                    self.notify(&target, &ban_notice(until)).await;
                    self.hub.persist().await;
                }
            },
            Command::Profile => {
                self.notify(user, &profile_line(&self.hub, user)).await;
            }
            Command::Unknown(name) => {
                self.notify(user, &format!("* unknown command {name}, send /start for help"))
                    .await;
            }
            Command::Text(line) => {
                if line.is_empty() {
                    return Ok(());
                }
                match self.hub.relay.relay(user, &line).await {
                    RelayOutcome::Delivered => {}
                    RelayOutcome::NoSession => {
                        self.notify(user, NO_SESSION).await;
                    }
                    RelayOutcome::Blocked => {
                        self.notify(user, LINKS_BLOCKED).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn set_gender(&self, user: &str, gender: Gender) {
        self.hub.directory.update(user, |p| p.gender = gender);
        self.notify(user, &format!("* gender set to {}", gender.as_str()))
            .await;
        self.hub.persist().await;
    }

    /// Match notifications happen here, after the matching lock has been
    /// released inside the matchmaker.
    async fn announce_match(&self, user: &str, result: &MatchResult) {
        match result {
            MatchResult::Paired(partner) => {
                info!(user = %user, partner = %partner, "Session committed");
                self.notify(user, PARTNER_FOUND).await;
                self.notify(partner, PARTNER_FOUND).await;
            }
            MatchResult::Waiting => {
                self.notify(user, SEARCHING).await;
            }
            MatchResult::AlreadyPaired => {
                self.notify(user, ALREADY_PAIRED).await;
            }
        }
    }

    async fn notify(&self, user: &str, text: &str) {
        if let Err(e) = self.hub.messenger.send(user, text).await {
            warn!(user = %user, error = %e, "Notification delivery failed");
        }
    }
}

fn ban_notice(until: i64) -> String {
    let when = chrono::DateTime::from_timestamp(until, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| until.to_string());
    format!("* you are banned until {when}")
}

fn profile_line(hub: &Hub, user: &str) -> String {
    match hub.directory.get(user) {
        Some(p) => format!(
            "* your profile: gender={} age={} country={} premium={}",
            p.gender.as_str(),
            p.age.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
            p.country.as_deref().unwrap_or("-"),
            if p.premium { "yes" } else { "no" },
        ),
        None => "* no profile yet, send /start".to_string(),
    }
}
