//! Connection health from recent job history.
//!
//! Health is recomputed on every read. The rules below are evaluated top to
//! bottom and the first match wins; their order is the behaviour.

use crate::jobs::{most_recent_first, JobRecord, JobStatus};
use common::config::components::status::StatusConfig;
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionHealth {
    Running,
    Failed,
    Paused,
    Incomplete,
    Pending,
    Synced,
}

impl Display for ConnectionHealth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionHealth::Running => "running",
            ConnectionHealth::Failed => "failed",
            ConnectionHealth::Paused => "paused",
            ConnectionHealth::Incomplete => "incomplete",
            ConnectionHealth::Pending => "pending",
            ConnectionHealth::Synced => "synced",
        };
        f.write_str(name)
    }
}

/// Connection-level inputs that are not part of the job history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionFlags {
    pub enabled: bool,
    /// An unresolved breaking schema change is pending approval.
    pub breaking_change: bool,
}

impl Default for ConnectionFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            breaking_change: false,
        }
    }
}

/// The facts every rule reads, computed once per derivation.
#[derive(Debug, Clone, Copy)]
pub struct HistoryFacts<'a> {
    pub flags: ConnectionFlags,
    pub latest: Option<&'a JobRecord>,
    pub latest_terminal: Option<&'a JobRecord>,
}

impl<'a> HistoryFacts<'a> {
    pub fn from_window(flags: ConnectionFlags, window: &[&'a JobRecord]) -> Self {
        Self {
            flags,
            latest: window.first().copied(),
            latest_terminal: window.iter().copied().find(|j| j.status.is_terminal()),
        }
    }
}

struct HealthRule {
    health: ConnectionHealth,
    applies: fn(&HistoryFacts<'_>) -> bool,
}

const HEALTH_RULES: [HealthRule; 6] = [
    HealthRule {
        health: ConnectionHealth::Running,
        applies: latest_is_running,
    },
    HealthRule {
        health: ConnectionHealth::Failed,
        applies: breaking_or_config_failure,
    },
    HealthRule {
        health: ConnectionHealth::Paused,
        applies: disabled,
    },
    HealthRule {
        health: ConnectionHealth::Incomplete,
        applies: cancelled_or_failed,
    },
    HealthRule {
        health: ConnectionHealth::Pending,
        applies: nothing_synced_yet,
    },
    HealthRule {
        health: ConnectionHealth::Synced,
        applies: always,
    },
];

fn latest_is_running(facts: &HistoryFacts<'_>) -> bool {
    facts.latest.is_some_and(|j| !j.status.is_terminal())
}

fn breaking_or_config_failure(facts: &HistoryFacts<'_>) -> bool {
    facts.flags.breaking_change
        || facts
            .latest_terminal
            .is_some_and(JobRecord::failed_with_config_error)
}

fn disabled(facts: &HistoryFacts<'_>) -> bool {
    !facts.flags.enabled
}

fn cancelled_or_failed(facts: &HistoryFacts<'_>) -> bool {
    facts.latest.is_some_and(|j| j.status == JobStatus::Cancelled)
        || facts
            .latest_terminal
            .is_some_and(|j| j.status == JobStatus::Failed)
}

fn nothing_synced_yet(facts: &HistoryFacts<'_>) -> bool {
    facts.latest_terminal.is_none() || facts.latest.is_some_and(|j| j.config_type.clears_data())
}

fn always(_: &HistoryFacts<'_>) -> bool {
    true
}

/// The rule order, for display and auditing.
pub fn precedence() -> impl Iterator<Item = ConnectionHealth> {
    HEALTH_RULES.iter().map(|rule| rule.health)
}

pub fn evaluate(facts: &HistoryFacts<'_>) -> ConnectionHealth {
    HEALTH_RULES
        .iter()
        .find(|rule| (rule.applies)(facts))
        .map(|rule| rule.health)
        .unwrap_or(ConnectionHealth::Synced)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatusDeriver {
    job_history_limit: usize,
}

impl Default for ConnectionStatusDeriver {
    fn default() -> Self {
        Self::from_config(&StatusConfig::default())
    }
}

impl ConnectionStatusDeriver {
    pub fn from_config(config: &StatusConfig) -> Self {
        Self {
            job_history_limit: config.job_history_limit.max(1),
        }
    }

    pub fn job_history_limit(&self) -> usize {
        self.job_history_limit
    }

    /// The jobs considered, most recent first.
    pub fn window<'a>(&self, jobs: &'a [JobRecord]) -> Vec<&'a JobRecord> {
        most_recent_first(jobs, self.job_history_limit)
    }

    pub fn derive(&self, flags: ConnectionFlags, jobs: &[JobRecord]) -> ConnectionHealth {
        let window = self.window(jobs);
        evaluate(&HistoryFacts::from_window(flags, &window))
    }
}
