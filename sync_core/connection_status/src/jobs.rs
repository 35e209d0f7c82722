use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    /// An attempt failed and another may follow.
    Incomplete,
    Failed,
    Succeeded,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Succeeded | JobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobConfigType {
    Sync,
    ResetConnection,
    Refresh,
    ClearStreams,
}

impl JobConfigType {
    /// Jobs that wipe synced data rather than produce it.
    pub fn clears_data(&self) -> bool {
        matches!(self, JobConfigType::ResetConnection | JobConfigType::ClearStreams)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ConfigError,
    SystemError,
    TransientError,
    ManualCancellation,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub failure_type: FailureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Running,
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub number: u32,
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub config_type: JobConfigType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
}

impl JobRecord {
    /// Failure of the last attempt that reported one.
    pub fn last_failure(&self) -> Option<&FailureSummary> {
        self.attempts
            .iter()
            .max_by_key(|a| a.number)
            .and_then(|a| a.failure.as_ref())
    }

    pub fn failed_with_config_error(&self) -> bool {
        self.status == JobStatus::Failed
            && self
                .last_failure()
                .is_some_and(|f| f.failure_type == FailureType::ConfigError)
    }
}

/// Most recent first, cut to `limit`. Ties on `created_at` go to the higher id.
pub fn most_recent_first(jobs: &[JobRecord], limit: usize) -> Vec<&JobRecord> {
    let mut window: Vec<&JobRecord> = jobs.iter().collect();
    window.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    window.truncate(limit);
    window
}
