use crate::derive::{evaluate, ConnectionFlags, ConnectionHealth, ConnectionStatusDeriver, HistoryFacts};
use crate::jobs::{FailureSummary, JobConfigType, JobRecord, JobStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Read model for one connection, derived from the same window as its health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatusSnapshot {
    pub connection_id: Uuid,
    pub health: ConnectionHealth,
    pub is_running: bool,
    pub breaking_change: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_successful_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_job_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureSummary>,
}

impl ConnectionStatusSnapshot {
    pub fn derive(
        deriver: &ConnectionStatusDeriver,
        connection_id: Uuid,
        flags: ConnectionFlags,
        jobs: &[JobRecord],
    ) -> Self {
        let window = deriver.window(jobs);
        let facts = HistoryFacts::from_window(flags, &window);
        let health = evaluate(&facts);

        let last_successful_sync_at = window
            .iter()
            .find(|j| {
                j.status == JobStatus::Succeeded
                    && matches!(j.config_type, JobConfigType::Sync | JobConfigType::Refresh)
            })
            .map(|j| j.updated_at);
        let failure_reason = facts
            .latest_terminal
            .filter(|j| j.status == JobStatus::Failed)
            .and_then(JobRecord::last_failure)
            .cloned();

        tracing::debug!(%connection_id, %health, jobs = window.len(), "derived connection status");
        Self {
            connection_id,
            health,
            is_running: health == ConnectionHealth::Running,
            breaking_change: flags.breaking_change,
            last_successful_sync_at,
            last_job_id: facts.latest.map(|j| j.id),
            failure_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{AttemptRecord, AttemptStatus, FailureType};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn snapshot_reports_last_success_and_failure() {
        let jobs = vec![
            JobRecord {
                id: 10,
                config_type: JobConfigType::Sync,
                status: JobStatus::Succeeded,
                created_at: at(1),
                updated_at: at(2),
                attempts: Vec::new(),
            },
            JobRecord {
                id: 11,
                config_type: JobConfigType::Sync,
                status: JobStatus::Failed,
                created_at: at(3),
                updated_at: at(4),
                attempts: vec![
                    AttemptRecord {
                        number: 1,
                        status: AttemptStatus::Failed,
                        failure: Some(FailureSummary {
                            failure_type: FailureType::TransientError,
                            message: None,
                        }),
                        ended_at: Some(at(3)),
                    },
                    AttemptRecord {
                        number: 2,
                        status: AttemptStatus::Failed,
                        failure: Some(FailureSummary {
                            failure_type: FailureType::SystemError,
                            message: Some("destination unreachable".into()),
                        }),
                        ended_at: Some(at(4)),
                    },
                ],
            },
        ];
        let id = Uuid::new_v4();
        let snapshot = ConnectionStatusSnapshot::derive(
            &ConnectionStatusDeriver::default(),
            id,
            ConnectionFlags::default(),
            &jobs,
        );

        assert_eq!(snapshot.health, ConnectionHealth::Incomplete);
        assert!(!snapshot.is_running);
        assert_eq!(snapshot.last_job_id, Some(11));
        assert_eq!(snapshot.last_successful_sync_at, Some(at(2)));
        assert_eq!(
            snapshot.failure_reason.map(|f| f.failure_type),
            Some(FailureType::SystemError)
        );

        let rendered = serde_json::to_value(
            ConnectionStatusSnapshot::derive(
                &ConnectionStatusDeriver::default(),
                id,
                ConnectionFlags::default(),
                &[],
            ),
        )
        .expect("serialize");
        assert_eq!(rendered["health"], "PENDING");
        assert!(rendered.get("last_job_id").is_none());
    }
}
