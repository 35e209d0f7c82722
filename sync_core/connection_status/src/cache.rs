use crate::derive::{ConnectionFlags, ConnectionStatusDeriver};
use crate::error::StatusError;
use crate::jobs::JobRecord;
use crate::snapshot::ConnectionStatusSnapshot;
use common::config::components::status::StatusConfig;
use std::collections::HashMap;
use uuid::Uuid;

/// Source of job history, e.g. the jobs table.
pub trait JobHistory {
    /// Up to `limit` jobs of the connection, in any order.
    fn list_jobs(&self, connection_id: Uuid, limit: usize) -> Result<Vec<JobRecord>, StatusError>;
}

/// Job histories fetched during one read request.
///
/// Built per request and passed down explicitly; dropping it is the only
/// invalidation.
pub struct StatusRequestCache<'h> {
    history: &'h dyn JobHistory,
    deriver: ConnectionStatusDeriver,
    jobs: HashMap<Uuid, Vec<JobRecord>>,
}

impl<'h> StatusRequestCache<'h> {
    pub fn new(history: &'h dyn JobHistory, config: &StatusConfig) -> Result<Self, StatusError> {
        if config.job_history_limit == 0 {
            return Err(StatusError::config("job_history_limit must be at least 1"));
        }
        Ok(Self {
            history,
            deriver: ConnectionStatusDeriver::from_config(config),
            jobs: HashMap::new(),
        })
    }

    pub fn jobs(&mut self, connection_id: Uuid) -> Result<&[JobRecord], StatusError> {
        if !self.jobs.contains_key(&connection_id) {
            let jobs = self
                .history
                .list_jobs(connection_id, self.deriver.job_history_limit())?;
            self.jobs.insert(connection_id, jobs);
        }
        Ok(self
            .jobs
            .get(&connection_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub fn deriver(&self) -> ConnectionStatusDeriver {
        self.deriver
    }

    pub fn cached_connections(&self) -> usize {
        self.jobs.len()
    }
}

/// A connection to derive a status for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRef {
    pub connection_id: Uuid,
    pub flags: ConnectionFlags,
}

pub fn derive_statuses(
    cache: &mut StatusRequestCache<'_>,
    connections: &[ConnectionRef],
) -> Result<Vec<ConnectionStatusSnapshot>, StatusError> {
    let deriver = cache.deriver();
    connections
        .iter()
        .map(|connection| {
            let jobs = cache.jobs(connection.connection_id)?;
            Ok(ConnectionStatusSnapshot::derive(
                &deriver,
                connection.connection_id,
                connection.flags,
                jobs,
            ))
        })
        .collect()
}
