//! Connection health derived from job history.
//!
//! Nothing here is persisted. Every read recomputes [`ConnectionHealth`] from
//! the most recent jobs plus the connection's enabled and breaking-change
//! flags.

pub mod cache;
pub mod derive;
pub mod error;
pub mod jobs;
pub mod snapshot;

pub use cache::{derive_statuses, ConnectionRef, JobHistory, StatusRequestCache};
pub use derive::{precedence, ConnectionFlags, ConnectionHealth, ConnectionStatusDeriver};
pub use error::StatusError;
pub use jobs::{
    AttemptRecord, AttemptStatus, FailureSummary, FailureType, JobConfigType, JobRecord, JobStatus,
};
pub use snapshot::ConnectionStatusSnapshot;
