use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Number of most recent jobs read when deriving a connection's health.
    pub job_history_limit: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            job_history_limit: 10,
        }
    }
}
