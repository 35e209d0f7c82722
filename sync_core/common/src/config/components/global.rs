use crate::config::components::compatibility::TypeWidening;
use crate::config::components::discovery::DiscoveryCacheConfig;
use crate::config::components::propagation::PropagationConfig;
use crate::config::components::status::StatusConfig;
use crate::config::error::ConfigError;
use serde::{Deserialize, Serialize};

// ---------------- global config ----------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub propagation: PropagationConfig,
    pub type_compatibility: Vec<TypeWidening>,
    pub discovery_cache: DiscoveryCacheConfig,
    pub status: StatusConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status.job_history_limit == 0 {
            return Err(ConfigError::invalid(
                "status.job_history_limit must be at least 1",
            ));
        }
        if self.discovery_cache.max_entries == 0 {
            return Err(ConfigError::invalid(
                "discovery_cache.max_entries must be at least 1",
            ));
        }
        if let Some(w) = self.type_compatibility.iter().find(|w| w.from == w.to) {
            return Err(ConfigError::invalid(format!(
                "type_compatibility entry '{} -> {}' is not a type change",
                w.from, w.to
            )));
        }
        Ok(())
    }
}
