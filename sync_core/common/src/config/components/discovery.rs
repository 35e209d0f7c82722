use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryCacheConfig {
    pub max_entries: usize,
}

impl Default for DiscoveryCacheConfig {
    fn default() -> Self {
        Self { max_entries: 256 }
    }
}
