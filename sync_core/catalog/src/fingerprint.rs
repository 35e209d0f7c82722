use crate::error::CatalogError;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// SHA-256 over the canonical JSON form of a value.
///
/// `serde_json` object keys are sorted and [`Schema`] serializes its streams
/// in key order, so equal catalogs always produce equal fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaFingerprint(String);

impl SchemaFingerprint {
    pub fn of_schema(schema: &Schema) -> Result<Self, CatalogError> {
        Self::of_json(&serde_json::to_value(schema)?)
    }

    pub fn of_json(value: &serde_json::Value) -> Result<Self, CatalogError> {
        let canonical = serde_json::to_vec(value)?;
        let digest = Sha256::digest(&canonical);
        Ok(Self(hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SchemaFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one discovery result: the same actor, connector version and
/// connector configuration always discover the same schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveryKey {
    pub actor_id: Uuid,
    pub connector_version: String,
    pub config_hash: String,
}

impl DiscoveryKey {
    pub fn new(
        actor_id: Uuid,
        connector_version: impl Into<String>,
        connector_config: &serde_json::Value,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            actor_id,
            connector_version: connector_version.into(),
            config_hash: SchemaFingerprint::of_json(connector_config)?.0,
        })
    }

    pub(crate) fn cache_id(&self) -> String {
        format!("{}:{}:{}", self.actor_id, self.connector_version, self.config_hash)
    }
}
