use crate::error::CatalogError;
use crate::schema::{Schema, StreamSchema};
use crate::sync_mode::{DestinationSyncMode, SyncMode};
use common::config::components::propagation::NewStreamSelection;
use common::types::{FieldPath, StreamKey};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{Iter, Keys};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// A field whose values the destination receives hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedField {
    pub field_path: FieldPath,
}

/// Opaque mapper attached to a stream (renames, filters, encryption...).
/// Reconciliation never interprets these, only carries them forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub mapper_type: String,
    pub config: serde_json::Value,
}

/// Per-stream user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub selected: bool,
    #[serde(default)]
    pub suggested: bool,
    pub sync_mode: SyncMode,
    pub destination_sync_mode: DestinationSyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<FieldPath>,
    #[serde(default)]
    pub primary_key: Vec<FieldPath>,
    #[serde(default)]
    pub field_selection_enabled: bool,
    #[serde(default)]
    pub selected_fields: BTreeSet<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_object_name: Option<String>,
    #[serde(default)]
    pub hashed_fields: Vec<HashedField>,
    #[serde(default)]
    pub mappers: Vec<MapperConfig>,
    #[serde(default)]
    pub include_files: bool,
}

impl StreamConfig {
    /// Configuration for a stream nobody has configured yet.
    pub fn default_for(stream: &StreamSchema, selection: NewStreamSelection) -> Self {
        let (sync_mode, destination_sync_mode) = stream.default_sync_modes();
        Self {
            selected: selection.is_selected(),
            suggested: false,
            sync_mode,
            destination_sync_mode,
            cursor_field: stream.default_cursor_field.clone(),
            primary_key: stream.default_primary_key(),
            field_selection_enabled: false,
            selected_fields: BTreeSet::new(),
            alias: None,
            destination_object_name: None,
            hashed_fields: Vec::new(),
            mappers: Vec::new(),
            include_files: false,
        }
    }

    /// Whether `path` reaches the destination under this configuration.
    pub fn is_field_selected(&self, path: &FieldPath) -> bool {
        !self.field_selection_enabled || self.selected_fields.iter().any(|s| s.is_prefix_of(path))
    }
}

/// A stream's schema paired with the configuration made against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    pub stream: StreamSchema,
    pub config: StreamConfig,
}

impl ConfiguredStream {
    pub fn key(&self) -> &StreamKey {
        &self.stream.key
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfiguredCatalogRepr {
    streams: Vec<ConfiguredStream>,
}

/// Every configured stream of a connection, keyed by [`StreamKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfiguredCatalogRepr", into = "ConfiguredCatalogRepr")]
pub struct ConfiguredCatalog {
    streams: BTreeMap<StreamKey, ConfiguredStream>,
}

impl ConfiguredCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_streams(
        streams: impl IntoIterator<Item = ConfiguredStream>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for stream in streams {
            if catalog.streams.contains_key(stream.key()) {
                return Err(CatalogError::duplicate(stream.key()));
            }
            catalog.insert(stream);
        }
        Ok(catalog)
    }

    /// Default configuration for every stream of `schema`.
    pub fn default_for_schema(schema: &Schema, selection: NewStreamSelection) -> Self {
        Self {
            streams: schema
                .iter()
                .map(|(key, stream)| {
                    (
                        key.clone(),
                        ConfiguredStream {
                            stream: stream.clone(),
                            config: StreamConfig::default_for(stream, selection),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn insert(&mut self, stream: ConfiguredStream) -> Option<ConfiguredStream> {
        self.streams.insert(stream.key().clone(), stream)
    }

    pub fn get(&self, key: &StreamKey) -> Option<&ConfiguredStream> {
        self.streams.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &StreamKey) -> Option<&mut ConfiguredStream> {
        self.streams.get_mut(key)
    }

    pub fn config(&self, key: &StreamKey) -> Option<&StreamConfig> {
        self.streams.get(key).map(|s| &s.config)
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.streams.contains_key(key)
    }

    pub fn is_selected(&self, key: &StreamKey) -> bool {
        self.config(key).is_some_and(|c| c.selected)
    }

    pub fn selected_keys(&self) -> BTreeSet<StreamKey> {
        self.streams
            .iter()
            .filter(|(_, s)| s.config.selected)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn keys(&self) -> Keys<'_, StreamKey, ConfiguredStream> {
        self.streams.keys()
    }

    pub fn iter(&self) -> Iter<'_, StreamKey, ConfiguredStream> {
        self.streams.iter()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// The schema entries this catalog was configured against.
    pub fn schema(&self) -> Schema {
        // keys are unique by construction
        Schema::from_streams(self.streams.values().map(|s| s.stream.clone())).unwrap_or_default()
    }
}

impl FromIterator<ConfiguredStream> for ConfiguredCatalog {
    /// Later entries win on duplicate keys.
    fn from_iter<T: IntoIterator<Item = ConfiguredStream>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for stream in iter {
            catalog.insert(stream);
        }
        catalog
    }
}

impl TryFrom<ConfiguredCatalogRepr> for ConfiguredCatalog {
    type Error = CatalogError;

    fn try_from(repr: ConfiguredCatalogRepr) -> Result<Self, Self::Error> {
        Self::from_streams(repr.streams)
    }
}

impl From<ConfiguredCatalog> for ConfiguredCatalogRepr {
    fn from(catalog: ConfiguredCatalog) -> Self {
        Self {
            streams: catalog.streams.into_values().collect(),
        }
    }
}
