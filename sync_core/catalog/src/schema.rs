//! Discovered catalogs and their parsed, path-indexed form.
//!
//! [`DiscoveredCatalog`] is the shape discovery returns and persistence stores.
//! [`Schema`] is the same catalog after validation: every stream's JSON schema
//! is parsed into a [`FieldTree`] once, so later "does this path still exist"
//! questions are map lookups. Both directions go through serde, so a `Schema`
//! can be stored and reloaded without keeping the raw form around.

use crate::error::CatalogError;
use crate::field_tree::FieldTree;
use crate::sync_mode::{DestinationSyncMode, SyncMode};
use common::types::{FieldPath, StreamKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map::{Iter, Keys};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredStream {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub json_schema: Value,
    #[serde(default)]
    pub supported_sync_modes: Vec<SyncMode>,
    #[serde(default)]
    pub source_defined_cursor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cursor_field: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_defined_primary_key: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub is_file_based: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredCatalog {
    pub streams: Vec<DiscoveredStream>,
}

/// A validated stream of a discovered catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DiscoveredStream", into = "DiscoveredStream")]
pub struct StreamSchema {
    pub key: StreamKey,
    pub json_schema: Value,
    pub fields: FieldTree,
    pub supported_sync_modes: Vec<SyncMode>,
    pub source_defined_cursor: bool,
    pub default_cursor_field: Option<FieldPath>,
    pub source_defined_primary_key: Option<Vec<FieldPath>>,
    pub is_file_based: bool,
}

impl StreamSchema {
    pub fn resolves(&self, path: &FieldPath) -> bool {
        self.fields.resolves(path)
    }

    pub fn supports(&self, mode: SyncMode) -> bool {
        self.supported_sync_modes.contains(&mode)
    }

    /// The primary key a fresh configuration starts with.
    pub fn default_primary_key(&self) -> Vec<FieldPath> {
        self.source_defined_primary_key.clone().unwrap_or_default()
    }

    /// Sync modes a fresh configuration starts with: incremental + dedup when the
    /// source provides both a cursor and a primary key, otherwise full refresh
    /// overwrite, otherwise whatever the source lists first.
    pub fn default_sync_modes(&self) -> (SyncMode, DestinationSyncMode) {
        let has_cursor = self.source_defined_cursor || self.default_cursor_field.is_some();
        let has_pk = self
            .source_defined_primary_key
            .as_ref()
            .is_some_and(|pk| !pk.is_empty());

        if self.supports(SyncMode::Incremental) && has_cursor && has_pk {
            (SyncMode::Incremental, DestinationSyncMode::AppendDedup)
        } else if self.supports(SyncMode::FullRefresh) {
            (SyncMode::FullRefresh, DestinationSyncMode::Overwrite)
        } else {
            let first = self.supported_sync_modes.first().copied().unwrap_or_default();
            (first, DestinationSyncMode::Append)
        }
    }

    /// Fields a cursor may point at. With a source-defined cursor that is the
    /// source's choice alone; otherwise any scalar field qualifies.
    pub fn cursor_candidates(&self) -> BTreeSet<FieldPath> {
        let mut candidates = BTreeSet::new();
        if let Some(default) = &self.default_cursor_field {
            candidates.insert(default.clone());
        }
        if !self.source_defined_cursor {
            candidates.extend(
                self.fields
                    .iter()
                    .filter(|(_, node)| node.field_type.is_cursor_candidate())
                    .map(|(path, _)| path.clone()),
            );
        }
        candidates
    }
}

impl TryFrom<DiscoveredStream> for StreamSchema {
    type Error = CatalogError;

    fn try_from(raw: DiscoveredStream) -> Result<Self, Self::Error> {
        let key = StreamKey {
            namespace: raw.namespace,
            name: raw.name,
        };
        if key.name.trim().is_empty() {
            return Err(CatalogError::malformed_schema("stream name must not be empty"));
        }

        let fields = FieldTree::parse(&key, &raw.json_schema)?;

        let mut supported_sync_modes = Vec::new();
        for mode in raw.supported_sync_modes {
            if !supported_sync_modes.contains(&mode) {
                supported_sync_modes.push(mode);
            }
        }
        if supported_sync_modes.is_empty() {
            supported_sync_modes.push(SyncMode::FullRefresh);
        }

        let default_cursor_field = match raw.default_cursor_field {
            Some(segments) if !segments.is_empty() => Some(FieldPath::new(segments)),
            _ => None,
        };

        let source_defined_primary_key = match raw.source_defined_primary_key {
            Some(pk) if !pk.is_empty() => {
                if pk.iter().any(Vec::is_empty) {
                    return Err(CatalogError::malformed_stream(
                        &key,
                        "primary key contains an empty field path",
                    ));
                }
                Some(pk.into_iter().map(FieldPath::new).collect())
            }
            _ => None,
        };

        Ok(Self {
            key,
            json_schema: raw.json_schema,
            fields,
            supported_sync_modes,
            source_defined_cursor: raw.source_defined_cursor,
            default_cursor_field,
            source_defined_primary_key,
            is_file_based: raw.is_file_based,
        })
    }
}

impl From<StreamSchema> for DiscoveredStream {
    fn from(stream: StreamSchema) -> Self {
        Self {
            name: stream.key.name,
            namespace: stream.key.namespace,
            json_schema: stream.json_schema,
            supported_sync_modes: stream.supported_sync_modes,
            source_defined_cursor: stream.source_defined_cursor,
            default_cursor_field: stream
                .default_cursor_field
                .map(|p| p.segments().to_vec()),
            source_defined_primary_key: stream
                .source_defined_primary_key
                .map(|pk| pk.iter().map(|p| p.segments().to_vec()).collect()),
            is_file_based: stream.is_file_based,
        }
    }
}

/// A validated discovered catalog, keyed and ordered by [`StreamKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DiscoveredCatalog", into = "DiscoveredCatalog")]
pub struct Schema {
    streams: BTreeMap<StreamKey, StreamSchema>,
}

impl Schema {
    pub fn from_streams(
        streams: impl IntoIterator<Item = StreamSchema>,
    ) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for stream in streams {
            if map.contains_key(&stream.key) {
                return Err(CatalogError::duplicate(&stream.key));
            }
            map.insert(stream.key.clone(), stream);
        }
        Ok(Self { streams: map })
    }

    pub fn get(&self, key: &StreamKey) -> Option<&StreamSchema> {
        self.streams.get(key)
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.streams.contains_key(key)
    }

    pub fn keys(&self) -> Keys<'_, StreamKey, StreamSchema> {
        self.streams.keys()
    }

    pub fn iter(&self) -> Iter<'_, StreamKey, StreamSchema> {
        self.streams.iter()
    }

    pub fn streams(&self) -> impl Iterator<Item = &StreamSchema> {
        self.streams.values()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl TryFrom<DiscoveredCatalog> for Schema {
    type Error = CatalogError;

    fn try_from(raw: DiscoveredCatalog) -> Result<Self, Self::Error> {
        let streams = raw
            .streams
            .into_iter()
            .map(StreamSchema::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Schema::from_streams(streams)
    }
}

impl From<Schema> for DiscoveredCatalog {
    fn from(schema: Schema) -> Self {
        Self {
            streams: schema.streams.into_values().map(DiscoveredStream::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;
    use serde_json::json;

    fn users() -> DiscoveredStream {
        DiscoveredStream {
            name: "users".into(),
            namespace: Some("public".into()),
            json_schema: json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "updated_at": {"type": "string", "format": "date-time"},
                    "tags": {"type": "array", "items": {"type": "string"}}
                }
            }),
            supported_sync_modes: vec![SyncMode::FullRefresh, SyncMode::Incremental],
            source_defined_cursor: false,
            default_cursor_field: Some(vec!["updated_at".into()]),
            source_defined_primary_key: Some(vec![vec!["id".into()]]),
            is_file_based: false,
        }
    }

    #[test]
    fn defaults_prefer_incremental_dedup_when_cursor_and_pk_exist() {
        let stream = StreamSchema::try_from(users()).expect("parse");
        assert_eq!(
            stream.default_sync_modes(),
            (SyncMode::Incremental, DestinationSyncMode::AppendDedup)
        );

        let mut raw = users();
        raw.source_defined_primary_key = None;
        let stream = StreamSchema::try_from(raw).expect("parse");
        assert_eq!(
            stream.default_sync_modes(),
            (SyncMode::FullRefresh, DestinationSyncMode::Overwrite)
        );
    }

    #[test]
    fn cursor_candidates_exclude_containers() {
        let stream = StreamSchema::try_from(users()).expect("parse");
        let candidates: Vec<String> = stream
            .cursor_candidates()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(candidates, vec!["id", "updated_at"]);

        let mut raw = users();
        raw.source_defined_cursor = true;
        let stream = StreamSchema::try_from(raw).expect("parse");
        assert_eq!(
            stream.cursor_candidates(),
            BTreeSet::from([FieldPath::root("updated_at")])
        );
    }

    #[test]
    fn empty_sync_modes_default_to_full_refresh() {
        let mut raw = users();
        raw.supported_sync_modes = vec![];
        let stream = StreamSchema::try_from(raw).expect("parse");
        assert_eq!(stream.supported_sync_modes, vec![SyncMode::FullRefresh]);
    }

    #[test]
    fn duplicate_stream_keys_are_rejected() {
        let err = Schema::try_from(DiscoveredCatalog {
            streams: vec![users(), users()],
        })
        .expect_err("duplicate");
        assert_matches!(err, CatalogError::Duplicate { .. });
        assert!(err.is_malformed_schema());
    }

    #[test]
    fn empty_name_is_malformed() {
        let mut raw = users();
        raw.name = " ".into();
        let err = StreamSchema::try_from(raw).expect_err("empty name");
        assert_matches!(err, CatalogError::MalformedSchema { .. });
    }

    #[test]
    fn schema_survives_json_storage() {
        let schema = Schema::try_from(DiscoveredCatalog {
            streams: vec![users()],
        })
        .expect("parse");
        let stored = serde_json::to_string(&schema).expect("serialize");
        let restored: Schema = serde_json::from_str(&stored).expect("deserialize");
        assert_eq!(restored, schema);
        assert!(restored
            .get(&StreamKey::namespaced("public", "users"))
            .expect("users")
            .resolves(&FieldPath::root("tags")));
    }
}
