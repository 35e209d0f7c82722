use catalog::{
    ConfiguredCatalog, ConfiguredStream, DiscoveredCatalog, DiscoveredStream, Schema,
    StreamConfig, StreamSchema, SyncMode,
};
use common::config::components::propagation::NewStreamSelection;
use common::types::StreamKey;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

static TEST_LOGGER: Lazy<()> = Lazy::new(logging::init_test_logger);

/// Route `tracing` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    Lazy::force(&TEST_LOGGER);
}

pub fn key(namespace: &str, name: &str) -> StreamKey {
    StreamKey::namespaced(namespace, name)
}

/// Builds a discovered stream field by field.
///
/// Starts with both sync modes supported, no cursor and no primary key.
/// Adding a field that already exists replaces it.
#[derive(Debug, Clone)]
pub struct StreamBuilder {
    raw: DiscoveredStream,
    properties: Map<String, Value>,
}

impl StreamBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            raw: DiscoveredStream {
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
                json_schema: json!({"type": "object"}),
                supported_sync_modes: vec![SyncMode::FullRefresh, SyncMode::Incremental],
                source_defined_cursor: false,
                default_cursor_field: None,
                source_defined_primary_key: None,
                is_file_based: false,
            },
            properties: Map::new(),
        }
    }

    pub fn field(self, name: &str, json_type: &str) -> Self {
        self.property(name, json!({"type": json_type}))
    }

    pub fn nullable_field(self, name: &str, json_type: &str) -> Self {
        self.property(name, json!({"type": ["null", json_type]}))
    }

    pub fn nested(self, name: &str, children: &[(&str, &str)]) -> Self {
        let properties: Map<String, Value> = children
            .iter()
            .map(|(child, json_type)| (child.to_string(), json!({"type": json_type})))
            .collect();
        self.property(name, json!({"type": "object", "properties": properties}))
    }

    pub fn property(mut self, name: &str, node: Value) -> Self {
        self.properties.insert(name.to_string(), node);
        self
    }

    pub fn primary_key(mut self, fields: &[&str]) -> Self {
        self.raw.source_defined_primary_key =
            Some(fields.iter().map(|f| vec![f.to_string()]).collect());
        self
    }

    pub fn cursor(mut self, field: &str) -> Self {
        self.raw.default_cursor_field = Some(vec![field.to_string()]);
        self
    }

    pub fn source_defined_cursor(mut self, source_defined: bool) -> Self {
        self.raw.source_defined_cursor = source_defined;
        self
    }

    pub fn sync_modes(mut self, modes: Vec<SyncMode>) -> Self {
        self.raw.supported_sync_modes = modes;
        self
    }

    pub fn file_based(mut self) -> Self {
        self.raw.is_file_based = true;
        self
    }

    pub fn discovered(self) -> DiscoveredStream {
        let mut raw = self.raw;
        raw.json_schema["properties"] = Value::Object(self.properties);
        raw
    }

    pub fn build(self) -> StreamSchema {
        StreamSchema::try_from(self.discovered()).expect("fixture stream must parse")
    }
}

pub fn discovered_catalog(streams: Vec<StreamBuilder>) -> DiscoveredCatalog {
    DiscoveredCatalog {
        streams: streams.into_iter().map(StreamBuilder::discovered).collect(),
    }
}

pub fn schema(streams: Vec<StreamBuilder>) -> Schema {
    Schema::try_from(discovered_catalog(streams)).expect("fixture schema must parse")
}

/// Default configuration for `schema` with exactly `selected` selected.
pub fn configured(schema: &Schema, selected: &[StreamKey]) -> ConfiguredCatalog {
    let mut catalog = ConfiguredCatalog::default_for_schema(schema, NewStreamSelection::Unselected);
    for key in selected {
        update_config(&mut catalog, key, |c| c.selected = true);
    }
    catalog
}

/// Edit one stream's configuration in place.
pub fn update_config(
    catalog: &mut ConfiguredCatalog,
    key: &StreamKey,
    edit: impl FnOnce(&mut StreamConfig),
) {
    let mut stream: ConfiguredStream = catalog
        .get(key)
        .cloned()
        .unwrap_or_else(|| panic!("stream {key} is not configured"));
    edit(&mut stream.config);
    catalog.insert(stream);
}
