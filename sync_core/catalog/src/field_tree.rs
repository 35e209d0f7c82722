use crate::error::CatalogError;
use common::types::{FieldPath, JsonType, StreamKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::btree_map::Iter;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Keywords that annotate a node without changing what data it accepts.
const ANNOTATION_KEYWORDS: [&str; 4] = ["description", "title", "examples", "$comment"];

/// Keywords whose branches each declare a type of their own.
const COMBINATOR_KEYWORDS: [&str; 3] = ["oneOf", "anyOf", "allOf"];

/// The declared type of a field: its JSON `type` set, optional `format`, and
/// the types nested under `items`, `oneOf`/`anyOf`/`allOf` and `$ref`.
///
/// Nested object properties of indexed fields are tree nodes of their own and
/// are not repeated here. Shapes the tree does not index (array elements,
/// combinator branches) keep their property types in `properties`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldType {
    pub types: BTreeSet<JsonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldType>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub combinators: BTreeMap<String, Vec<FieldType>>,
    #[serde(default, rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldType>,
}

impl FieldType {
    pub fn new(types: impl IntoIterator<Item = JsonType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_items(mut self, items: FieldType) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_combinator(mut self, keyword: impl Into<String>, branches: Vec<FieldType>) -> Self {
        self.combinators.insert(keyword.into(), branches);
        self
    }

    /// Whether two types differ only in their top-level `type` set.
    pub fn same_nested_shape(&self, other: &FieldType) -> bool {
        self.items == other.items
            && self.combinators == other.combinators
            && self.reference == other.reference
            && self.properties == other.properties
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// The type set with `null` removed; nullability is tracked separately.
    pub fn non_null_types(&self) -> BTreeSet<JsonType> {
        self.types
            .iter()
            .copied()
            .filter(|t| *t != JsonType::Null)
            .collect()
    }

    pub fn is_nullable(&self) -> bool {
        self.types.contains(&JsonType::Null)
    }

    /// Scalars can carry an incremental cursor; containers and untyped nodes cannot.
    pub fn is_cursor_candidate(&self) -> bool {
        let types = self.non_null_types();
        !types.is_empty()
            && types
                .iter()
                .all(|t| !matches!(t, JsonType::Object | JsonType::Array))
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.types.iter().map(JsonType::as_str).collect();
        match names.len() {
            0 => write!(f, "any")?,
            1 => write!(f, "{}", names[0])?,
            _ => write!(f, "[{}]", names.join(", "))?,
        }
        if let Some(items) = &self.items {
            write!(f, "<{items}>")?;
        }
        if let Some(format) = &self.format {
            write!(f, " ({format})")?;
        }
        for (keyword, branches) in &self.combinators {
            let branches: Vec<String> = branches.iter().map(ToString::to_string).collect();
            write!(f, " {keyword}({})", branches.join(" | "))?;
        }
        if let Some(reference) = &self.reference {
            write!(f, " $ref({reference})")?;
        }
        if !self.properties.is_empty() {
            let props: Vec<String> = self
                .properties
                .iter()
                .map(|(name, ty)| format!("{name}: {ty}"))
                .collect();
            write!(f, " {{{}}}", props.join(", "))?;
        }
        Ok(())
    }
}

/// One node of the field tree. `descriptor` is the node's JSON schema minus its
/// nested `properties` and annotation keywords; two nodes are the same field
/// shape iff their descriptors are equal.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub field_type: FieldType,
    pub descriptor: Value,
}

/// Path-indexed view of a stream's record schema, built once per stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldTree {
    nodes: BTreeMap<FieldPath, FieldNode>,
}

impl FieldTree {
    pub fn parse(stream: &StreamKey, json_schema: &Value) -> Result<Self, CatalogError> {
        let root = json_schema
            .as_object()
            .ok_or_else(|| CatalogError::malformed_stream(stream, "json_schema must be an object"))?;

        let mut nodes = BTreeMap::new();
        if let Some(properties) = root.get("properties") {
            collect_properties(stream, None, properties, &mut nodes)?;
        }
        Ok(Self { nodes })
    }

    pub fn get(&self, path: &FieldPath) -> Option<&FieldNode> {
        self.nodes.get(path)
    }

    pub fn resolves(&self, path: &FieldPath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.nodes.keys()
    }

    pub fn top_level_paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.nodes.keys().filter(|p| p.is_top_level())
    }

    pub fn iter(&self) -> Iter<'_, FieldPath, FieldNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn collect_properties(
    stream: &StreamKey,
    parent: Option<&FieldPath>,
    properties: &Value,
    out: &mut BTreeMap<FieldPath, FieldNode>,
) -> Result<(), CatalogError> {
    let properties = properties.as_object().ok_or_else(|| {
        let at = parent.map(|p| p.to_string()).unwrap_or_else(|| "<root>".into());
        CatalogError::malformed_stream(stream, format!("'properties' of {at} must be an object"))
    })?;

    for (name, node) in properties {
        let path = match parent {
            Some(p) => p.child(name.clone()),
            None => FieldPath::root(name.clone()),
        };
        let node = node.as_object().ok_or_else(|| {
            CatalogError::malformed_stream(stream, format!("field '{path}' must be an object"))
        })?;

        let field_type = parse_field_type(stream, &path, node, false)?;
        out.insert(
            path.clone(),
            FieldNode {
                field_type,
                descriptor: descriptor_of(node),
            },
        );

        if let Some(nested) = node.get("properties") {
            collect_properties(stream, Some(&path), nested, out)?;
        }
    }
    Ok(())
}

fn parse_field_type(
    stream: &StreamKey,
    path: &FieldPath,
    node: &Map<String, Value>,
    unindexed: bool,
) -> Result<FieldType, CatalogError> {
    let malformed =
        |detail: String| CatalogError::malformed_stream(stream, format!("field '{path}': {detail}"));
    let parse_one = |raw: &str| raw.parse::<JsonType>().map_err(malformed);

    let types = match node.get("type") {
        None => BTreeSet::new(),
        Some(Value::String(raw)) => BTreeSet::from([parse_one(raw)?]),
        Some(Value::Array(items)) => {
            let mut types = BTreeSet::new();
            for item in items {
                let raw = item
                    .as_str()
                    .ok_or_else(|| malformed("type entries must be strings".into()))?;
                types.insert(parse_one(raw)?);
            }
            types
        }
        Some(other) => return Err(malformed(format!("unsupported type declaration {other}"))),
    };

    let mut combinators = BTreeMap::new();
    let items = match node.get("items") {
        None => None,
        Some(Value::Array(tuple)) => {
            combinators.insert("items".to_owned(), parse_branches(stream, path, tuple)?);
            None
        }
        Some(items) => Some(Box::new(parse_nested(stream, path, items)?)),
    };
    for keyword in COMBINATOR_KEYWORDS {
        match node.get(keyword) {
            None => {}
            Some(Value::Array(branches)) => {
                combinators.insert(keyword.to_owned(), parse_branches(stream, path, branches)?);
            }
            Some(_) => return Err(malformed(format!("'{keyword}' must be an array"))),
        }
    }

    let mut properties = BTreeMap::new();
    if unindexed {
        if let Some(nested) = node.get("properties") {
            let nested = nested
                .as_object()
                .ok_or_else(|| malformed("'properties' must be an object".into()))?;
            for (name, child) in nested {
                properties.insert(name.clone(), parse_nested(stream, path, child)?);
            }
        }
    }

    Ok(FieldType {
        types,
        format: node.get("format").and_then(Value::as_str).map(str::to_owned),
        items,
        combinators,
        reference: node.get("$ref").and_then(Value::as_str).map(str::to_owned),
        properties,
    })
}

/// Type of a schema the tree does not index. Boolean schemas carry no type.
fn parse_nested(
    stream: &StreamKey,
    path: &FieldPath,
    node: &Value,
) -> Result<FieldType, CatalogError> {
    match node {
        Value::Object(node) => parse_field_type(stream, path, node, true),
        Value::Bool(_) => Ok(FieldType::default()),
        other => Err(CatalogError::malformed_stream(
            stream,
            format!("field '{path}': nested schema must be an object, got {other}"),
        )),
    }
}

fn parse_branches(
    stream: &StreamKey,
    path: &FieldPath,
    branches: &[Value],
) -> Result<Vec<FieldType>, CatalogError> {
    branches
        .iter()
        .map(|branch| parse_nested(stream, path, branch))
        .collect()
}

fn descriptor_of(node: &Map<String, Value>) -> Value {
    let mut descriptor = node.clone();
    descriptor.remove("properties");
    for keyword in ANNOTATION_KEYWORDS {
        descriptor.remove(keyword);
    }
    Value::Object(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;
    use serde_json::json;

    fn key() -> StreamKey {
        StreamKey::namespaced("public", "users")
    }

    #[test]
    fn nested_properties_are_indexed_by_path() {
        let tree = FieldTree::parse(
            &key(),
            &json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "address": {
                        "type": ["null", "object"],
                        "properties": {"city": {"type": "string"}}
                    }
                }
            }),
        )
        .expect("parse");

        assert_eq!(tree.len(), 3);
        assert!(tree.resolves(&FieldPath::from(vec!["address", "city"])));
        let top: Vec<String> = tree.top_level_paths().map(ToString::to_string).collect();
        assert_eq!(top, vec!["address", "id"]);

        let address = tree.get(&FieldPath::root("address")).expect("address");
        assert!(address.field_type.is_nullable());
        assert!(!address.field_type.is_cursor_candidate());
        assert!(address.descriptor.get("properties").is_none());
    }

    #[test]
    fn annotations_do_not_affect_descriptor() {
        let a = FieldTree::parse(
            &key(),
            &json!({"properties": {"id": {"type": "integer", "description": "pk"}}}),
        )
        .expect("parse");
        let b = FieldTree::parse(&key(), &json!({"properties": {"id": {"type": "integer"}}}))
            .expect("parse");
        assert_eq!(a, b);
    }

    #[test]
    fn missing_properties_means_no_fields() {
        let tree = FieldTree::parse(&key(), &json!({"type": "object"})).expect("parse");
        assert!(tree.is_empty());
    }

    #[test]
    fn non_object_schema_is_malformed() {
        let err = FieldTree::parse(&key(), &json!("object")).expect_err("malformed");
        assert_matches!(err, CatalogError::MalformedSchema { .. });
    }

    #[test]
    fn unknown_type_name_is_malformed() {
        let err = FieldTree::parse(&key(), &json!({"properties": {"id": {"type": "int64"}}}))
            .expect_err("malformed");
        assert_matches!(err, CatalogError::MalformedSchema { .. });
        assert!(err.to_string().contains("int64"));
    }

    #[test]
    fn properties_must_be_an_object() {
        let err = FieldTree::parse(&key(), &json!({"properties": ["id"]})).expect_err("malformed");
        assert_matches!(err, CatalogError::MalformedSchema { .. });
    }

    #[test]
    fn array_items_and_combinators_are_part_of_the_type() {
        let parse = |tags: Value| {
            FieldTree::parse(&key(), &json!({"properties": {"tags": tags}}))
                .expect("parse")
                .get(&FieldPath::root("tags"))
                .expect("tags")
                .field_type
                .clone()
        };

        let strings = parse(json!({"type": "array", "items": {"type": "string"}}));
        let integers = parse(json!({"type": "array", "items": {"type": "integer"}}));
        assert_eq!(
            strings,
            FieldType::new([JsonType::Array]).with_items(FieldType::new([JsonType::String]))
        );
        assert_ne!(strings, integers);
        assert!(!strings.same_nested_shape(&integers));

        let one_of = parse(json!({"oneOf": [{"type": "string"}, {"type": "null"}]}));
        assert_eq!(
            one_of,
            FieldType::default().with_combinator(
                "oneOf",
                vec![FieldType::new([JsonType::String]), FieldType::new([JsonType::Null])]
            )
        );
        assert_ne!(one_of, parse(json!({"oneOf": [{"type": "integer"}, {"type": "null"}]})));

        let records = parse(json!({
            "type": "array",
            "items": {"type": "object", "properties": {"n": {"type": "string"}}}
        }));
        let changed = parse(json!({
            "type": "array",
            "items": {"type": "object", "properties": {"n": {"type": "number"}}}
        }));
        assert_ne!(records, changed);
    }

    #[test]
    fn malformed_combinator_is_rejected() {
        let err = FieldTree::parse(
            &key(),
            &json!({"properties": {"v": {"anyOf": {"type": "string"}}}}),
        )
        .expect_err("malformed");
        assert_matches!(err, CatalogError::MalformedSchema { .. });
    }

    #[test]
    fn field_type_display() {
        let ty = FieldType::new([JsonType::Null, JsonType::String]).with_format("date-time");
        assert_eq!(ty.to_string(), "[null, string] (date-time)");
        assert_eq!(FieldType::default().to_string(), "any");
        let tags = FieldType::new([JsonType::Array]).with_items(FieldType::new([JsonType::String]));
        assert_eq!(tags.to_string(), "array<string>");
    }
}
