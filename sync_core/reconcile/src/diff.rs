//! Structural diff between two discovered schemas.
//!
//! Streams are correlated by [`StreamKey`] and fields by [`FieldPath`], so
//! neither stream order nor property order inside a JSON schema matters.

use catalog::{FieldTree, FieldType, Schema, StreamSchema, SyncMode};
use common::types::{FieldPath, StreamKey};
use serde::Serialize;
use std::collections::BTreeSet;

/// A field-level or metadata-level change inside one stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldTransform {
    AddField {
        path: FieldPath,
        field_type: FieldType,
    },
    RemoveField {
        path: FieldPath,
        field_type: FieldType,
    },
    /// The field's schema node changed. `old`/`new` cover nested `items` and
    /// combinator types, and are equal only when non-type keywords (e.g.
    /// `maxLength`) moved.
    UpdateFieldSchema {
        path: FieldPath,
        old: FieldType,
        new: FieldType,
    },
    UpdatePrimaryKey {
        old: Option<Vec<FieldPath>>,
        new: Option<Vec<FieldPath>>,
    },
    UpdateCursorCandidates {
        old: BTreeSet<FieldPath>,
        new: BTreeSet<FieldPath>,
    },
    UpdateSupportedSyncModes {
        old: Vec<SyncMode>,
        new: Vec<SyncMode>,
    },
}

impl FieldTransform {
    pub fn is_type_change(&self) -> bool {
        matches!(self, FieldTransform::UpdateFieldSchema { old, new, .. } if old != new)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "transform_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamTransform {
    AddStream {
        stream: StreamKey,
    },
    RemoveStream {
        stream: StreamKey,
    },
    UpdateStream {
        stream: StreamKey,
        changes: Vec<FieldTransform>,
    },
}

impl StreamTransform {
    pub fn stream(&self) -> &StreamKey {
        match self {
            StreamTransform::AddStream { stream }
            | StreamTransform::RemoveStream { stream }
            | StreamTransform::UpdateStream { stream, .. } => stream,
        }
    }
}

/// Ordered list of stream transforms, sorted by stream key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CatalogDiff {
    transforms: Vec<StreamTransform>,
}

impl CatalogDiff {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_transforms(mut transforms: Vec<StreamTransform>) -> Self {
        transforms.sort_by(|a, b| a.stream().cmp(b.stream()));
        Self { transforms }
    }

    pub fn transforms(&self) -> &[StreamTransform] {
        &self.transforms
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StreamTransform> {
        self.transforms.iter()
    }

    pub fn added_streams(&self) -> BTreeSet<StreamKey> {
        self.streams_where(|t| matches!(t, StreamTransform::AddStream { .. }))
    }

    pub fn removed_streams(&self) -> BTreeSet<StreamKey> {
        self.streams_where(|t| matches!(t, StreamTransform::RemoveStream { .. }))
    }

    pub fn updated_streams(&self) -> BTreeSet<StreamKey> {
        self.streams_where(|t| matches!(t, StreamTransform::UpdateStream { .. }))
    }

    fn streams_where(&self, pred: impl Fn(&StreamTransform) -> bool) -> BTreeSet<StreamKey> {
        self.transforms
            .iter()
            .filter(|t| pred(t))
            .map(|t| t.stream().clone())
            .collect()
    }
}

impl<'a> IntoIterator for &'a CatalogDiff {
    type Item = &'a StreamTransform;
    type IntoIter = std::slice::Iter<'a, StreamTransform>;

    fn into_iter(self) -> Self::IntoIter {
        self.transforms.iter()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogDiffEngine;

impl CatalogDiffEngine {
    pub fn diff(&self, old: &Schema, new: &Schema) -> CatalogDiff {
        let keys: BTreeSet<&StreamKey> = old.keys().chain(new.keys()).collect();
        let transforms = keys
            .into_iter()
            .filter_map(|key| match (old.get(key), new.get(key)) {
                (None, Some(_)) => Some(StreamTransform::AddStream {
                    stream: key.clone(),
                }),
                (Some(_), None) => Some(StreamTransform::RemoveStream {
                    stream: key.clone(),
                }),
                (Some(before), Some(after)) => {
                    let changes = diff_stream(before, after);
                    (!changes.is_empty()).then(|| StreamTransform::UpdateStream {
                        stream: key.clone(),
                        changes,
                    })
                }
                (None, None) => None,
            })
            .collect();

        // keys were iterated in order already
        CatalogDiff { transforms }
    }
}

/// Convenience wrapper around [`CatalogDiffEngine::diff`].
pub fn diff(old: &Schema, new: &Schema) -> CatalogDiff {
    CatalogDiffEngine.diff(old, new)
}

fn diff_stream(old: &StreamSchema, new: &StreamSchema) -> Vec<FieldTransform> {
    let mut changes = diff_fields(&old.fields, &new.fields);

    if old.source_defined_primary_key != new.source_defined_primary_key {
        changes.push(FieldTransform::UpdatePrimaryKey {
            old: old.source_defined_primary_key.clone(),
            new: new.source_defined_primary_key.clone(),
        });
    }

    // Only a change in what the source declares counts here; candidates that
    // appear or vanish with fields are already reported as field changes.
    let declared_cursor_changed = old.source_defined_cursor != new.source_defined_cursor
        || old.default_cursor_field != new.default_cursor_field;
    if declared_cursor_changed {
        changes.push(FieldTransform::UpdateCursorCandidates {
            old: old.cursor_candidates(),
            new: new.cursor_candidates(),
        });
    }

    let old_modes: BTreeSet<SyncMode> = old.supported_sync_modes.iter().copied().collect();
    let new_modes: BTreeSet<SyncMode> = new.supported_sync_modes.iter().copied().collect();
    if old_modes != new_modes {
        changes.push(FieldTransform::UpdateSupportedSyncModes {
            old: old.supported_sync_modes.clone(),
            new: new.supported_sync_modes.clone(),
        });
    }

    changes
}

fn diff_fields(old: &FieldTree, new: &FieldTree) -> Vec<FieldTransform> {
    let mut changes = Vec::new();
    let mut removed: Vec<&FieldPath> = Vec::new();
    let mut added: Vec<&FieldPath> = Vec::new();

    // BTreeMap order puts parents before their children
    for (path, node) in old.iter() {
        match new.get(path) {
            None => {
                if !removed.iter().any(|parent| parent.is_prefix_of(path)) {
                    removed.push(path);
                    changes.push(FieldTransform::RemoveField {
                        path: path.clone(),
                        field_type: node.field_type.clone(),
                    });
                }
            }
            Some(after) if after.descriptor != node.descriptor => {
                changes.push(FieldTransform::UpdateFieldSchema {
                    path: path.clone(),
                    old: node.field_type.clone(),
                    new: after.field_type.clone(),
                });
            }
            Some(_) => {}
        }
    }

    for (path, node) in new.iter() {
        if old.resolves(path) || added.iter().any(|parent| parent.is_prefix_of(path)) {
            continue;
        }
        added.push(path);
        changes.push(FieldTransform::AddField {
            path: path.clone(),
            field_type: node.field_type.clone(),
        });
    }

    changes
}
