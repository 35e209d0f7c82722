//! Carries a configured catalog forward onto a freshly discovered schema.
//!
//! Every attribute of [`StreamConfig`] has an explicit rule. An old value is
//! only kept once it has been checked against the new schema; anything that no
//! longer resolves falls back to a schema-provided default and is reported as
//! an [`UnresolvedReference`].

use catalog::{
    ConfiguredCatalog, ConfiguredStream, DestinationSyncMode, HashedField, Schema, StreamConfig,
    StreamSchema,
};
use common::config::components::propagation::NewStreamSelection;
use common::types::{FieldPath, StreamKey};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Cursor,
    PrimaryKey,
    SelectedField,
    HashedField,
}

/// A configured path that did not survive reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub stream: StreamKey,
    pub kind: ReferenceKind,
    pub path: FieldPath,
    /// Whether the old schema knew the path. When it did not, the
    /// configuration referenced a field that never existed.
    pub known_to_old_schema: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub catalog: ConfiguredCatalog,
    pub unresolved: Vec<UnresolvedReference>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigReconciler {
    new_streams: NewStreamSelection,
}

impl ConfigReconciler {
    pub fn new(new_streams: NewStreamSelection) -> Self {
        Self { new_streams }
    }

    pub fn reconcile(
        &self,
        old_configured: &ConfiguredCatalog,
        old_schema: &Schema,
        new_schema: &Schema,
    ) -> ConfiguredCatalog {
        self.reconcile_with_report(old_configured, old_schema, new_schema)
            .catalog
    }

    pub fn reconcile_with_report(
        &self,
        old_configured: &ConfiguredCatalog,
        old_schema: &Schema,
        new_schema: &Schema,
    ) -> Reconciliation {
        let (streams, unresolved): (Vec<ConfiguredStream>, Vec<Vec<UnresolvedReference>>) =
            new_schema
                .streams()
                .map(|stream| match old_configured.get(&stream.key) {
                    Some(previous) => {
                        let before = old_schema.get(&stream.key).unwrap_or(&previous.stream);
                        let mut merge = StreamMerge::new(before, stream);
                        let config = merge.carry_forward(&previous.config);
                        (
                            ConfiguredStream {
                                stream: stream.clone(),
                                config,
                            },
                            merge.unresolved,
                        )
                    }
                    None => {
                        tracing::debug!(stream = %stream.key, "configuring newly discovered stream");
                        (
                            ConfiguredStream {
                                stream: stream.clone(),
                                config: StreamConfig::default_for(stream, self.new_streams),
                            },
                            Vec::new(),
                        )
                    }
                })
                .unzip();

        for dropped in old_configured.keys().filter(|k| !new_schema.contains(k)) {
            tracing::debug!(stream = %dropped, "dropping stream missing from the new schema");
        }

        let unresolved: Vec<UnresolvedReference> = unresolved.into_iter().flatten().collect();
        for reference in &unresolved {
            if reference.known_to_old_schema {
                tracing::debug!(
                    stream = %reference.stream,
                    kind = ?reference.kind,
                    path = %reference.path,
                    "configured field vanished, falling back"
                );
            } else {
                tracing::warn!(
                    stream = %reference.stream,
                    kind = ?reference.kind,
                    path = %reference.path,
                    "configured field resolves in neither the old nor the new schema"
                );
            }
        }

        Reconciliation {
            catalog: streams.into_iter().collect(),
            unresolved,
        }
    }
}

/// Convenience wrapper using the default new-stream selection (unselected).
pub fn reconcile(
    old_configured: &ConfiguredCatalog,
    old_schema: &Schema,
    new_schema: &Schema,
) -> ConfiguredCatalog {
    ConfigReconciler::default().reconcile(old_configured, old_schema, new_schema)
}

struct StreamMerge<'a> {
    old: &'a StreamSchema,
    new: &'a StreamSchema,
    unresolved: Vec<UnresolvedReference>,
}

impl<'a> StreamMerge<'a> {
    fn new(old: &'a StreamSchema, new: &'a StreamSchema) -> Self {
        Self {
            old,
            new,
            unresolved: Vec::new(),
        }
    }

    fn carry_forward(&mut self, previous: &StreamConfig) -> StreamConfig {
        let (sync_mode, destination_sync_mode) = if self.new.supports(previous.sync_mode) {
            (previous.sync_mode, previous.destination_sync_mode)
        } else {
            tracing::debug!(
                stream = %self.new.key,
                mode = %previous.sync_mode,
                "sync mode no longer supported, using schema default"
            );
            self.new.default_sync_modes()
        };

        let cursor_field = self.cursor(previous);
        let primary_key = self.primary_key(previous);
        let destination_sync_mode =
            if destination_sync_mode.requires_primary_key() && primary_key.is_empty() {
                DestinationSyncMode::Append
            } else {
                destination_sync_mode
            };

        let selected_fields = if previous.field_selection_enabled {
            self.selected_fields(previous, cursor_field.as_ref(), &primary_key)
        } else {
            BTreeSet::new()
        };
        let hashed_fields = self.hashed_fields(&previous.hashed_fields);

        StreamConfig {
            selected: previous.selected,
            suggested: previous.suggested,
            sync_mode,
            destination_sync_mode,
            cursor_field,
            primary_key,
            field_selection_enabled: previous.field_selection_enabled,
            selected_fields,
            alias: previous.alias.clone(),
            destination_object_name: previous.destination_object_name.clone(),
            hashed_fields,
            mappers: previous.mappers.clone(),
            include_files: previous.include_files,
        }
    }

    fn cursor(&mut self, previous: &StreamConfig) -> Option<FieldPath> {
        if self.new.source_defined_cursor {
            return self.new.default_cursor_field.clone();
        }
        match &previous.cursor_field {
            Some(cursor) if self.new.resolves(cursor) => Some(cursor.clone()),
            Some(cursor) => {
                self.unresolved(ReferenceKind::Cursor, cursor);
                self.new.default_cursor_field.clone()
            }
            None => self.new.default_cursor_field.clone(),
        }
    }

    fn primary_key(&mut self, previous: &StreamConfig) -> Vec<FieldPath> {
        if let Some(pk) = &self.new.source_defined_primary_key {
            return pk.clone();
        }
        let missing: Vec<FieldPath> = previous
            .primary_key
            .iter()
            .filter(|path| !self.new.resolves(path))
            .cloned()
            .collect();
        if missing.is_empty() {
            return previous.primary_key.clone();
        }
        for path in &missing {
            self.unresolved(ReferenceKind::PrimaryKey, path);
        }
        self.new.default_primary_key()
    }

    /// Old selections survive if the field still exists, fields the old schema
    /// never had are selected at any depth, and the roots of the cursor and primary key are
    /// always kept so the stream stays syncable.
    fn selected_fields(
        &mut self,
        previous: &StreamConfig,
        cursor: Option<&FieldPath>,
        primary_key: &[FieldPath],
    ) -> BTreeSet<FieldPath> {
        let mut selected = BTreeSet::new();
        for path in &previous.selected_fields {
            if self.new.resolves(path) && self.old.resolves(path) {
                selected.insert(path.clone());
            } else if !self.new.resolves(path) && !self.old.resolves(path) {
                self.unresolved(ReferenceKind::SelectedField, path);
            }
        }

        // parents sort before children, so a new object covers its own fields
        for path in self.new.fields.paths() {
            if self.old.resolves(path) || selected.iter().any(|s| s.is_prefix_of(path)) {
                continue;
            }
            selected.insert(path.clone());
        }

        selected.extend(
            cursor
                .into_iter()
                .chain(primary_key)
                .filter_map(FieldPath::top_level)
                .filter(|root| self.new.resolves(root)),
        );
        selected
    }

    fn hashed_fields(&mut self, previous: &[HashedField]) -> Vec<HashedField> {
        let mut kept = Vec::with_capacity(previous.len());
        for hashed in previous {
            if self.new.resolves(&hashed.field_path) {
                kept.push(hashed.clone());
            } else {
                self.unresolved(ReferenceKind::HashedField, &hashed.field_path);
            }
        }
        kept
    }

    fn unresolved(&mut self, kind: ReferenceKind, path: &FieldPath) {
        self.unresolved.push(UnresolvedReference {
            stream: self.new.key.clone(),
            kind,
            path: path.clone(),
            known_to_old_schema: self.old.resolves(path),
        });
    }
}
