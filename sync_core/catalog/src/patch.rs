//! User-submitted edits to a configured catalog.
//!
//! Every patchable attribute is a [`Patch`]: absent from the request means
//! [`Patch::Unset`] (leave it alone), an explicit `null` means [`Patch::Clear`]
//! (back to the schema default / empty), and a value means [`Patch::SetTo`].

use crate::configured::{ConfiguredCatalog, HashedField, MapperConfig, StreamConfig};
use crate::error::CatalogError;
use crate::schema::StreamSchema;
use crate::sync_mode::{DestinationSyncMode, SyncMode};
use common::types::{FieldPath, StreamKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Clear,
    SetTo(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    /// Apply to an optional attribute.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Unset => current,
            Patch::Clear => None,
            Patch::SetTo(value) => Some(value),
        }
    }

    /// Apply to an attribute that always has a value; `Clear` yields `default`.
    pub fn apply_or(self, current: T, default: impl FnOnce() -> T) -> T {
        match self {
            Patch::Unset => current,
            Patch::Clear => default(),
            Patch::SetTo(value) => value,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // only reachable without skip_serializing_if
            Patch::Unset | Patch::Clear => serializer.serialize_none(),
            Patch::SetTo(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::SetTo(value),
            None => Patch::Clear,
        })
    }
}

/// Field selection: `SetTo` enables it with the given fields, `Clear` turns it off.
pub type FieldSelectionPatch = Patch<BTreeSet<FieldPath>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfigPatch {
    pub stream: StreamKey,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub selected: Patch<bool>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub sync_mode: Patch<SyncMode>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub destination_sync_mode: Patch<DestinationSyncMode>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub cursor_field: Patch<FieldPath>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub primary_key: Patch<Vec<FieldPath>>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub selected_fields: FieldSelectionPatch,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub alias: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub destination_object_name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub hashed_fields: Patch<Vec<HashedField>>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub mappers: Patch<Vec<MapperConfig>>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub include_files: Patch<bool>,
}

impl StreamConfigPatch {
    pub fn new(stream: StreamKey) -> Self {
        Self {
            stream,
            selected: Patch::Unset,
            sync_mode: Patch::Unset,
            destination_sync_mode: Patch::Unset,
            cursor_field: Patch::Unset,
            primary_key: Patch::Unset,
            selected_fields: Patch::Unset,
            alias: Patch::Unset,
            destination_object_name: Patch::Unset,
            hashed_fields: Patch::Unset,
            mappers: Patch::Unset,
            include_files: Patch::Unset,
        }
    }
}

/// Result of applying user patches: the new catalog and the streams whose
/// sync mode the user changed (a reset trigger independent of schema changes).
#[derive(Debug, Clone, PartialEq)]
pub struct UserPatchOutcome {
    pub catalog: ConfiguredCatalog,
    pub sync_mode_changed: BTreeSet<StreamKey>,
}

impl ConfiguredCatalog {
    pub fn apply_patches(
        &self,
        patches: &[StreamConfigPatch],
    ) -> Result<UserPatchOutcome, CatalogError> {
        let mut catalog = self.clone();
        let mut sync_mode_changed = BTreeSet::new();

        for patch in patches {
            let configured = catalog.get_mut(&patch.stream).ok_or_else(|| {
                CatalogError::not_found(format!(
                    "cannot patch stream '{}': not in the configured catalog",
                    patch.stream
                ))
            })?;
            let before = (configured.config.sync_mode, configured.config.destination_sync_mode);
            let updated = apply_stream_patch(&configured.stream, &configured.config, patch.clone())?;
            if (updated.sync_mode, updated.destination_sync_mode) != before {
                tracing::debug!(stream = %patch.stream, "user changed sync mode");
                sync_mode_changed.insert(patch.stream.clone());
            }
            configured.config = updated;
        }

        Ok(UserPatchOutcome {
            catalog,
            sync_mode_changed,
        })
    }
}

fn apply_stream_patch(
    stream: &StreamSchema,
    current: &StreamConfig,
    patch: StreamConfigPatch,
) -> Result<StreamConfig, CatalogError> {
    let key = &stream.key;
    let (default_sync, default_dest) = stream.default_sync_modes();
    let mut next = current.clone();

    next.selected = patch.selected.apply_or(current.selected, || false);
    next.sync_mode = patch.sync_mode.apply_or(current.sync_mode, || default_sync);
    next.destination_sync_mode = patch
        .destination_sync_mode
        .apply_or(current.destination_sync_mode, || default_dest);
    next.cursor_field = patch.cursor_field.apply(current.cursor_field.clone());
    next.primary_key = patch
        .primary_key
        .apply_or(current.primary_key.clone(), Vec::new);
    match patch.selected_fields {
        Patch::Unset => {}
        Patch::Clear => {
            next.field_selection_enabled = false;
            next.selected_fields.clear();
        }
        Patch::SetTo(fields) => {
            next.field_selection_enabled = true;
            next.selected_fields = fields;
        }
    }
    next.alias = patch.alias.apply(current.alias.clone());
    next.destination_object_name = patch
        .destination_object_name
        .apply(current.destination_object_name.clone());
    next.hashed_fields = patch
        .hashed_fields
        .apply_or(current.hashed_fields.clone(), Vec::new);
    next.mappers = patch.mappers.apply_or(current.mappers.clone(), Vec::new);
    next.include_files = patch.include_files.apply_or(current.include_files, || false);

    if !stream.supports(next.sync_mode) {
        return Err(CatalogError::invalid_patch(
            key,
            format!("sync mode {} is not supported", next.sync_mode),
        ));
    }
    if let Some(cursor) = &next.cursor_field {
        if !stream.resolves(cursor) {
            return Err(CatalogError::invalid_patch(
                key,
                format!("cursor field '{cursor}' does not exist"),
            ));
        }
    }
    if let Some(missing) = next.primary_key.iter().find(|p| !stream.resolves(p)) {
        return Err(CatalogError::invalid_patch(
            key,
            format!("primary key field '{missing}' does not exist"),
        ));
    }
    if next.destination_sync_mode.requires_primary_key() && next.primary_key.is_empty() {
        return Err(CatalogError::invalid_patch(
            key,
            format!("{} requires a primary key", next.destination_sync_mode),
        ));
    }
    if let Some(missing) = next.selected_fields.iter().find(|p| !stream.resolves(p)) {
        return Err(CatalogError::invalid_patch(
            key,
            format!("selected field '{missing}' does not exist"),
        ));
    }
    if let Some(missing) = next.hashed_fields.iter().find(|h| !stream.resolves(&h.field_path)) {
        return Err(CatalogError::invalid_patch(
            key,
            format!("hashed field '{}' does not exist", missing.field_path),
        ));
    }
    if next.include_files && !stream.is_file_based {
        return Err(CatalogError::invalid_patch(
            key,
            "include_files requires a file-based stream",
        ));
    }

    Ok(next)
}
