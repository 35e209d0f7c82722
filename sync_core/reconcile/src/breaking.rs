use crate::diff::{CatalogDiff, FieldTransform, StreamTransform};
use catalog::{ConfiguredCatalog, FieldType, StreamConfig, SyncMode};
use common::config::components::compatibility::TypeWidening;
use common::types::{FieldPath, StreamKey};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Why a transform invalidates previously synced data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BreakingReason {
    SelectedStreamRemoved,
    PrimaryKeyChanged,
    FieldTypeChanged {
        path: FieldPath,
        old: FieldType,
        new: FieldType,
    },
    CursorFieldRemoved {
        path: FieldPath,
    },
    PrimaryKeyFieldRemoved {
        path: FieldPath,
    },
    CursorNoLongerCandidate {
        cursor: FieldPath,
    },
}

impl Display for BreakingReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakingReason::SelectedStreamRemoved => write!(f, "a selected stream was removed"),
            BreakingReason::PrimaryKeyChanged => write!(f, "the primary key changed"),
            BreakingReason::FieldTypeChanged { path, old, new } => {
                write!(f, "field '{path}' changed type from {old} to {new}")
            }
            BreakingReason::CursorFieldRemoved { path } => {
                write!(f, "cursor field '{path}' was removed")
            }
            BreakingReason::PrimaryKeyFieldRemoved { path } => {
                write!(f, "primary key field '{path}' was removed")
            }
            BreakingReason::CursorNoLongerCandidate { cursor } => {
                write!(f, "cursor '{cursor}' is no longer a cursor candidate")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakingTransform {
    pub transform: StreamTransform,
    pub reasons: Vec<BreakingReason>,
}

impl BreakingTransform {
    pub fn stream(&self) -> &StreamKey {
        self.transform.stream()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakingChangeVerdict {
    offending: Vec<BreakingTransform>,
}

impl BreakingChangeVerdict {
    pub fn non_breaking() -> Self {
        Self::default()
    }

    pub fn is_breaking(&self) -> bool {
        !self.offending.is_empty()
    }

    pub fn offending(&self) -> &[BreakingTransform] {
        &self.offending
    }

    /// One line per reason, for user-facing messages.
    pub fn describe(&self) -> Vec<String> {
        self.offending
            .iter()
            .flat_map(|t| t.reasons.iter().map(move |r| format!("{}: {r}", t.stream())))
            .collect()
    }
}

/// Labels a diff against the configuration it would be applied to.
///
/// Only selected streams can break: an unselected stream has no synced data
/// to invalidate. Type changes, including those under `items` and
/// `oneOf`/`anyOf`/`allOf`, are breaking unless the exact single-type change
/// is listed in the widening whitelist.
pub struct BreakingChangeClassifier<'a> {
    active: &'a ConfiguredCatalog,
    widenings: &'a [TypeWidening],
}

impl<'a> BreakingChangeClassifier<'a> {
    pub fn new(active: &'a ConfiguredCatalog) -> Self {
        Self {
            active,
            widenings: &[],
        }
    }

    pub fn with_widenings(mut self, widenings: &'a [TypeWidening]) -> Self {
        self.widenings = widenings;
        self
    }

    pub fn classify(&self, diff: &CatalogDiff) -> BreakingChangeVerdict {
        let offending = diff
            .iter()
            .filter_map(|transform| {
                let reasons = self.reasons_for(transform);
                (!reasons.is_empty()).then(|| BreakingTransform {
                    transform: transform.clone(),
                    reasons,
                })
            })
            .collect();
        BreakingChangeVerdict { offending }
    }

    fn reasons_for(&self, transform: &StreamTransform) -> Vec<BreakingReason> {
        let Some(config) = self
            .active
            .config(transform.stream())
            .filter(|config| config.selected)
        else {
            return Vec::new();
        };

        match transform {
            StreamTransform::AddStream { .. } => Vec::new(),
            StreamTransform::RemoveStream { .. } => vec![BreakingReason::SelectedStreamRemoved],
            StreamTransform::UpdateStream { changes, .. } => changes
                .iter()
                .filter_map(|change| self.reason_for_change(config, change))
                .collect(),
        }
    }

    fn reason_for_change(
        &self,
        config: &StreamConfig,
        change: &FieldTransform,
    ) -> Option<BreakingReason> {
        let active_cursor = active_cursor(config);
        match change {
            FieldTransform::AddField { .. } | FieldTransform::UpdateSupportedSyncModes { .. } => None,
            FieldTransform::UpdatePrimaryKey { .. } => Some(BreakingReason::PrimaryKeyChanged),
            FieldTransform::UpdateFieldSchema { path, old, new } => (old != new
                && !self.is_whitelisted(old, new))
            .then(|| BreakingReason::FieldTypeChanged {
                path: path.clone(),
                old: old.clone(),
                new: new.clone(),
            }),
            FieldTransform::RemoveField { path, .. } => {
                if let Some(cursor) = active_cursor.filter(|c| path.is_prefix_of(c)) {
                    Some(BreakingReason::CursorFieldRemoved {
                        path: cursor.clone(),
                    })
                } else {
                    config
                        .primary_key
                        .iter()
                        .find(|pk| path.is_prefix_of(pk))
                        .map(|pk| BreakingReason::PrimaryKeyFieldRemoved { path: pk.clone() })
                }
            }
            FieldTransform::UpdateCursorCandidates { new, .. } => active_cursor
                .filter(|cursor| !new.contains(*cursor))
                .map(|cursor| BreakingReason::CursorNoLongerCandidate {
                    cursor: cursor.clone(),
                }),
        }
    }

    fn is_whitelisted(&self, old: &FieldType, new: &FieldType) -> bool {
        if old.format != new.format
            || old.is_nullable() != new.is_nullable()
            || !old.same_nested_shape(new)
        {
            return false;
        }
        let (from, to) = (old.non_null_types(), new.non_null_types());
        match (from.len(), to.len()) {
            (1, 1) => from.iter().zip(to.iter()).all(|(f, t)| {
                self.widenings
                    .iter()
                    .any(|w| w.from == *f && w.to == *t)
            }),
            _ => false,
        }
    }
}

/// The cursor only matters while the stream syncs incrementally.
fn active_cursor(config: &StreamConfig) -> Option<&FieldPath> {
    match config.sync_mode {
        SyncMode::Incremental => config.cursor_field.as_ref(),
        SyncMode::FullRefresh => None,
    }
}
