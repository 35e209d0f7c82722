use catalog::{ConfiguredCatalog, DestinationSyncMode, StreamConfig, SyncMode, UserPatchOutcome};
use common::types::StreamKey;
use serde::Serialize;
use std::collections::btree_map::Keys;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    SyncModeChanged,
    DestinationSyncModeChanged,
    CursorChanged,
    PrimaryKeyChanged,
    UserChangedSyncMode,
}

/// Streams whose synced state must be invalidated, with why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StreamResets {
    streams: BTreeMap<StreamKey, BTreeSet<ResetReason>>,
}

impl StreamResets {
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.streams.contains_key(key)
    }

    pub fn reasons(&self, key: &StreamKey) -> Option<&BTreeSet<ResetReason>> {
        self.streams.get(key)
    }

    pub fn keys(&self) -> Keys<'_, StreamKey, BTreeSet<ResetReason>> {
        self.streams.keys()
    }

    pub fn key_set(&self) -> BTreeSet<StreamKey> {
        self.streams.keys().cloned().collect()
    }

    fn add(&mut self, key: &StreamKey, reason: ResetReason) {
        self.streams.entry(key.clone()).or_default().insert(reason);
    }
}

/// Computes the reset set between two configured catalogs.
///
/// Two triggers are unioned: configuration drift between the catalogs, and
/// streams whose sync mode a user patch changed. Whether the caller resets or
/// merge-refreshes the result is its own decision.
#[derive(Debug, Clone, Default)]
pub struct StreamResetDeterminer {
    user_sync_mode_changes: BTreeSet<StreamKey>,
}

impl StreamResetDeterminer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_changes(user_sync_mode_changes: BTreeSet<StreamKey>) -> Self {
        Self {
            user_sync_mode_changes,
        }
    }

    pub fn from_patch_outcome(outcome: &UserPatchOutcome) -> Self {
        Self::with_user_changes(outcome.sync_mode_changed.clone())
    }

    pub fn determine(
        &self,
        old_configured: &ConfiguredCatalog,
        new_configured: &ConfiguredCatalog,
    ) -> StreamResets {
        let mut resets = StreamResets::default();

        for (key, stream) in new_configured.iter().filter(|(_, s)| s.config.selected) {
            let Some(before) = old_configured.config(key) else {
                continue;
            };
            for reason in config_drift(before, &stream.config) {
                resets.add(key, reason);
            }
        }

        for key in &self.user_sync_mode_changes {
            let before = old_configured.config(key);
            let Some(after) = new_configured.config(key) else {
                continue;
            };
            if !after.selected {
                tracing::debug!(stream = %key, "skipping user reset trigger for unselected stream");
            } else if before.is_some_and(|before| sync_modes(before) != sync_modes(after)) {
                resets.add(key, ResetReason::UserChangedSyncMode);
            }
        }

        if !resets.is_empty() {
            tracing::debug!(streams = resets.len(), "streams need a reset");
        }
        resets
    }

    pub fn streams_to_reset(
        &self,
        old_configured: &ConfiguredCatalog,
        new_configured: &ConfiguredCatalog,
    ) -> BTreeSet<StreamKey> {
        self.determine(old_configured, new_configured).key_set()
    }
}

fn sync_modes(config: &StreamConfig) -> (SyncMode, DestinationSyncMode) {
    (config.sync_mode, config.destination_sync_mode)
}

fn config_drift(old: &StreamConfig, new: &StreamConfig) -> Vec<ResetReason> {
    [
        (old.sync_mode != new.sync_mode, ResetReason::SyncModeChanged),
        (
            old.destination_sync_mode != new.destination_sync_mode,
            ResetReason::DestinationSyncModeChanged,
        ),
        (old.cursor_field != new.cursor_field, ResetReason::CursorChanged),
        (old.primary_key != new.primary_key, ResetReason::PrimaryKeyChanged),
    ]
    .into_iter()
    .filter_map(|(changed, reason)| changed.then_some(reason))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Patch, StreamConfigPatch};
    use common::types::FieldPath;
    use test_utils::{configured, key, schema, update_config, StreamBuilder};

    fn catalog() -> ConfiguredCatalog {
        let s = schema(vec![
            StreamBuilder::new("public", "events")
                .field("id", "integer")
                .field("ts", "string")
                .cursor("ts"),
            StreamBuilder::new("public", "users").field("id", "integer"),
        ]);
        let mut catalog = configured(&s, &[key("public", "events"), key("public", "users")]);
        update_config(&mut catalog, &key("public", "events"), |c| {
            c.sync_mode = SyncMode::FullRefresh;
            c.destination_sync_mode = DestinationSyncMode::Overwrite;
        });
        catalog
    }

    #[test]
    fn equal_catalogs_need_no_reset() {
        let c = catalog();
        assert!(StreamResetDeterminer::new().determine(&c, &c).is_empty());
    }

    #[test]
    fn config_drift_triggers_reset_for_selected_streams_only() {
        let old = catalog();
        let mut new = old.clone();
        update_config(&mut new, &key("public", "users"), |c| {
            c.primary_key = vec![FieldPath::root("id")];
        });
        let resets = StreamResetDeterminer::new().determine(&old, &new);
        assert_eq!(
            resets.reasons(&key("public", "users")),
            Some(&BTreeSet::from([ResetReason::PrimaryKeyChanged]))
        );

        update_config(&mut new, &key("public", "users"), |c| c.selected = false);
        assert!(StreamResetDeterminer::new().determine(&old, &new).is_empty());
    }

    #[test]
    fn user_sync_mode_change_triggers_reset_without_schema_change() {
        let old = catalog();
        let mut patch = StreamConfigPatch::new(key("public", "events"));
        patch.sync_mode = Patch::SetTo(SyncMode::Incremental);
        patch.destination_sync_mode = Patch::SetTo(DestinationSyncMode::Append);
        let outcome = old.apply_patches(&[patch]).expect("patch");

        let determiner = StreamResetDeterminer::from_patch_outcome(&outcome);
        // equal catalogs never reset, whatever the user trigger says
        assert!(determiner.streams_to_reset(&old, &old).is_empty());
        assert!(determiner
            .streams_to_reset(&outcome.catalog, &outcome.catalog)
            .is_empty());

        let resets = determiner.determine(&old, &outcome.catalog);
        assert_eq!(
            resets.reasons(&key("public", "events")),
            Some(&BTreeSet::from([
                ResetReason::SyncModeChanged,
                ResetReason::DestinationSyncModeChanged,
                ResetReason::UserChangedSyncMode,
            ]))
        );
    }
}
