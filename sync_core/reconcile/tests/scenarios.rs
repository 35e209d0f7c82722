use catalog::{
    DiscoveryCache, DiscoveryKey, Patch, Schema, StreamConfigPatch, SyncMode,
};
use common::config::components::discovery::DiscoveryCacheConfig;
use common::types::FieldPath;
use pretty_assertions::assert_eq;
use reconcile::{
    diff, reconcile, Baseline, BreakingChangeClassifier, Discovery, FieldTransform,
    NonBreakingChangesPreference, PropagationAction, PropagationPolicyEngine, ReconciliationPipeline,
    ReconciliationRequest, StreamResetDeterminer, StreamTransform,
};
use serde_json::json;
use std::collections::BTreeSet;
use test_utils::{configured, discovered_catalog, init_logging, key, schema, update_config, StreamBuilder};
use uuid::Uuid;

const PREFERENCES: [NonBreakingChangesPreference; 4] = [
    NonBreakingChangesPreference::Ignore,
    NonBreakingChangesPreference::Disable,
    NonBreakingChangesPreference::PropagateColumns,
    NonBreakingChangesPreference::PropagateFully,
];

fn users() -> StreamBuilder {
    StreamBuilder::new("public", "users")
        .field("id", "integer")
        .field("name", "string")
        .primary_key(&["id"])
}

fn sample_schemas() -> Vec<Schema> {
    vec![
        schema(vec![]),
        schema(vec![users()]),
        schema(vec![users().field("email", "string")]),
        schema(vec![
            users().nested("address", &[("city", "string")]),
            StreamBuilder::new("public", "orders")
                .field("id", "integer")
                .field("updated_at", "string")
                .cursor("updated_at"),
        ]),
        schema(vec![StreamBuilder::new("sales", "orders").field("id", "string")]),
    ]
}

#[test]
fn diff_identity_and_symmetry() {
    let schemas = sample_schemas();
    for a in &schemas {
        assert!(diff(a, a).is_empty());
        for b in &schemas {
            assert_eq!(diff(a, b).added_streams(), diff(b, a).removed_streams());
            assert_eq!(diff(a, b).removed_streams(), diff(b, a).added_streams());
        }
    }
}

#[test]
fn reconciliation_is_idempotent() {
    let schemas = sample_schemas();
    for old_schema in &schemas {
        let mut previous = configured(old_schema, &old_schema.keys().cloned().collect::<Vec<_>>());
        if let Some(first) = old_schema.keys().next().cloned() {
            update_config(&mut previous, &first, |c| {
                c.field_selection_enabled = true;
                c.selected_fields = BTreeSet::from([FieldPath::root("id")]);
                c.cursor_field = Some(FieldPath::root("gone"));
            });
        }
        for new_schema in &schemas {
            let once = reconcile(&previous, old_schema, new_schema);
            let twice = reconcile(&once, new_schema, new_schema);
            assert_eq!(twice, once);
        }
    }
}

#[test]
fn compatible_changes_never_lose_selection() {
    let old = schema(vec![users()]);
    let new = schema(vec![users().field("email", "string").field("age", "integer")]);
    let previous = configured(&old, &[key("public", "users")]);

    let verdict = BreakingChangeClassifier::new(&previous).classify(&diff(&old, &new));
    assert!(!verdict.is_breaking());
    assert!(reconcile(&previous, &old, &new).is_selected(&key("public", "users")));
}

#[test]
fn scenario_a_added_field_is_auto_selected() {
    init_logging();
    let old = schema(vec![users()]);
    let new = schema(vec![users().field("email", "string")]);
    let mut previous = configured(&old, &[key("public", "users")]);
    update_config(&mut previous, &key("public", "users"), |c| {
        c.field_selection_enabled = true;
        c.selected_fields = BTreeSet::from([FieldPath::root("id"), FieldPath::root("name")]);
    });

    let d = diff(&old, &new);
    assert_eq!(
        d.transforms(),
        &[StreamTransform::UpdateStream {
            stream: key("public", "users"),
            changes: vec![FieldTransform::AddField {
                path: FieldPath::root("email"),
                field_type: new
                    .get(&key("public", "users"))
                    .and_then(|s| s.fields.get(&FieldPath::root("email")))
                    .map(|n| n.field_type.clone())
                    .expect("email"),
            }],
        }]
    );
    assert!(!BreakingChangeClassifier::new(&previous).classify(&d).is_breaking());

    let merged = reconcile(&previous, &old, &new);
    let before = previous.config(&key("public", "users")).expect("users");
    let after = merged.config(&key("public", "users")).expect("users");
    assert_eq!(after.primary_key, vec![FieldPath::root("id")]);
    assert_eq!(after.sync_mode, before.sync_mode);
    assert!(after.selected_fields.contains(&FieldPath::root("email")));
}

#[test]
fn scenario_b_primary_key_change_needs_approval() {
    let old = schema(vec![StreamBuilder::new("public", "orders")
        .field("id", "integer")
        .primary_key(&["id"])]);
    let new = schema(vec![StreamBuilder::new("public", "orders")
        .field("id", "integer")
        .field("order_uuid", "string")
        .primary_key(&["order_uuid"])]);
    let active = configured(&old, &[key("public", "orders")]);

    let d = diff(&old, &new);
    let StreamTransform::UpdateStream { changes, .. } = &d.transforms()[0] else {
        panic!("expected an update");
    };
    assert!(changes
        .iter()
        .any(|c| matches!(c, FieldTransform::UpdatePrimaryKey { .. })));

    let verdict = BreakingChangeClassifier::new(&active).classify(&d);
    assert!(verdict.is_breaking());
    let decision = PropagationPolicyEngine::default().decide(
        &d,
        &verdict,
        NonBreakingChangesPreference::PropagateFully,
    );
    assert_eq!(decision.action, PropagationAction::ManualApprovalRequired);
}

#[test]
fn scenario_c_selected_stream_removed() {
    let old = schema(vec![users(), StreamBuilder::new("public", "legacy").field("id", "integer")]);
    let new = schema(vec![users()]);
    let active = configured(&old, &[key("public", "legacy")]);

    let d = diff(&old, &new);
    assert_eq!(
        d.transforms(),
        &[StreamTransform::RemoveStream {
            stream: key("public", "legacy")
        }]
    );
    assert!(BreakingChangeClassifier::new(&active).classify(&d).is_breaking());
    assert!(!reconcile(&active, &old, &new).contains(&key("public", "legacy")));
}

#[test]
fn scenario_d_user_sync_mode_change_resets_stream() {
    let s = schema(vec![StreamBuilder::new("public", "events")
        .field("id", "integer")
        .field("ts", "string")
        .cursor("ts")]);
    let current = configured(&s, &[key("public", "events")]);
    assert_eq!(
        current.config(&key("public", "events")).map(|c| c.sync_mode),
        Some(SyncMode::FullRefresh)
    );

    // no schema change at all
    assert!(StreamResetDeterminer::new().determine(&current, &current).is_empty());

    let mut patch = StreamConfigPatch::new(key("public", "events"));
    patch.sync_mode = Patch::SetTo(SyncMode::Incremental);
    let outcome = current.apply_patches(&[patch]).expect("patch");

    let resets = StreamResetDeterminer::from_patch_outcome(&outcome)
        .streams_to_reset(&current, &outcome.catalog);
    assert!(resets.contains(&key("public", "events")));
}

#[test]
fn breaking_changes_are_never_auto_applied_by_the_pipeline() {
    let old = schema(vec![users()]);
    let new = schema(vec![StreamBuilder::new("public", "users")
        .field("id", "string")
        .field("name", "string")
        .primary_key(&["id"])]);
    let active = configured(&old, &[key("public", "users")]);

    for preference in PREFERENCES {
        let outcome = ReconciliationPipeline::default()
            .run(ReconciliationRequest {
                baseline: Baseline::Existing {
                    schema: &old,
                    configured: &active,
                },
                discovery: Discovery::Fresh(discovered_catalog(vec![StreamBuilder::new(
                    "public", "users",
                )
                .field("id", "string")
                .field("name", "string")
                .primary_key(&["id"])])),
                preference,
            })
            .expect("run");
        assert!(outcome.is_breaking());
        assert_ne!(outcome.decision.action, PropagationAction::AutoApply);
        assert!(outcome.configured.is_none());
        assert!(outcome.resets.is_empty());
        assert_eq!(outcome.schema, new);
    }
}

#[test]
fn cached_and_fresh_discoveries_reconcile_identically() {
    let old = schema(vec![users()]);
    let active = configured(&old, &[key("public", "users")]);
    let fresh = discovered_catalog(vec![
        users().field("email", "string"),
        StreamBuilder::new("public", "orders").field("id", "integer"),
    ]);

    let cache = DiscoveryCache::new(&DiscoveryCacheConfig::default());
    let discovery_key =
        DiscoveryKey::new(Uuid::new_v4(), "2.1.0", &json!({"host": "db"})).expect("key");
    let parsed = Schema::try_from(fresh.clone()).expect("parse");
    cache.put(discovery_key.clone(), parsed).expect("put");
    let hit = cache.get(&discovery_key).expect("hit");

    let pipeline = ReconciliationPipeline::default();
    let run = |discovery| {
        pipeline
            .run(ReconciliationRequest {
                baseline: Baseline::Existing {
                    schema: &old,
                    configured: &active,
                },
                discovery,
                preference: NonBreakingChangesPreference::PropagateFully,
            })
            .expect("run")
    };
    let from_fresh = run(Discovery::Fresh(fresh));
    let from_cache = run(Discovery::Cached(hit));

    assert_eq!(from_fresh.diff, from_cache.diff);
    assert_eq!(from_fresh.configured, from_cache.configured);
    assert_eq!(from_fresh.decision.action, PropagationAction::AutoApply);
    let configured = from_fresh.configured.expect("catalog changed");
    // propagate_fully selects new streams by default
    assert!(configured.is_selected(&key("public", "orders")));
    assert!(from_fresh.resets.is_empty());
}
