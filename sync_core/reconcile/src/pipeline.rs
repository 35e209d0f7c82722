//! One reconciliation run: parse, diff, classify, decide, merge, reset.
//!
//! The pipeline is pure. It reads a baseline and a discovery result and
//! returns everything the caller needs to perform side effects; nothing here
//! persists or dispatches anything.

use crate::breaking::{BreakingChangeClassifier, BreakingChangeVerdict};
use crate::diff::{CatalogDiff, CatalogDiffEngine};
use crate::error::ReconcileError;
use crate::merge::{ConfigReconciler, UnresolvedReference};
use crate::propagation::{
    ConnectionDirective, NonBreakingChangesPreference, PropagationDecision,
    PropagationPolicyEngine,
};
use crate::reset::{StreamResetDeterminer, StreamResets};
use catalog::{CachedDiscovery, CatalogError, ConfiguredCatalog, DiscoveredCatalog, Schema};
use common::config::components::compatibility::TypeWidening;
use common::config::components::propagation::NewStreamSelection;
use common::config::EngineConfig;

/// What the discovered schema is compared against.
#[derive(Debug, Clone, Copy)]
pub enum Baseline<'a> {
    /// The connection has never stored a discovered schema. The discovery
    /// becomes the baseline as-is: there is nothing it could break.
    FirstDiscovery,
    Existing {
        schema: &'a Schema,
        configured: &'a ConfiguredCatalog,
    },
}

/// A fresh connector result and a cache hit take the same path.
#[derive(Debug, Clone)]
pub enum Discovery {
    Fresh(DiscoveredCatalog),
    Cached(CachedDiscovery),
}

impl Discovery {
    pub fn into_schema(self) -> Result<Schema, CatalogError> {
        match self {
            Discovery::Fresh(raw) => Schema::try_from(raw),
            Discovery::Cached(hit) => Ok(hit.schema),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationRequest<'a> {
    pub baseline: Baseline<'a>,
    pub discovery: Discovery,
    pub preference: NonBreakingChangesPreference,
}

#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    /// The parsed discovery.
    pub schema: Schema,
    pub first_discovery: bool,
    pub diff: CatalogDiff,
    pub verdict: BreakingChangeVerdict,
    pub decision: PropagationDecision,
    /// Set when the configured catalog must be replaced.
    pub configured: Option<ConfiguredCatalog>,
    pub resets: StreamResets,
    pub unresolved: Vec<UnresolvedReference>,
}

impl ReconciliationOutcome {
    pub fn applied(&self) -> &CatalogDiff {
        &self.decision.applied
    }

    pub fn directive(&self) -> ConnectionDirective {
        self.decision.directive
    }

    pub fn is_breaking(&self) -> bool {
        self.verdict.is_breaking()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationPipeline {
    widenings: Vec<TypeWidening>,
    policy: PropagationPolicyEngine,
}

impl ReconciliationPipeline {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            widenings: config.type_compatibility.clone(),
            policy: PropagationPolicyEngine::new(config.propagation.clone()),
        }
    }

    pub fn run(
        &self,
        request: ReconciliationRequest<'_>,
    ) -> Result<ReconciliationOutcome, ReconcileError> {
        let schema = request.discovery.into_schema()?;

        let (old_schema, old_configured) = match request.baseline {
            Baseline::FirstDiscovery => return Ok(first_discovery(schema)),
            Baseline::Existing { schema, configured } => (schema, configured),
        };

        let diff = CatalogDiffEngine.diff(old_schema, &schema);
        let verdict = BreakingChangeClassifier::new(old_configured)
            .with_widenings(&self.widenings)
            .classify(&diff);
        let decision = self.policy.decide(&diff, &verdict, request.preference);

        let (configured, resets, unresolved) = if decision.is_auto_apply() {
            let report = ConfigReconciler::new(decision.new_streams).reconcile_with_report(
                old_configured,
                old_schema,
                &schema,
            );
            let resets = StreamResetDeterminer::new().determine(old_configured, &report.catalog);
            let configured = (report.catalog != *old_configured).then_some(report.catalog);
            (configured, resets, report.unresolved)
        } else {
            (None, StreamResets::default(), Vec::new())
        };

        tracing::info!(
            transforms = diff.len(),
            breaking = verdict.is_breaking(),
            action = ?decision.action,
            resets = resets.len(),
            "reconciled discovered schema"
        );

        Ok(ReconciliationOutcome {
            schema,
            first_discovery: false,
            diff,
            verdict,
            decision,
            configured,
            resets,
            unresolved,
        })
    }
}

fn first_discovery(schema: Schema) -> ReconciliationOutcome {
    tracing::info!(streams = schema.len(), "first discovery becomes the baseline");
    let configured = ConfiguredCatalog::default_for_schema(&schema, NewStreamSelection::Unselected);
    ReconciliationOutcome {
        schema,
        first_discovery: true,
        diff: CatalogDiff::empty(),
        verdict: BreakingChangeVerdict::non_breaking(),
        decision: PropagationDecision::no_op(),
        configured: Some(configured),
        resets: StreamResets::default(),
        unresolved: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::PropagationAction;
    use matches::assert_matches;
    use common::config::{read_config, CONFIG_FILE_NAME};
    use serde_json::json;
    use test_utils::{configured, discovered_catalog, key, schema, StreamBuilder};

    #[test]
    fn first_discovery_is_an_explicit_baseline() {
        let pipeline = ReconciliationPipeline::default();
        let outcome = pipeline
            .run(ReconciliationRequest {
                baseline: Baseline::FirstDiscovery,
                discovery: Discovery::Fresh(discovered_catalog(vec![StreamBuilder::new(
                    "public", "users",
                )
                .field("id", "integer")])),
                preference: NonBreakingChangesPreference::Ignore,
            })
            .expect("run");

        assert!(outcome.first_discovery);
        assert!(outcome.diff.is_empty());
        assert_eq!(outcome.decision.action, PropagationAction::NoOp);
        let configured = outcome.configured.expect("default catalog");
        assert!(configured.contains(&key("public", "users")));
        assert!(configured.selected_keys().is_empty());
    }

    #[test]
    fn malformed_discovery_aborts_before_any_decision() {
        let mut raw = StreamBuilder::new("public", "users").discovered();
        raw.json_schema = json!({"properties": {"id": {"type": 42}}});

        let err = ReconciliationPipeline::default()
            .run(ReconciliationRequest {
                baseline: Baseline::FirstDiscovery,
                discovery: Discovery::Fresh(DiscoveredCatalog { streams: vec![raw] }),
                preference: NonBreakingChangesPreference::PropagateFully,
            })
            .expect_err("malformed");
        assert_matches!(err, ReconcileError::MalformedSchema { .. });
    }

    #[test]
    fn loaded_config_drives_widenings_and_new_stream_selection() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "propagation:\n  propagate_fully: unselected\ntype_compatibility:\n  - from: integer\n    to: number\n",
        )
        .expect("write config");
        let config = read_config(Some(dir.path().to_path_buf())).expect("config");

        let orders = |amount: &str| {
            StreamBuilder::new("public", "orders")
                .field("id", "integer")
                .field("amount", amount)
                .primary_key(&["id"])
        };
        let old = schema(vec![orders("integer")]);
        let active = configured(&old, &[key("public", "orders")]);
        let request = || ReconciliationRequest {
            baseline: Baseline::Existing {
                schema: &old,
                configured: &active,
            },
            discovery: Discovery::Fresh(discovered_catalog(vec![
                orders("number"),
                StreamBuilder::new("public", "refunds").field("id", "integer"),
            ])),
            preference: NonBreakingChangesPreference::PropagateFully,
        };

        let outcome = ReconciliationPipeline::from_config(&config)
            .run(request())
            .expect("run");
        assert!(!outcome.is_breaking());
        assert_eq!(outcome.decision.action, PropagationAction::AutoApply);
        let updated = outcome.configured.expect("updated catalog");
        assert!(updated.is_selected(&key("public", "orders")));
        assert!(updated.contains(&key("public", "refunds")));
        assert!(!updated.is_selected(&key("public", "refunds")));

        // without the whitelist the same change is breaking
        let outcome = ReconciliationPipeline::default().run(request()).expect("run");
        assert!(outcome.is_breaking());
        assert_eq!(outcome.decision.action, PropagationAction::ManualApprovalRequired);
        assert!(outcome.configured.is_none());
    }
}
