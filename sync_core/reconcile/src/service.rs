//! Drives a reconciliation against external collaborators.
//!
//! The pipeline itself is pure; this layer loads the connection's state,
//! runs it, and dispatches the side effects (persist, disable, flag, reset,
//! notify). Runs for the same connection are serialised through
//! [`ConnectionLocks`] so two discoveries cannot interleave their writes.

use crate::diff::CatalogDiff;
use crate::error::ReconcileError;
use crate::pipeline::{
    Baseline, Discovery, ReconciliationOutcome, ReconciliationPipeline, ReconciliationRequest,
};
use crate::propagation::{ConnectionDirective, NonBreakingChangesPreference, PropagationAction};
use crate::reset::{StreamResetDeterminer, StreamResets};
use async_trait::async_trait;
use catalog::{ConfiguredCatalog, Schema, StreamConfigPatch};
use common::types::StreamKey;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Everything stored about a connection that reconciliation reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionCatalogState {
    /// `None` until the first discovery has been stored.
    pub schema: Option<Schema>,
    pub configured: ConfiguredCatalog,
    /// Raw preference as stored on the connection.
    pub preference: String,
    pub enabled: bool,
    pub breaking_change: bool,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load(&self, connection_id: Uuid) -> Result<ConnectionCatalogState, ReconcileError>;
    async fn save_catalog(
        &self,
        connection_id: Uuid,
        schema: &Schema,
        configured: &ConfiguredCatalog,
    ) -> Result<(), ReconcileError>;
    async fn set_enabled(&self, connection_id: Uuid, enabled: bool) -> Result<(), ReconcileError>;
    async fn set_breaking_change(
        &self,
        connection_id: Uuid,
        breaking: bool,
    ) -> Result<(), ReconcileError>;
}

#[async_trait]
pub trait StreamResetter: Send + Sync {
    /// Whether the destination can merge-refresh instead of truncating.
    async fn supports_refresh(&self, connection_id: Uuid) -> Result<bool, ReconcileError>;
    async fn refresh_streams(
        &self,
        connection_id: Uuid,
        streams: &BTreeSet<StreamKey>,
    ) -> Result<(), ReconcileError>;
    async fn reset_streams(
        &self,
        connection_id: Uuid,
        streams: &BTreeSet<StreamKey>,
    ) -> Result<(), ReconcileError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaChangeEvent {
    pub connection_id: Uuid,
    pub diff: CatalogDiff,
    pub applied: CatalogDiff,
    pub breaking: bool,
    pub action: PropagationAction,
    pub disabled: bool,
}

#[async_trait]
pub trait SchemaChangeNotifier: Send + Sync {
    async fn schema_changed(&self, event: &SchemaChangeEvent) -> Result<(), ReconcileError>;
}

/// How a reset set was handed to the resetter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetDispatch {
    Nothing,
    Refreshed(BTreeSet<StreamKey>),
    Reset(BTreeSet<StreamKey>),
}

#[derive(Debug, Clone)]
pub struct SchemaChangeResult {
    pub outcome: ReconciliationOutcome,
    pub dispatch: ResetDispatch,
}

#[derive(Debug, Clone)]
pub struct UserPatchResult {
    pub catalog: ConfiguredCatalog,
    pub resets: StreamResets,
    pub dispatch: ResetDispatch,
}

/// One async mutex per connection id. Entries are dropped again once no
/// caller holds or waits on them.
#[derive(Default)]
pub struct ConnectionLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConnectionLocks {
    pub async fn acquire(&self, connection_id: Uuid) -> ConnectionGuard<'_> {
        let lock = self.locks.lock().entry(connection_id).or_default().clone();
        ConnectionGuard {
            locks: self,
            connection_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Connections that currently have a lock holder or waiter.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

pub struct ConnectionGuard<'a> {
    locks: &'a ConnectionLocks,
    connection_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        // the owned guard keeps its own reference to the mutex
        self.guard.take();
        let mut locks = self.locks.locks.lock();
        if locks
            .get(&self.connection_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.connection_id);
        }
    }
}

pub struct SchemaChangeService {
    pipeline: ReconciliationPipeline,
    store: Arc<dyn CatalogStore>,
    resetter: Arc<dyn StreamResetter>,
    notifier: Arc<dyn SchemaChangeNotifier>,
    locks: ConnectionLocks,
}

impl SchemaChangeService {
    pub fn new(
        pipeline: ReconciliationPipeline,
        store: Arc<dyn CatalogStore>,
        resetter: Arc<dyn StreamResetter>,
        notifier: Arc<dyn SchemaChangeNotifier>,
    ) -> Self {
        Self {
            pipeline,
            store,
            resetter,
            notifier,
            locks: ConnectionLocks::default(),
        }
    }

    pub async fn apply_discovered_schema(
        &self,
        connection_id: Uuid,
        discovery: Discovery,
    ) -> Result<SchemaChangeResult, ReconcileError> {
        let _guard = self.locks.acquire(connection_id).await;
        let state = self.store.load(connection_id).await?;
        let preference: NonBreakingChangesPreference = state.preference.parse()?;

        let baseline = match &state.schema {
            Some(schema) => Baseline::Existing {
                schema,
                configured: &state.configured,
            },
            None => Baseline::FirstDiscovery,
        };
        // no collaborator is touched before this succeeds
        let outcome = self.pipeline.run(ReconciliationRequest {
            baseline,
            discovery,
            preference,
        })?;

        if let Some(configured) = &outcome.configured {
            self.store
                .save_catalog(connection_id, &outcome.schema, configured)
                .await?;
        }

        let disable = outcome.directive() == ConnectionDirective::Disable && state.enabled;
        if disable {
            tracing::warn!(%connection_id, "disabling connection after schema change");
            self.store.set_enabled(connection_id, false).await?;
        }
        if outcome.decision.raise_breaking_flag && !state.breaking_change {
            self.store.set_breaking_change(connection_id, true).await?;
        }

        let dispatch = self.dispatch_resets(connection_id, &outcome.resets).await?;

        if !outcome.diff.is_empty() {
            self.notifier
                .schema_changed(&SchemaChangeEvent {
                    connection_id,
                    diff: outcome.diff.clone(),
                    applied: outcome.applied().clone(),
                    breaking: outcome.is_breaking(),
                    action: outcome.decision.action,
                    disabled: disable,
                })
                .await?;
        }

        Ok(SchemaChangeResult { outcome, dispatch })
    }

    pub async fn apply_user_patch(
        &self,
        connection_id: Uuid,
        patches: &[StreamConfigPatch],
    ) -> Result<UserPatchResult, ReconcileError> {
        let _guard = self.locks.acquire(connection_id).await;
        let state = self.store.load(connection_id).await?;

        let patched = state.configured.apply_patches(patches)?;
        let resets = StreamResetDeterminer::from_patch_outcome(&patched)
            .determine(&state.configured, &patched.catalog);

        let schema = match state.schema {
            Some(schema) => schema,
            None => patched.catalog.schema(),
        };
        self.store
            .save_catalog(connection_id, &schema, &patched.catalog)
            .await?;

        let dispatch = self.dispatch_resets(connection_id, &resets).await?;
        Ok(UserPatchResult {
            catalog: patched.catalog,
            resets,
            dispatch,
        })
    }

    async fn dispatch_resets(
        &self,
        connection_id: Uuid,
        resets: &StreamResets,
    ) -> Result<ResetDispatch, ReconcileError> {
        if resets.is_empty() {
            return Ok(ResetDispatch::Nothing);
        }
        let streams = resets.key_set();
        if self.resetter.supports_refresh(connection_id).await? {
            tracing::info!(%connection_id, streams = streams.len(), "refreshing streams");
            self.resetter.refresh_streams(connection_id, &streams).await?;
            Ok(ResetDispatch::Refreshed(streams))
        } else {
            tracing::info!(%connection_id, streams = streams.len(), "resetting streams");
            self.resetter.reset_streams(connection_id, &streams).await?;
            Ok(ResetDispatch::Reset(streams))
        }
    }
}
