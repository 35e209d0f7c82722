pub mod breaking;
pub mod diff;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod propagation;
pub mod reset;
pub mod service;

pub use breaking::{BreakingChangeClassifier, BreakingChangeVerdict, BreakingReason, BreakingTransform};
pub use diff::{diff, CatalogDiff, CatalogDiffEngine, FieldTransform, StreamTransform};
pub use error::ReconcileError;
pub use merge::{reconcile, ConfigReconciler, Reconciliation, ReferenceKind, UnresolvedReference};
pub use pipeline::{
    Baseline, Discovery, ReconciliationOutcome, ReconciliationPipeline, ReconciliationRequest,
};
pub use propagation::{
    ConnectionDirective, NonBreakingChangesPreference, PropagationAction, PropagationDecision,
    PropagationPolicyEngine,
};
pub use reset::{ResetReason, StreamResetDeterminer, StreamResets};
pub use service::{
    CatalogStore, ConnectionCatalogState, ConnectionGuard, ConnectionLocks, ResetDispatch,
    SchemaChangeEvent, SchemaChangeNotifier, SchemaChangeResult, SchemaChangeService,
    StreamResetter, UserPatchResult,
};
