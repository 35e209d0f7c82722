//! Catalog model for schema reconciliation.
//!
//! Discovered catalogs are parsed into a typed [`Schema`] (one path-indexed
//! [`FieldTree`] per stream), paired with user choices in a
//! [`ConfiguredCatalog`], edited through tri-state [`Patch`]es, and cached by
//! [`DiscoveryKey`].

pub mod cache;
pub mod configured;
pub mod error;
pub mod field_tree;
pub mod fingerprint;
pub mod patch;
pub mod schema;
pub mod sync_mode;

pub use cache::{CachedDiscovery, DiscoveryCache};
pub use configured::{ConfiguredCatalog, ConfiguredStream, HashedField, MapperConfig, StreamConfig};
pub use error::CatalogError;
pub use field_tree::{FieldNode, FieldTree, FieldType};
pub use fingerprint::{DiscoveryKey, SchemaFingerprint};
pub use patch::{FieldSelectionPatch, Patch, StreamConfigPatch, UserPatchOutcome};
pub use schema::{DiscoveredCatalog, DiscoveredStream, Schema, StreamSchema};
pub use sync_mode::{DestinationSyncMode, SyncMode};

pub use common::config::components::propagation::NewStreamSelection;
pub use common::types::{FieldPath, JsonType, StreamKey};
