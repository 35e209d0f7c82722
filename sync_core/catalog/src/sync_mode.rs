use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How the source reads a stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Re-read all data each sync
    #[default]
    FullRefresh,
    /// Read only records past the stored cursor
    Incremental,
}

/// How the destination writes a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSyncMode {
    #[default]
    Append,
    Overwrite,
    AppendDedup,
    OverwriteDedup,
}

impl DestinationSyncMode {
    /// Dedup modes key records on the primary key and are meaningless without one.
    pub fn requires_primary_key(&self) -> bool {
        matches!(
            self,
            DestinationSyncMode::AppendDedup | DestinationSyncMode::OverwriteDedup
        )
    }
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::FullRefresh => write!(f, "full_refresh"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

impl Display for DestinationSyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationSyncMode::Append => write!(f, "append"),
            DestinationSyncMode::Overwrite => write!(f, "overwrite"),
            DestinationSyncMode::AppendDedup => write!(f, "append_dedup"),
            DestinationSyncMode::OverwriteDedup => write!(f, "overwrite_dedup"),
        }
    }
}
