use crate::types::JsonType;
use serde::{Deserialize, Serialize};

/// A field type change that previously synced data survives, e.g. `integer -> number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeWidening {
    pub from: JsonType,
    pub to: JsonType,
}

impl TypeWidening {
    pub fn new(from: JsonType, to: JsonType) -> Self {
        Self { from, to }
    }
}
