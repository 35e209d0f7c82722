use serde::{Deserialize, Serialize};

/// Whether streams that appear for the first time are synced straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewStreamSelection {
    #[default]
    Unselected,
    Selected,
}

impl NewStreamSelection {
    pub fn is_selected(&self) -> bool {
        matches!(self, NewStreamSelection::Selected)
    }
}

/// How each auto-propagating preference treats newly discovered streams.
///
/// Column propagation only carries field changes into existing streams, so
/// its new streams stay unselected unless configured otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub propagate_columns: NewStreamSelection,
    pub propagate_fully: NewStreamSelection,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            propagate_columns: NewStreamSelection::Unselected,
            propagate_fully: NewStreamSelection::Selected,
        }
    }
}
