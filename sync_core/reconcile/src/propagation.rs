use crate::breaking::BreakingChangeVerdict;
use crate::diff::CatalogDiff;
use crate::error::ReconcileError;
use common::config::components::propagation::{NewStreamSelection, PropagationConfig};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// What a connection wants done with non-breaking schema changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonBreakingChangesPreference {
    Ignore,
    Disable,
    PropagateColumns,
    PropagateFully,
}

impl NonBreakingChangesPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            NonBreakingChangesPreference::Ignore => "ignore",
            NonBreakingChangesPreference::Disable => "disable",
            NonBreakingChangesPreference::PropagateColumns => "propagate_columns",
            NonBreakingChangesPreference::PropagateFully => "propagate_fully",
        }
    }
}

impl FromStr for NonBreakingChangesPreference {
    type Err = ReconcileError;

    /// Unknown values are an error, never a default: guessing could
    /// auto-apply changes the connection owner never agreed to.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(NonBreakingChangesPreference::Ignore),
            "disable" => Ok(NonBreakingChangesPreference::Disable),
            "propagate_columns" => Ok(NonBreakingChangesPreference::PropagateColumns),
            "propagate_fully" => Ok(NonBreakingChangesPreference::PropagateFully),
            other => Err(ReconcileError::invalid_preference(format!(
                "unknown preference '{other}'"
            ))),
        }
    }
}

impl Display for NonBreakingChangesPreference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropagationAction {
    AutoApply,
    ManualApprovalRequired,
    NoOp,
}

/// Connection-state mutation the caller must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionDirective {
    #[default]
    Keep,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationDecision {
    pub action: PropagationAction,
    /// The transforms actually merged into the configuration.
    pub applied: CatalogDiff,
    pub directive: ConnectionDirective,
    pub raise_breaking_flag: bool,
    /// Selection for streams that first appear in this diff.
    pub new_streams: NewStreamSelection,
}

impl PropagationDecision {
    pub fn no_op() -> Self {
        Self {
            action: PropagationAction::NoOp,
            applied: CatalogDiff::empty(),
            directive: ConnectionDirective::Keep,
            raise_breaking_flag: false,
            new_streams: NewStreamSelection::Unselected,
        }
    }

    fn manual(directive: ConnectionDirective, raise_breaking_flag: bool) -> Self {
        Self {
            action: PropagationAction::ManualApprovalRequired,
            directive,
            raise_breaking_flag,
            ..Self::no_op()
        }
    }

    pub fn is_auto_apply(&self) -> bool {
        self.action == PropagationAction::AutoApply
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropagationPolicyEngine {
    config: PropagationConfig,
}

impl PropagationPolicyEngine {
    pub fn new(config: PropagationConfig) -> Self {
        Self { config }
    }

    pub fn decide(
        &self,
        diff: &CatalogDiff,
        verdict: &BreakingChangeVerdict,
        preference: NonBreakingChangesPreference,
    ) -> PropagationDecision {
        if verdict.is_breaking() {
            tracing::warn!(
                reasons = ?verdict.describe(),
                "breaking schema change, connection needs manual approval"
            );
            return PropagationDecision::manual(ConnectionDirective::Disable, true);
        }
        if diff.is_empty() {
            return PropagationDecision::no_op();
        }

        let new_streams = match preference {
            NonBreakingChangesPreference::Ignore => {
                tracing::info!(%preference, "non-breaking schema change ignored");
                return PropagationDecision::no_op();
            }
            NonBreakingChangesPreference::Disable => {
                tracing::info!(%preference, "non-breaking schema change disables connection");
                return PropagationDecision::manual(ConnectionDirective::Disable, false);
            }
            NonBreakingChangesPreference::PropagateColumns => self.config.propagate_columns,
            NonBreakingChangesPreference::PropagateFully => self.config.propagate_fully,
        };

        tracing::info!(%preference, transforms = diff.len(), "auto-applying schema change");
        PropagationDecision {
            action: PropagationAction::AutoApply,
            applied: diff.clone(),
            directive: ConnectionDirective::Keep,
            raise_breaking_flag: false,
            new_streams,
        }
    }
}
