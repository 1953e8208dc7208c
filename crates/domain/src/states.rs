//! Lifecycle state machines for golden and activated repositories.

use code_hub_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a golden repository.
///
/// Transitions are total and one-directional except `Ready ↔ Refreshing`;
/// there is no path back from `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldenState {
    /// Entry registered, index creation in progress.
    Creating,
    /// Index exists and the repository is queryable.
    Ready,
    /// Re-index in progress; reverts to `Ready` either way.
    Refreshing,
    /// Cleanup delegated to the indexing collaborator.
    Deleting,
    /// Terminal: cleanup completed, entry pending purge.
    Deleted,
}

impl GoldenState {
    /// Total transition table for golden repositories.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Creating, Self::Ready)
                | (Self::Ready, Self::Refreshing)
                | (Self::Refreshing, Self::Ready)
                | (Self::Ready, Self::Deleting)
                | (Self::Deleting, Self::Deleted)
        )
    }

    /// Stable label for serialization and logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Refreshing => "refreshing",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for GoldenState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Lifecycle state of an activated repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Working copy materialization in progress.
    Activating,
    /// Queryable user-scoped working copy.
    Active,
    /// Teardown in progress.
    Deactivating,
    /// Terminal: materialization failed or the golden repository was
    /// force-deleted out from under the activation.
    Failed,
}

impl ActivationState {
    /// Total transition table for activated repositories.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Activating, Self::Active)
                | (Self::Activating, Self::Failed)
                | (Self::Active, Self::Deactivating)
                | (Self::Active, Self::Failed)
                | (Self::Deactivating, Self::Failed)
        )
    }

    /// Stable label for serialization and logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Build a conflict error for a rejected lifecycle transition.
#[must_use]
pub fn invalid_transition(alias: &str, from: GoldenState, to: GoldenState) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::conflict(),
        format!("invalid lifecycle transition {from} -> {to}"),
    )
    .with_metadata("alias", alias.to_owned())
    .with_metadata("from", from.as_str())
    .with_metadata("to", to.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golden_transitions_are_guarded() {
        assert!(GoldenState::Creating.can_transition(GoldenState::Ready));
        assert!(GoldenState::Ready.can_transition(GoldenState::Refreshing));
        assert!(GoldenState::Refreshing.can_transition(GoldenState::Ready));
        assert!(GoldenState::Ready.can_transition(GoldenState::Deleting));
        assert!(GoldenState::Deleting.can_transition(GoldenState::Deleted));

        // No path back from Deleted, no skips.
        assert!(!GoldenState::Deleted.can_transition(GoldenState::Ready));
        assert!(!GoldenState::Creating.can_transition(GoldenState::Refreshing));
        assert!(!GoldenState::Refreshing.can_transition(GoldenState::Deleting));
        assert!(!GoldenState::Deleting.can_transition(GoldenState::Ready));
    }

    #[test]
    fn activation_transitions_are_guarded() {
        assert!(ActivationState::Activating.can_transition(ActivationState::Active));
        assert!(ActivationState::Activating.can_transition(ActivationState::Failed));
        assert!(ActivationState::Active.can_transition(ActivationState::Failed));

        // Failed is terminal.
        assert!(!ActivationState::Failed.can_transition(ActivationState::Active));
        assert!(!ActivationState::Failed.can_transition(ActivationState::Activating));
    }

    #[test]
    fn invalid_transition_reports_conflict() {
        let error = invalid_transition("acme", GoldenState::Refreshing, GoldenState::Refreshing);
        assert!(error.is_conflict());
        assert_eq!(error.metadata.get("from").map(String::as_str), Some("refreshing"));
    }

    #[test]
    fn states_serialize_snake_case() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(GoldenState::Refreshing)?;
        assert_eq!(value, serde_json::json!("refreshing"));
        let value = serde_json::to_value(ActivationState::Activating)?;
        assert_eq!(value, serde_json::json!("activating"));
        Ok(())
    }
}
