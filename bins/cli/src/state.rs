//! Local persistence of catalog and activation records between invocations.

use crate::error::CliError;
use code_hub_domain::{ActivatedRepository, GoldenRepository};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default state file, relative to the working directory.
pub const DEFAULT_STATE_PATH: &str = ".code-hub/state.json";

/// Persisted hub state: every catalog record plus every activation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubState {
    pub goldens: Vec<GoldenRepository>,
    pub activations: Vec<ActivatedRepository>,
}

/// Resolve the state path from the CLI flag or the default location.
#[must_use]
pub fn resolve_state_path(flag: Option<&Path>) -> PathBuf {
    flag.map_or_else(|| PathBuf::from(DEFAULT_STATE_PATH), Path::to_path_buf)
}

/// Load persisted state; a missing file is an empty state, not an error.
pub fn load_state(path: &Path) -> Result<HubState, CliError> {
    let payload = match std::fs::read_to_string(path) {
        Ok(payload) => payload,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(HubState::default());
        },
        Err(error) => return Err(CliError::Io(error)),
    };
    Ok(serde_json::from_str(&payload)?)
}

/// Persist state as pretty-printed JSON, creating parent directories.
pub fn save_state(path: &Path, state: &HubState) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut payload = serde_json::to_string_pretty(state)?;
    payload.push('\n');
    std::fs::write(path, payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(label: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("chub-{label}-{unique}/state.json"))
    }

    #[test]
    fn missing_state_file_loads_empty() -> Result<(), CliError> {
        let state = load_state(Path::new("/nonexistent/chub-state.json"))?;
        assert!(state.goldens.is_empty());
        assert!(state.activations.is_empty());
        Ok(())
    }

    #[test]
    fn state_round_trips_through_disk() -> Result<(), CliError> {
        let path = temp_path("roundtrip");
        let state = HubState::default();
        save_state(&path, &state)?;
        let loaded = load_state(&path)?;
        assert!(loaded.goldens.is_empty());
        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    #[test]
    fn default_path_is_relative() {
        let path = resolve_state_path(None);
        assert!(path.is_relative());
        assert!(path.ends_with("state.json"));
    }
}
