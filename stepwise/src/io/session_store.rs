//! Session snapshots persisted as pretty JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::io::config::write_atomic;
use crate::session::SessionSnapshot;

/// Load a snapshot; `Ok(None)` when the file does not exist yet.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_snapshot(path: &Path) -> Result<Option<SessionSnapshot>> {
    if !path.exists() {
        debug!("no session snapshot yet");
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let snapshot =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(snapshot))
}

/// Atomically write `snapshot` (temp file + rename).
#[instrument(skip_all, fields(path = %path.display()))]
pub fn save_snapshot(path: &Path, snapshot: &SessionSnapshot) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(snapshot).context("serialize session snapshot")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Role, SessionState};

    #[test]
    fn missing_snapshot_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_snapshot(&temp.path().join("session.json")).expect("load").is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("session.json");
        let mut state = SessionState::default();
        state.add_turn(Role::User, "show me disk usage");
        state.add_execution("executor", "df -h", "Filesystem Size", true);

        save_snapshot(&path, &state.export()).expect("save");
        let loaded = load_snapshot(&path).expect("load").expect("present");
        assert_eq!(loaded, state.export());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("session.json");
        fs::write(&path, "{not json").expect("write");
        let err = load_snapshot(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}
