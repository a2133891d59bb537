use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::AppointmentRecord;

/// Last successfully emailed slot per location, in canonical timestamp text.
/// Deleting the backing file resets suppression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationState(BTreeMap<String, String>);

impl NotificationState {
    pub fn get(&self, location: &str) -> Option<&str> {
        self.0.get(location).map(String::as_str)
    }

    pub fn insert(&mut self, location: impl Into<String>, timestamp: impl Into<String>) {
        self.0.insert(location.into(), timestamp.into());
    }

    /// Records each known slot as notified. `Unknown` slots are skipped.
    pub fn record_sent(&mut self, records: &[AppointmentRecord]) {
        for r in records {
            if r.next_available.known().is_some() {
                self.insert(r.location.clone(), r.next_available.to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NotificationStore {
    path: PathBuf,
}

impl NotificationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole state. A missing, unreadable or malformed file counts as empty.
    pub fn load(&self) -> NotificationState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No notification state yet");
                return NotificationState::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Unreadable notification state, starting empty");
                return NotificationState::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "Corrupt notification state, starting empty");
            NotificationState::default()
        })
    }

    /// Replaces the file in one step: write a sibling temp file, then rename over.
    pub fn save(&self, state: &NotificationState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;

        debug!(path = %self.path.display(), entries = state.len(), "Saved notification state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NextAvailable;

    fn store() -> (tempfile::TempDir, NotificationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = NotificationStore::new(dir.path().join("state").join("notification_state.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_empty());

        fs::write(store.path(), "[1, 2, 3]").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load() {
        let (_dir, store) = store();
        let mut state = NotificationState::default();
        state.insert("Bayonne", "2025-07-15 10:00 AM");
        store.save(&state).unwrap();

        assert_eq!(store.load(), state);
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"Bayonne\": \"2025-07-15 10:00 AM\""));
    }

    #[test]
    fn save_overwrites_whole_file() {
        let (_dir, store) = store();
        let mut first = NotificationState::default();
        first.insert("Bayonne", "2025-07-15 10:00 AM");
        first.insert("Rahway", "2025-07-20 10:00 AM");
        store.save(&first).unwrap();

        let mut second = NotificationState::default();
        second.insert("Lodi", "2025-07-01 09:00 AM");
        store.save(&second).unwrap();

        assert_eq!(store.load(), second);
    }

    #[test]
    fn record_sent_skips_unknown() {
        let mut state = NotificationState::default();
        state.record_sent(&[
            AppointmentRecord::new("Lodi", NextAvailable::Unknown, None),
            AppointmentRecord::new(
                "Bayonne",
                NextAvailable::from_canonical("2025-07-10 08:00 AM"),
                None,
            ),
        ]);
        assert_eq!(state.get("Bayonne"), Some("2025-07-10 08:00 AM"));
        assert_eq!(state.get("Lodi"), None);
    }
}
