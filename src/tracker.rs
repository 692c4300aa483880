use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use color_eyre::Result;
use color_eyre::eyre::Context;
use serde::{Deserialize, Serialize};

const RUNS_FILE: &str = "runs.json";

/// One successful publish, as remembered between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub playlist_id: String,
    pub url: String,
    pub name: String,
    pub published_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub track_ids: Vec<String>,
}

/// Local run history. Used to skip republishing when a run would produce
/// the exact playlist the previous run already published.
pub struct RunTracker {
    path: PathBuf,
}

impl RunTracker {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(RUNS_FILE),
        }
    }

    /// The most recent record, if any. A missing or corrupt file reads as
    /// no history; the cache is advisory and must never fail a run.
    pub fn last_run(&self) -> Option<RunRecord> {
        self.read_all().into_iter().last()
    }

    pub fn record(&self, record: RunRecord) -> Result<()> {
        let mut runs = self.read_all();
        runs.push(record);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create data dir {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(&runs)
            .wrap_err("Failed to serialize run history")?;
        std::fs::write(&self.path, contents)
            .wrap_err_with(|| format!("Failed to write run history {}", self.path.display()))?;

        Ok(())
    }

    fn read_all(&self) -> Vec<RunRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&contents) {
            Ok(runs) => runs,
            Err(err) => {
                tracing::warn!(%err, path = %self.path.display(), "ignoring corrupt run history");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(playlist_id: &str, track_ids: &[&str]) -> RunRecord {
        RunRecord {
            playlist_id: playlist_id.into(),
            url: format!("https://open.spotify.com/playlist/{playlist_id}"),
            name: "Weekly Gems".into(),
            published_at: Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0).unwrap(),
            window_start: Utc.with_ymd_and_hms(2026, 7, 27, 9, 0, 0).unwrap(),
            track_ids: track_ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_tracker_has_no_last_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = RunTracker::new(dir.path());
        assert!(tracker.last_run().is_none());
    }

    #[test]
    fn test_record_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = RunTracker::new(dir.path());

        tracker.record(record("pl1", &["t1", "t2"])).unwrap();
        tracker.record(record("pl1", &["t3"])).unwrap();

        let last = tracker.last_run().unwrap();
        assert_eq!(last.track_ids, vec!["t3"]);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RUNS_FILE), "not json").unwrap();

        let tracker = RunTracker::new(dir.path());
        assert!(tracker.last_run().is_none());

        // Recording over a corrupt file starts a fresh history.
        tracker.record(record("pl1", &["t1"])).unwrap();
        assert_eq!(tracker.last_run().unwrap().playlist_id, "pl1");
    }

    #[test]
    fn test_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deeper").join("still");

        let tracker = RunTracker::new(&nested);
        tracker.record(record("pl1", &["t1"])).unwrap();
        assert!(tracker.last_run().is_some());
    }
}
