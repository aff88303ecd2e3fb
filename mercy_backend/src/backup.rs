//! Timestamped snapshots of the whole store.
//!
//! Snapshots live in a dedicated folder as
//! `user_data_backup_<YYYYMMDD_HHMMSS>[_<suffix>].json`, are never modified
//! after being written, and are pruned by modification time so only the
//! newest `retain` files survive.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TrackerError};
use crate::mercy::Store;

pub const BACKUP_PREFIX: &str = "user_data_backup_";
pub const BACKUP_EXTENSION: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const DEFAULT_MANUAL_SUFFIX: &str = "manual";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Taken before every save. Same-second snapshots overwrite each other.
    Automatic,
    Manual { suffix: String },
}

impl SnapshotKind {
    pub fn manual(suffix: impl Into<String>) -> Self {
        SnapshotKind::Manual {
            suffix: suffix.into(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SnapshotKind::Automatic => "automatic",
            SnapshotKind::Manual { .. } => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub name: String,
    pub modified_at: DateTime<Local>,
    pub size_bytes: u64,
    /// Timestamp embedded in the file name, if it parses
    pub created_at: Option<NaiveDateTime>,
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub ok: bool,
    pub reason: String,
}

impl IntegrityReport {
    fn passed() -> Self {
        Self {
            ok: true,
            reason: "ok".to_string(),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

pub struct BackupManager {
    folder: PathBuf,
    retain: usize,
}

impl BackupManager {
    pub fn new(folder: impl Into<PathBuf>, retain: usize) -> Self {
        Self {
            folder: folder.into(),
            retain,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn retain(&self) -> usize {
        self.retain
    }

    pub fn ensure_backup_folder(&self) -> Result<()> {
        if self.folder.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.folder).map_err(|e| TrackerError::io(&self.folder, e))?;
        tracing::info!("Created backup folder: {:?}", self.folder);
        Ok(())
    }

    /// Write a snapshot named after the current local time, then prune.
    pub fn create_snapshot(&self, store: &Store, kind: &SnapshotKind) -> Result<PathBuf> {
        self.create_snapshot_at(store, kind, Local::now())
    }

    /// [`create_snapshot`](Self::create_snapshot) with an explicit clock.
    pub fn create_snapshot_at(
        &self,
        store: &Store,
        kind: &SnapshotKind,
        now: DateTime<Local>,
    ) -> Result<PathBuf> {
        self.ensure_backup_folder()?;

        let name = snapshot_name(now, kind);
        let path = self.folder.join(&name);
        let json = serde_json::to_string_pretty(store).map_err(|e| TrackerError::parse(&path, e))?;
        fs::write(&path, json).map_err(|e| TrackerError::io(&path, e))?;

        tracing::info!("Created {} backup: {}", kind.label(), name);

        if let Err(e) = self.prune_old_snapshots(self.retain) {
            tracing::error!("Error cleaning up backups: {}", e);
        }
        Ok(path)
    }

    /// Delete all but the `retain` most recently modified snapshots.
    ///
    /// Returns how many files were removed. A file that cannot be deleted is
    /// logged and skipped so the rest still get pruned.
    pub fn prune_old_snapshots(&self, retain: usize) -> Result<usize> {
        let snapshots = self.snapshot_entries()?;
        let mut removed = 0;

        for (path, _) in snapshots.iter().skip(retain) {
            match fs::remove_file(path) {
                Ok(()) => {
                    removed += 1;
                    tracing::info!("Removed old backup: {}", file_name(path));
                }
                Err(e) => {
                    tracing::warn!("Failed to remove old backup {:?}: {}", path, e);
                }
            }
        }
        Ok(removed)
    }

    /// Deserialize the most recently modified snapshot.
    pub fn restore_latest(&self) -> Result<Store> {
        let snapshots = self.snapshot_entries()?;
        let (path, _) = snapshots
            .first()
            .ok_or_else(|| TrackerError::NotFound("No backup files found".to_string()))?;

        let store = read_store(path)?;
        tracing::info!("Restored data from backup: {}", file_name(path));
        Ok(store)
    }

    pub fn restore_specific(&self, name: &str) -> Result<Store> {
        let path = self.snapshot_path(name)?;
        let store = read_store(&path)?;
        tracing::info!("Restored data from specific backup: {}", name);
        Ok(store)
    }

    /// Snapshots newest first. An absent folder lists as empty.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let snapshots = self.snapshot_entries()?;

        Ok(snapshots
            .into_iter()
            .map(|(path, modified)| {
                let name = file_name(&path);
                let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let parsed = parse_snapshot_name(&name);
                SnapshotInfo {
                    modified_at: DateTime::<Local>::from(modified),
                    size_bytes,
                    created_at: parsed.as_ref().map(|(ts, _)| *ts),
                    suffix: parsed.and_then(|(_, suffix)| suffix),
                    name,
                }
            })
            .collect())
    }

    /// Read-only shape check of a snapshot: an object of user ids mapping to
    /// objects of non-negative integer counts.
    pub fn verify_integrity(&self, name: &str) -> IntegrityReport {
        let path = match self.snapshot_path(name) {
            Ok(path) => path,
            Err(e) => return IntegrityReport::failed(e.to_string()),
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return IntegrityReport::failed("Backup file not found")
            }
            Err(e) => return IntegrityReport::failed(format!("Error reading backup: {}", e)),
        };

        let value: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => return IntegrityReport::failed(format!("Invalid JSON format: {}", e)),
        };

        match check_structure(&value) {
            Ok(()) => IntegrityReport::passed(),
            Err(reason) => IntegrityReport::failed(reason),
        }
    }

    /// Snapshot files with their modification times, newest first.
    /// Ties fall back to name order so the result is deterministic.
    fn snapshot_entries(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let read_dir = match fs::read_dir(&self.folder) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrackerError::io(&self.folder, e)),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| TrackerError::io(&self.folder, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_snapshot_name(&name) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Skipping unreadable backup {}: {}", name, e);
                    continue;
                }
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((entry.path(), modified));
        }

        entries.sort_by(|(a_path, a_time), (b_path, b_time)| {
            b_time.cmp(a_time).then_with(|| b_path.cmp(a_path))
        });
        Ok(entries)
    }

    fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        let bare = !name.is_empty()
            && !name.contains(|c: char| c == '/' || c == '\\')
            && name != "."
            && name != "..";
        if !bare {
            return Err(TrackerError::Validation(format!(
                "Invalid backup name: {:?}",
                name
            )));
        }
        Ok(self.folder.join(name))
    }
}

fn snapshot_name(now: DateTime<Local>, kind: &SnapshotKind) -> String {
    let timestamp = now.format(TIMESTAMP_FORMAT);
    match kind {
        SnapshotKind::Automatic => format!("{}{}{}", BACKUP_PREFIX, timestamp, BACKUP_EXTENSION),
        SnapshotKind::Manual { suffix } => format!(
            "{}{}_{}{}",
            BACKUP_PREFIX,
            timestamp,
            sanitize_suffix(suffix),
            BACKUP_EXTENSION
        ),
    }
}

/// Keep suffixes to `[A-Za-z0-9_-]` so they can never escape the folder.
fn sanitize_suffix(suffix: &str) -> String {
    let cleaned: String = suffix
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        DEFAULT_MANUAL_SUFFIX.to_string()
    } else {
        cleaned.to_string()
    }
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_EXTENSION)
}

fn snapshot_name_pattern() -> Option<&'static regex_lite::Regex> {
    static PATTERN: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            regex_lite::Regex::new(r"^user_data_backup_(\d{8}_\d{6})(?:_(.+))?\.json$").ok()
        })
        .as_ref()
}

/// Split a snapshot file name into its timestamp and optional suffix.
pub fn parse_snapshot_name(name: &str) -> Option<(NaiveDateTime, Option<String>)> {
    let caps = snapshot_name_pattern()?.captures(name)?;
    let timestamp = NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), TIMESTAMP_FORMAT).ok()?;
    let suffix = caps.get(2).map(|m| m.as_str().to_string());
    Some((timestamp, suffix))
}

/// Shape rules shared by integrity checks: top-level object, each user an
/// object, each count a non-negative integer.
pub fn check_structure(value: &Value) -> std::result::Result<(), String> {
    let users = value
        .as_object()
        .ok_or_else(|| "Invalid data structure - not a dictionary".to_string())?;

    for (user_id, user_data) in users {
        let counts = user_data
            .as_object()
            .ok_or_else(|| format!("Invalid user data structure for user {}", user_id))?;

        for (category, count) in counts {
            if count.as_u64().is_none() {
                return Err(format!(
                    "Invalid count for user {} category {}: {}",
                    user_id, category, count
                ));
            }
        }
    }
    Ok(())
}

fn read_store(path: &Path) -> Result<Store> {
    let contents = fs::read_to_string(path).map_err(|e| TrackerError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| TrackerError::parse(path, e))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mercy::UserRecord;
    use chrono::TimeZone;
    use std::time::Duration;

    fn sample_store() -> Store {
        let record: UserRecord = [("sacred", 12), ("primal_mythical", 40)].into_iter().collect();
        [("123456789012345678", record)].into_iter().collect()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, h, m, s).unwrap()
    }

    fn set_mtime(path: &Path, secs_after_epoch: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_after_epoch))
            .unwrap();
    }

    #[test]
    fn snapshot_names_follow_convention() {
        assert_eq!(
            snapshot_name(at(9, 5, 7), &SnapshotKind::Automatic),
            "user_data_backup_20250314_090507.json"
        );
        assert_eq!(
            snapshot_name(at(9, 5, 7), &SnapshotKind::manual("pre migration/../x")),
            "user_data_backup_20250314_090507_pre-migration----x.json"
        );
        assert_eq!(
            snapshot_name(at(9, 5, 7), &SnapshotKind::manual("  ")),
            "user_data_backup_20250314_090507_manual.json"
        );
    }

    #[test]
    fn parse_snapshot_name_extracts_parts() {
        let (ts, suffix) = parse_snapshot_name("user_data_backup_20250314_090507_manual.json").unwrap();
        assert_eq!(ts.format(TIMESTAMP_FORMAT).to_string(), "20250314_090507");
        assert_eq!(suffix.as_deref(), Some("manual"));

        let (_, suffix) = parse_snapshot_name("user_data_backup_20250314_090507.json").unwrap();
        assert!(suffix.is_none());

        assert!(parse_snapshot_name("user_data.json").is_none());
    }

    #[test]
    fn snapshot_name_pattern_is_compiled_once() {
        let first = snapshot_name_pattern().unwrap();
        let second = snapshot_name_pattern().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn snapshot_then_restore_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("backups"), 10);

        let store = sample_store();
        let path = manager.create_snapshot(&store, &SnapshotKind::Automatic).unwrap();
        assert!(path.exists());

        assert_eq!(manager.restore_latest().unwrap(), store);
    }

    #[test]
    fn restore_latest_without_backups_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("missing"), 10);

        let err = manager.restore_latest().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(manager.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn restore_latest_picks_newest_mtime_not_name() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 10);

        let old: Store = [("1", UserRecord::from_iter([("void", 1u64)]))].into_iter().collect();
        let new: Store = [("1", UserRecord::from_iter([("void", 2u64)]))].into_iter().collect();

        let late_named = manager
            .create_snapshot_at(&old, &SnapshotKind::Automatic, at(12, 0, 0))
            .unwrap();
        let early_named = manager
            .create_snapshot_at(&new, &SnapshotKind::Automatic, at(8, 0, 0))
            .unwrap();
        set_mtime(&late_named, 1_000);
        set_mtime(&early_named, 2_000);

        assert_eq!(manager.restore_latest().unwrap(), new);
    }

    #[test]
    fn restore_specific_missing_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 10);

        let err = manager.restore_specific("user_data_backup_20990101_000000.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = manager.restore_specific("../user_data.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn restore_specific_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 10);
        let name = "user_data_backup_20250101_000000.json";
        fs::write(dir.path().join(name), "{not json").unwrap();

        let err = manager.restore_specific(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn prune_keeps_newest_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 100);
        let store = sample_store();

        for i in 0..5u32 {
            let path = manager
                .create_snapshot_at(&store, &SnapshotKind::Automatic, at(10, 0, i))
                .unwrap();
            set_mtime(&path, 1_000 + u64::from(i));
        }
        fs::write(dir.path().join("notes.txt"), "not a backup").unwrap();

        assert_eq!(manager.prune_old_snapshots(2).unwrap(), 3);

        let names: Vec<String> = manager.list_snapshots().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "user_data_backup_20250314_100004.json".to_string(),
                "user_data_backup_20250314_100003.json".to_string(),
            ]
        );
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn list_reports_size_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 10);
        let path = manager
            .create_snapshot_at(&sample_store(), &SnapshotKind::manual("weekly"), at(7, 30, 0))
            .unwrap();

        let listed = manager.list_snapshots().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].suffix.as_deref(), Some("weekly"));
        assert_eq!(listed[0].size_bytes, fs::metadata(&path).unwrap().len());
        assert!(listed[0].created_at.is_some());
    }

    #[test]
    fn verify_accepts_created_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 10);
        let path = manager.create_snapshot(&sample_store(), &SnapshotKind::Automatic).unwrap();

        let report = manager.verify_integrity(&file_name(&path));
        assert!(report.ok, "{}", report.reason);
        assert_eq!(report.reason, "ok");
    }

    #[test]
    fn verify_rejects_array_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 10);
        let name = "user_data_backup_20250101_000000.json";
        fs::write(dir.path().join(name), "[1, 2, 3]").unwrap();

        let report = manager.verify_integrity(name);
        assert!(!report.ok);
        assert!(report.reason.contains("not a dictionary"));
    }

    #[test]
    fn verify_rejects_bad_user_data_and_counts() {
        assert!(check_structure(&serde_json::json!({"1": [1]}))
            .unwrap_err()
            .contains("user 1"));
        assert!(check_structure(&serde_json::json!({"1": {"sacred": -4}}))
            .unwrap_err()
            .contains("Invalid count"));
        assert!(check_structure(&serde_json::json!({"1": {"sacred": 4}})).is_ok());
    }

    #[test]
    fn verify_reports_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), 10);

        let report = manager.verify_integrity("user_data_backup_20990101_000000.json");
        assert_eq!(report, IntegrityReport::failed("Backup file not found"));

        let name = "user_data_backup_20250101_000000.json";
        fs::write(dir.path().join(name), "{").unwrap();
        assert!(manager.verify_integrity(name).reason.starts_with("Invalid JSON format"));
    }
}
