//! Canonical data file: load with fallback to backups, save behind a snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::{BackupManager, SnapshotKind};
use crate::config::TrackerConfig;
use crate::error::{ErrorKind, Result, TrackerError};
use crate::mercy::Store;

pub struct DataStore {
    data_file: PathBuf,
    backups: BackupManager,
}

impl DataStore {
    pub fn new(data_file: impl Into<PathBuf>, backups: BackupManager) -> Self {
        Self {
            data_file: data_file.into(),
            backups,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            config.data_path(),
            BackupManager::new(config.backup_dir(), config.max_backups),
        )
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Never fails: canonical file, then newest backup, then an empty store.
    pub fn load(&self) -> Store {
        let contents = match fs::read_to_string(&self.data_file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No existing data file at {:?}, starting with empty data",
                    self.data_file
                );
                return Store::new();
            }
            Err(e) => {
                tracing::error!("Error reading data file {:?}: {}", self.data_file, e);
                return self.recover_from_backup();
            }
        };

        match serde_json::from_str::<Store>(&contents) {
            Ok(store) => {
                tracing::info!("Loaded data for {} users", store.len());
                store
            }
            Err(e) => {
                tracing::error!("Error decoding JSON data in {:?}: {}", self.data_file, e);
                self.recover_from_backup()
            }
        }
    }

    fn recover_from_backup(&self) -> Store {
        match self.backups.restore_latest() {
            Ok(store) => {
                tracing::warn!("Restored data for {} users from backup", store.len());
                store
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("No usable backup found, starting with empty data");
                Store::new()
            }
            Err(e) => {
                tracing::error!("Error restoring from backup: {}", e);
                Store::new()
            }
        }
    }

    /// Snapshot `store`, then replace the canonical file with it.
    ///
    /// A failed snapshot is logged and does not block the write; only a
    /// failure to write the canonical file is returned.
    pub fn save(&self, store: &Store) -> Result<()> {
        if let Err(e) = self.backups.create_snapshot(store, &SnapshotKind::Automatic) {
            tracing::error!("Error creating backup before save: {}", e);
        }

        let json = serde_json::to_string_pretty(store)
            .map_err(|e| TrackerError::parse(&self.data_file, e))?;
        write_replacing(&self.data_file, &json)?;

        tracing::info!("Saved data for {} users", store.len());
        Ok(())
    }
}

/// Write to a sibling temp file and rename it over `path`, so a reader
/// sees either the old or the new contents.
fn write_replacing(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TrackerError::io(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents).map_err(|e| TrackerError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| TrackerError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mercy::UserRecord;

    fn store_with(user: &str, category: &str, count: u64) -> Store {
        let record: UserRecord = [(category, count)].into_iter().collect();
        [(user, record)].into_iter().collect()
    }

    fn data_store(dir: &Path) -> DataStore {
        DataStore::new(
            dir.join("user_data.json"),
            BackupManager::new(dir.join("backups"), 10),
        )
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(data_store(dir.path()).load().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = data_store(dir.path());
        let store = store_with("42", "sacred", 7);

        storage.save(&store).unwrap();
        assert_eq!(storage.load(), store);
        assert!(!dir.path().join("user_data.json.tmp").exists());
    }

    #[test]
    fn save_snapshots_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = data_store(dir.path());
        let store = store_with("42", "void", 3);

        storage.save(&store).unwrap();

        let snapshots = storage.backups().list_snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(storage.backups().restore_latest().unwrap(), store);
    }

    #[test]
    fn corrupt_file_falls_back_to_latest_backup() {
        let dir = tempfile::tempdir().unwrap();
        let storage = data_store(dir.path());
        let store = store_with("42", "remnant", 20);

        storage.save(&store).unwrap();
        fs::write(storage.data_file(), "{\"42\": {\"remnant\": ").unwrap();

        assert_eq!(storage.load(), store);
    }

    #[test]
    fn corrupt_file_without_backups_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = data_store(dir.path());
        fs::write(storage.data_file(), "not json at all").unwrap();

        assert!(storage.load().is_empty());
    }

    #[test]
    fn failed_backup_does_not_block_save() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the backup folder should be makes every snapshot fail.
        let blocker = dir.path().join("backups");
        fs::write(&blocker, "occupied").unwrap();
        let storage = DataStore::new(
            dir.path().join("user_data.json"),
            BackupManager::new(&blocker, 10),
        );

        let store = store_with("7", "ancient", 1);
        storage.save(&store).unwrap();
        assert_eq!(storage.load(), store);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DataStore::new(
            dir.path().join("nested/data/user_data.json"),
            BackupManager::new(dir.path().join("backups"), 10),
        );
        storage.save(&Store::new()).unwrap();
        assert!(storage.data_file().exists());
    }
}
