//! The tracker service: owns the in-memory store and persists every mutation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::backup::{IntegrityReport, SnapshotInfo, SnapshotKind};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::format::validate_amount;
use crate::mercy::rules::{PRIMAL, PRIMAL_LEGENDARY, PRIMAL_MYTHICAL};
use crate::mercy::{self, CategoryStatus, Store, UserRecord};
use crate::storage::DataStore;

const NO_DATA_TO_RESET: &str = "You have no data to reset.";
const NO_PRIMAL_DATA: &str = "You have no primal data to reset.";

/// Every key that feeds the primal tiers, including the combined counter.
const PRIMAL_KEYS: [&str; 3] = [PRIMAL, PRIMAL_LEGENDARY, PRIMAL_MYTHICAL];

pub struct Tracker {
    config: TrackerConfig,
    storage: DataStore,
    store: Store,
}

impl Tracker {
    /// Build the persistence layer from `config` and load the current store.
    pub fn open(config: TrackerConfig) -> Self {
        let storage = DataStore::from_config(&config);
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: TrackerConfig, storage: DataStore) -> Self {
        let store = storage.load();
        Self {
            config,
            storage,
            store,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn storage(&self) -> &DataStore {
        &self.storage
    }

    pub fn record(&self, user_id: &str) -> Option<&UserRecord> {
        self.store.get(user_id)
    }

    /// Add `amount` to every category in `categories` and save once.
    ///
    /// All inputs are checked before anything is applied, so a rejected
    /// call leaves the store untouched. Returns `(category, new_total)`
    /// in the order given.
    pub fn record_open(
        &mut self,
        user_id: &str,
        categories: &[&str],
        amount: u64,
    ) -> Result<Vec<(String, u64)>> {
        if !validate_amount(amount, self.config.min_amount, self.config.max_amount) {
            return Err(TrackerError::Validation(format!(
                "Invalid amount. Must be between {} and {}.",
                self.config.min_amount, self.config.max_amount
            )));
        }
        if categories.is_empty() {
            return Err(TrackerError::Validation("No shard type given.".to_string()));
        }

        let categories = categories
            .iter()
            .map(|c| self.normalize_category(c))
            .collect::<Result<Vec<_>>>()?;

        // Apply to a copy so an overflow on the second key cannot leave the
        // first one half-applied.
        let mut record = self.store.get(user_id).cloned().unwrap_or_default();
        let mut totals = Vec::with_capacity(categories.len());
        for category in categories {
            let total = mercy::update(&mut record, &category, amount, &self.config.valid_categories)?;
            totals.push((category, total));
        }

        *self.store.record_mut(user_id) = record;
        self.persist()?;

        tracing::debug!("User {} opened {} x{:?}", user_id, amount, totals);
        Ok(totals)
    }

    /// Drop one counter. Returns the count it held (zero if it was unset).
    pub fn reset_category(&mut self, user_id: &str, category: &str) -> Result<u64> {
        let category = self.normalize_category(category)?;
        let record = self.record_with_data(user_id)?;

        let previous = mercy::reset_category(record, &category).unwrap_or(0);
        self.persist()?;

        tracing::info!("User {} reset {} (was {})", user_id, category, previous);
        Ok(previous)
    }

    /// Drop every primal counter, the combined one included.
    ///
    /// Returns the keys that held data with their counts, in
    /// [`PRIMAL_KEYS`] order. `NotFound` when none of them did.
    pub fn reset_primal(&mut self, user_id: &str) -> Result<Vec<(String, u64)>> {
        let record = self.record_with_data(user_id)?;

        let cleared: Vec<(String, u64)> = PRIMAL_KEYS
            .iter()
            .filter_map(|key| mercy::reset_category(record, key).map(|count| (key.to_string(), count)))
            .filter(|(_, count)| *count > 0)
            .collect();
        if cleared.is_empty() {
            return Err(TrackerError::NotFound(NO_PRIMAL_DATA.to_string()));
        }
        self.persist()?;

        tracing::info!("User {} reset primal counters {:?}", user_id, cleared);
        Ok(cleared)
    }

    /// Clear every counter for the user, returning what was cleared.
    pub fn reset_all(&mut self, user_id: &str) -> Result<UserRecord> {
        let record = self.record_with_data(user_id)?;

        let previous = mercy::reset_all(record);
        self.persist()?;

        tracing::info!("User {} reset all {} counters", user_id, previous.len());
        Ok(previous)
    }

    pub fn status(&self, user_id: &str) -> String {
        let empty = UserRecord::new();
        let record = self.store.get(user_id).unwrap_or(&empty);
        mercy::render_status(record, &self.config.bar_style(), &self.config.valid_categories)
    }

    pub fn detailed_status(&self, user_id: &str) -> BTreeMap<String, CategoryStatus> {
        self.store
            .get(user_id)
            .map(|record| mercy::detailed_status(record, &self.config.valid_categories))
            .unwrap_or_default()
    }

    pub fn summary(&self, user_id: &str) -> Vec<String> {
        self.store
            .get(user_id)
            .map(mercy::summarize_record)
            .unwrap_or_default()
    }

    pub fn rules_info(&self) -> String {
        mercy::render_rules_info()
    }

    pub fn manual_backup(&self, suffix: &str) -> Result<PathBuf> {
        self.storage
            .backups()
            .create_snapshot(&self.store, &SnapshotKind::manual(suffix))
    }

    pub fn list_backups(&self) -> Result<Vec<SnapshotInfo>> {
        self.storage.backups().list_snapshots()
    }

    pub fn verify_backup(&self, name: &str) -> IntegrityReport {
        self.storage.backups().verify_integrity(name)
    }

    /// Replace the whole store with a verified snapshot and persist it.
    /// Returns the number of users restored.
    pub fn restore_backup(&mut self, name: &str) -> Result<usize> {
        let report = self.verify_backup(name);
        if !report.ok {
            return Err(TrackerError::Structural {
                name: name.to_string(),
                reason: report.reason,
            });
        }

        let restored = self.storage.backups().restore_specific(name)?;
        let users = restored.len();
        self.store = restored;
        self.persist()?;

        tracing::warn!("Store replaced from backup {} ({} users)", name, users);
        Ok(users)
    }

    fn normalize_category(&self, category: &str) -> Result<String> {
        let category = category.trim().to_lowercase();
        if !self.config.is_valid_category(&category) {
            return Err(TrackerError::Validation(format!(
                "Unknown shard type: {}",
                category
            )));
        }
        Ok(category)
    }

    fn record_with_data(&mut self, user_id: &str) -> Result<&mut UserRecord> {
        match self.store.get_mut(user_id) {
            Some(record) if record.has_data() => Ok(record),
            _ => Err(TrackerError::NotFound(NO_DATA_TO_RESET.to_string())),
        }
    }

    fn persist(&self) -> Result<()> {
        self.storage.save(&self.store)
    }
}
