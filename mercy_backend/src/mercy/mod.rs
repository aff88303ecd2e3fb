//! Mercy accounting: per-user counters, the static rule table, and the
//! status renderers built on top of them.

pub mod rules;
pub mod status;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

pub use rules::{compute_mercy_bonus, rules_for, MercyRule, Rarity, MERCY_RULES};
pub use status::{
    detailed_status, render_rules_info, render_status, summarize_record, CategoryStatus,
    TierStatus, NO_DATA_MESSAGE,
};

/// Counter category -> pulls since the last reset, for one user.
///
/// Keys read from disk are kept verbatim even when they are not tracked;
/// only [`update`] enforces the closed category set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord {
    counts: BTreeMap<String, u64>,
}

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count, zero when the key is absent.
    pub fn get(&self, category: &str) -> u64 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether any counter is non-zero. Zero-valued keys from older files
    /// are treated as absent.
    pub fn has_data(&self) -> bool {
        self.counts.values().any(|&count| count > 0)
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for UserRecord {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// User identifier -> [`UserRecord`]. Serializes as the canonical JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    users: BTreeMap<String, UserRecord>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, user_id: &str) -> Option<&UserRecord> {
        self.users.get(user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut UserRecord> {
        self.users.get_mut(user_id)
    }

    /// The user's record, created empty on first use.
    pub fn record_mut(&mut self, user_id: &str) -> &mut UserRecord {
        self.users.entry(user_id.to_string()).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UserRecord)> {
        self.users.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, UserRecord)> for Store {
    fn from_iter<I: IntoIterator<Item = (K, UserRecord)>>(iter: I) -> Self {
        Self {
            users: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Add `amount` pulls to `category` and return the new total.
///
/// Rejects categories outside `tracked` and a zero amount. Range checks
/// against the configured bounds belong to the caller.
pub fn update(record: &mut UserRecord, category: &str, amount: u64, tracked: &[String]) -> Result<u64> {
    if !tracked.iter().any(|c| c == category) {
        return Err(TrackerError::Validation(format!(
            "Unknown shard type: {}",
            category
        )));
    }
    if amount == 0 {
        return Err(TrackerError::Validation(
            "Amount must be a positive number.".to_string(),
        ));
    }

    let counter = record.counts.entry(category.to_string()).or_insert(0);
    let total = counter.checked_add(amount).ok_or_else(|| {
        TrackerError::Validation(format!("Counter for {} would overflow", category))
    })?;
    *counter = total;
    Ok(total)
}

/// Remove the counter entirely; returns the count it held.
pub fn reset_category(record: &mut UserRecord, category: &str) -> Option<u64> {
    record.counts.remove(category)
}

/// Clear every counter, returning what was there.
pub fn reset_all(record: &mut UserRecord) -> UserRecord {
    std::mem::take(record)
}
