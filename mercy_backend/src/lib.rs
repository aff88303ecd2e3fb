//! Core of the mercy tracker: per-user pity counters for gacha shard pulls,
//! the rule table that turns them into mercy status, and JSON persistence
//! guarded by rotating timestamped backups.
//!
//! Chat-platform wiring lives in the host binary; this crate never talks to
//! a network.

pub mod backup;
pub mod config;
pub mod error;
pub mod format;
pub mod mercy;
pub mod storage;
pub mod tracker;

pub use error::{ErrorKind, Result, TrackerError};
pub use mercy::{Store, UserRecord};
pub use tracker::Tracker;
