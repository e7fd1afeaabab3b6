use std::path::{Path, PathBuf};

use anyhow::Result;
use defect_trainer_core::{
    FoundDefect, MemoryPersistence, ProgressPersistence, ProgressSummary, Slot, TrainerSession,
};
use defect_trainer_store_sqlite::{SchemaStatus, SqliteStore};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

mod config;

pub use config::{DayOfWeek, TrainerConfig};

pub const API_CONTRACT_VERSION: &str = "trainer.v1";

/// Found-defects panel data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressView {
    pub contract_version: String,
    pub summary: ProgressSummary,
    pub found: Vec<FoundDefect>,
}

/// Slots of one calendar day, in generation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotDay {
    pub date: String,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone)]
pub struct TrainerApi {
    db_path: PathBuf,
    config: TrainerConfig,
}

impl TrainerApi {
    #[must_use]
    pub fn new(db_path: PathBuf, config: TrainerConfig) -> Self {
        Self { db_path, config }
    }

    /// Build an api from a YAML config file.
    ///
    /// # Errors
    /// Returns an error when the config cannot be loaded.
    pub fn from_config_file(db_path: PathBuf, config_path: &Path) -> Result<Self> {
        Ok(Self::new(db_path, TrainerConfig::load(config_path)?))
    }

    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn open_store(&self) -> Result<SqliteStore> {
        let mut store = SqliteStore::open(&self.db_path)?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without migrating.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        SqliteStore::open(&self.db_path)?.schema_status()
    }

    /// Open a session whose progress persists in the `SQLite` database.
    ///
    /// # Errors
    /// Returns an error when the config is invalid or the database cannot be opened or migrated.
    pub fn open_session(&self) -> Result<TrainerSession<SqliteStore>> {
        let catalog = self.config.defect_catalog()?;
        let settings = self.config.session_settings()?;
        let store = self.open_store()?;
        Ok(TrainerSession::open(catalog, settings, store))
    }
}

/// Open a session that keeps progress in memory only.
///
/// # Errors
/// Returns an error when the config is invalid.
pub fn open_ephemeral_session(
    config: &TrainerConfig,
) -> Result<TrainerSession<MemoryPersistence>> {
    Ok(TrainerSession::open(
        config.defect_catalog()?,
        config.session_settings()?,
        MemoryPersistence::new(),
    ))
}

#[must_use]
pub fn progress_view<P: ProgressPersistence>(session: &TrainerSession<P>) -> ProgressView {
    ProgressView {
        contract_version: API_CONTRACT_VERSION.to_string(),
        summary: session.summary(),
        found: session.found().as_slice().to_vec(),
    }
}

/// Group day-major slots by date, keeping day order.
#[must_use]
pub fn group_by_date(slots: impl IntoIterator<Item = Slot>) -> Vec<SlotDay> {
    let mut days: Vec<SlotDay> = Vec::new();
    for slot in slots {
        if let Some(day) = days.last_mut().filter(|day| day.date == slot.date) {
            day.slots.push(slot);
            continue;
        }
        days.push(SlotDay { date: slot.date.clone(), slots: vec![slot] });
    }
    days
}

#[must_use]
pub fn slot_days<P: ProgressPersistence>(session: &TrainerSession<P>, today: Date) -> Vec<SlotDay> {
    group_by_date(session.slots(today))
}

/// Today's date in UTC. The grid labels carry no timezone, so hosts wanting local dates pass
/// their own `today` to [`slot_days`].
#[must_use]
pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}
