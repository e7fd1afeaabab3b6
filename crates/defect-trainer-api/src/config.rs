//! YAML configuration for a trainer session.
//!
//! Every field has a default, so an empty document yields the stock exercise: a seven-day
//! window without weekends, five meeting times, name-only identities and a three second
//! confirmation.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use defect_trainer_core::{
    DefectCatalog, DefectRecord, IdentityPolicy, SessionSettings, SlotGrid,
    MIN_CONFIRMATION_DISPLAY,
};
use serde::{Deserialize, Serialize};
use time::Weekday;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Monday,
            DayOfWeek::Tuesday => Weekday::Tuesday,
            DayOfWeek::Wednesday => Weekday::Wednesday,
            DayOfWeek::Thursday => Weekday::Thursday,
            DayOfWeek::Friday => Weekday::Friday,
            DayOfWeek::Saturday => Weekday::Saturday,
            DayOfWeek::Sunday => Weekday::Sunday,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TrainerConfig {
    pub window_days: u16,
    pub excluded_weekdays: Vec<DayOfWeek>,
    pub times_of_day: Vec<String>,
    pub identity_policy: IdentityPolicy,
    pub confirmation_seconds: u64,
    /// Replaces the built-in catalog when present.
    pub catalog: Option<Vec<DefectRecord>>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        let grid = SlotGrid::default();
        Self {
            window_days: grid.window_days(),
            excluded_weekdays: vec![DayOfWeek::Saturday, DayOfWeek::Sunday],
            times_of_day: grid.times_of_day().to_vec(),
            identity_policy: IdentityPolicy::default(),
            confirmation_seconds: MIN_CONFIRMATION_DISPLAY.as_secs(),
            catalog: None,
        }
    }
}

impl TrainerConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    /// Returns an error when the YAML is malformed, has unknown fields, or fails validation.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw).context("failed to parse trainer config YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML config file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or its contents are invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trainer config {}", path.display()))?;
        let config = Self::from_yaml_str(&raw)
            .with_context(|| format!("invalid trainer config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded trainer config");
        Ok(config)
    }

    /// Check every constraint the session relies on.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.confirmation_seconds < MIN_CONFIRMATION_DISPLAY.as_secs() {
            return Err(anyhow!(
                "confirmation_seconds MUST be >= {}",
                MIN_CONFIRMATION_DISPLAY.as_secs()
            ));
        }
        self.slot_grid()?;
        self.defect_catalog()?;
        Ok(())
    }

    /// Configured catalog, or the built-in one.
    ///
    /// # Errors
    /// Returns an error when a configured catalog is invalid.
    pub fn defect_catalog(&self) -> Result<DefectCatalog> {
        match &self.catalog {
            Some(records) => DefectCatalog::from_records(records.clone())
                .map_err(|err| anyhow!("invalid catalog: {err}")),
            None => Ok(DefectCatalog::builtin()),
        }
    }

    /// Slot-generation parameters.
    ///
    /// # Errors
    /// Returns an error when the window or time list is invalid.
    pub fn slot_grid(&self) -> Result<SlotGrid> {
        SlotGrid::new(
            self.window_days,
            self.excluded_weekdays.iter().copied().map(Weekday::from).collect(),
            self.times_of_day.clone(),
        )
        .map_err(|err| anyhow!("invalid slot grid: {err}"))
    }

    /// Session settings derived from this config.
    ///
    /// # Errors
    /// Returns an error when the slot grid is invalid.
    pub fn session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            grid: self.slot_grid()?,
            identity_policy: self.identity_policy,
            confirmation_delay: Duration::from_secs(self.confirmation_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() -> Result<()> {
        let config = TrainerConfig::from_yaml_str("")?;
        assert_eq!(config, TrainerConfig::default());

        let settings = config.session_settings()?;
        assert_eq!(settings, SessionSettings::default());
        assert_eq!(config.defect_catalog()?.total(), 7);
        Ok(())
    }

    #[test]
    fn partial_document_overrides_selected_fields() -> Result<()> {
        let config = TrainerConfig::from_yaml_str(
            "window_days: 5\n\
             times_of_day: [\"10:00\", \"11:00\"]\n\
             identity_policy: email\n\
             confirmation_seconds: 5\n",
        )?;

        assert_eq!(config.window_days, 5);
        assert_eq!(config.excluded_weekdays, vec![DayOfWeek::Saturday, DayOfWeek::Sunday]);
        assert_eq!(config.identity_policy, IdentityPolicy::Email);

        let settings = config.session_settings()?;
        assert_eq!(settings.grid.times_of_day().len(), 2);
        assert_eq!(settings.confirmation_delay, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn custom_catalog_replaces_builtin() -> Result<()> {
        let config = TrainerConfig::from_yaml_str(
            "catalog:\n\
             \x20 - id: \"9.1\"\n\
             \x20   referenceText: \"The system shall be fast.\"\n\
             \x20   explanation: \"No measurable threshold.\"\n\
             \x20   violatedAttribute: \"Verifiability\"\n",
        )?;

        let catalog = config.defect_catalog()?;
        assert_eq!(catalog.total(), 1);
        assert!(catalog.get("9.1").is_some());
        Ok(())
    }

    #[test]
    fn invalid_documents_are_rejected() {
        for raw in [
            "window_days: 0\n",
            "times_of_day: []\n",
            "times_of_day: [\"10:00\", \"10:00\"]\n",
            "confirmation_seconds: 1\n",
            "excluded_weekdays: [funday]\n",
            "unknown_field: true\n",
            "catalog: []\n",
        ] {
            assert!(TrainerConfig::from_yaml_str(raw).is_err(), "accepted: {raw}");
        }
    }

    #[test]
    fn load_reports_missing_files() {
        let missing = std::env::temp_dir().join("defect-trainer-config-does-not-exist.yaml");
        let err = match TrainerConfig::load(&missing) {
            Ok(_) => panic!("expected missing config to fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("failed to read trainer config"));
    }
}
