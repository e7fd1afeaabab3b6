use serde::{Deserialize, Serialize};

use crate::{DefectCatalog, DefectRecord, TrainerError};

/// A catalog entry materialized into the learner's progress at the moment it was first matched.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct FoundDefect {
    pub id: String,
    pub reference_text: String,
    pub explanation: String,
    pub violated_attribute: String,
}

impl From<&DefectRecord> for FoundDefect {
    fn from(record: &DefectRecord) -> Self {
        Self {
            id: record.id.clone(),
            reference_text: record.reference_text.clone(),
            explanation: record.explanation.clone(),
            violated_attribute: record.violated_attribute.clone(),
        }
    }
}

/// Findings in discovery order. Ids are unique.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Progress {
    found: Vec<FoundDefect>,
}

impl Progress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.found.iter().any(|found| found.id == id)
    }

    /// Append a finding unless its id is already recorded. Returns whether it was appended.
    pub fn append(&mut self, found: FoundDefect) -> bool {
        if self.contains(&found.id) {
            return false;
        }
        self.found.push(found);
        debug_assert!(self.ids_are_unique(), "duplicate id slipped into progress");
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &FoundDefect> {
        self.found.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[FoundDefect] {
        &self.found
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.found.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.found.clear();
    }

    /// Drop findings whose id is not in `catalog` and refresh the wording of the rest from their
    /// catalog record. Returns the number of dropped and refreshed entries.
    pub(crate) fn reconcile(&mut self, catalog: &DefectCatalog) -> (usize, usize) {
        let before = self.found.len();
        self.found.retain(|found| catalog.get(&found.id).is_some());
        let dropped = before - self.found.len();

        let mut refreshed = 0;
        for found in &mut self.found {
            let Some(record) = catalog.get(&found.id) else {
                continue;
            };
            let current = FoundDefect::from(record);
            if *found != current {
                *found = current;
                refreshed += 1;
            }
        }
        (dropped, refreshed)
    }

    /// Serialize to the persisted JSON array.
    ///
    /// # Errors
    /// Returns [`TrainerError::Persistence`] when JSON encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TrainerError> {
        serde_json::to_vec(&self.found)
            .map_err(|err| TrainerError::Persistence(format!("failed to encode progress: {err}")))
    }

    /// Parse the persisted JSON array.
    ///
    /// # Errors
    /// Returns [`TrainerError::PersistenceCorrupt`] when the bytes are not a JSON array of
    /// findings, an id is blank, or an id appears twice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrainerError> {
        let entries: Vec<FoundDefect> = serde_json::from_slice(bytes)
            .map_err(|err| TrainerError::PersistenceCorrupt(err.to_string()))?;

        let mut progress = Self::new();
        for entry in entries {
            if entry.id.trim().is_empty() {
                return Err(TrainerError::PersistenceCorrupt(
                    "persisted finding has a blank id".to_string(),
                ));
            }
            let id = entry.id.clone();
            if !progress.append(entry) {
                return Err(TrainerError::PersistenceCorrupt(format!(
                    "persisted finding id `{id}` appears more than once"
                )));
            }
        }
        Ok(progress)
    }

    fn ids_are_unique(&self) -> bool {
        let mut ids = self.found.iter().map(|found| found.id.as_str()).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.windows(2).all(|pair| pair[0] != pair[1])
    }
}

/// Storage for the single persisted progress entry.
pub trait ProgressPersistence {
    /// Read the persisted entry, `None` when absent.
    ///
    /// # Errors
    /// Returns an error when the backend cannot be read or the entry fails an integrity check.
    fn read_progress(&self) -> Result<Option<Vec<u8>>, TrainerError>;

    /// Replace the persisted entry.
    ///
    /// # Errors
    /// Returns an error when the backend rejects the write.
    fn write_progress(&mut self, bytes: &[u8]) -> Result<(), TrainerError>;

    /// Delete the persisted entry. Deleting an absent entry succeeds.
    ///
    /// # Errors
    /// Returns an error when the backend rejects the delete.
    fn erase_progress(&mut self) -> Result<(), TrainerError>;
}

/// In-process backend, used for ephemeral sessions and tests.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MemoryPersistence {
    entry: Option<Vec<u8>>,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entry(bytes: impl Into<Vec<u8>>) -> Self {
        Self { entry: Some(bytes.into()) }
    }

    #[must_use]
    pub fn entry(&self) -> Option<&[u8]> {
        self.entry.as_deref()
    }
}

impl ProgressPersistence for MemoryPersistence {
    fn read_progress(&self) -> Result<Option<Vec<u8>>, TrainerError> {
        Ok(self.entry.clone())
    }

    fn write_progress(&mut self, bytes: &[u8]) -> Result<(), TrainerError> {
        self.entry = Some(bytes.to_vec());
        Ok(())
    }

    fn erase_progress(&mut self) -> Result<(), TrainerError> {
        self.entry = None;
        Ok(())
    }
}

/// In-memory progress mirrored to a persistence backend after every mutation.
///
/// Persistence is best-effort: read failures and corrupt entries restore as empty progress, and
/// failed writes are logged while the in-memory state stays authoritative for the session.
#[derive(Debug)]
pub struct ProgressStore<P> {
    progress: Progress,
    backend: P,
}

impl<P: ProgressPersistence> ProgressStore<P> {
    /// Restore progress from `backend`, falling back to empty progress.
    ///
    /// A corrupt entry is erased from the backend so it is reported once.
    pub fn open(mut backend: P) -> Self {
        let restored = backend.read_progress().and_then(|entry| match entry {
            Some(bytes) => Progress::from_bytes(&bytes),
            None => Ok(Progress::new()),
        });

        let progress = match restored {
            Ok(progress) => {
                tracing::debug!(found = progress.len(), "restored persisted progress");
                progress
            }
            Err(err @ TrainerError::PersistenceCorrupt(_)) => {
                tracing::warn!("discarding persisted progress: {err}");
                if let Err(erase_err) = backend.erase_progress() {
                    tracing::warn!("failed to erase corrupt persisted progress: {erase_err}");
                }
                Progress::new()
            }
            Err(err) => {
                tracing::warn!("failed to read persisted progress, starting empty: {err}");
                Progress::new()
            }
        };

        Self { progress, backend }
    }

    /// Align restored progress with `catalog`: unknown ids are dropped and known ones take the
    /// catalog's current wording. The result is persisted when anything changed.
    pub fn reconcile(&mut self, catalog: &DefectCatalog) {
        let (dropped, refreshed) = self.progress.reconcile(catalog);
        if dropped == 0 && refreshed == 0 {
            return;
        }
        tracing::warn!(
            dropped,
            refreshed,
            found = self.progress.len(),
            "persisted progress did not match the active catalog"
        );
        self.persist();
    }

    #[must_use]
    pub fn snapshot(&self) -> &Progress {
        &self.progress
    }

    /// Append a finding and persist. Duplicate ids are a no-op returning `false`.
    pub fn append(&mut self, found: FoundDefect) -> bool {
        if !self.progress.append(found) {
            return false;
        }
        self.persist();
        true
    }

    /// Clear in-memory progress and delete the persisted entry.
    ///
    /// When the delete fails an empty array is written in its place, so a later session still
    /// restores nothing.
    ///
    /// # Errors
    /// Returns the delete error when both the delete and the fallback write fail. In-memory
    /// progress is cleared either way.
    pub fn reset(&mut self) -> Result<(), TrainerError> {
        self.progress.clear();

        let Err(erase_err) = self.backend.erase_progress() else {
            return Ok(());
        };
        tracing::warn!("failed to erase persisted progress: {erase_err}");

        let overwrite = self.progress.to_bytes().and_then(|bytes| self.backend.write_progress(&bytes));
        if let Err(write_err) = overwrite {
            tracing::warn!("failed to overwrite persisted progress after reset: {write_err}");
            return Err(erase_err);
        }
        Ok(())
    }

    #[must_use]
    pub fn backend(&self) -> &P {
        &self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> P {
        self.backend
    }

    fn persist(&mut self) {
        let result = self.progress.to_bytes().and_then(|bytes| self.backend.write_progress(&bytes));
        if let Err(err) = result {
            tracing::warn!(found = self.progress.len(), "failed to persist progress: {err}");
        }
    }
}
