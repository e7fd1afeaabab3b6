use serde::{Deserialize, Serialize};

use crate::{DefectCatalog, DefectRecord, FoundDefect, ProgressPersistence, ProgressStore};

/// A learner interaction: a clicked requirement id, or text they selected.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum MatchQuery {
    ById(String),
    ByText(String),
}

/// Result of a marking attempt. Only [`MarkOutcome::Recorded`] changes progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MarkOutcome {
    Recorded,
    NoMatch,
    AlreadyFound,
}

impl MarkOutcome {
    #[must_use]
    pub fn is_recorded(self) -> bool {
        self == Self::Recorded
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::NoMatch => "no_match",
            Self::AlreadyFound => "already_found",
        }
    }
}

/// Resolve a query to a catalog entry.
///
/// Ids match by exact key. Text is trimmed, then tried against each reference text in catalog
/// order: exact equality first, then containment in either direction, and finally a leading
/// `N.N` id in the text is looked up by key.
#[must_use]
pub fn resolve<'c>(catalog: &'c DefectCatalog, query: &MatchQuery) -> Option<&'c DefectRecord> {
    match query {
        MatchQuery::ById(id) => catalog.get(id),
        MatchQuery::ByText(text) => resolve_text(catalog, text),
    }
}

fn resolve_text<'c>(catalog: &'c DefectCatalog, text: &str) -> Option<&'c DefectRecord> {
    let selection = text.trim();
    if selection.is_empty() {
        return None;
    }

    if let Some(record) = catalog.iter().find(|record| record.reference_text == selection) {
        return Some(record);
    }

    let contained = catalog.iter().find(|record| {
        let reference = record.reference_text.trim();
        selection.contains(reference) || reference.contains(selection)
    });
    if contained.is_some() {
        return contained;
    }

    extract_leading_id(selection).and_then(|id| catalog.get(id))
}

/// Extract a leading `digits.digits` id such as `2.3` from the start of `text`.
#[must_use]
pub fn extract_leading_id(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let major = text.bytes().take_while(u8::is_ascii_digit).count();
    if major == 0 || text.as_bytes().get(major) != Some(&b'.') {
        return None;
    }

    let minor = text[major + 1..].bytes().take_while(u8::is_ascii_digit).count();
    if minor == 0 {
        return None;
    }

    Some(&text[..major + 1 + minor])
}

/// Record `record` as found unless it is absent or already recorded.
pub fn mark_found<P: ProgressPersistence>(
    progress: &mut ProgressStore<P>,
    record: Option<&DefectRecord>,
) -> MarkOutcome {
    let Some(record) = record else {
        tracing::debug!("mark rejected: input does not resolve to a catalog entry");
        return MarkOutcome::NoMatch;
    };

    if !progress.append(FoundDefect::from(record)) {
        tracing::debug!(id = %record.id, "mark rejected: defect already found");
        return MarkOutcome::AlreadyFound;
    }

    tracing::info!(
        id = %record.id,
        found = progress.snapshot().len(),
        "defect found"
    );
    MarkOutcome::Recorded
}
