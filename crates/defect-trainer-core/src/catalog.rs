use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::TrainerError;

/// One deliberately flawed requirement statement and the quality attribute it violates.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DefectRecord {
    pub id: String,
    pub reference_text: String,
    pub explanation: String,
    pub violated_attribute: String,
}

impl DefectRecord {
    #[must_use]
    pub fn new(id: &str, reference_text: &str, explanation: &str, violated_attribute: &str) -> Self {
        Self {
            id: id.to_string(),
            reference_text: reference_text.to_string(),
            explanation: explanation.to_string(),
            violated_attribute: violated_attribute.to_string(),
        }
    }

    /// Validate one catalog entry.
    ///
    /// # Errors
    /// Returns [`TrainerError::Validation`] when any field is blank.
    pub fn validate(&self) -> Result<(), TrainerError> {
        for (name, value) in [
            ("id", &self.id),
            ("reference_text", &self.reference_text),
            ("explanation", &self.explanation),
            ("violated_attribute", &self.violated_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(TrainerError::Validation(format!(
                    "defect record {name} MUST be non-empty (id={})",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Immutable answer key. Entries keep the order they were supplied in.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DefectCatalog {
    records: Vec<DefectRecord>,
}

impl DefectCatalog {
    /// Build a catalog from explicit records.
    ///
    /// # Errors
    /// Returns [`TrainerError::Validation`] when the list is empty, a record is invalid, or two
    /// records share an id.
    pub fn from_records(records: Vec<DefectRecord>) -> Result<Self, TrainerError> {
        if records.is_empty() {
            return Err(TrainerError::Validation(
                "defect catalog MUST contain at least one record".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for record in &records {
            record.validate()?;
            if !seen.insert(record.id.as_str()) {
                return Err(TrainerError::Validation(format!(
                    "defect catalog id `{}` MUST be unique",
                    record.id
                )));
            }
        }

        Ok(Self { records })
    }

    /// The seven defects planted in the meeting-booking requirements.
    #[must_use]
    pub fn builtin() -> Self {
        let records = vec![
            DefectRecord::new(
                "1.3",
                "Пользователи должны чаще приходить на встречи после бронирования.",
                "Не указано ограничение: 1 встреча в день.",
                "Полнота",
            ),
            DefectRecord::new(
                "1.5",
                "Решение должно быть интуитивно понятным и приносить пользу клиентам.",
                "Непроверяемо, абстрактно.",
                "Проверяемость",
            ),
            DefectRecord::new(
                "2.1",
                "Календарь должен отображать ближайшие 7 дней, начиная с текущей даты.",
                "Не указано, сколько дней (7? 30?).",
                "Однозначность",
            ),
            DefectRecord::new(
                "2.3",
                "Система должна позволять бронировать любое время в течение дня.",
                "Не определено, какие часы считаются доступными.",
                "Полнота",
            ),
            DefectRecord::new(
                "2.5",
                "Имя, введённое пользователем, должно сохраняться.",
                "Непонятно, где и зачем сохраняется.",
                "Ясность",
            ),
            DefectRecord::new(
                "2.6",
                "Пользователь не может изменить встречу после бронирования.",
                "Противоречит ожидаемому поведению.",
                "Реализуемость",
            ),
            DefectRecord::new(
                "3.4",
                "После успешного бронирования должно появиться уведомление не менее чем на 3 секунды с текстом «Встреча успешно забронирована».",
                "Не указано, какой текст, где и как долго.",
                "Проверяемость",
            ),
        ];
        Self { records }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DefectRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DefectRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn records(&self) -> &[DefectRecord] {
        &self.records
    }

    /// Number of defects a learner can find.
    #[must_use]
    pub fn total(&self) -> usize {
        self.records.len()
    }
}

impl Default for DefectCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid_and_has_seven_entries() {
        let catalog = DefectCatalog::builtin();
        assert_eq!(catalog.total(), 7);

        let rebuilt = DefectCatalog::from_records(catalog.records().to_vec());
        assert_eq!(rebuilt, Ok(catalog));
    }

    #[test]
    fn lookup_is_exact_key_equality() {
        let catalog = DefectCatalog::builtin();
        assert!(catalog.get("2.3").is_some());
        assert!(catalog.get("2.3 ").is_none());
        assert!(catalog.get("1.1").is_none());
    }

    #[test]
    fn from_records_rejects_duplicate_ids() {
        let err = DefectCatalog::from_records(vec![
            DefectRecord::new("1.1", "a", "b", "c"),
            DefectRecord::new("1.1", "d", "e", "f"),
        ]);
        assert!(matches!(err, Err(TrainerError::Validation(message)) if message.contains("unique")));
    }

    #[test]
    fn from_records_rejects_blank_fields_and_empty_lists() {
        let blank = DefectCatalog::from_records(vec![DefectRecord::new("1.1", "a", " ", "c")]);
        assert!(matches!(blank, Err(TrainerError::Validation(message)) if message.contains("explanation")));

        let empty = DefectCatalog::from_records(Vec::new());
        assert!(matches!(empty, Err(TrainerError::Validation(_))));
    }
}
