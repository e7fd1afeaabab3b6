//! Defect-matching and booking-simulation engines for the requirements self-check exercise.
//!
//! Everything in this crate is synchronous and free of I/O. Persisted progress goes through the
//! [`ProgressPersistence`] trait so the storage backend can be swapped without touching the engines.

mod booking;
mod catalog;
mod matcher;
mod notice;
mod progress;
mod session;
mod slots;

pub use booking::{
    validate_identity, Booking, BookingError, BookingId, BookingLedger, IdentityPolicy,
    ValidIdentity,
};
pub use catalog::{DefectCatalog, DefectRecord};
pub use matcher::{extract_leading_id, mark_found, resolve, MarkOutcome, MatchQuery};
pub use notice::{
    Notice, NoticeBoard, NoticeTicket, CONFIRMATION_MESSAGE, MIN_CONFIRMATION_DISPLAY,
};
pub use progress::{FoundDefect, MemoryPersistence, Progress, ProgressPersistence, ProgressStore};
pub use session::{BookingReceipt, ProgressSummary, SessionSettings, TrainerSession};
pub use slots::{date_label, generate, parse_date_label, BookedSlots, Slot, SlotGrid, SlotIter, SlotKey};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TrainerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("persisted progress is corrupt: {0}")]
    PersistenceCorrupt(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}
