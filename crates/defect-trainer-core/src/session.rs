use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    mark_found, resolve, BookedSlots, Booking, BookingError, BookingLedger, DefectCatalog,
    DefectRecord, IdentityPolicy, MarkOutcome, MatchQuery, Notice, NoticeBoard, NoticeTicket,
    Progress, ProgressPersistence, ProgressStore, Slot, SlotGrid, SlotIter, TrainerError,
    CONFIRMATION_MESSAGE, MIN_CONFIRMATION_DISPLAY,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionSettings {
    pub grid: SlotGrid,
    pub identity_policy: IdentityPolicy,
    pub confirmation_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            grid: SlotGrid::default(),
            identity_policy: IdentityPolicy::default(),
            confirmation_delay: MIN_CONFIRMATION_DISPLAY,
        }
    }
}

/// The "N / total found" counter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct ProgressSummary {
    pub found: usize,
    pub total: usize,
    pub complete: bool,
}

impl Display for ProgressSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.found, self.total)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub notice: NoticeTicket,
}

/// All mutable state of one learner session.
///
/// Every operation runs to completion under `&mut self`, so observers never see a partially
/// applied match, booking, or reset.
#[derive(Debug)]
pub struct TrainerSession<P> {
    catalog: DefectCatalog,
    grid: SlotGrid,
    confirmation_delay: Duration,
    progress: ProgressStore<P>,
    ledger: BookingLedger,
    notices: NoticeBoard,
}

impl<P: ProgressPersistence> TrainerSession<P> {
    /// Start a session, restoring any persisted progress from `backend`.
    ///
    /// Restored findings are aligned with `catalog` before the session is used.
    pub fn open(catalog: DefectCatalog, settings: SessionSettings, backend: P) -> Self {
        let mut progress = ProgressStore::open(backend);
        progress.reconcile(&catalog);
        tracing::info!(
            found = progress.snapshot().len(),
            total = catalog.total(),
            policy = settings.identity_policy.as_str(),
            "trainer session opened"
        );

        Self {
            catalog,
            grid: settings.grid,
            confirmation_delay: settings.confirmation_delay,
            progress,
            ledger: BookingLedger::new(settings.identity_policy),
            notices: NoticeBoard::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &DefectCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    #[must_use]
    pub fn resolve(&self, query: &MatchQuery) -> Option<&DefectRecord> {
        resolve(&self.catalog, query)
    }

    /// Resolve `query` and record the defect if it is new.
    pub fn mark(&mut self, query: &MatchQuery) -> MarkOutcome {
        let record = resolve(&self.catalog, query);
        mark_found(&mut self.progress, record)
    }

    /// Like [`Self::mark`], reporting only whether progress changed.
    pub fn mark_found(&mut self, query: &MatchQuery) -> bool {
        self.mark(query).is_recorded()
    }

    #[must_use]
    pub fn found(&self) -> &Progress {
        self.progress.snapshot()
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        let found = self.progress.snapshot().len();
        let total = self.catalog.total();
        ProgressSummary { found, total, complete: found == total }
    }

    /// Current slot grid starting at `today`, with availability from this session's bookings.
    #[must_use]
    pub fn slots(&self, today: Date) -> SlotIter<'_> {
        self.grid.generate(today, self.ledger.booked_slots())
    }

    /// Book `slot` and post the confirmation notice.
    ///
    /// # Errors
    /// Returns [`BookingError::UnknownSlot`] when the slot does not fit this session's grid, or
    /// the ledger's [`BookingError`]. Nothing changes on failure.
    pub fn book(
        &mut self,
        slot: &Slot,
        identity: &str,
        display_name: &str,
    ) -> Result<BookingReceipt, BookingError> {
        if !self.grid.admits(slot) {
            tracing::info!(date = %slot.date, time = %slot.time, "booking rejected: slot outside grid");
            return Err(BookingError::UnknownSlot {
                date: slot.date.clone(),
                time: slot.time.clone(),
            });
        }
        let booking = self.ledger.book(slot, identity, display_name)?;
        let notice = self.notices.post(CONFIRMATION_MESSAGE, self.confirmation_delay);
        Ok(BookingReceipt { booking, notice })
    }

    #[must_use]
    pub fn bookings(&self) -> &[Booking] {
        self.ledger.bookings()
    }

    #[must_use]
    pub fn booked_slots(&self) -> &BookedSlots {
        self.ledger.booked_slots()
    }

    #[must_use]
    pub fn active_notice(&self) -> Option<&Notice> {
        self.notices.active()
    }

    /// Deferred notice dismissal. Stale tickets are ignored.
    pub fn dismiss_notice(&mut self, ticket: NoticeTicket) -> bool {
        self.notices.dismiss(ticket)
    }

    /// Clear progress (in memory and persisted), all bookings, and any notice.
    ///
    /// The catalog and slot parameters are untouched.
    ///
    /// # Errors
    /// Returns an error when the persisted progress could not be removed. In-memory state is
    /// cleared regardless.
    pub fn reset(&mut self) -> Result<(), TrainerError> {
        self.ledger.clear();
        self.notices.invalidate();
        let persisted = self.progress.reset();
        tracing::info!(generation = self.notices.generation(), "session reset");
        persisted
    }

    #[must_use]
    pub fn backend(&self) -> &P {
        self.progress.backend()
    }

    #[must_use]
    pub fn into_backend(self) -> P {
        self.progress.into_backend()
    }
}
