use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const CONFIRMATION_MESSAGE: &str = "Встреча успешно забронирована";

/// Shortest time a booking confirmation stays visible.
pub const MIN_CONFIRMATION_DISPLAY: Duration = Duration::from_secs(3);

/// Handle for the deferred dismissal of one posted notice.
///
/// The host schedules `dismiss` after `delay`. A ticket from before a reset, or for a notice that
/// has since been replaced, dismisses nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct NoticeTicket {
    pub generation: u64,
    pub serial: u64,
    pub delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Notice {
    pub message: String,
    pub serial: u64,
}

/// Advisory notification state. Holds no booking or progress data.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    generation: u64,
    next_serial: u64,
    active: Option<Notice>,
}

impl NoticeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn active(&self) -> Option<&Notice> {
        self.active.as_ref()
    }

    /// Show `message`, replacing any visible notice. `delay` is raised to
    /// [`MIN_CONFIRMATION_DISPLAY`] when shorter.
    pub fn post(&mut self, message: &str, delay: Duration) -> NoticeTicket {
        self.next_serial += 1;
        let serial = self.next_serial;
        self.active = Some(Notice { message: message.to_string(), serial });
        NoticeTicket {
            generation: self.generation,
            serial,
            delay: delay.max(MIN_CONFIRMATION_DISPLAY),
        }
    }

    /// Clear the notice `ticket` was issued for. Returns whether anything was cleared.
    pub fn dismiss(&mut self, ticket: NoticeTicket) -> bool {
        let current = self
            .active
            .as_ref()
            .is_some_and(|notice| notice.serial == ticket.serial);
        if ticket.generation != self.generation || !current {
            tracing::debug!(
                generation = ticket.generation,
                serial = ticket.serial,
                "ignoring stale notice timer"
            );
            return false;
        }
        self.active = None;
        true
    }

    /// Drop any visible notice and invalidate every outstanding ticket.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dismiss_clears_the_matching_notice() {
        let mut board = NoticeBoard::new();
        let ticket = board.post(CONFIRMATION_MESSAGE, Duration::from_secs(5));

        assert_eq!(ticket.delay, Duration::from_secs(5));
        assert_eq!(board.active().map(|notice| notice.message.as_str()), Some(CONFIRMATION_MESSAGE));
        assert!(board.dismiss(ticket));
        assert!(board.active().is_none());
        assert!(!board.dismiss(ticket));
    }

    #[test]
    fn delay_is_raised_to_the_minimum() {
        let mut board = NoticeBoard::new();
        let ticket = board.post(CONFIRMATION_MESSAGE, Duration::from_millis(500));
        assert_eq!(ticket.delay, MIN_CONFIRMATION_DISPLAY);
    }

    #[test]
    fn timer_for_a_replaced_notice_is_a_no_op() {
        let mut board = NoticeBoard::new();
        let first = board.post("first", MIN_CONFIRMATION_DISPLAY);
        let second = board.post("second", MIN_CONFIRMATION_DISPLAY);

        assert!(!board.dismiss(first));
        assert_eq!(board.active().map(|notice| notice.serial), Some(second.serial));
        assert!(board.dismiss(second));
    }

    #[test]
    fn timer_firing_after_invalidate_is_a_no_op() {
        let mut board = NoticeBoard::new();
        let stale = board.post(CONFIRMATION_MESSAGE, MIN_CONFIRMATION_DISPLAY);
        board.invalidate();
        assert!(board.active().is_none());

        let fresh = board.post(CONFIRMATION_MESSAGE, MIN_CONFIRMATION_DISPLAY);
        assert!(!board.dismiss(stale));
        assert!(board.active().is_some());
        assert!(board.dismiss(fresh));
        assert_eq!(board.generation(), 1);
    }
}
