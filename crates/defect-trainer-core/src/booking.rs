use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{BookedSlots, Slot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BookingId(pub Ulid);

impl BookingId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BookingId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which learner input identifies a person for the one-booking-per-day rule.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// The entered name is the identity.
    #[default]
    NameOnly,
    /// A `local@domain.tld` email is the identity; a name is still required.
    Email,
}

impl IdentityPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NameOnly => "name_only",
            Self::Email => "email",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "name_only" => Some(Self::NameOnly),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum BookingError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("slot {date} {time} is not available")]
    SlotUnavailable { date: String, time: String },
    #[error("slot {date} {time} is not part of the booking grid")]
    UnknownSlot { date: String, time: String },
    #[error("`{identity}` already has a booking on {date}")]
    DuplicateBooking { identity: String, date: String },
}

/// Trimmed identity and display name that passed [`validate_identity`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ValidIdentity {
    pub identity: String,
    pub display_name: String,
}

/// Validate learner-entered booking details under `policy`.
///
/// Under [`IdentityPolicy::NameOnly`] a blank display name falls back to the identity.
///
/// # Errors
/// Returns [`BookingError::InvalidIdentity`] when a required value is blank or the email is not
/// shaped like `local@domain.tld`.
pub fn validate_identity(
    policy: IdentityPolicy,
    identity: &str,
    display_name: &str,
) -> Result<ValidIdentity, BookingError> {
    let identity = identity.trim();
    let display_name = display_name.trim();

    match policy {
        IdentityPolicy::NameOnly => {
            if identity.is_empty() {
                return Err(BookingError::InvalidIdentity("name MUST be provided".to_string()));
            }
            let display_name = if display_name.is_empty() { identity } else { display_name };
            Ok(ValidIdentity {
                identity: identity.to_string(),
                display_name: display_name.to_string(),
            })
        }
        IdentityPolicy::Email => {
            if display_name.is_empty() {
                return Err(BookingError::InvalidIdentity("name MUST be provided".to_string()));
            }
            if !is_valid_email(identity) {
                return Err(BookingError::InvalidIdentity(format!(
                    "email `{identity}` MUST be formatted as local@domain.tld"
                )));
            }
            Ok(ValidIdentity {
                identity: identity.to_string(),
                display_name: display_name.to_string(),
            })
        }
    }
}

fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels = domain.split('.').collect::<Vec<_>>();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// One confirmed booking. Bookings are permanent for the life of a session.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Booking {
    pub booking_id: BookingId,
    pub identity: String,
    pub display_name: String,
    pub date: String,
    pub time: String,
}

/// Append-only booking ledger together with the set of booked slot keys.
///
/// There is no cancel or modify operation.
#[derive(Debug, Clone, Default)]
pub struct BookingLedger {
    policy: IdentityPolicy,
    bookings: Vec<Booking>,
    booked: BookedSlots,
}

impl BookingLedger {
    #[must_use]
    pub fn new(policy: IdentityPolicy) -> Self {
        Self { policy, bookings: Vec::new(), booked: BookedSlots::new() }
    }

    #[must_use]
    pub fn policy(&self) -> IdentityPolicy {
        self.policy
    }

    #[must_use]
    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    #[must_use]
    pub fn booked_slots(&self) -> &BookedSlots {
        &self.booked
    }

    #[must_use]
    pub fn has_booking_on(&self, identity: &str, date: &str) -> bool {
        self.bookings.iter().any(|booking| booking.identity == identity && booking.date == date)
    }

    /// Book `slot` for `identity`.
    ///
    /// The ledger does not know the grid; callers pass slots taken from a generated grid.
    ///
    /// # Errors
    /// - [`BookingError::SlotUnavailable`] when the slot is flagged unavailable or already booked.
    /// - [`BookingError::InvalidIdentity`] when the details fail the ledger's identity policy.
    /// - [`BookingError::DuplicateBooking`] when the identity already booked any time that day.
    ///
    /// A failed booking leaves the ledger unchanged.
    pub fn book(
        &mut self,
        slot: &Slot,
        identity: &str,
        display_name: &str,
    ) -> Result<Booking, BookingError> {
        let key = slot.key();
        if !slot.available || self.booked.contains(&key) {
            tracing::info!(slot = %key, "booking rejected: slot unavailable");
            return Err(BookingError::SlotUnavailable {
                date: slot.date.clone(),
                time: slot.time.clone(),
            });
        }

        let valid = validate_identity(self.policy, identity, display_name)?;

        if self.has_booking_on(&valid.identity, &slot.date) {
            tracing::info!(date = %slot.date, "booking rejected: identity already booked that day");
            return Err(BookingError::DuplicateBooking {
                identity: valid.identity,
                date: slot.date.clone(),
            });
        }

        let booking = Booking {
            booking_id: BookingId::new(),
            identity: valid.identity,
            display_name: valid.display_name,
            date: slot.date.clone(),
            time: slot.time.clone(),
        };
        self.booked.insert(key);
        self.bookings.push(booking.clone());
        tracing::info!(
            booking_id = %booking.booking_id,
            date = %booking.date,
            time = %booking.time,
            "booking confirmed"
        );
        Ok(booking)
    }

    pub(crate) fn clear(&mut self) {
        self.bookings.clear();
        self.booked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_slot(date: &str, time: &str) -> Slot {
        Slot { date: date.to_string(), time: time.to_string(), available: true }
    }

    fn must_book(ledger: &mut BookingLedger, slot: &Slot, identity: &str, name: &str) -> Booking {
        match ledger.book(slot, identity, name) {
            Ok(booking) => booking,
            Err(err) => panic!("expected booking of {} {} to succeed: {err}", slot.date, slot.time),
        }
    }

    #[test]
    fn booking_records_entry_and_slot_key() {
        let mut ledger = BookingLedger::new(IdentityPolicy::Email);
        let slot = free_slot("19.10.2026", "10:00");

        let booking = must_book(&mut ledger, &slot, " alice@x.com ", "Alice");

        assert_eq!(booking.identity, "alice@x.com");
        assert_eq!(booking.display_name, "Alice");
        assert_eq!(ledger.bookings(), &[booking]);
        assert!(ledger.booked_slots().contains(&slot.key()));
    }

    #[test]
    fn same_identity_same_day_is_rejected_even_for_a_free_slot() {
        let mut ledger = BookingLedger::new(IdentityPolicy::Email);
        must_book(&mut ledger, &free_slot("19.10.2026", "10:00"), "alice@x.com", "Alice");

        let err = ledger.book(&free_slot("19.10.2026", "11:00"), "alice@x.com", "Alice");

        assert_eq!(
            err,
            Err(BookingError::DuplicateBooking {
                identity: "alice@x.com".to_string(),
                date: "19.10.2026".to_string(),
            })
        );
        assert_eq!(ledger.bookings().len(), 1);
        assert_eq!(ledger.booked_slots().len(), 1);
    }

    #[test]
    fn same_identity_on_another_day_and_other_identities_are_allowed() {
        let mut ledger = BookingLedger::new(IdentityPolicy::NameOnly);
        must_book(&mut ledger, &free_slot("19.10.2026", "10:00"), "Alice", "");
        must_book(&mut ledger, &free_slot("20.10.2026", "10:00"), "Alice", "");
        must_book(&mut ledger, &free_slot("19.10.2026", "11:00"), "Bob", "");

        assert_eq!(ledger.bookings().len(), 3);
    }

    #[test]
    fn identity_comparison_is_exact() {
        let mut ledger = BookingLedger::new(IdentityPolicy::NameOnly);
        must_book(&mut ledger, &free_slot("19.10.2026", "10:00"), "Alice", "");
        must_book(&mut ledger, &free_slot("19.10.2026", "11:00"), "alice", "");
        assert!(ledger.has_booking_on("Alice", "19.10.2026"));
        assert!(ledger.has_booking_on("alice", "19.10.2026"));
    }

    #[test]
    fn booked_or_flagged_slots_are_unavailable() {
        let mut ledger = BookingLedger::new(IdentityPolicy::NameOnly);
        let slot = free_slot("19.10.2026", "10:00");
        must_book(&mut ledger, &slot, "Alice", "");

        let stale = ledger.book(&slot, "Bob", "");
        assert!(matches!(stale, Err(BookingError::SlotUnavailable { .. })));

        let mut flagged = free_slot("19.10.2026", "11:00");
        flagged.available = false;
        let flagged_err = ledger.book(&flagged, "Bob", "");
        assert!(matches!(flagged_err, Err(BookingError::SlotUnavailable { .. })));

        assert_eq!(ledger.bookings().len(), 1);
    }

    #[test]
    fn invalid_identity_leaves_ledger_unchanged() {
        let mut ledger = BookingLedger::new(IdentityPolicy::Email);
        let slot = free_slot("19.10.2026", "10:00");

        for (identity, name) in [("alice@x.com", " "), ("alice", "Alice"), ("alice@x", "Alice")] {
            let err = ledger.book(&slot, identity, name);
            assert!(matches!(err, Err(BookingError::InvalidIdentity(_))), "{identity}/{name}");
        }
        assert!(ledger.bookings().is_empty());
        assert!(ledger.booked_slots().is_empty());
    }

    #[test]
    fn name_only_policy_requires_a_name() {
        assert!(matches!(
            validate_identity(IdentityPolicy::NameOnly, "  ", "Alice"),
            Err(BookingError::InvalidIdentity(_))
        ));
        assert_eq!(
            validate_identity(IdentityPolicy::NameOnly, " Алиса ", ""),
            Ok(ValidIdentity { identity: "Алиса".to_string(), display_name: "Алиса".to_string() })
        );
    }

    #[test]
    fn email_shape_checks() {
        for valid in ["alice@x.com", "a.b@mail.example.org"] {
            assert!(is_valid_email(valid), "{valid}");
        }
        for invalid in ["", "@x.com", "alice@", "alice@x", "alice@x.", "a@b@c.com", "al ice@x.com"] {
            assert!(!is_valid_email(invalid), "{invalid}");
        }
    }

    #[test]
    fn identity_policy_parse_round_trips() {
        for policy in [IdentityPolicy::NameOnly, IdentityPolicy::Email] {
            assert_eq!(IdentityPolicy::parse(policy.as_str()), Some(policy));
        }
        assert_eq!(IdentityPolicy::parse("phone"), None);
    }
}
