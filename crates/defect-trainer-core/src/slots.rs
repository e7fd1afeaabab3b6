use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::{Date, Weekday};

use crate::TrainerError;

/// One bookable (date, time) unit.
///
/// Time labels are local wall-clock strings and carry no timezone.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct Slot {
    pub date: String,
    pub time: String,
    pub available: bool,
}

impl Slot {
    #[must_use]
    pub fn key(&self) -> SlotKey {
        SlotKey::new(&self.date, &self.time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SlotKey {
    pub date: String,
    pub time: String,
}

impl SlotKey {
    #[must_use]
    pub fn new(date: &str, time: &str) -> Self {
        Self { date: date.to_string(), time: time.to_string() }
    }
}

impl Display for SlotKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.date, self.time)
    }
}

/// Keys of booked slots. Only grows, except through a full session reset.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BookedSlots {
    keys: BTreeSet<SlotKey>,
}

impl BookedSlots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &SlotKey) -> bool {
        self.keys.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotKey> {
        self.keys.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub(crate) fn insert(&mut self, key: SlotKey) -> bool {
        self.keys.insert(key)
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Slot-generation parameters: a calendar window, skipped weekdays and a fixed time list.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlotGrid {
    window_days: u16,
    excluded_weekdays: Vec<Weekday>,
    times_of_day: Vec<String>,
}

impl SlotGrid {
    /// Validate and build grid parameters.
    ///
    /// # Errors
    /// Returns [`TrainerError::Validation`] when the window is zero days, the time list is empty,
    /// or a time label is blank or repeated.
    pub fn new(
        window_days: u16,
        excluded_weekdays: Vec<Weekday>,
        times_of_day: Vec<String>,
    ) -> Result<Self, TrainerError> {
        if window_days == 0 {
            return Err(TrainerError::Validation("window_days MUST be >= 1".to_string()));
        }
        if times_of_day.is_empty() {
            return Err(TrainerError::Validation(
                "times_of_day MUST contain at least one label".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for time in &times_of_day {
            if time.trim().is_empty() {
                return Err(TrainerError::Validation(
                    "times_of_day labels MUST be non-empty".to_string(),
                ));
            }
            if !seen.insert(time.as_str()) {
                return Err(TrainerError::Validation(format!(
                    "times_of_day label `{time}` MUST be unique"
                )));
            }
        }

        Ok(Self { window_days, excluded_weekdays, times_of_day })
    }

    #[must_use]
    pub fn window_days(&self) -> u16 {
        self.window_days
    }

    #[must_use]
    pub fn excluded_weekdays(&self) -> &[Weekday] {
        &self.excluded_weekdays
    }

    #[must_use]
    pub fn times_of_day(&self) -> &[String] {
        &self.times_of_day
    }

    /// Whether `slot` has the shape of a slot this grid generates: a configured time on a
    /// `dd.mm.yyyy` day that is not excluded. The window position is not checked.
    #[must_use]
    pub fn admits(&self, slot: &Slot) -> bool {
        if !self.times_of_day.iter().any(|time| *time == slot.time) {
            return false;
        }
        parse_date_label(&slot.date)
            .is_some_and(|day| !self.excluded_weekdays.contains(&day.weekday()))
    }

    #[must_use]
    pub fn generate<'a>(&'a self, today: Date, booked: &'a BookedSlots) -> SlotIter<'a> {
        generate(today, self.window_days, &self.excluded_weekdays, &self.times_of_day, booked)
    }
}

impl Default for SlotGrid {
    /// Seven days from today, weekends skipped, five fixed meeting times.
    fn default() -> Self {
        Self {
            window_days: 7,
            excluded_weekdays: vec![Weekday::Saturday, Weekday::Sunday],
            times_of_day: ["10:00", "11:00", "14:00", "15:00", "16:00"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Enumerate slots for `window_days` consecutive days starting at `today`, day-major and
/// time-minor, skipping excluded weekdays.
///
/// The returned iterator borrows its inputs, is finite, and can be cloned to restart.
#[must_use]
pub fn generate<'a>(
    today: Date,
    window_days: u16,
    excluded_weekdays: &'a [Weekday],
    times_of_day: &'a [String],
    booked: &'a BookedSlots,
) -> SlotIter<'a> {
    SlotIter {
        next_day: Some(today),
        remaining_days: window_days,
        excluded_weekdays,
        times_of_day,
        booked,
        current_date: None,
        time_index: 0,
    }
}

#[derive(Debug, Clone)]
pub struct SlotIter<'a> {
    next_day: Option<Date>,
    remaining_days: u16,
    excluded_weekdays: &'a [Weekday],
    times_of_day: &'a [String],
    booked: &'a BookedSlots,
    current_date: Option<String>,
    time_index: usize,
}

impl Iterator for SlotIter<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            if let Some(date) = &self.current_date {
                if let Some(time) = self.times_of_day.get(self.time_index) {
                    self.time_index += 1;
                    let key = SlotKey::new(date, time);
                    let available = !self.booked.contains(&key);
                    return Some(Slot { date: key.date, time: key.time, available });
                }
                self.current_date = None;
            }

            if self.remaining_days == 0 {
                return None;
            }
            let day = self.next_day?;
            self.remaining_days -= 1;
            self.next_day = day.next_day();

            if self.excluded_weekdays.contains(&day.weekday()) {
                continue;
            }
            self.current_date = Some(date_label(day));
            self.time_index = 0;
        }
    }
}

/// `dd.mm.yyyy` day label.
#[must_use]
pub fn date_label(day: Date) -> String {
    format!("{:02}.{:02}.{:04}", day.day(), u8::from(day.month()), day.year())
}

/// Parse a `dd.mm.yyyy` label produced by [`date_label`].
#[must_use]
pub fn parse_date_label(label: &str) -> Option<Date> {
    let format = time::format_description::parse("[day].[month].[year]").ok()?;
    let day = Date::parse(label, &format).ok()?;
    (date_label(day) == label).then_some(day)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use time::Month;

    use super::*;

    fn date(year: i32, month: Month, day: u8) -> Date {
        match Date::from_calendar_date(year, month, day) {
            Ok(date) => date,
            Err(err) => panic!("invalid fixture date {year}-{month}-{day}: {err}"),
        }
    }

    fn times(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|label| (*label).to_string()).collect()
    }

    #[test]
    fn five_business_days_with_two_times_yield_ten_free_slots() {
        let monday = date(2026, Month::October, 19);
        let excluded = [Weekday::Saturday, Weekday::Sunday];
        let times = times(&["10:00", "11:00"]);
        let booked = BookedSlots::new();

        let slots = generate(monday, 5, &excluded, &times, &booked).collect::<Vec<_>>();

        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|slot| slot.available));
        assert_eq!(slots[0].date, "19.10.2026");
        assert_eq!(slots[0].time, "10:00");
        assert_eq!(slots[1].time, "11:00");
        assert_eq!(slots[9].date, "23.10.2026");
    }

    #[test]
    fn default_grid_skips_weekends_in_a_seven_day_window() {
        let thursday = date(2026, Month::October, 22);
        let grid = SlotGrid::default();
        let booked = BookedSlots::new();

        let dates = grid
            .generate(thursday, &booked)
            .map(|slot| slot.date)
            .collect::<BTreeSet<_>>();

        assert_eq!(dates.len(), 5);
        assert!(!dates.contains("24.10.2026"));
        assert!(!dates.contains("25.10.2026"));
        assert_eq!(grid.generate(thursday, &booked).count(), 25);
    }

    #[test]
    fn window_crosses_month_and_year_boundaries() {
        let new_years_eve = date(2026, Month::December, 31);
        let times = times(&["10:00"]);
        let booked = BookedSlots::new();

        let dates = generate(new_years_eve, 2, &[], &times, &booked)
            .map(|slot| slot.date)
            .collect::<Vec<_>>();

        assert_eq!(dates, vec!["31.12.2026".to_string(), "01.01.2027".to_string()]);
    }

    #[test]
    fn booked_key_marks_only_that_slot_unavailable() {
        let monday = date(2026, Month::October, 19);
        let times = times(&["10:00", "11:00"]);
        let mut booked = BookedSlots::new();
        booked.insert(SlotKey::new("19.10.2026", "11:00"));

        let unavailable = generate(monday, 3, &[], &times, &booked)
            .filter(|slot| !slot.available)
            .map(|slot| slot.key().to_string())
            .collect::<Vec<_>>();

        assert_eq!(unavailable, vec!["19.10.2026-11:00".to_string()]);
    }

    #[test]
    fn cloned_iterator_restarts_from_the_same_position() {
        let monday = date(2026, Month::October, 19);
        let grid = SlotGrid::default();
        let booked = BookedSlots::new();

        let iter = grid.generate(monday, &booked);
        let first = iter.clone().collect::<Vec<_>>();
        let second = iter.collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn grid_rejects_invalid_parameters() {
        assert!(SlotGrid::new(0, Vec::new(), times(&["10:00"])).is_err());
        assert!(SlotGrid::new(7, Vec::new(), Vec::new()).is_err());
        assert!(SlotGrid::new(7, Vec::new(), times(&["10:00", " "])).is_err());
        assert!(SlotGrid::new(7, Vec::new(), times(&["10:00", "10:00"])).is_err());
        assert!(SlotGrid::new(1, vec![Weekday::Monday], times(&["09:30"])).is_ok());
    }

    #[test]
    fn grid_admits_only_generated_shapes() {
        let grid = SlotGrid::default();
        let slot = |date: &str, time: &str| Slot { date: date.to_string(), time: time.to_string(), available: true };

        assert!(grid.generate(date(2026, Month::October, 19), &BookedSlots::new()).all(|slot| grid.admits(&slot)));
        assert!(!grid.admits(&slot("foo", "25:00")));
        assert!(!grid.admits(&slot("19.10.2026", "25:00")));
        assert!(!grid.admits(&slot("24.10.2026", "10:00")));
        assert!(!grid.admits(&slot("19.10.26", "10:00")));
        assert!(!grid.admits(&slot("31.02.2026", "10:00")));
    }

    #[test]
    fn date_labels_parse_back() {
        let day = date(2027, Month::January, 1);
        assert_eq!(parse_date_label(&date_label(day)), Some(day));
        assert_eq!(parse_date_label("1.1.2027"), None);
    }

    proptest! {
        #[test]
        fn property_generation_is_deterministic(offset in 0_i64..3650, window in 1_u16..40, booked_index in 0_usize..64) {
            let start = date(2020, Month::January, 1) + time::Duration::days(offset);
            let grid = SlotGrid::default();
            let mut booked = BookedSlots::new();
            if let Some(slot) = grid.generate(start, &booked).nth(booked_index) {
                booked.insert(slot.key());
            }
            let excluded = grid.excluded_weekdays().to_vec();

            let first = generate(start, window, &excluded, grid.times_of_day(), &booked).collect::<Vec<_>>();
            let second = generate(start, window, &excluded, grid.times_of_day(), &booked).collect::<Vec<_>>();
            prop_assert_eq!(&first, &second);
            prop_assert!(first.len() <= usize::from(window) * grid.times_of_day().len());
            prop_assert!(first.iter().filter(|slot| !slot.available).count() <= 1);
        }
    }
}
