//! Date source for the engine and calendar.

use chrono::{Local, NaiveDate};
use std::cell::Cell;
use std::rc::Rc;

/// Supplies the current calendar date
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable date for tests and replays; clones share the same date.
#[derive(Clone, Debug)]
pub struct ManualClock {
    today: Rc<Cell<NaiveDate>>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Rc::new(Cell::new(today)),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        self.today.set(today);
    }

    pub fn advance_days(&self, days: i64) {
        self.today.set(self.today.get() + chrono::Duration::days(days));
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        self.today.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
        let view = clock.clone();
        clock.advance_days(1);
        assert_eq!(view.today(), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
    }
}
