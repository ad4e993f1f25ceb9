//! Month-grid calendar over the adherence ledger.
//!
//! [`CalendarView`] holds the navigation state (selected date and displayed
//! month) and derives everything a month grid or a day detail panel needs.

use crate::ledger::AdherenceLedger;
use crate::types::{DateSummary, DayStatus, Exercise};
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

/// One day of the month grid
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub exercises_on_target: usize,
    pub total_exercises: usize,
    pub percent: u32,
    pub is_today: bool,
    pub is_selected: bool,
}

/// A rendered month: blanks before the 1st (Sunday-first weeks), then days.
#[derive(Clone, Debug, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub leading_blanks: u32,
    pub days: Vec<DayCell>,
}

/// Per-exercise detail row for the selected date
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ExerciseRow {
    pub id: String,
    pub name: String,
    pub timed: bool,
    pub sessions: u32,
    pub target: u32,
    pub completed: bool,
    pub done: bool,
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    match first.checked_add_months(Months::new(1)) {
        Some(next) => (next - first).num_days() as u32,
        None => 31,
    }
}

/// Calendar navigation state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarView {
    selected: NaiveDate,
    month: NaiveDate,
}

impl CalendarView {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            selected: today,
            month: first_of_month(today),
        }
    }

    pub fn selected(&self) -> NaiveDate {
        self.selected
    }

    /// First day of the displayed month.
    pub fn month(&self) -> NaiveDate {
        self.month
    }

    /// Select a date; the displayed month is left alone.
    pub fn select_date(&mut self, date: NaiveDate) {
        self.selected = date;
    }

    /// Show a specific month without changing the selection.
    pub fn show_month(&mut self, year: i32, month: u32) -> bool {
        match NaiveDate::from_ymd_opt(year, month, 1) {
            Some(first) => {
                self.month = first;
                true
            }
            None => false,
        }
    }

    pub fn navigate_month(&mut self, delta: i32) {
        let months = Months::new(delta.unsigned_abs());
        let shifted = if delta >= 0 {
            self.month.checked_add_months(months)
        } else {
            self.month.checked_sub_months(months)
        };
        if let Some(month) = shifted {
            self.month = month;
        }
    }

    pub fn go_today(&mut self, today: NaiveDate) {
        self.selected = today;
        self.month = first_of_month(today);
    }

    pub fn month_label(&self) -> String {
        self.month.format("%B %Y").to_string()
    }

    pub fn month_grid(
        &self,
        ledger: &AdherenceLedger,
        catalog: &[Exercise],
        today: NaiveDate,
    ) -> MonthGrid {
        let year = self.month.year();
        let month = self.month.month();
        let days = self
            .month
            .iter_days()
            .take_while(|d| d.month() == month)
            .map(|date| {
                let summary = ledger.summarize(date, catalog);
                DayCell {
                    date,
                    status: ledger.status(date, today, catalog),
                    exercises_on_target: summary.exercises_on_target,
                    total_exercises: summary.total_exercises,
                    percent: summary.percent_on_target(),
                    is_today: date == today,
                    is_selected: date == self.selected,
                }
            })
            .collect();

        MonthGrid {
            year,
            month,
            leading_blanks: self.month.weekday().num_days_from_sunday(),
            days,
        }
    }

    pub fn selected_summary(&self, ledger: &AdherenceLedger, catalog: &[Exercise]) -> DateSummary {
        ledger.summarize(self.selected, catalog)
    }

    pub fn exercise_rows(&self, ledger: &AdherenceLedger, catalog: &[Exercise]) -> Vec<ExerciseRow> {
        catalog
            .iter()
            .map(|exercise| {
                let sessions = ledger.sessions_for_date(self.selected, exercise);
                let target = exercise.daily_target();
                ExerciseRow {
                    id: exercise.id.clone(),
                    name: exercise.name.clone(),
                    timed: exercise.is_timed(),
                    sessions,
                    target,
                    completed: !exercise.is_timed() && sessions >= 1,
                    done: sessions >= target,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn catalog() -> Vec<Exercise> {
        vec![
            Exercise {
                id: "gaze".into(),
                name: "Gaze".into(),
                description: String::new(),
                use_timer: true,
                duration: 60,
                reps: 1,
                sets: 2,
                image: None,
            },
            Exercise {
                id: "walk".into(),
                name: "Walk".into(),
                description: String::new(),
                use_timer: false,
                duration: 60,
                reps: 1,
                sets: 1,
                image: None,
            },
        ]
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2026, 12), 31);
        assert_eq!(days_in_month(2026, 13), 0);
    }

    #[test]
    fn test_month_grid_layout() {
        let today = date(2026, 10, 19);
        let view = CalendarView::new(today);
        let grid = view.month_grid(&AdherenceLedger::new(), &catalog(), today);

        assert_eq!(grid.days.len(), 31);
        // 1 October 2026 is a Thursday.
        assert_eq!(grid.leading_blanks, 4);
        assert!(grid.days[18].is_today && grid.days[18].is_selected);
        assert_eq!(grid.days[18].status, DayStatus::Red);
        assert_eq!(grid.days[19].status, DayStatus::None);
    }

    #[test]
    fn test_grid_reflects_ledger() {
        let today = date(2026, 10, 19);
        let mut ledger = AdherenceLedger::new();
        ledger.record_session(date(2026, 10, 5), 1);
        ledger.set_checkoff_completed(date(2026, 10, 5), "walk", true);
        ledger.record_session(date(2026, 10, 6), 2);
        ledger.set_checkoff_completed(date(2026, 10, 6), "walk", true);

        let grid = CalendarView::new(today).month_grid(&ledger, &catalog(), today);
        let fifth = &grid.days[4];
        assert_eq!(fifth.status, DayStatus::Yellow);
        assert_eq!((fifth.exercises_on_target, fifth.percent), (1, 50));
        assert_eq!(grid.days[5].status, DayStatus::Green);
    }

    #[test]
    fn test_navigation() {
        let mut view = CalendarView::new(date(2026, 1, 31));
        view.navigate_month(-1);
        assert_eq!(view.month(), date(2025, 12, 1));
        view.navigate_month(14);
        assert_eq!(view.month_label(), "February 2027");
        assert_eq!(view.selected(), date(2026, 1, 31));

        view.select_date(date(2027, 2, 3));
        view.go_today(date(2026, 1, 31));
        assert_eq!(view.month(), date(2026, 1, 1));
        assert_eq!(view.selected(), date(2026, 1, 31));
        assert!(!view.show_month(2026, 0));
    }

    #[test]
    fn test_exercise_rows() {
        let mut ledger = AdherenceLedger::new();
        let day = date(2026, 7, 1);
        ledger.record_session(day, 1);
        ledger.set_checkoff_completed(day, "walk", true);

        let mut view = CalendarView::new(day);
        view.select_date(day);
        let rows = view.exercise_rows(&ledger, &catalog());

        assert_eq!((rows[0].sessions, rows[0].target, rows[0].done), (1, 2, false));
        assert!(!rows[0].completed);
        assert!(rows[1].completed && rows[1].done);
        assert_eq!(view.selected_summary(&ledger, &catalog()).exercises_on_target, 1);
    }
}
