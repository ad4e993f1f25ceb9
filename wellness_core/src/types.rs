//! Core domain types for the wellness timer.
//!
//! This module defines the fundamental types shared by the routine engine
//! and the adherence ledger:
//! - Exercises (timed or checkoff)
//! - Timer phases
//! - Day records and their derived summaries

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Shortest countdown an exercise may carry.
pub const MIN_DURATION_SECS: u32 = 5;

/// Countdown used when stored data carries no usable duration.
pub const DEFAULT_DURATION_SECS: u32 = 60;

// ============================================================================
// Exercise
// ============================================================================

/// One entry of the routine.
///
/// `reps`, `sets` and `duration` are always normalized (>= 1, >= 1, >= 5)
/// before an `Exercise` is constructed from stored or user data.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub description: String,
    pub use_timer: bool,
    pub duration: u32,
    pub reps: u32,
    pub sets: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Exercise {
    /// True for countdown exercises, false for daily checkoff tasks.
    pub fn is_timed(&self) -> bool {
        self.use_timer
    }

    /// Timer cycles required within one pass.
    pub fn target_reps(&self) -> u32 {
        self.reps.max(1)
    }

    /// Logged sessions required per day for the exercise to be on target.
    ///
    /// Checkoff exercises are complete-once-per-day, so their target is 1.
    pub fn daily_target(&self) -> u32 {
        if self.is_timed() {
            self.sets.max(1)
        } else {
            1
        }
    }
}

// ============================================================================
// Timer phase
// ============================================================================

/// Phase of the slot currently loaded into the routine engine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    LeadIn,
    Running,
    Done,
    Checkoff,
    Stopped,
}

impl Phase {
    /// Whether a countdown is ticking in this phase.
    pub fn is_counting(self) -> bool {
        matches!(self, Phase::LeadIn | Phase::Running)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::LeadIn => "get ready",
            Phase::Running => "running",
            Phase::Done => "done",
            Phase::Checkoff => "checkoff",
            Phase::Stopped => "ready",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Day records
// ============================================================================

/// Per-exercise completion flag for checkoff exercises.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseEntry {
    pub completed: bool,
}

/// Everything logged for one calendar date.
///
/// `timed_sessions` is a single routine-level counter shared by every timed
/// exercise on that date. Deserialization always goes through
/// [`crate::ledger::normalize_day`], so any JSON value yields a valid record.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "crate::ledger::StoredDay", from = "serde_json::Value")]
pub struct DayRecord {
    pub timed_sessions: u32,
    pub exercises: BTreeMap<String, ExerciseEntry>,
}

impl DayRecord {
    /// Completion flag for a checkoff exercise; unknown ids are incomplete.
    pub fn is_completed(&self, exercise_id: &str) -> bool {
        self.exercises
            .get(exercise_id)
            .map(|e| e.completed)
            .unwrap_or(false)
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Aggregate adherence numbers for one date against the current routine.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct DateSummary {
    pub date: Option<NaiveDate>,
    pub total_exercises: usize,
    pub exercises_on_target: usize,
    pub timed_sessions_logged: u32,
    pub total_exercise_sessions: u32,
    pub any_logged: bool,
}

impl DateSummary {
    /// Rounded share of exercises on target, 0..=100.
    pub fn percent_on_target(&self) -> u32 {
        if self.total_exercises == 0 {
            return 0;
        }
        let ratio = self.exercises_on_target as f64 / self.total_exercises as f64;
        (ratio * 100.0).round() as u32
    }
}

/// Calendar colouring for a date.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    None,
    Red,
    Yellow,
    Green,
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DayStatus::None => "none",
            DayStatus::Red => "red",
            DayStatus::Yellow => "yellow",
            DayStatus::Green => "green",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(use_timer: bool, reps: u32, sets: u32) -> Exercise {
        Exercise {
            id: "ex".into(),
            name: "Exercise".into(),
            description: String::new(),
            use_timer,
            duration: 30,
            reps,
            sets,
            image: None,
        }
    }

    #[test]
    fn test_checkoff_daily_target_is_always_one() {
        assert_eq!(exercise(false, 4, 7).daily_target(), 1);
        assert_eq!(exercise(true, 4, 7).daily_target(), 7);
    }

    #[test]
    fn test_exercise_serializes_camel_case() {
        let json = serde_json::to_value(exercise(true, 2, 3)).unwrap();
        assert_eq!(json["useTimer"], true);
        assert!(json.get("image").is_none());
    }

    #[test]
    fn test_percent_on_target_rounds() {
        let summary = DateSummary {
            total_exercises: 3,
            exercises_on_target: 2,
            ..Default::default()
        };
        assert_eq!(summary.percent_on_target(), 67);
        assert_eq!(DateSummary::default().percent_on_target(), 0);
    }
}
