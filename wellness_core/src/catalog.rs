//! Exercise catalog: the built-in routine, exercise normalization, and the
//! input types used to add or edit exercises.

use crate::types::{Exercise, DEFAULT_DURATION_SECS, MIN_DURATION_SECS};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Cached default routine - built once and cloned on demand
static DEFAULT_ROUTINE: Lazy<Vec<Exercise>> = Lazy::new(build_default_routine_internal);

/// Get a reference to the cached default routine
pub fn get_default_routine() -> &'static [Exercise] {
    &DEFAULT_ROUTINE
}

/// Builds the default routine used when no exercise list has been saved yet
pub fn build_default_routine() -> Vec<Exercise> {
    DEFAULT_ROUTINE.clone()
}

fn timed(id: &str, name: &str, description: &str, duration: u32) -> Exercise {
    Exercise {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        use_timer: true,
        duration,
        reps: 1,
        sets: 1,
        image: None,
    }
}

fn build_default_routine_internal() -> Vec<Exercise> {
    vec![
        timed(
            "ex-1",
            "Gaze Stabilization (x1)",
            "Fix your eyes on an X at arm's length and turn your head briskly side to side, \
             then nod up and down. Keep the letter in focus; slow down if dizzy.",
            60,
        ),
        timed(
            "ex-2",
            "X2 Beginners",
            "Two targets 30 cm apart. Lead with the eyes to one target, then turn the head \
             to follow. Alternate between targets, then repeat vertically.",
            60,
        ),
        timed(
            "ex-3",
            "X2 Moving Checkerboard",
            "Move a card in a small arc left to right; the eyes follow the card while the \
             head turns the opposite way.",
            60,
        ),
        timed(
            "ex-4",
            "Following a Moving Target",
            "Sweep a card through a 120-180 degree arc and let head and eyes follow it. \
             30 reps side to side, then 30 reps up and down.",
            90,
        ),
        timed(
            "ex-5",
            "x1 On The Move - Yes & No Walk",
            "Walk 3-5 m toward a target while performing the yes and no head movements. \
             Turn, walk back, repeat five lengths.",
            120,
        ),
        timed(
            "ex-6",
            "Walking with Head Turns - Window Shopping",
            "Walk 5-10 m at a time turning the head left and right as if window shopping. \
             Build up the speed of the turn.",
            150,
        ),
        timed(
            "ex-7",
            "Daily Walk Outdoors",
            "Walk outdoors for ten minutes, turning the head to look at objects on each side.",
            600,
        ),
    ]
}

/// Generate an id for a newly added exercise.
pub fn new_exercise_id() -> String {
    format!("ex-{}", uuid::Uuid::new_v4().simple())
}

// ============================================================================
// Normalization
// ============================================================================

/// Floor a loosely-typed number, falling back to `default` when absent.
fn whole_number(value: Option<&Value>, default: u32) -> u32 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => n.floor().clamp(0.0, u32::MAX as f64) as u32,
        _ => default,
    }
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Normalize one stored exercise. Returns `None` for non-objects.
///
/// Anything other than a literal `false` in `useTimer` means timed.
pub fn normalize_exercise(raw: &Value) -> Option<Exercise> {
    let map = raw.as_object()?;
    let id = text(map, "id")
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_exercise_id);
    let use_timer = !matches!(map.get("useTimer"), Some(Value::Bool(false)));

    Some(Exercise {
        name: text(map, "name").unwrap_or_else(|| id.clone()),
        id,
        description: text(map, "description").unwrap_or_default(),
        use_timer,
        duration: whole_number(map.get("duration"), DEFAULT_DURATION_SECS).max(MIN_DURATION_SECS),
        reps: whole_number(map.get("reps"), 1).max(1),
        sets: whole_number(map.get("sets"), 1).max(1),
        image: text(map, "image"),
    })
}

/// Normalize a stored exercise list.
///
/// Non-object entries are skipped and duplicate ids are replaced so every
/// exercise keeps its own rep counter.
pub fn normalize_routine(raw: &Value) -> Option<Vec<Exercise>> {
    let items = raw.as_array()?;
    let mut seen = HashSet::new();
    let exercises = items
        .iter()
        .filter_map(normalize_exercise)
        .map(|mut exercise| {
            if !seen.insert(exercise.id.clone()) {
                let fresh = new_exercise_id();
                tracing::warn!("Duplicate exercise id {}, reassigned {}", exercise.id, fresh);
                exercise.id = fresh.clone();
                seen.insert(fresh);
            }
            exercise
        })
        .collect();
    Some(exercises)
}

// ============================================================================
// User input
// ============================================================================

/// Input for a new exercise
#[derive(Clone, Debug)]
pub struct NewExercise {
    pub name: String,
    pub description: String,
    pub use_timer: bool,
    pub duration: u32,
    pub reps: u32,
    pub sets: u32,
    pub image: Option<String>,
}

impl Default for NewExercise {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            use_timer: true,
            duration: DEFAULT_DURATION_SECS,
            reps: 1,
            sets: 1,
            image: None,
        }
    }
}

impl NewExercise {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Validate and build the exercise with a fresh id.
    ///
    /// Checkoff exercises always carry reps = sets = 1.
    pub fn into_exercise(self) -> Result<Exercise> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("Please enter an exercise name.".into()));
        }
        Ok(Exercise {
            id: new_exercise_id(),
            name,
            description: self.description,
            use_timer: self.use_timer,
            duration: self.duration.max(MIN_DURATION_SECS),
            reps: if self.use_timer { self.reps.max(1) } else { 1 },
            sets: if self.use_timer { self.sets.max(1) } else { 1 },
            image: self.image,
        })
    }
}

/// Partial edit of an existing exercise; `None` keeps the current value
#[derive(Clone, Debug, Default)]
pub struct ExerciseUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub use_timer: Option<bool>,
    pub duration: Option<u32>,
    pub reps: Option<u32>,
    pub sets: Option<u32>,
    pub image: Option<String>,
}

impl ExerciseUpdate {
    /// Apply the edit. A blank name leaves the old name in place.
    pub fn apply(self, exercise: &mut Exercise) {
        if let Some(name) = self.name.map(|n| n.trim().to_string()) {
            if !name.is_empty() {
                exercise.name = name;
            }
        }
        if let Some(description) = self.description {
            exercise.description = description;
        }
        if let Some(duration) = self.duration {
            exercise.duration = duration.max(MIN_DURATION_SECS);
        }
        if let Some(use_timer) = self.use_timer {
            exercise.use_timer = use_timer;
        }
        if exercise.use_timer {
            exercise.reps = self.reps.unwrap_or(exercise.reps).max(1);
            exercise.sets = self.sets.unwrap_or(exercise.sets).max(1);
        } else {
            exercise.reps = 1;
            exercise.sets = 1;
        }
        if let Some(image) = self.image {
            exercise.image = Some(image);
        }
    }
}
