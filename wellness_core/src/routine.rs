//! The ordered exercise list and its persistence.

use crate::catalog::{build_default_routine, normalize_routine, ExerciseUpdate};
use crate::store::Store;
use crate::types::Exercise;
use serde_json::Value;

/// Ordered exercises of the routine, written back to its store on change.
pub struct Routine {
    exercises: Vec<Exercise>,
    store: Option<Box<dyn Store>>,
}

impl Routine {
    /// In-memory routine with the given exercises.
    pub fn new(exercises: Vec<Exercise>) -> Self {
        Self {
            exercises,
            store: None,
        }
    }

    /// Load from a store, seeding it with the default routine when empty
    /// or unreadable.
    pub fn load(store: Box<dyn Store>) -> Self {
        let loaded = store.load().and_then(|raw| normalize_routine(&raw));
        let seeded = loaded.is_none();
        let exercises = loaded.unwrap_or_else(build_default_routine);

        let mut routine = Self {
            exercises,
            store: Some(store),
        };
        if seeded {
            tracing::info!("No saved routine, using the default exercises");
            routine.flush();
        } else {
            tracing::info!("Loaded routine with {} exercises", routine.len());
        }
        routine
    }

    pub fn to_raw(&self) -> Value {
        serde_json::to_value(&self.exercises).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    /// Best-effort write to the attached store. Failures only log.
    pub fn flush(&mut self) {
        let raw = self.to_raw();
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.save(&raw) {
                tracing::warn!("Failed to save exercises: {}", e);
            }
        }
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn get(&self, index: usize) -> Option<&Exercise> {
        self.exercises.get(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.exercises.iter().position(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Whether a completed pass should be logged as a timed session.
    pub fn has_timed(&self) -> bool {
        self.exercises.iter().any(Exercise::is_timed)
    }

    pub fn push(&mut self, exercise: Exercise) {
        self.exercises.push(exercise);
        self.flush();
    }

    pub fn remove(&mut self, index: usize) -> Option<Exercise> {
        if index >= self.exercises.len() {
            return None;
        }
        let removed = self.exercises.remove(index);
        self.flush();
        Some(removed)
    }

    /// Move the exercise at `from` so it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        let len = self.exercises.len();
        if from == to || from >= len || to >= len {
            return false;
        }
        let moved = self.exercises.remove(from);
        self.exercises.insert(to, moved);
        self.flush();
        true
    }

    pub fn update(&mut self, index: usize, update: ExerciseUpdate) -> bool {
        let Some(exercise) = self.exercises.get_mut(index) else {
            return false;
        };
        update.apply(exercise);
        self.flush();
        true
    }

    /// Set the countdown of a timed exercise. Values below the minimum are
    /// rejected.
    pub fn set_duration(&mut self, index: usize, secs: u32) -> bool {
        match self.exercises.get_mut(index) {
            Some(exercise) if exercise.is_timed() && secs >= crate::types::MIN_DURATION_SECS => {
                exercise.duration = secs;
                self.flush();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_empty_store_is_seeded_with_defaults() {
        let store = MemoryStore::new();
        let routine = Routine::load(Box::new(store.clone()));
        assert_eq!(routine.len(), 7);
        assert_eq!(store.value().unwrap().as_array().unwrap().len(), 7);
    }

    #[test]
    fn test_saved_list_is_normalized() {
        let store = MemoryStore::with_value(json!([
            {"id": "walk", "name": "Walk", "useTimer": false},
            {"id": "gaze", "name": "Gaze", "duration": 0}
        ]));
        let routine = Routine::load(Box::new(store));
        assert_eq!(routine.len(), 2);
        assert!(!routine.get(0).unwrap().is_timed());
        assert_eq!(routine.get(1).unwrap().duration, 5);
        assert_eq!(routine.position("gaze"), Some(1));
    }

    #[test]
    fn test_saved_empty_list_stays_empty() {
        let routine = Routine::load(Box::new(MemoryStore::with_value(json!([]))));
        assert!(routine.is_empty());
        assert!(!routine.has_timed());
    }

    #[test]
    fn test_move_and_remove_persist() {
        let store = MemoryStore::new();
        let mut routine = Routine::load(Box::new(store.clone()));

        assert!(routine.move_item(0, 2));
        assert_eq!(routine.get(2).unwrap().id, "ex-1");
        assert!(!routine.move_item(0, 99));

        let removed = routine.remove(2).unwrap();
        assert_eq!(removed.id, "ex-1");
        let saved = store.value().unwrap();
        assert_eq!(saved.as_array().unwrap().len(), 6);
        assert!(routine.remove(42).is_none());
    }

    #[test]
    fn test_set_duration_bounds() {
        let mut routine = Routine::new(build_default_routine());
        assert!(!routine.set_duration(0, 4));
        assert!(routine.set_duration(0, 45));
        assert_eq!(routine.get(0).unwrap().duration, 45);
    }
}
