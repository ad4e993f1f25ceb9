//! Routine engine: walks one pass through the routine.
//!
//! Each slot is either a timed exercise driven by a countdown or a checkoff
//! task driven by a toggle:
//!
//! ```text
//! Idle -> Stopped -> [LeadIn] -> Running -> Done -> (next slot | complete)
//!            ^___________ stop ______|
//! Idle -> Checkoff -> toggle -> Checkoff -> (next slot | complete)
//! ```
//!
//! Invalid intents (wrong phase, out-of-range index, double start) are
//! silently ignored. Presentation code observes the engine through
//! [`RoutineEngine::subscribe`].

use crate::catalog::{ExerciseUpdate, NewExercise};
use crate::clock::Clock;
use crate::ledger::AdherenceLedger;
use crate::routine::Routine;
use crate::ticker::{TickHandle, TickScheduler, VirtualTicker, TICK_INTERVAL};
use crate::types::{DateSummary, DayStatus, Exercise, Phase};
use crate::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;

/// Lead-in used when no preference has been configured.
pub const DEFAULT_LEAD_IN_SECS: u32 = 5;

/// Notifications delivered to subscribers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    PhaseChanged {
        index: Option<usize>,
        phase: Phase,
    },
    Tick {
        phase: Phase,
        remaining: u32,
        total: u32,
    },
    RepCompleted {
        exercise_id: String,
        reps: u32,
        target: u32,
    },
    CheckoffToggled {
        exercise_id: String,
        completed: bool,
    },
    PassCompleted {
        date: NaiveDate,
        session_logged: bool,
    },
}

/// Result of an `advance` intent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Target not met, countdown running, or nothing loaded.
    NotReady,
    /// Next slot loaded at this index.
    Moved(usize),
    /// Every target met on the last slot.
    RoutineComplete { session_logged: bool },
}

/// Transient state of the live walkthrough. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunState {
    pub current_index: Option<usize>,
    pub phase: Phase,
    pub time_remaining: u32,
    pub total_time: u32,
    pub reps_by_exercise: HashMap<String, u32>,
    pub pass_complete: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            current_index: None,
            phase: Phase::Idle,
            time_remaining: 0,
            total_time: 0,
            reps_by_exercise: HashMap::new(),
            pass_complete: false,
        }
    }
}

type Observer = Box<dyn FnMut(&EngineEvent)>;

/// Format seconds as `m:ss`.
pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub struct RoutineEngine {
    routine: Routine,
    ledger: AdherenceLedger,
    clock: Box<dyn Clock>,
    ticker: Box<dyn TickScheduler>,
    lead_in_secs: u32,
    run: RunState,
    active_tick: Option<TickHandle>,
    observers: Vec<Observer>,
}

impl RoutineEngine {
    pub fn new(
        routine: Routine,
        ledger: AdherenceLedger,
        clock: Box<dyn Clock>,
        ticker: Box<dyn TickScheduler>,
    ) -> Self {
        let mut engine = Self {
            routine,
            ledger,
            clock,
            ticker,
            lead_in_secs: DEFAULT_LEAD_IN_SECS,
            run: RunState::default(),
            active_tick: None,
            observers: Vec::new(),
        };
        engine.reset_reps();
        engine
    }

    pub fn with_lead_in(mut self, secs: u32) -> Self {
        self.lead_in_secs = secs;
        self
    }

    /// Register a presentation callback.
    pub fn subscribe(&mut self, observer: impl FnMut(&EngineEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: EngineEvent) {
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.run.phase
    }

    pub fn current_index(&self) -> Option<usize> {
        self.run.current_index
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.run.current_index.and_then(|i| self.routine.get(i))
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn time_remaining(&self) -> u32 {
        self.run.time_remaining
    }

    pub fn total_time(&self) -> u32 {
        self.run.total_time
    }

    pub fn lead_in_secs(&self) -> u32 {
        self.lead_in_secs
    }

    pub fn exercises(&self) -> &[Exercise] {
        self.routine.exercises()
    }

    pub fn ledger(&self) -> &AdherenceLedger {
        &self.ledger
    }

    /// Direct ledger access for calendar edits on arbitrary dates.
    pub fn ledger_mut(&mut self) -> &mut AdherenceLedger {
        &mut self.ledger
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Handle of the live countdown tick, if any.
    pub fn pending_tick(&self) -> Option<TickHandle> {
        self.active_tick
    }

    pub fn is_counting(&self) -> bool {
        self.run.phase.is_counting()
    }

    pub fn is_pass_complete(&self) -> bool {
        self.run.pass_complete
    }

    /// Completed timer cycles for an exercise in the current pass.
    pub fn reps_for(&self, exercise_id: &str) -> u32 {
        self.run
            .reps_by_exercise
            .get(exercise_id)
            .copied()
            .unwrap_or(0)
    }

    /// Today's completion of the loaded checkoff exercise, read from the ledger.
    pub fn checkoff_completed(&self) -> bool {
        let today = self.today();
        self.current_exercise()
            .filter(|ex| !ex.is_timed())
            .map(|ex| self.ledger.is_checkoff_completed(today, &ex.id))
            .unwrap_or(false)
    }

    /// Slot index of an exercise by id.
    pub fn position(&self, exercise_id: &str) -> Option<usize> {
        self.routine.position(exercise_id)
    }

    fn target_met(&self, exercise: &Exercise, today: NaiveDate) -> bool {
        if exercise.is_timed() {
            self.reps_for(&exercise.id) >= exercise.target_reps()
        } else {
            self.ledger.is_checkoff_completed(today, &exercise.id)
        }
    }

    pub fn is_current_target_met(&self) -> bool {
        let today = self.today();
        self.current_exercise()
            .map(|ex| self.target_met(ex, today))
            .unwrap_or(false)
    }

    /// Whether every exercise in the routine has met its target this pass.
    pub fn is_pass_target_met(&self) -> bool {
        let today = self.today();
        self.routine
            .exercises()
            .iter()
            .all(|ex| self.target_met(ex, today))
    }

    /// Text for the timer face.
    pub fn timer_display(&self) -> String {
        match self.run.phase {
            Phase::Idle => String::new(),
            Phase::LeadIn => self.run.time_remaining.to_string(),
            Phase::Checkoff if self.checkoff_completed() => "Task Complete".into(),
            Phase::Checkoff => "Task Incomplete".into(),
            _ => format_clock(self.run.time_remaining),
        }
    }

    /// Remaining share of the countdown, 0.0..=1.0.
    pub fn progress_ratio(&self) -> f64 {
        if self.run.phase == Phase::Checkoff || self.run.total_time == 0 {
            return 1.0;
        }
        f64::from(self.run.time_remaining) / f64::from(self.run.total_time)
    }

    pub fn summarize(&self, date: NaiveDate) -> DateSummary {
        self.ledger.summarize(date, self.routine.exercises())
    }

    pub fn status(&self, date: NaiveDate) -> DayStatus {
        self.ledger
            .status(date, self.today(), self.routine.exercises())
    }

    // ── Internal transitions ─────────────────────────────────────────

    fn set_phase(&mut self, phase: Phase) {
        self.run.phase = phase;
        tracing::debug!("Phase -> {:?} at slot {:?}", phase, self.run.current_index);
        self.emit(EngineEvent::PhaseChanged {
            index: self.run.current_index,
            phase,
        });
    }

    fn cancel_tick(&mut self) {
        if let Some(handle) = self.active_tick.take() {
            self.ticker.cancel(handle);
        }
    }

    fn schedule_tick(&mut self) {
        self.cancel_tick();
        self.active_tick = Some(self.ticker.schedule_tick(TICK_INTERVAL));
    }

    fn reset_display(&mut self, secs: u32) {
        self.run.time_remaining = secs;
        self.run.total_time = secs;
    }

    fn reset_reps(&mut self) {
        self.run.reps_by_exercise = self
            .routine
            .exercises()
            .iter()
            .map(|ex| (ex.id.clone(), 0))
            .collect();
    }

    fn begin_countdown(&mut self) {
        let Some(duration) = self
            .current_exercise()
            .filter(|ex| ex.is_timed())
            .map(|ex| ex.duration)
        else {
            self.cancel_tick();
            return;
        };
        self.reset_display(duration);
        self.set_phase(Phase::Running);
        self.schedule_tick();
    }

    fn complete_rep(&mut self) {
        let Some((id, target)) = self
            .current_exercise()
            .map(|ex| (ex.id.clone(), ex.target_reps()))
        else {
            return;
        };
        let reps = self.reps_for(&id) + 1;
        self.run.reps_by_exercise.insert(id.clone(), reps);
        tracing::debug!("Rep {}/{} completed for {}", reps, target, id);
        self.emit(EngineEvent::RepCompleted {
            exercise_id: id,
            reps,
            target,
        });
    }

    // ── Intents ──────────────────────────────────────────────────────

    /// Start a fresh pass at the first slot.
    pub fn begin_pass(&mut self) {
        self.cancel_tick();
        self.reset_reps();
        self.run.pass_complete = false;
        if !self.load_slot(0) {
            self.go_idle();
        }
    }

    /// Load the exercise at `index`. Out-of-range indices are ignored.
    pub fn load_slot(&mut self, index: usize) -> bool {
        let Some(exercise) = self.routine.get(index).cloned() else {
            return false;
        };
        self.cancel_tick();
        self.run.current_index = Some(index);

        if exercise.is_timed() {
            self.reset_display(exercise.duration);
            self.set_phase(Phase::Stopped);
        } else {
            self.reset_display(0);
            self.set_phase(Phase::Checkoff);
        }
        true
    }

    /// Start the countdown, or toggle completion for a checkoff slot.
    pub fn start(&mut self) {
        let Some(timed) = self.current_exercise().map(Exercise::is_timed) else {
            return;
        };
        if !timed {
            self.toggle_checkoff();
            return;
        }
        if !matches!(self.run.phase, Phase::Stopped | Phase::Done) {
            return;
        }

        self.cancel_tick();
        if self.lead_in_secs > 0 {
            self.reset_display(self.lead_in_secs);
            self.set_phase(Phase::LeadIn);
            self.schedule_tick();
        } else {
            self.begin_countdown();
        }
    }

    /// Deliver one tick. Returns false for stale or unknown handles.
    pub fn on_tick(&mut self, handle: TickHandle) -> bool {
        if self.active_tick != Some(handle) {
            return false;
        }

        match self.run.phase {
            Phase::LeadIn => {
                self.run.time_remaining = self.run.time_remaining.saturating_sub(1);
                self.emit(EngineEvent::Tick {
                    phase: Phase::LeadIn,
                    remaining: self.run.time_remaining,
                    total: self.run.total_time,
                });
                if self.run.time_remaining == 0 {
                    self.cancel_tick();
                    self.begin_countdown();
                }
            }
            Phase::Running => {
                self.run.time_remaining = self.run.time_remaining.saturating_sub(1);
                self.emit(EngineEvent::Tick {
                    phase: Phase::Running,
                    remaining: self.run.time_remaining,
                    total: self.run.total_time,
                });
                if self.run.time_remaining == 0 {
                    self.cancel_tick();
                    self.complete_rep();
                    self.set_phase(Phase::Done);
                }
            }
            _ => self.cancel_tick(),
        }
        true
    }

    /// Deliver every tick that falls due on a virtual ticker.
    ///
    /// Returns how many ticks the engine accepted.
    pub fn pump(&mut self, ticker: &VirtualTicker, elapsed: Duration) -> usize {
        ticker
            .advance(elapsed)
            .into_iter()
            .filter(|handle| self.on_tick(*handle))
            .count()
    }

    /// Cancel the countdown and reset the slot.
    pub fn stop(&mut self) {
        let Some(exercise) = self.current_exercise().cloned() else {
            return;
        };
        self.cancel_tick();
        if exercise.is_timed() {
            self.reset_display(exercise.duration);
            self.set_phase(Phase::Stopped);
        } else {
            self.set_phase(Phase::Checkoff);
        }
    }

    /// Move on once the current target is met; on the last slot, complete
    /// the pass when every target is met.
    ///
    /// Returns `NotReady` while a countdown runs; call [`stop`](Self::stop) first.
    pub fn advance(&mut self) -> AdvanceOutcome {
        let Some(index) = self.run.current_index else {
            return AdvanceOutcome::NotReady;
        };
        if self.is_counting() || self.run.pass_complete || !self.is_current_target_met() {
            return AdvanceOutcome::NotReady;
        }

        if index + 1 < self.routine.len() {
            self.load_slot(index + 1);
            return AdvanceOutcome::Moved(index + 1);
        }
        if !self.is_pass_target_met() {
            return AdvanceOutcome::NotReady;
        }

        self.cancel_tick();
        let date = self.today();
        let session_logged = self.routine.has_timed();
        if session_logged {
            self.ledger.record_session(date, 1);
        }
        self.run.pass_complete = true;
        tracing::info!("Routine pass completed on {} (logged: {})", date, session_logged);
        self.emit(EngineEvent::PassCompleted {
            date,
            session_logged,
        });
        AdvanceOutcome::RoutineComplete { session_logged }
    }

    /// Flip today's completion for the loaded checkoff exercise.
    ///
    /// Returns the new flag, or `None` when no checkoff slot is loaded.
    pub fn toggle_checkoff(&mut self) -> Option<bool> {
        if self.run.phase != Phase::Checkoff {
            return None;
        }
        let id = self
            .current_exercise()
            .filter(|ex| !ex.is_timed())
            .map(|ex| ex.id.clone())?;

        let today = self.today();
        let completed = self.ledger.toggle_checkoff(today, &id);
        self.emit(EngineEvent::CheckoffToggled {
            exercise_id: id,
            completed,
        });
        Some(completed)
    }

    /// Leave the walkthrough and clear pass progress.
    pub fn go_idle(&mut self) {
        self.cancel_tick();
        self.run.current_index = None;
        self.run.pass_complete = false;
        self.reset_display(0);
        self.reset_reps();
        self.set_phase(Phase::Idle);
    }

    pub fn set_lead_in(&mut self, secs: u32) {
        self.lead_in_secs = secs;
    }

    /// Change the loaded timed exercise's duration (>= 5 s).
    pub fn set_duration(&mut self, secs: u32) -> bool {
        let Some(index) = self.run.current_index else {
            return false;
        };
        if !self.routine.set_duration(index, secs) {
            return false;
        }
        if matches!(self.run.phase, Phase::Stopped | Phase::Done) {
            self.reset_display(secs);
        }
        true
    }

    // ── Catalog edits ────────────────────────────────────────────────

    /// Append an exercise; an empty name is rejected.
    pub fn add_exercise(&mut self, new: NewExercise) -> Result<String> {
        let exercise = new.into_exercise()?;
        let id = exercise.id.clone();
        self.run.reps_by_exercise.insert(id.clone(), 0);
        tracing::info!("Added exercise {} ({})", exercise.name, id);
        self.routine.push(exercise);
        Ok(id)
    }

    /// Edit an exercise; the loaded slot is reloaded when it is the target.
    pub fn update_exercise(&mut self, index: usize, update: ExerciseUpdate) -> bool {
        if !self.routine.update(index, update) {
            return false;
        }
        if self.run.current_index == Some(index) {
            self.load_slot(index);
        }
        true
    }

    /// Remove an exercise, keeping the loaded slot on the same logical
    /// exercise where possible.
    pub fn remove_exercise(&mut self, index: usize) -> Option<Exercise> {
        let removed = self.routine.remove(index)?;
        self.run.reps_by_exercise.remove(&removed.id);
        tracing::info!("Removed exercise {} ({})", removed.name, removed.id);

        match self.run.current_index {
            Some(current) if current == index => {
                if !self.load_slot(index) {
                    self.go_idle();
                }
            }
            Some(current) if current > index => {
                self.run.current_index = Some(current - 1);
            }
            _ => {}
        }
        Some(removed)
    }

    /// Reorder; the loaded slot follows its exercise.
    pub fn move_exercise(&mut self, from: usize, to: usize) -> bool {
        if !self.routine.move_item(from, to) {
            return false;
        }
        if let Some(current) = self.run.current_index {
            let adjusted = if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            };
            self.run.current_index = Some(adjusted);
        }
        true
    }
}
