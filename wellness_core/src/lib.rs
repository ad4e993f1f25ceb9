#![forbid(unsafe_code)]

//! Core domain model and business logic for the wellness exercise timer.
//!
//! This crate provides:
//! - Domain types (exercises, phases, day records, summaries)
//! - The routine engine (timer state machine for one pass)
//! - The adherence ledger (per-date history and red/yellow/green status)
//! - Calendar month views and CSV export
//! - Persistence (JSON stores) and configuration

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod clock;
pub mod ticker;
pub mod routine;
pub mod ledger;
pub mod calendar;
pub mod export;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_routine, ExerciseUpdate, NewExercise};
pub use config::Config;
pub use store::{JsonFileStore, MemoryStore, Store};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ticker::{TickHandle, TickScheduler, VirtualTicker, TICK_INTERVAL};
pub use routine::Routine;
pub use ledger::{normalize_day, AdherenceLedger};
pub use calendar::CalendarView;
pub use export::export_csv;
pub use engine::{format_clock, AdvanceOutcome, EngineEvent, RoutineEngine};
