//! Adherence ledger: per-date completion history.
//!
//! The ledger owns every persisted [`DayRecord`]. Raw calendar JSON passes
//! through [`normalize_day`] on the way in, which accepts the current
//! `{meta, exercises}` shape as well as the older per-exercise shapes:
//!
//! ```text
//! current: { "meta": { "timedSessions": 2 }, "exercises": { "ex-7": { "completed": true } } }
//! legacy:  { "ex-1": 3, "ex-7": { "reps": 1, "sessions": 0 } }
//! ```

use crate::store::Store;
use crate::types::{DateSummary, DayRecord, DayStatus, Exercise, ExerciseEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Calendar key format for stored dates.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

// ============================================================================
// Normalization
// ============================================================================

/// The two raw shapes a stored day can take.
enum RawDay<'a> {
    Current {
        meta: Option<&'a Value>,
        exercises: Option<&'a Map<String, Value>>,
    },
    Legacy(&'a Map<String, Value>),
    Invalid,
}

impl<'a> RawDay<'a> {
    fn classify(raw: &'a Value) -> Self {
        let Some(map) = raw.as_object() else {
            return RawDay::Invalid;
        };
        if map.contains_key("meta") || map.contains_key("exercises") {
            RawDay::Current {
                meta: map.get("meta"),
                exercises: map.get("exercises").and_then(Value::as_object),
            }
        } else {
            RawDay::Legacy(map)
        }
    }
}

/// Floor a loosely-typed count to a non-negative integer.
///
/// Numbers and numeric strings are accepted; anything else counts as zero.
fn count_of(value: Option<&Value>) -> u32 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => n.floor().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// `a ?? b`: the first field that is present and not null.
fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

/// Normalize one checkoff entry.
///
/// An explicit boolean `completed` wins; otherwise any positive `reps` or
/// `sessions` marks the entry completed.
pub fn normalize_entry(raw: &Value) -> ExerciseEntry {
    let Some(map) = raw.as_object() else {
        return ExerciseEntry::default();
    };
    if let Some(Value::Bool(completed)) = map.get("completed") {
        return ExerciseEntry {
            completed: *completed,
        };
    }
    ExerciseEntry {
        completed: count_of(map.get("reps")) > 0 || count_of(map.get("sessions")) > 0,
    }
}

/// Normalize one raw day into a valid [`DayRecord`]. Total and idempotent.
pub fn normalize_day(raw: &Value) -> DayRecord {
    match RawDay::classify(raw) {
        RawDay::Invalid => DayRecord::default(),
        RawDay::Current { meta, exercises } => {
            let timed_sessions = meta
                .and_then(Value::as_object)
                .map(|m| count_of(first_present(m, &["timedSessions", "sessions"])))
                .unwrap_or(0);
            let exercises = exercises
                .map(|map| {
                    map.iter()
                        .map(|(id, entry)| (id.clone(), normalize_entry(entry)))
                        .collect()
                })
                .unwrap_or_default();
            DayRecord {
                timed_sessions,
                exercises,
            }
        }
        RawDay::Legacy(map) => {
            let mut max_sessions = 0;
            let mut exercises = BTreeMap::new();
            for (id, entry) in map {
                let completed = match entry {
                    Value::Number(_) => {
                        max_sessions = max_sessions.max(count_of(Some(entry)));
                        false
                    }
                    Value::Object(fields) => {
                        let reps = count_of(fields.get("reps"));
                        let sessions = count_of(fields.get("sessions"));
                        max_sessions = max_sessions.max(sessions);
                        reps > 0 || sessions > 0
                    }
                    _ => false,
                };
                exercises.insert(id.clone(), ExerciseEntry { completed });
            }
            DayRecord {
                timed_sessions: max_sessions,
                exercises,
            }
        }
    }
}

/// Normalize a whole calendar document. Keys that are not dates are dropped.
pub fn normalize_calendar(raw: &Value) -> BTreeMap<NaiveDate, DayRecord> {
    let Some(map) = raw.as_object() else {
        if !raw.is_null() {
            tracing::warn!("Calendar data is not an object, starting empty");
        }
        return BTreeMap::new();
    };

    map.iter()
        .filter_map(|(key, day)| match parse_date_key(key) {
            Some(date) => Some((date, normalize_day(day))),
            None => {
                tracing::warn!("Dropping calendar entry with invalid date key {:?}", key);
                None
            }
        })
        .collect()
}

/// On-disk shape of a day record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredDay {
    meta: StoredMeta,
    exercises: BTreeMap<String, ExerciseEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMeta {
    timed_sessions: u32,
}

impl From<DayRecord> for StoredDay {
    fn from(day: DayRecord) -> Self {
        StoredDay {
            meta: StoredMeta {
                timed_sessions: day.timed_sessions,
            },
            exercises: day.exercises,
        }
    }
}

impl From<Value> for DayRecord {
    fn from(raw: Value) -> Self {
        normalize_day(&raw)
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Date-keyed completion history with optional best-effort persistence.
pub struct AdherenceLedger {
    days: BTreeMap<NaiveDate, DayRecord>,
    store: Option<Box<dyn Store>>,
}

impl Default for AdherenceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AdherenceLedger {
    /// Empty, in-memory ledger.
    pub fn new() -> Self {
        Self {
            days: BTreeMap::new(),
            store: None,
        }
    }

    /// Build from a raw calendar document without attaching a store.
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            days: normalize_calendar(raw),
            store: None,
        }
    }

    /// Load from a store; every later mutation is written back to it.
    pub fn load(store: Box<dyn Store>) -> Self {
        let days = store
            .load()
            .map(|raw| normalize_calendar(&raw))
            .unwrap_or_default();
        tracing::info!("Loaded calendar with {} recorded dates", days.len());
        Self {
            days,
            store: Some(store),
        }
    }

    /// Serialize to the stored calendar shape.
    pub fn to_raw(&self) -> Value {
        let map: Map<String, Value> = self
            .days
            .iter()
            .map(|(date, day)| {
                let value = serde_json::to_value(StoredDay::from(day.clone()))
                    .unwrap_or(Value::Null);
                (date_key(*date), value)
            })
            .collect();
        Value::Object(map)
    }

    /// Best-effort write to the attached store. Failures only log.
    pub fn flush(&mut self) {
        let raw = self.to_raw();
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.save(&raw) {
                tracing::warn!("Failed to save calendar: {}", e);
            }
        }
    }

    /// Record for a date, created on first access.
    pub fn get_day(&mut self, date: NaiveDate) -> &DayRecord {
        self.days.entry(date).or_default()
    }

    /// Record for a date without creating it.
    pub fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.days.get(&date)
    }

    /// Dates with a record, oldest first.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Add completed passes to a date. Negative deltas add nothing.
    ///
    /// Returns the new count.
    pub fn record_session(&mut self, date: NaiveDate, delta: i64) -> u32 {
        let add = u32::try_from(delta.max(0)).unwrap_or(u32::MAX);
        let day = self.days.entry(date).or_default();
        day.timed_sessions = day.timed_sessions.saturating_add(add);
        let count = day.timed_sessions;
        tracing::info!("Recorded {} session(s) on {}, total {}", add, date, count);
        self.flush();
        count
    }

    pub fn set_checkoff_completed(&mut self, date: NaiveDate, exercise_id: &str, completed: bool) {
        self.days
            .entry(date)
            .or_default()
            .exercises
            .insert(exercise_id.to_string(), ExerciseEntry { completed });
        tracing::debug!("Set {} completed={} on {}", exercise_id, completed, date);
        self.flush();
    }

    pub fn is_checkoff_completed(&self, date: NaiveDate, exercise_id: &str) -> bool {
        self.day(date)
            .map(|d| d.is_completed(exercise_id))
            .unwrap_or(false)
    }

    /// Flip a checkoff flag and return the new value.
    pub fn toggle_checkoff(&mut self, date: NaiveDate, exercise_id: &str) -> bool {
        let completed = !self.is_checkoff_completed(date, exercise_id);
        self.set_checkoff_completed(date, exercise_id, completed);
        completed
    }

    /// Sessions counted for one exercise on a date.
    ///
    /// Timed exercises all report the date's shared pass counter.
    pub fn sessions_for_date(&self, date: NaiveDate, exercise: &Exercise) -> u32 {
        let Some(day) = self.day(date) else {
            return 0;
        };
        if exercise.is_timed() {
            day.timed_sessions
        } else {
            u32::from(day.is_completed(&exercise.id))
        }
    }

    pub fn summarize(&self, date: NaiveDate, catalog: &[Exercise]) -> DateSummary {
        let timed_sessions = self.day(date).map(|d| d.timed_sessions).unwrap_or(0);
        let mut summary = DateSummary {
            date: Some(date),
            total_exercises: catalog.len(),
            timed_sessions_logged: timed_sessions,
            any_logged: timed_sessions > 0,
            ..Default::default()
        };

        for exercise in catalog {
            let sessions = self.sessions_for_date(date, exercise);
            summary.total_exercise_sessions += sessions;
            if sessions > 0 {
                summary.any_logged = true;
            }
            if sessions >= exercise.daily_target() {
                summary.exercises_on_target += 1;
            }
        }

        summary
    }

    /// Calendar colour for a date. Dates after `today` are always `None`.
    pub fn status(&self, date: NaiveDate, today: NaiveDate, catalog: &[Exercise]) -> DayStatus {
        if date > today || catalog.is_empty() {
            return DayStatus::None;
        }
        let summary = self.summarize(date, catalog);
        if !summary.any_logged {
            DayStatus::Red
        } else if summary.exercises_on_target >= summary.total_exercises {
            DayStatus::Green
        } else {
            DayStatus::Yellow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Result;
    use proptest::prelude::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        parse_date_key(s).unwrap()
    }

    fn timed(id: &str, sets: u32) -> Exercise {
        Exercise {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            use_timer: true,
            duration: 30,
            reps: 1,
            sets,
            image: None,
        }
    }

    fn checkoff(id: &str) -> Exercise {
        Exercise {
            use_timer: false,
            ..timed(id, 1)
        }
    }

    #[test]
    fn test_normalize_non_objects_to_default() {
        for raw in [json!(null), json!(3), json!("x"), json!([1, 2]), json!(true)] {
            assert_eq!(normalize_day(&raw), DayRecord::default());
        }
    }

    #[test]
    fn test_normalize_current_shape() {
        let day = normalize_day(&json!({
            "meta": {"timedSessions": 2.7},
            "exercises": {
                "a": {"completed": true},
                "b": {"completed": false, "reps": 4},
                "c": {"reps": 1},
                "d": "junk"
            }
        }));
        assert_eq!(day.timed_sessions, 2);
        assert!(day.is_completed("a"));
        assert!(!day.is_completed("b"));
        assert!(day.is_completed("c"));
        assert!(!day.is_completed("d"));
    }

    #[test]
    fn test_normalize_meta_falls_back_to_sessions() {
        let day = normalize_day(&json!({"meta": {"timedSessions": null, "sessions": 3}}));
        assert_eq!(day.timed_sessions, 3);
        let day = normalize_day(&json!({"meta": {"timedSessions": -4}}));
        assert_eq!(day.timed_sessions, 0);
    }

    #[test]
    fn test_normalize_legacy_shape() {
        let day = normalize_day(&json!({
            "ex-1": 3,
            "ex-2": {"reps": 2, "sessions": 0},
            "ex-3": {"reps": 0, "sessions": 5},
            "ex-4": {"reps": 0},
            "ex-5": null
        }));
        assert_eq!(day.timed_sessions, 5);
        assert!(!day.is_completed("ex-1"));
        assert!(day.is_completed("ex-2"));
        assert!(day.is_completed("ex-3"));
        assert!(!day.is_completed("ex-4"));
        assert!(!day.is_completed("ex-5"));
        assert_eq!(day.exercises.len(), 5);
    }

    #[test]
    fn test_day_record_deserializes_through_normalizer() {
        let day: DayRecord = serde_json::from_str(r#"{"ex-1": {"sessions": 2}}"#).unwrap();
        assert_eq!(day.timed_sessions, 2);
        assert!(day.is_completed("ex-1"));

        let stored = serde_json::to_value(&day).unwrap();
        assert_eq!(stored["meta"]["timedSessions"], 2);
        assert_eq!(stored["exercises"]["ex-1"]["completed"], true);
    }

    #[test]
    fn test_invalid_date_keys_dropped() {
        let ledger = AdherenceLedger::from_raw(&json!({
            "2026-03-01": {"meta": {"timedSessions": 1}},
            "yesterday": {"meta": {"timedSessions": 9}}
        }));
        assert_eq!(ledger.dates().collect::<Vec<_>>(), vec![date("2026-03-01")]);
    }

    #[test]
    fn test_get_day_creates_default() {
        let mut ledger = AdherenceLedger::new();
        assert!(ledger.day(date("2026-01-01")).is_none());
        assert_eq!(ledger.get_day(date("2026-01-01")), &DayRecord::default());
        assert!(ledger.day(date("2026-01-01")).is_some());
    }

    #[test]
    fn test_negative_delta_never_decreases() {
        let mut ledger = AdherenceLedger::new();
        let d = date("2026-02-02");
        assert_eq!(ledger.record_session(d, -5), 0);
        ledger.record_session(d, 2);
        assert_eq!(ledger.record_session(d, -5), 2);
    }

    #[test]
    fn test_checkoff_independent_of_timed_sessions() {
        let mut ledger = AdherenceLedger::new();
        let d = date("2026-02-02");
        ledger.set_checkoff_completed(d, "walk", true);
        assert_eq!(ledger.get_day(d).timed_sessions, 0);
        assert!(!ledger.toggle_checkoff(d, "walk"));
        assert!(!ledger.is_checkoff_completed(d, "walk"));
    }

    #[test]
    fn test_shared_counter_applies_to_every_timed_exercise() {
        let mut ledger = AdherenceLedger::new();
        let d = date("2026-04-10");
        let catalog = vec![timed("a", 1), timed("b", 2)];
        ledger.record_session(d, 1);

        assert_eq!(ledger.sessions_for_date(d, &catalog[0]), 1);
        assert_eq!(ledger.sessions_for_date(d, &catalog[1]), 1);

        let summary = ledger.summarize(d, &catalog);
        assert_eq!(summary.total_exercises, 2);
        assert_eq!(summary.exercises_on_target, 1);
        assert_eq!(summary.total_exercise_sessions, 2);
        assert!(summary.any_logged);
        assert_eq!(ledger.status(d, d, &catalog), DayStatus::Yellow);

        ledger.record_session(d, 1);
        assert_eq!(ledger.status(d, d, &catalog), DayStatus::Green);
    }

    #[test]
    fn test_status_rules() {
        let mut ledger = AdherenceLedger::new();
        let today = date("2026-05-15");
        let catalog = vec![timed("a", 1), checkoff("walk")];

        assert_eq!(ledger.status(today, today, &[]), DayStatus::None);
        assert_eq!(ledger.status(today, today, &catalog), DayStatus::Red);

        ledger.set_checkoff_completed(today, "walk", true);
        assert_eq!(ledger.status(today, today, &catalog), DayStatus::Yellow);

        ledger.record_session(today, 1);
        assert_eq!(ledger.status(today, today, &catalog), DayStatus::Green);

        let tomorrow = today.succ_opt().unwrap();
        ledger.record_session(tomorrow, 3);
        assert_eq!(ledger.status(tomorrow, today, &catalog), DayStatus::None);
    }

    #[test]
    fn test_mutations_flush_to_store() {
        let store = MemoryStore::new();
        let mut ledger = AdherenceLedger::load(Box::new(store.clone()));
        ledger.record_session(date("2026-01-05"), 1);

        let saved = store.value().unwrap();
        assert_eq!(saved["2026-01-05"]["meta"]["timedSessions"], 1);

        let reloaded = AdherenceLedger::load(Box::new(store));
        assert_eq!(reloaded.day(date("2026-01-05")).unwrap().timed_sessions, 1);
    }

    struct BrokenStore;

    impl Store for BrokenStore {
        fn load(&self) -> Option<Value> {
            None
        }

        fn save(&mut self, _raw: &Value) -> Result<()> {
            Err(crate::Error::Other("disk full".into()))
        }
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let mut ledger = AdherenceLedger::load(Box::new(BrokenStore));
        let d = date("2026-01-05");
        assert_eq!(ledger.record_session(d, 1), 1);
        ledger.set_checkoff_completed(d, "walk", true);
        assert!(ledger.is_checkoff_completed(d, "walk"));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            (-1.0e6f64..1.0e6).prop_map(|n| json!(n)),
            "[a-z0-9]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            let keys = prop_oneof![
                Just("meta".to_string()),
                Just("exercises".to_string()),
                Just("timedSessions".to_string()),
                Just("sessions".to_string()),
                Just("reps".to_string()),
                Just("completed".to_string()),
                "ex-[0-9]".prop_map(String::from),
            ];
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map(keys, inner, 0..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_normalize_day_is_idempotent(raw in arb_json()) {
            let once = normalize_day(&raw);
            let stored = serde_json::to_value(&once).unwrap();
            prop_assert_eq!(normalize_day(&stored), once);
        }

        #[test]
        fn prop_negative_delta_never_lowers_count(start in 0u32..1000, delta in -1000i64..0) {
            let mut ledger = AdherenceLedger::new();
            let d = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
            ledger.record_session(d, i64::from(start));
            prop_assert_eq!(ledger.record_session(d, delta), start);
        }

        #[test]
        fn prop_future_dates_are_none(offset in 1i64..2000, sessions in 0i64..5) {
            let mut ledger = AdherenceLedger::new();
            let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
            let future = today + chrono::Duration::days(offset);
            ledger.record_session(future, sessions);
            ledger.set_checkoff_completed(future, "walk", true);
            prop_assert_eq!(
                ledger.status(future, today, &[timed("a", 1), checkoff("walk")]),
                DayStatus::None
            );
        }

        #[test]
        fn prop_checkoff_on_target_iff_completed(completed in any::<bool>(), timed_count in 0i64..4) {
            let mut ledger = AdherenceLedger::new();
            let d = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
            ledger.record_session(d, timed_count);
            ledger.set_checkoff_completed(d, "walk", completed);
            let summary = ledger.summarize(d, &[checkoff("walk")]);
            prop_assert_eq!(summary.exercises_on_target == 1, completed);
        }
    }
}
