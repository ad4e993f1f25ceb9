//! CSV export of the adherence history.
//!
//! One row per recorded date, evaluated against the current routine.

use crate::ledger::{date_key, AdherenceLedger};
use crate::types::Exercise;
use crate::Result;
use chrono::NaiveDate;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    timed_sessions: u32,
    exercises_on_target: usize,
    total_exercises: usize,
    status: String,
    completed_checkoffs: String,
}

/// Write the history to `csv_path`, replacing any existing file.
///
/// Returns the number of rows written.
pub fn export_csv(
    ledger: &AdherenceLedger,
    catalog: &[Exercise],
    today: NaiveDate,
    csv_path: &Path,
) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(csv_path)?;
    let mut count = 0;

    for date in ledger.dates() {
        let summary = ledger.summarize(date, catalog);
        let completed: Vec<&str> = ledger
            .day(date)
            .map(|day| {
                day.exercises
                    .iter()
                    .filter(|(_, entry)| entry.completed)
                    .map(|(id, _)| id.as_str())
                    .collect()
            })
            .unwrap_or_default();

        writer.serialize(CsvRow {
            date: date_key(date),
            timed_sessions: summary.timed_sessions_logged,
            exercises_on_target: summary.exercises_on_target,
            total_exercises: summary.total_exercises,
            status: ledger.status(date, today, catalog).to_string(),
            completed_checkoffs: completed.join(";"),
        })?;
        count += 1;
    }

    writer.flush()?;
    tracing::info!("Exported {} dates to {:?}", count, csv_path);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_export_writes_row_per_date() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("out").join("history.csv");

        let mut ledger = AdherenceLedger::new();
        ledger.record_session(date(2026, 2, 1), 1);
        ledger.set_checkoff_completed(date(2026, 2, 3), "walk", true);
        ledger.set_checkoff_completed(date(2026, 2, 3), "stretch", true);

        let catalog = crate::catalog::build_default_routine();
        let count = export_csv(&ledger, &catalog, date(2026, 2, 10), &csv_path).unwrap();
        assert_eq!(count, 2);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][0], "2026-02-01");
        assert_eq!(&rows[0][4], "green");
        assert_eq!(&rows[1][4], "red");
        assert_eq!(&rows[1][5], "stretch;walk");
    }

    #[test]
    fn test_export_empty_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("history.csv");

        let count = export_csv(&AdherenceLedger::new(), &[], date(2026, 2, 10), &csv_path).unwrap();
        assert_eq!(count, 0);
        assert!(csv_path.exists());
    }
}
