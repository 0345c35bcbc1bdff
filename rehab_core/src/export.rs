//! CSV export of the completed-exercise history.

use crate::history::HistoryRecorder;
use crate::store::BlobStore;
use crate::{CompletedExerciseRecord, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    date: String,
    completed_at: String,
    exercise_id: String,
    exercise_name: String,
    execution_type: Option<String>,
    hold_time: Option<u32>,
    /// Reps per set joined with `-`, e.g. `3-2-1`
    reps_schema: Option<String>,
    rest_time: Option<u32>,
    total_sets: u32,
}

impl From<&CompletedExerciseRecord> for CsvRow {
    fn from(record: &CompletedExerciseRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            date: record.completed_at.date_naive().to_string(),
            completed_at: record.completed_at.to_rfc3339(),
            exercise_id: record.exercise_id.clone(),
            exercise_name: record.exercise_name.clone(),
            execution_type: record.execution_type.map(|t| t.as_str().to_string()),
            hold_time: record.hold_time,
            reps_schema: record.reps_schema.as_ref().map(|schema| {
                schema
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join("-")
            }),
            rest_time: record.rest_time,
            total_sets: record.total_sets,
        }
    }
}

/// Write every history record, oldest day first, to a CSV file
///
/// The file is replaced, written with headers and synced to disk before
/// returning the number of rows written.
pub fn export_history_csv(store: &dyn BlobStore, csv_path: &Path) -> Result<usize> {
    let records = HistoryRecorder::new(store).all_records()?;

    if let Some(parent) = csv_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(csv_path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    for record in &records {
        writer.serialize(CsvRow::from(record))?;
    }

    // Flush and sync to disk
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} records to {:?}", records.len(), csv_path);
    Ok(records.len())
}
