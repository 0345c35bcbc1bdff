//! Completed-exercise history and aggregate statistics.
//!
//! Records are appended to a per-day log. Partial-set records and the full
//! completion record may both exist for one exercise and day; consumers
//! aggregate by summing `total_sets` per exercise.

use crate::store::{date_from_key, keys, load_for_update, load_record, save_record, BlobStore};
use crate::{CompletedExerciseRecord, ExecutionType, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals for one exercise across all days
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ExerciseTotals {
    pub exercise_name: String,
    pub records: u32,
    pub total_sets: u32,
}

/// Read-only aggregate over every day log
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct OverallStatistics {
    pub total_records: u32,
    pub total_sets: u32,
    pub active_days: u32,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub per_exercise: BTreeMap<String, ExerciseTotals>,
    pub per_type: BTreeMap<ExecutionType, u32>,
}

pub struct HistoryRecorder<'a> {
    store: &'a dyn BlobStore,
}

impl<'a> HistoryRecorder<'a> {
    pub fn new(store: &'a dyn BlobStore) -> Self {
        Self { store }
    }

    /// Append a record to the log of the day it was completed on
    pub fn append_completed_exercise(&self, record: &CompletedExerciseRecord) -> Result<()> {
        self.append_to_day(record.completed_at.date_naive(), record)
    }

    /// Append a record to a specific day's log
    ///
    /// A session that runs past midnight files every record under the day it
    /// was opened on. Nothing is written when the existing log cannot be read.
    pub fn append_to_day(&self, date: NaiveDate, record: &CompletedExerciseRecord) -> Result<()> {
        let key = keys::history(date);

        let mut records =
            load_for_update::<Vec<CompletedExerciseRecord>>(self.store, &key)?.unwrap_or_default();
        records.push(record.clone());
        save_record(self.store, &key, &records)?;

        tracing::debug!(
            "Recorded {} ({} sets) for {}",
            record.exercise_name,
            record.total_sets,
            date
        );
        Ok(())
    }

    pub fn records_for_day(&self, date: NaiveDate) -> Vec<CompletedExerciseRecord> {
        load_record(self.store, &keys::history(date)).unwrap_or_default()
    }

    /// Sets done on a day, summed per exercise id
    pub fn sets_by_exercise(&self, date: NaiveDate) -> BTreeMap<String, u32> {
        let mut totals = BTreeMap::new();
        for record in self.records_for_day(date) {
            *totals.entry(record.exercise_id).or_insert(0) += record.total_sets;
        }
        totals
    }

    /// Days that have a log, oldest first
    pub fn logged_days(&self) -> Result<Vec<NaiveDate>> {
        let mut days: Vec<NaiveDate> = self
            .store
            .list_keys()?
            .iter()
            .filter_map(|key| date_from_key(key, keys::HISTORY_PREFIX))
            .collect();
        days.sort();
        Ok(days)
    }

    /// Every record, oldest day first
    pub fn all_records(&self) -> Result<Vec<CompletedExerciseRecord>> {
        let mut records = Vec::new();
        for day in self.logged_days()? {
            records.extend(self.records_for_day(day));
        }
        Ok(records)
    }

    /// Aggregate statistics over all persisted day logs
    ///
    /// A store that cannot be listed yields empty statistics.
    pub fn overall_statistics(&self) -> OverallStatistics {
        let days = match self.logged_days() {
            Ok(days) => days,
            Err(e) => {
                tracing::warn!("Unable to list history: {}", e);
                return OverallStatistics::default();
            }
        };

        let mut stats = OverallStatistics::default();
        for day in days {
            let records = self.records_for_day(day);
            if records.is_empty() {
                continue;
            }

            stats.active_days += 1;
            stats.first_day.get_or_insert(day);
            stats.last_day = Some(day);

            for record in records {
                stats.total_records += 1;
                stats.total_sets += record.total_sets;

                let totals = stats
                    .per_exercise
                    .entry(record.exercise_id.clone())
                    .or_default();
                totals.exercise_name = record.exercise_name.clone();
                totals.records += 1;
                totals.total_sets += record.total_sets;

                if let Some(execution_type) = record.execution_type {
                    *stats.per_type.entry(execution_type).or_insert(0) += 1;
                }
            }
        }

        tracing::info!(
            "Computed statistics over {} active days ({} records)",
            stats.active_days,
            stats.total_records
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Error;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::cell::Cell;
    use uuid::Uuid;

    /// Memory store whose reads can be switched off
    #[derive(Default)]
    struct UnreadableStore {
        inner: MemoryStore,
        fail_reads: Cell<bool>,
    }

    impl BlobStore for UnreadableStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            if self.fail_reads.get() {
                return Err(Error::PersistenceRead(format!("{} is unavailable", key)));
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key)
        }

        fn list_keys(&self) -> Result<Vec<String>> {
            self.inner.list_keys()
        }
    }

    fn create_test_record(exercise_id: &str, at: DateTime<Utc>, total_sets: u32) -> CompletedExerciseRecord {
        CompletedExerciseRecord {
            id: Uuid::new_v4(),
            exercise_id: exercise_id.into(),
            exercise_name: exercise_id.to_uppercase(),
            execution_type: Some(ExecutionType::Hold),
            completed_at: at,
            hold_time: Some(7),
            reps_schema: Some(vec![3, 2, 1]),
            rest_time: Some(15),
            total_sets,
        }
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_append_and_read_day() {
        let store = MemoryStore::new();
        let history = HistoryRecorder::new(&store);

        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1), 1))
            .unwrap();
        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1) + Duration::minutes(5), 3))
            .unwrap();

        let records = history.records_for_day(noon(1).date_naive());
        assert_eq!(records.len(), 2);
        assert!(history.records_for_day(noon(2).date_naive()).is_empty());
    }

    #[test]
    fn test_partial_and_full_records_are_summed() {
        let store = MemoryStore::new();
        let history = HistoryRecorder::new(&store);

        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1), 1))
            .unwrap();
        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1), 3))
            .unwrap();
        history
            .append_completed_exercise(&create_test_record("walk", noon(1), 1))
            .unwrap();

        let sets = history.sets_by_exercise(noon(1).date_naive());
        assert_eq!(sets["bird_dog"], 4);
        assert_eq!(sets["walk"], 1);
    }

    #[test]
    fn test_overall_statistics() {
        let store = MemoryStore::new();
        let history = HistoryRecorder::new(&store);

        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(3), 3))
            .unwrap();
        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1), 2))
            .unwrap();
        let mut walk = create_test_record("walk", noon(1), 1);
        walk.execution_type = Some(ExecutionType::Walk);
        history.append_completed_exercise(&walk).unwrap();

        let stats = history.overall_statistics();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.total_sets, 6);
        assert_eq!(stats.active_days, 2);
        assert_eq!(stats.first_day, Some(noon(1).date_naive()));
        assert_eq!(stats.last_day, Some(noon(3).date_naive()));
        assert_eq!(stats.per_exercise["bird_dog"].total_sets, 5);
        assert_eq!(stats.per_type[&ExecutionType::Hold], 2);
        assert_eq!(stats.per_type[&ExecutionType::Walk], 1);
    }

    #[test]
    fn test_malformed_day_log_is_skipped() {
        let store = MemoryStore::new();
        let history = HistoryRecorder::new(&store);
        store.set(&keys::history(noon(2).date_naive()), "[{broken").unwrap();
        history
            .append_completed_exercise(&create_test_record("walk", noon(1), 1))
            .unwrap();

        let stats = history.overall_statistics();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.active_days, 1);
    }

    #[test]
    fn test_all_records_oldest_first() {
        let store = MemoryStore::new();
        let history = HistoryRecorder::new(&store);
        history
            .append_completed_exercise(&create_test_record("late", noon(5), 1))
            .unwrap();
        history
            .append_completed_exercise(&create_test_record("early", noon(2), 1))
            .unwrap();

        let records = history.all_records().unwrap();
        assert_eq!(records[0].exercise_id, "early");
        assert_eq!(records[1].exercise_id, "late");
    }

    #[test]
    fn test_failed_read_keeps_existing_log() {
        let store = UnreadableStore::default();
        let history = HistoryRecorder::new(&store);
        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1), 1))
            .unwrap();
        history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1), 1))
            .unwrap();

        store.fail_reads.set(true);
        let err = history
            .append_completed_exercise(&create_test_record("bird_dog", noon(1), 1))
            .unwrap_err();
        assert!(err.is_persistence());

        store.fail_reads.set(false);
        assert_eq!(history.records_for_day(noon(1).date_naive()).len(), 2);
    }

    #[test]
    fn test_malformed_log_is_replaced_on_append() {
        let store = MemoryStore::new();
        let history = HistoryRecorder::new(&store);
        store.set(&keys::history(noon(1).date_naive()), "[{broken").unwrap();

        history
            .append_completed_exercise(&create_test_record("walk", noon(1), 1))
            .unwrap();
        assert_eq!(history.records_for_day(noon(1).date_naive()).len(), 1);
    }

    #[test]
    fn test_append_to_day_uses_given_day() {
        let store = MemoryStore::new();
        let history = HistoryRecorder::new(&store);
        let late = Utc.with_ymd_and_hms(2024, 3, 2, 0, 5, 0).unwrap();

        history
            .append_to_day(noon(1).date_naive(), &create_test_record("walk", late, 1))
            .unwrap();
        assert_eq!(history.sets_by_exercise(noon(1).date_naive())["walk"], 1);
        assert!(history.records_for_day(late.date_naive()).is_empty());
    }
}
