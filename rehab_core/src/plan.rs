//! Per-day exercise list.

use crate::store::{keys, load_for_update, load_record, save_record, BlobStore};
use crate::{DailyPlan, PlanEntry, Program, Result};
use chrono::{DateTime, NaiveDate, Utc};

pub struct DailyPlanStore<'a> {
    store: &'a dyn BlobStore,
}

impl<'a> DailyPlanStore<'a> {
    pub fn new(store: &'a dyn BlobStore) -> Self {
        Self { store }
    }

    pub fn load(&self, date: NaiveDate) -> Option<DailyPlan> {
        load_record(self.store, &keys::plan(date))
    }

    /// Load the day's plan, creating it from the program if absent
    pub fn ensure_plan(&self, date: NaiveDate, program: &Program) -> Result<DailyPlan> {
        if let Some(plan) = load_for_update(self.store, &keys::plan(date))? {
            return Ok(plan);
        }

        let plan = DailyPlan {
            date,
            entries: program
                .exercises
                .iter()
                .map(|exercise| PlanEntry {
                    exercise_id: exercise.id.clone(),
                    exercise_name: exercise.name.clone(),
                    completed: false,
                    completed_at: None,
                })
                .collect(),
        };
        save_record(self.store, &keys::plan(date), &plan)?;
        tracing::info!("Created plan for {} from {}", date, program.id);
        Ok(plan)
    }

    /// Mark an exercise done; an exercise not on the plan is appended
    pub fn mark_completed(
        &self,
        date: NaiveDate,
        exercise_id: &str,
        exercise_name: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut plan = load_for_update(self.store, &keys::plan(date))?.unwrap_or(DailyPlan {
            date,
            entries: Vec::new(),
        });

        match plan.entries.iter_mut().find(|e| e.exercise_id == exercise_id) {
            Some(entry) => {
                entry.completed = true;
                entry.completed_at = Some(at);
            }
            None => plan.entries.push(PlanEntry {
                exercise_id: exercise_id.to_string(),
                exercise_name: exercise_name.to_string(),
                completed: true,
                completed_at: Some(at),
            }),
        }

        save_record(self.store, &keys::plan(date), &plan)
    }

    pub fn is_completed(&self, date: NaiveDate, exercise_id: &str) -> bool {
        self.load(date)
            .is_some_and(|plan| plan.is_completed(exercise_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{build_default_catalog, DEFAULT_PROGRAM_ID};
    use crate::store::MemoryStore;

    #[test]
    fn test_ensure_plan_creates_once() {
        let store = MemoryStore::new();
        let plans = DailyPlanStore::new(&store);
        let catalog = build_default_catalog();
        let program = catalog.program(DEFAULT_PROGRAM_ID).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let plan = plans.ensure_plan(date, program).unwrap();
        assert_eq!(plan.entries.len(), program.exercises.len());
        assert!(!plan.all_completed());

        plans
            .mark_completed(date, "bird_dog", "Bird Dog", Utc::now())
            .unwrap();
        let again = plans.ensure_plan(date, program).unwrap();
        assert!(again.is_completed("bird_dog"));
    }

    #[test]
    fn test_mark_completed_without_plan() {
        let store = MemoryStore::new();
        let plans = DailyPlanStore::new(&store);
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        assert!(!plans.is_completed(date, "walk"));
        plans.mark_completed(date, "walk", "Walk", Utc::now()).unwrap();
        assert!(plans.is_completed(date, "walk"));
        assert!(plans.load(date).unwrap().all_completed());
    }

    struct UnreadableStore(MemoryStore);

    impl BlobStore for UnreadableStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Err(crate::Error::PersistenceRead(format!("{} is unavailable", key)))
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.0.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.0.delete(key)
        }

        fn list_keys(&self) -> Result<Vec<String>> {
            self.0.list_keys()
        }
    }

    #[test]
    fn test_failed_read_does_not_overwrite_plan() {
        let store = UnreadableStore(MemoryStore::new());
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        store.0.set(&keys::plan(date), "{\"kept\": true}").unwrap();

        let plans = DailyPlanStore::new(&store);
        assert!(plans.mark_completed(date, "walk", "Walk", Utc::now()).is_err());
        assert_eq!(
            store.0.get(&keys::plan(date)).unwrap().as_deref(),
            Some("{\"kept\": true}")
        );
    }
}
