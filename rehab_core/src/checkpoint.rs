//! Resumable mid-exercise checkpoints.
//!
//! A `SessionProgress` is stored per exercise and calendar day. It is only
//! valid for resumption inside the resume window; older checkpoints are
//! deleted lazily when read.

use crate::store::{keys, load_record, save_record, BlobStore};
use crate::{Result, SessionProgress};
use chrono::{DateTime, Duration, NaiveDate, Utc};

pub struct CheckpointStore<'a> {
    store: &'a dyn BlobStore,
    window: Duration,
}

impl<'a> CheckpointStore<'a> {
    pub fn new(store: &'a dyn BlobStore, resume_window_hours: i64) -> Self {
        Self {
            store,
            window: Duration::hours(resume_window_hours),
        }
    }

    /// Load today's checkpoint if it is still inside the resume window
    pub fn load(&self, exercise_id: &str, date: NaiveDate, now: DateTime<Utc>) -> Option<SessionProgress> {
        let key = keys::session(exercise_id, date);
        let progress = load_record::<SessionProgress>(self.store, &key)?;

        if now - progress.timestamp >= self.window {
            tracing::info!(
                "Discarding stale checkpoint for {} from {}",
                exercise_id,
                progress.timestamp
            );
            if let Err(e) = self.store.delete(&key) {
                tracing::warn!("Failed to delete stale checkpoint {}: {}", key, e);
            }
            return None;
        }

        Some(progress)
    }

    pub fn save(&self, progress: &SessionProgress, date: NaiveDate) -> Result<()> {
        let key = keys::session(&progress.exercise_id, date);
        save_record(self.store, &key, progress)?;
        tracing::debug!(
            "Checkpointed {} at set {} rep {}",
            progress.exercise_id,
            progress.current_set,
            progress.current_rep
        );
        Ok(())
    }

    pub fn clear(&self, exercise_id: &str, date: NaiveDate) -> Result<()> {
        self.store.delete(&keys::session(exercise_id, date))
    }
}
