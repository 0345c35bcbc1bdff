//! Weekly progression: week advancement, load reduction and overrides.
//!
//! This module implements the progression rules for exercise settings:
//! - Accepting a week progresses load fields and shortens rest
//! - Reducing load (pain response) shrinks load fields and lengthens rest
//! - Every load field has a floor so settings never become meaningless
//!
//! `ProgressionManager` is the only writer of the persisted `UserProgress`.

use crate::config::ProgressionConfig;
use crate::events::{SettingsBus, SettingsEvent, SubscriptionId};
use crate::store::{keys, load_record, save_record, BlobStore};
use crate::{
    resolver, Error, ExerciseSettings, Program, ProgramExercise, ProgramHistoryEntry,
    ProgressionHistoryEntry, Result, UserProgress,
};
use chrono::{Days, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Floors and ceilings applied by the field rules
pub mod limits {
    pub const MIN_HOLD_TIME: u32 = 3;
    pub const MIN_REPS: u32 = 1;
    pub const MIN_DYNAMIC_REPS: u32 = 1;
    pub const MIN_DYNAMIC_SETS: u32 = 1;
    pub const MIN_ROLLING_DURATION: u32 = 30;
    pub const MIN_ROLLING_SESSIONS: u32 = 1;
    pub const MIN_WALK_DURATION: u32 = 5;
    pub const MIN_WALK_SESSIONS: u32 = 1;
    pub const MIN_REST_TIME: u32 = 5;
    pub const MAX_REDUCED_REST_TIME: u32 = 30;
}

// Absorbs float noise such as 6.9999999 for an exact 7
const EPSILON: f64 = 1e-9;

/// Apply `load` to every load field (with its floor) and `rest` to rest_time
fn map_fields<L, R>(settings: &ExerciseSettings, load: L, rest: R) -> ExerciseSettings
where
    L: Fn(u32, u32) -> u32,
    R: Fn(u32) -> u32,
{
    use limits::*;

    match settings {
        ExerciseSettings::Hold {
            hold_time,
            reps_schema,
            rest_time,
        } => ExerciseSettings::Hold {
            hold_time: load(*hold_time, MIN_HOLD_TIME),
            reps_schema: reps_schema.iter().map(|r| load(*r, MIN_REPS)).collect(),
            rest_time: rest(*rest_time),
        },
        ExerciseSettings::Dynamic {
            dynamic_reps,
            dynamic_sets,
            rest_time,
        } => ExerciseSettings::Dynamic {
            dynamic_reps: load(*dynamic_reps, MIN_DYNAMIC_REPS),
            dynamic_sets: load(*dynamic_sets, MIN_DYNAMIC_SETS),
            rest_time: rest(*rest_time),
        },
        ExerciseSettings::FoamRolling {
            rolling_duration,
            rolling_sessions,
            rest_time,
        } => ExerciseSettings::FoamRolling {
            rolling_duration: load(*rolling_duration, MIN_ROLLING_DURATION),
            rolling_sessions: load(*rolling_sessions, MIN_ROLLING_SESSIONS),
            rest_time: rest(*rest_time),
        },
        ExerciseSettings::Walk {
            walk_duration,
            walk_sessions,
        } => ExerciseSettings::Walk {
            walk_duration: load(*walk_duration, MIN_WALK_DURATION),
            walk_sessions: load(*walk_sessions, MIN_WALK_SESSIONS),
        },
    }
}

/// Progress settings by one week
///
/// Load fields: `round(value * multiplier)`, floored per field.
/// Rest: `round(value * rest_factor)`, floored at 5 s.
pub fn progress_settings(
    settings: &ExerciseSettings,
    multiplier: f64,
    rest_factor: f64,
) -> ExerciseSettings {
    map_fields(
        settings,
        |value, min| ((value as f64 * multiplier).round() as u32).max(min),
        |value| ((value as f64 * rest_factor).round() as u32).max(limits::MIN_REST_TIME),
    )
}

/// Reduce settings in response to pain
///
/// Load fields round down: `floor(value * (1 - reduction))`, floored per field.
/// Rest rounds up: `ceil(value * (1 + reduction))`, capped at 30 s unless the
/// rest was already longer, in which case it is kept.
pub fn reduce_settings(settings: &ExerciseSettings, reduction_percent: f64) -> ExerciseSettings {
    let reduction = reduction_percent.clamp(0.0, 0.95);
    map_fields(
        settings,
        |value, min| ((value as f64 * (1.0 - reduction) + EPSILON).floor() as u32).max(min),
        |value| {
            let grown = (value as f64 * (1.0 + reduction) - EPSILON).ceil() as u32;
            grown.min(limits::MAX_REDUCED_REST_TIME.max(value))
        },
    )
}

/// Owner of the persisted user progress
pub struct ProgressionManager<'a> {
    store: &'a dyn BlobStore,
    config: ProgressionConfig,
    progress: UserProgress,
    bus: SettingsBus,
}

impl<'a> ProgressionManager<'a> {
    /// Load progress from the store
    ///
    /// Absent or malformed progress yields fresh progress for
    /// `default_program_id` starting today; nothing is written until the
    /// first mutation.
    pub fn load(store: &'a dyn BlobStore, config: ProgressionConfig, default_program_id: &str) -> Self {
        let progress = load_record::<UserProgress>(store, keys::PROGRESS).unwrap_or_else(|| {
            tracing::info!("No user progress found, starting {}", default_program_id);
            UserProgress::new(default_program_id, Utc::now().date_naive())
        });

        Self {
            store,
            config,
            progress,
            bus: SettingsBus::new(),
        }
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SettingsEvent) + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Persist the whole progress root
    pub fn save(&self) -> Result<()> {
        if let Err(e) = save_record(self.store, keys::PROGRESS, &self.progress) {
            tracing::error!("Failed to persist user progress: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Persist, then notify subscribers
    fn commit(&mut self, event: SettingsEvent) -> Result<()> {
        self.save()?;
        self.bus.publish(&event);
        Ok(())
    }

    /// Effective settings for an exercise under the current progress
    pub fn effective_settings(&self, program: &Program, exercise_id: &str) -> Result<ExerciseSettings> {
        resolver::resolve(program, exercise_id, &self.progress)
    }

    /// Effective settings, falling back to the exercise type's safe default
    pub fn effective_settings_or_default(
        &self,
        program: &Program,
        exercise: &ProgramExercise,
    ) -> ExerciseSettings {
        let settings = resolver::resolve_or_default(
            program,
            &exercise.id,
            &self.progress,
            exercise.execution_type,
        );
        if settings.matches_type(exercise.execution_type) {
            settings
        } else {
            tracing::warn!(
                "Stored settings for {} do not fit a {} exercise; using defaults",
                exercise.id,
                exercise.execution_type
            );
            resolver::default_for(exercise.execution_type)
        }
    }

    fn resolve_all(&self, program: &Program) -> BTreeMap<String, ExerciseSettings> {
        let mut resolved = BTreeMap::new();
        for exercise in &program.exercises {
            match resolver::resolve(program, &exercise.id, &self.progress) {
                Ok(settings) => {
                    resolved.insert(exercise.id.clone(), settings);
                }
                Err(e) => tracing::warn!("Skipping {}: {}", exercise.id, e),
            }
        }
        resolved
    }

    fn warn_if_other_program(&self, program: &Program) {
        if program.id != self.progress.current_program_id {
            tracing::warn!(
                "Applying {} while the current program is {}",
                program.id,
                self.progress.current_program_id
            );
        }
    }

    /// Reset to week 1, day 0 with empty overrides and history
    pub fn initialize_progress(&mut self, program_id: &str, start_date: NaiveDate) -> Result<()> {
        self.progress = UserProgress::new(program_id, start_date);
        tracing::info!("Initialized progress for program {}", program_id);
        self.commit(SettingsEvent::ProgressInitialized {
            program_id: program_id.to_string(),
        })
    }

    /// Count a completed day and update the streak
    ///
    /// Never advances the week; that is `accept_progression`'s job.
    pub fn mark_day_completed(&mut self, date: Option<NaiveDate>) -> Result<()> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let progress = &mut self.progress;

        progress.days_completed += 1;

        let yesterday_missed = date
            .checked_sub_days(Days::new(1))
            .is_some_and(|yesterday| progress.missed_days.contains(&yesterday));

        progress.current_streak = if yesterday_missed {
            1
        } else {
            progress.current_streak + 1
        };
        progress.longest_streak = progress.longest_streak.max(progress.current_streak);
        progress.missed_days.remove(&date);

        tracing::info!(
            "Day {} completed (streak {}, longest {})",
            progress.days_completed,
            progress.current_streak,
            progress.longest_streak
        );

        let days_completed = progress.days_completed;
        self.commit(SettingsEvent::DayCompleted { days_completed })
    }

    /// Record a missed day. Returns false if it was already recorded.
    pub fn mark_day_missed(&mut self, date: NaiveDate) -> Result<bool> {
        if !self.progress.missed_days.insert(date) {
            return Ok(false);
        }
        tracing::info!("Marked {} as missed", date);
        self.commit(SettingsEvent::DayMissed { date })?;
        Ok(true)
    }

    /// Whether the "ready for next week" prompt should be shown today
    pub fn should_show_progression_popup(&self, today: NaiveDate) -> bool {
        let progress = &self.progress;
        progress.days_completed > 0
            && progress.days_completed == progress.current_week * 7
            && progress.last_progression_popup_date != Some(today)
    }

    pub fn mark_progression_popup_shown(&mut self, today: NaiveDate) -> Result<()> {
        self.progress.last_progression_popup_date = Some(today);
        self.save()
    }

    /// Accept the next week: bake current settings, progressed, into the new week
    ///
    /// Current settings include manual overrides, which are cleared because
    /// they now live in the new week's baseline.
    pub fn accept_progression(&mut self, program: &Program, new_week: u32, date: NaiveDate) -> Result<()> {
        self.warn_if_other_program(program);
        let new_week = new_week.max(1);

        let previous = self.resolve_all(program);
        let progressed: BTreeMap<String, ExerciseSettings> = previous
            .iter()
            .map(|(id, settings)| {
                (
                    id.clone(),
                    progress_settings(settings, self.config.multiplier, self.config.rest_factor),
                )
            })
            .collect();

        let progress = &mut self.progress;
        progress
            .weekly_adjusted_settings
            .insert(new_week, progressed.clone());
        progress.manual_overrides.clear();
        progress.progression_history.push(ProgressionHistoryEntry {
            date,
            week: new_week,
            accepted: true,
            previous_settings: previous,
            new_settings: progressed,
        });
        progress.current_week = new_week;

        tracing::info!("Accepted progression to week {}", new_week);
        self.commit(SettingsEvent::ProgressionAccepted { week: new_week })
    }

    /// Decline the suggested week; only the audit trail changes
    pub fn decline_progression(&mut self, program: &Program, suggested_week: u32, date: NaiveDate) -> Result<()> {
        self.warn_if_other_program(program);

        let previous = self.resolve_all(program);
        let suggested = previous
            .iter()
            .map(|(id, settings)| {
                (
                    id.clone(),
                    progress_settings(settings, self.config.multiplier, self.config.rest_factor),
                )
            })
            .collect();

        self.progress
            .progression_history
            .push(ProgressionHistoryEntry {
                date,
                week: suggested_week,
                accepted: false,
                previous_settings: previous,
                new_settings: suggested,
            });

        tracing::info!("Declined progression to week {}", suggested_week);
        self.commit(SettingsEvent::ProgressionDeclined {
            week: suggested_week,
        })
    }

    /// Pain response: override every exercise with reduced current settings
    pub fn reduce_current_settings(&mut self, program: &Program, reduction_percent: f64) -> Result<()> {
        self.warn_if_other_program(program);

        for (id, settings) in self.resolve_all(program) {
            let reduced = reduce_settings(&settings, reduction_percent);
            tracing::debug!("Reduced {}: {} -> {}", id, settings, reduced);
            self.progress.manual_overrides.insert(id, reduced);
        }

        tracing::info!(
            "Reduced load by {:.0}% for program {}",
            reduction_percent * 100.0,
            program.id
        );
        self.commit(SettingsEvent::LoadReduced)
    }

    /// Explicit user edit of one exercise's settings
    pub fn set_manual_override(
        &mut self,
        program: &Program,
        exercise_id: &str,
        settings: ExerciseSettings,
    ) -> Result<()> {
        let exercise = program.exercise(exercise_id).ok_or_else(|| {
            Error::NotFound(format!(
                "exercise '{}' in program '{}'",
                exercise_id, program.id
            ))
        })?;
        settings.validate()?;
        if !settings.matches_type(exercise.execution_type) {
            return Err(Error::InvalidSettings(format!(
                "{} settings do not fit {} exercise '{}'",
                settings, exercise.execution_type, exercise_id
            )));
        }

        self.progress
            .manual_overrides
            .insert(exercise_id.to_string(), settings);
        self.commit(SettingsEvent::OverrideChanged {
            exercise_id: exercise_id.to_string(),
        })
    }

    /// Remove one override. Returns false if there was none.
    pub fn clear_manual_override(&mut self, exercise_id: &str) -> Result<bool> {
        if self.progress.manual_overrides.remove(exercise_id).is_none() {
            return Ok(false);
        }
        self.commit(SettingsEvent::OverrideChanged {
            exercise_id: exercise_id.to_string(),
        })?;
        Ok(true)
    }

    pub fn reset_overrides(&mut self) -> Result<()> {
        self.progress.manual_overrides.clear();
        self.commit(SettingsEvent::OverridesCleared)
    }

    /// Step back `weeks` weeks, never below week 1. Returns the new week.
    ///
    /// Adjusted settings stored for later weeks are kept.
    pub fn rollback_weeks(&mut self, weeks: u32) -> Result<u32> {
        let week = self.progress.current_week.saturating_sub(weeks).max(1);
        self.progress.current_week = week;
        tracing::info!("Rolled back to week {}", week);
        self.commit(SettingsEvent::WeekRolledBack { week })?;
        Ok(week)
    }

    /// Start a new program, remembering the outgoing one
    pub fn switch_program_with_history(&mut self, new_program_id: &str, date: NaiveDate) -> Result<()> {
        let outgoing = ProgramHistoryEntry {
            program_id: self.progress.current_program_id.clone(),
            start_date: self.progress.program_start_date,
            end_date: date,
            week: self.progress.current_week,
        };

        let mut history = std::mem::take(&mut self.progress.program_history);
        history.push(outgoing);

        self.progress = UserProgress::new(new_program_id, date);
        self.progress.program_history = history;

        tracing::info!("Switched to program {}", new_program_id);
        self.commit(SettingsEvent::ProgramSwitched {
            program_id: new_program_id.to_string(),
        })
    }

    /// Return to the most recently left program and its recorded week
    ///
    /// Returns false when there is no previous program.
    pub fn return_to_previous_program(&mut self, date: NaiveDate) -> Result<bool> {
        let Some(previous) = self.progress.program_history.pop() else {
            tracing::warn!("No previous program to return to");
            return Ok(false);
        };

        let history = std::mem::take(&mut self.progress.program_history);
        let week = previous.week.max(1);

        self.progress = UserProgress::new(previous.program_id.clone(), date);
        self.progress.program_history = history;
        self.progress.current_week = week;
        // Days up to the start of the restored week count as done
        self.progress.days_completed = (week - 1) * 7;

        tracing::info!(
            "Returned to program {} at week {}",
            previous.program_id,
            week
        );
        self.commit(SettingsEvent::ProgramSwitched {
            program_id: previous.program_id,
        })?;
        Ok(true)
    }
}
