//! Exercise session state machine.
//!
//! One `ExerciseSession` runs one exercise through its timed phases. The
//! caller drives it with one `tick()` per second; transitions happen
//! synchronously when the remaining time reaches zero. Completed sets are
//! written to the history log and checkpointed so the exercise can be resumed
//! later the same day.
//!
//! Phase tables:
//! - hold/reps: prepare → exercise → (mini_rest → exercise)* → rest → prepare ...
//! - dynamic: prepare → exercise (reps × seconds per rep) → rest → prepare ...
//! - foam rolling: prepare → rolling → rest → prepare ...
//! - walk: exercise (minutes × 60) → completed
//!
//! Time is a logical clock: `opened_at` plus the number of ticks seen, so
//! record and checkpoint timestamps are reproducible in tests.

use crate::checkpoint::CheckpointStore;
use crate::config::SessionConfig;
use crate::history::HistoryRecorder;
use crate::plan::DailyPlanStore;
use crate::resolver::default_for;
use crate::store::BlobStore;
use crate::{
    CompletedExerciseRecord, Error, ExecutionType, ExerciseSettings, ProgramExercise, Result,
    SessionProgress,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Prepare,
    Exercise,
    MiniRest,
    Rest,
    Rolling,
    SchemeCompleted,
    Completed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Prepare => "prepare",
            Phase::Exercise => "exercise",
            Phase::MiniRest => "mini_rest",
            Phase::Rest => "rest",
            Phase::Rolling => "rolling",
            Phase::SchemeCompleted => "scheme_completed",
            Phase::Completed => "completed",
        }
    }

    /// Cue emitted when the phase is entered
    fn entry_cue(self) -> Option<Cue> {
        match self {
            Phase::Idle => None,
            Phase::Prepare => Some(Cue::Prepare),
            Phase::Exercise | Phase::Rolling => Some(Cue::Start),
            Phase::MiniRest => Some(Cue::Finish),
            Phase::Rest => Some(Cue::Rest),
            Phase::SchemeCompleted | Phase::Completed => Some(Cue::Completed),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio cue requested from the playback collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    Prepare,
    Start,
    Hold,
    Finish,
    Rest,
    Completed,
}

impl Cue {
    pub fn as_str(self) -> &'static str {
        match self {
            Cue::Prepare => "prepare",
            Cue::Start => "start",
            Cue::Hold => "hold",
            Cue::Finish => "finish",
            Cue::Rest => "rest",
            Cue::Completed => "completed",
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives cues as phases are entered
pub trait PlaybackSink {
    fn cue(&mut self, cue: Cue);
}

/// Records every cue, in order
impl PlaybackSink for Vec<Cue> {
    fn cue(&mut self, cue: Cue) {
        self.push(cue);
    }
}

/// Discards cues
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPlayback;

impl PlaybackSink for NullPlayback {
    fn cue(&mut self, _cue: Cue) {}
}

/// Live timer projection, read-only to the UI
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimerState {
    /// Seconds remaining in the current phase
    pub current_time: u32,
    pub is_running: bool,
    pub phase: Phase,
    pub current_set: u32,
    pub current_rep: u32,
    pub current_session: u32,
    pub instruction: String,
    pub hold_sound_played: bool,
    pub current_scheme: u32,
    pub scheme_one_completed: bool,
}

impl TimerState {
    fn idle(instruction: &str) -> Self {
        Self {
            current_time: 0,
            is_running: false,
            phase: Phase::Idle,
            current_set: 1,
            current_rep: 1,
            current_session: 1,
            instruction: instruction.to_string(),
            hold_sound_played: false,
            current_scheme: 1,
            scheme_one_completed: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Nothing was running; the session was torn down without asking
    NotRunning,
    /// The timer is running and the user must confirm first
    NeedsConfirmation,
    Cancelled,
}

pub struct ExerciseSession<'a, P: PlaybackSink = NullPlayback> {
    store: &'a dyn BlobStore,
    exercise: ProgramExercise,
    settings: ExerciseSettings,
    config: SessionConfig,
    playback: P,
    timer: TimerState,
    phase_duration: u32,
    opened_at: DateTime<Utc>,
    day: NaiveDate,
    elapsed: u32,
    completed_sets: u32,
    resumable: Option<SessionProgress>,
    exit_requested: bool,
    persistence_warning: Option<Error>,
}

impl<'a, P: PlaybackSink> ExerciseSession<'a, P> {
    /// Open a session for one exercise
    ///
    /// Settings that are invalid or belong to another execution type are
    /// replaced by the safe default for the exercise's type. A checkpoint from
    /// today is offered for resumption unless the exercise is already
    /// completed in today's plan.
    pub fn open(
        store: &'a dyn BlobStore,
        exercise: &ProgramExercise,
        settings: ExerciseSettings,
        config: SessionConfig,
        playback: P,
        now: DateTime<Utc>,
    ) -> Self {
        let settings = match settings.validate() {
            Ok(()) if settings.matches_type(exercise.execution_type) => settings,
            Ok(()) => {
                tracing::warn!(
                    "Settings for {} do not match type {}; using defaults",
                    exercise.id,
                    exercise.execution_type
                );
                default_for(exercise.execution_type)
            }
            Err(e) => {
                tracing::warn!("{} for {}; using defaults", e, exercise.id);
                default_for(exercise.execution_type)
            }
        };

        let day = now.date_naive();
        let resumable = if DailyPlanStore::new(store).is_completed(day, &exercise.id) {
            None
        } else {
            CheckpointStore::new(store, config.resume_window_hours).load(&exercise.id, day, now)
        };

        if let Some(saved) = &resumable {
            tracing::info!(
                "{} can resume at set {} rep {}",
                exercise.id,
                saved.current_set,
                saved.current_rep
            );
        }

        Self {
            store,
            timer: TimerState::idle(exercise.instruction_for(1)),
            exercise: exercise.clone(),
            settings,
            config,
            playback,
            phase_duration: 0,
            opened_at: now,
            day,
            elapsed: 0,
            completed_sets: 0,
            resumable,
            exit_requested: false,
            persistence_warning: None,
        }
    }

    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    pub fn phase(&self) -> Phase {
        self.timer.phase
    }

    pub fn exercise(&self) -> &ProgramExercise {
        &self.exercise
    }

    pub fn settings(&self) -> &ExerciseSettings {
        &self.settings
    }

    /// Checkpoint that `continue_saved` would resume from
    pub fn resumable(&self) -> Option<&SessionProgress> {
        self.resumable.as_ref()
    }

    pub fn completed_sets(&self) -> u32 {
        self.completed_sets
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn into_playback(self) -> P {
        self.playback
    }

    /// True once the completion exit delay has elapsed
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Most recent persistence failure, if any, cleared on read
    pub fn take_persistence_warning(&mut self) -> Option<Error> {
        self.persistence_warning.take()
    }

    /// Start fresh, or begin scheme 2 after scheme 1 completed
    pub fn start(&mut self) -> Result<()> {
        match self.timer.phase {
            Phase::SchemeCompleted => {
                tracing::info!("Starting scheme 2 of {}", self.exercise.id);
                self.timer.current_scheme = 2;
                self.timer.scheme_one_completed = true;
                self.timer.current_set = 1;
                self.timer.current_rep = 1;
                self.timer.current_session = 1;
                self.completed_sets = 0;
                self.resumable = None;
                self.begin();
                Ok(())
            }
            Phase::Idle | Phase::Completed => {
                if self.resumable.take().is_some() {
                    tracing::info!("Discarding checkpoint for {}", self.exercise.id);
                    let cleared = self.checkpoints().clear(&self.exercise.id, self.day);
                    self.note_failure("clear checkpoint", cleared);
                }
                self.timer = TimerState::idle(self.exercise.instruction_for(1));
                self.completed_sets = 0;
                self.exit_requested = false;
                tracing::info!("Starting {} ({})", self.exercise.id, self.settings);
                self.begin();
                Ok(())
            }
            phase => Err(Error::Session(format!(
                "cannot start {} while in {}",
                self.exercise.id, phase
            ))),
        }
    }

    /// Resume from today's checkpoint
    pub fn continue_saved(&mut self) -> Result<()> {
        if self.timer.phase != Phase::Idle {
            return Err(Error::Session(format!(
                "cannot continue {} while in {}",
                self.exercise.id, self.timer.phase
            )));
        }
        let saved = self.resumable.take().ok_or_else(|| {
            Error::Session(format!("no saved progress for {}", self.exercise.id))
        })?;

        let total = self.total_sets();
        let scheme = if self.is_two_scheme() {
            saved.current_scheme.unwrap_or(1).clamp(1, 2)
        } else {
            1
        };
        let set = saved.current_set.clamp(1, total);
        let rep = saved.current_rep.clamp(1, self.reps_in_set(set));

        self.timer = TimerState::idle(self.exercise.instruction_for(scheme));
        self.timer.current_scheme = scheme;
        self.timer.scheme_one_completed = saved.scheme_one_completed.unwrap_or(scheme == 2);
        self.timer.current_set = set;
        self.timer.current_rep = rep;
        self.timer.current_session = set;
        self.completed_sets = saved.completed_sets.min(total);
        self.exit_requested = false;

        tracing::info!(
            "Continuing {} at scheme {} set {} rep {}",
            self.exercise.id,
            scheme,
            set,
            rep
        );
        self.begin();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if !self.timer.is_running {
            return Err(Error::Session("timer is not running".into()));
        }
        self.timer.is_running = false;
        tracing::debug!("Paused {} in {}", self.exercise.id, self.timer.phase);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.timer.phase {
            Phase::Idle | Phase::SchemeCompleted => Err(Error::Session(format!(
                "nothing to resume in {}",
                self.timer.phase
            ))),
            _ if self.timer.is_running => Err(Error::Session("timer is already running".into())),
            Phase::Completed if self.exit_requested => {
                Err(Error::Session("exercise already completed".into()))
            }
            _ => {
                self.timer.is_running = true;
                tracing::debug!("Resumed {} in {}", self.exercise.id, self.timer.phase);
                Ok(())
            }
        }
    }

    /// Tear the session down, asking for confirmation while the timer runs
    ///
    /// Checkpoints written for completed sets stay in place.
    pub fn cancel(&mut self, confirmed: bool) -> CancelOutcome {
        let was_running = self.timer.is_running;
        if was_running && !confirmed {
            return CancelOutcome::NeedsConfirmation;
        }

        self.timer.is_running = false;
        if self.timer.phase != Phase::Completed {
            tracing::info!(
                "Cancelled {} at set {} rep {}",
                self.exercise.id,
                self.timer.current_set,
                self.timer.current_rep
            );
            let instruction = self.exercise.instruction_for(1).to_string();
            self.timer = TimerState::idle(&instruction);
            self.phase_duration = 0;
            self.resumable = self
                .checkpoints()
                .load(&self.exercise.id, self.day, self.clock());
        }

        if was_running {
            CancelOutcome::Cancelled
        } else {
            CancelOutcome::NotRunning
        }
    }

    /// Advance the logical clock by one second
    ///
    /// Never fails; persistence problems are logged and kept for
    /// `take_persistence_warning`.
    pub fn tick(&mut self) {
        if !self.timer.is_running {
            return;
        }

        self.elapsed += 1;
        self.timer.current_time = self.timer.current_time.saturating_sub(1);
        self.maybe_hold_cue();

        if self.timer.current_time == 0 {
            self.advance();
        }
    }

    fn begin(&mut self) {
        self.timer.is_running = true;
        if self.exercise.execution_type == ExecutionType::Walk {
            let seconds = match self.settings {
                ExerciseSettings::Walk { walk_duration, .. } => walk_duration.saturating_mul(60),
                _ => 0,
            };
            self.enter(Phase::Exercise, seconds);
        } else {
            self.enter(Phase::Prepare, self.config.prepare_seconds);
        }
    }

    fn enter(&mut self, phase: Phase, duration: u32) {
        self.timer.phase = phase;
        self.timer.current_time = duration;
        self.timer.hold_sound_played = false;
        self.timer.instruction = self.instruction_text(phase);
        self.phase_duration = duration;

        if let Some(cue) = phase.entry_cue() {
            self.playback.cue(cue);
        }
        tracing::debug!(
            "{} entered {} for {}s (set {}, rep {})",
            self.exercise.id,
            phase,
            duration,
            self.timer.current_set,
            self.timer.current_rep
        );
    }

    fn maybe_hold_cue(&mut self) {
        if self.timer.phase != Phase::Exercise
            || !self.exercise.execution_type.is_hold_like()
            || self.timer.hold_sound_played
            || self.phase_duration <= self.config.hold_cue_threshold_seconds
        {
            return;
        }
        if self.timer.current_time <= self.phase_duration / 2 {
            self.timer.hold_sound_played = true;
            self.playback.cue(Cue::Hold);
        }
    }

    fn advance(&mut self) {
        match self.timer.phase {
            Phase::Prepare => match &self.settings {
                ExerciseSettings::FoamRolling {
                    rolling_duration, ..
                } => {
                    let duration = *rolling_duration;
                    self.enter(Phase::Rolling, duration);
                }
                ExerciseSettings::Dynamic { dynamic_reps, .. } => {
                    let duration =
                        dynamic_reps.saturating_mul(self.config.seconds_per_dynamic_rep);
                    self.enter(Phase::Exercise, duration);
                }
                ExerciseSettings::Hold { hold_time, .. } => {
                    let duration = *hold_time;
                    self.enter(Phase::Exercise, duration);
                }
                ExerciseSettings::Walk { walk_duration, .. } => {
                    let duration = walk_duration.saturating_mul(60);
                    self.enter(Phase::Exercise, duration);
                }
            },
            Phase::Exercise => match self.exercise.execution_type {
                ExecutionType::Walk => self.complete(1, None),
                ExecutionType::Hold | ExecutionType::Reps
                    if self.timer.current_rep < self.reps_in_set(self.timer.current_set) =>
                {
                    self.enter(Phase::MiniRest, self.config.mini_rest_seconds);
                }
                _ => self.finish_set(),
            },
            Phase::Rolling => self.finish_set(),
            Phase::MiniRest => {
                self.timer.current_rep += 1;
                let duration = self.settings.hold_time().unwrap_or(0);
                self.enter(Phase::Exercise, duration);
            }
            Phase::Rest => {
                self.timer.current_set += 1;
                self.timer.current_session = self.timer.current_set;
                self.timer.current_rep = 1;
                self.enter(Phase::Prepare, self.config.prepare_seconds);
            }
            Phase::Completed => {
                self.timer.is_running = false;
                self.exit_requested = true;
                tracing::debug!("{} exit delay elapsed", self.exercise.id);
            }
            Phase::Idle | Phase::SchemeCompleted => {
                self.timer.is_running = false;
            }
        }
    }

    /// Last rep of a set (or end of a rolling session) reached
    fn finish_set(&mut self) {
        let set = self.timer.current_set;
        let total = self.total_sets();
        self.completed_sets = set;

        if set < total {
            self.append_record(1, None);
            let progress = self.checkpoint(set, set + 1, self.is_two_scheme().then_some(self.timer.current_scheme));
            self.save_checkpoint(&progress);
            let rest = self.settings.rest_time().unwrap_or(0);
            self.enter(Phase::Rest, rest);
        } else if self.is_two_scheme() && self.timer.current_scheme == 1 {
            self.append_record(total, Some(1));
            let mut progress = self.checkpoint(0, 1, Some(2));
            progress.scheme_one_completed = Some(true);
            self.save_checkpoint(&progress);

            self.timer.scheme_one_completed = true;
            self.timer.is_running = false;
            tracing::info!("{} scheme 1 completed", self.exercise.id);
            self.enter(Phase::SchemeCompleted, 0);
        } else {
            let scheme = self.is_two_scheme().then_some(self.timer.current_scheme);
            self.complete(total, scheme);
        }
    }

    fn complete(&mut self, total_sets: u32, scheme: Option<u32>) {
        let at = self.clock();
        let marked = DailyPlanStore::new(self.store).mark_completed(
            self.day,
            &self.exercise.id,
            &self.exercise.name,
            at,
        );
        self.note_failure("mark plan completed", marked);

        self.append_record(total_sets, scheme);

        let cleared = self.checkpoints().clear(&self.exercise.id, self.day);
        self.note_failure("clear checkpoint", cleared);
        self.resumable = None;

        tracing::info!("Completed {}", self.exercise.id);
        self.enter(Phase::Completed, self.config.exit_delay_seconds);
        if self.config.exit_delay_seconds == 0 {
            self.advance();
        }
    }

    fn append_record(&mut self, total_sets: u32, scheme: Option<u32>) {
        let exercise_name = match scheme {
            Some(scheme) => format!("{} (scheme {})", self.exercise.name, scheme),
            None => self.exercise.name.clone(),
        };
        let record = CompletedExerciseRecord {
            id: Uuid::new_v4(),
            exercise_id: self.exercise.id.clone(),
            exercise_name,
            execution_type: Some(self.exercise.execution_type),
            completed_at: self.clock(),
            hold_time: self.settings.hold_time(),
            reps_schema: self.settings.reps_schema().map(<[u32]>::to_vec),
            rest_time: self.settings.rest_time(),
            total_sets,
        };
        let appended = HistoryRecorder::new(self.store).append_to_day(self.day, &record);
        self.note_failure("append history record", appended);
    }

    fn checkpoint(&self, completed_sets: u32, next_set: u32, scheme: Option<u32>) -> SessionProgress {
        SessionProgress {
            exercise_id: self.exercise.id.clone(),
            completed_sets,
            current_set: next_set,
            current_rep: 1,
            timestamp: self.clock(),
            current_scheme: scheme,
            scheme_one_completed: scheme.map(|_| self.timer.scheme_one_completed),
        }
    }

    fn save_checkpoint(&mut self, progress: &SessionProgress) {
        let saved = self.checkpoints().save(progress, self.day);
        self.note_failure("save checkpoint", saved);
    }

    fn note_failure(&mut self, action: &str, result: Result<()>) {
        if let Err(e) = result {
            tracing::error!("Failed to {} for {}: {}", action, self.exercise.id, e);
            self.persistence_warning = Some(e);
        }
    }

    fn checkpoints(&self) -> CheckpointStore<'a> {
        CheckpointStore::new(self.store, self.config.resume_window_hours)
    }

    fn clock(&self) -> DateTime<Utc> {
        self.opened_at + Duration::seconds(i64::from(self.elapsed))
    }

    fn is_two_scheme(&self) -> bool {
        self.exercise.two_scheme && self.exercise.execution_type.is_hold_like()
    }

    fn total_sets(&self) -> u32 {
        match self.exercise.execution_type {
            ExecutionType::Walk => 1,
            _ => self.settings.total_sets().max(1),
        }
    }

    fn reps_in_set(&self, set: u32) -> u32 {
        self.settings
            .reps_schema()
            .and_then(|schema| schema.get(set.saturating_sub(1) as usize).copied())
            .unwrap_or(1)
            .max(1)
    }

    fn instruction_text(&self, phase: Phase) -> String {
        let base = self.exercise.instruction_for(self.timer.current_scheme);
        match phase {
            Phase::Idle | Phase::Exercise | Phase::Rolling => base.to_string(),
            Phase::Prepare if base.is_empty() => "Get ready".to_string(),
            Phase::Prepare => format!("Get ready: {}", base),
            Phase::MiniRest => "Relax".to_string(),
            Phase::Rest => "Rest before the next set".to_string(),
            Phase::SchemeCompleted => "First side done; start the other side when ready".to_string(),
            Phase::Completed => "Exercise complete".to_string(),
        }
    }
}
