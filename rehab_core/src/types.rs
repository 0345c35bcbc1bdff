//! Core domain types for the rehab exercise system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Execution types and their per-type settings records
//! - Programs, exercises and weekly templates
//! - Persisted user progress and progression history
//! - Resumable session checkpoints and completion records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Execution Types
// ============================================================================

/// Category of an exercise, deciding its settings record and phase table
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Hold,
    Reps,
    Dynamic,
    FoamRolling,
    Walk,
}

impl ExecutionType {
    /// Hold and reps exercises share the same settings record and phase table
    pub fn is_hold_like(self) -> bool {
        matches!(self, ExecutionType::Hold | ExecutionType::Reps)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionType::Hold => "hold",
            ExecutionType::Reps => "reps",
            ExecutionType::Dynamic => "dynamic",
            ExecutionType::FoamRolling => "foam_rolling",
            ExecutionType::Walk => "walk",
        }
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Effective parameters for one exercise, tagged by settings kind
///
/// `Hold` serves both the `hold` and `reps` execution types.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExerciseSettings {
    Hold {
        /// Seconds per hold/rep
        hold_time: u32,
        /// Reps per set, one element per set
        reps_schema: Vec<u32>,
        /// Seconds between sets
        rest_time: u32,
    },
    Dynamic {
        dynamic_reps: u32,
        dynamic_sets: u32,
        rest_time: u32,
    },
    FoamRolling {
        /// Seconds per rolling session
        rolling_duration: u32,
        rolling_sessions: u32,
        rest_time: u32,
    },
    Walk {
        /// Minutes
        walk_duration: u32,
        walk_sessions: u32,
    },
}

impl ExerciseSettings {
    /// Whether this record is the one the given execution type reads
    pub fn matches_type(&self, execution_type: ExecutionType) -> bool {
        match self {
            ExerciseSettings::Hold { .. } => execution_type.is_hold_like(),
            ExerciseSettings::Dynamic { .. } => execution_type == ExecutionType::Dynamic,
            ExerciseSettings::FoamRolling { .. } => execution_type == ExecutionType::FoamRolling,
            ExerciseSettings::Walk { .. } => execution_type == ExecutionType::Walk,
        }
    }

    pub fn hold_time(&self) -> Option<u32> {
        match self {
            ExerciseSettings::Hold { hold_time, .. } => Some(*hold_time),
            _ => None,
        }
    }

    pub fn reps_schema(&self) -> Option<&[u32]> {
        match self {
            ExerciseSettings::Hold { reps_schema, .. } => Some(reps_schema),
            _ => None,
        }
    }

    pub fn rest_time(&self) -> Option<u32> {
        match self {
            ExerciseSettings::Hold { rest_time, .. }
            | ExerciseSettings::Dynamic { rest_time, .. }
            | ExerciseSettings::FoamRolling { rest_time, .. } => Some(*rest_time),
            ExerciseSettings::Walk { .. } => None,
        }
    }

    /// Number of sets (or sessions) a full run consists of
    pub fn total_sets(&self) -> u32 {
        match self {
            ExerciseSettings::Hold { reps_schema, .. } => reps_schema.len() as u32,
            ExerciseSettings::Dynamic { dynamic_sets, .. } => *dynamic_sets,
            ExerciseSettings::FoamRolling {
                rolling_sessions, ..
            } => *rolling_sessions,
            ExerciseSettings::Walk { walk_sessions, .. } => *walk_sessions,
        }
    }

    /// Check the record invariants: non-empty schema, all numbers positive
    pub fn validate(&self) -> crate::Result<()> {
        let fields: Vec<(&str, u32)> = match self {
            ExerciseSettings::Hold {
                hold_time,
                reps_schema,
                rest_time,
            } => {
                if reps_schema.is_empty() {
                    return Err(crate::Error::InvalidSettings(
                        "reps_schema must not be empty".into(),
                    ));
                }
                let mut fields = vec![("hold_time", *hold_time), ("rest_time", *rest_time)];
                fields.extend(reps_schema.iter().map(|r| ("reps_schema", *r)));
                fields
            }
            ExerciseSettings::Dynamic {
                dynamic_reps,
                dynamic_sets,
                rest_time,
            } => vec![
                ("dynamic_reps", *dynamic_reps),
                ("dynamic_sets", *dynamic_sets),
                ("rest_time", *rest_time),
            ],
            ExerciseSettings::FoamRolling {
                rolling_duration,
                rolling_sessions,
                rest_time,
            } => vec![
                ("rolling_duration", *rolling_duration),
                ("rolling_sessions", *rolling_sessions),
                ("rest_time", *rest_time),
            ],
            ExerciseSettings::Walk {
                walk_duration,
                walk_sessions,
            } => vec![
                ("walk_duration", *walk_duration),
                ("walk_sessions", *walk_sessions),
            ],
        };

        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(crate::Error::InvalidSettings(format!(
                "{} must be positive",
                name
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ExerciseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExerciseSettings::Hold {
                hold_time,
                reps_schema,
                rest_time,
            } => {
                let schema: Vec<String> = reps_schema.iter().map(|r| r.to_string()).collect();
                write!(
                    f,
                    "hold {}s, reps [{}], rest {}s",
                    hold_time,
                    schema.join(", "),
                    rest_time
                )
            }
            ExerciseSettings::Dynamic {
                dynamic_reps,
                dynamic_sets,
                rest_time,
            } => write!(
                f,
                "{} reps x {} sets, rest {}s",
                dynamic_reps, dynamic_sets, rest_time
            ),
            ExerciseSettings::FoamRolling {
                rolling_duration,
                rolling_sessions,
                rest_time,
            } => write!(
                f,
                "roll {}s x {} sessions, rest {}s",
                rolling_duration, rolling_sessions, rest_time
            ),
            ExerciseSettings::Walk {
                walk_duration,
                walk_sessions,
            } => write!(f, "walk {} min x {}", walk_duration, walk_sessions),
        }
    }
}

/// Partial settings shared by all exercises of a program for one week
///
/// Only the fields present here override an exercise's base settings, and
/// only where the base record has that field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SettingsTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps_schema: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_sets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_sessions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walk_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walk_sessions: Option<u32>,
}

// ============================================================================
// Programs
// ============================================================================

/// An exercise as declared by a program
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramExercise {
    pub id: String,
    pub name: String,
    pub execution_type: ExecutionType,
    /// Base settings before any template, adjustment or override
    pub settings: ExerciseSettings,
    /// Runs as two symmetric halves (e.g. left arm/right leg, then the mirror)
    #[serde(default)]
    pub two_scheme: bool,
    /// Instruction text, one entry per scheme
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl ProgramExercise {
    /// Instruction text for a 1-based scheme number
    pub fn instruction_for(&self, scheme: u32) -> &str {
        let idx = scheme.saturating_sub(1) as usize;
        self.instructions
            .get(idx)
            .or_else(|| self.instructions.first())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A rehabilitation program: exercises plus the planned weekly curve
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub exercises: Vec<ProgramExercise>,
    #[serde(default)]
    pub weekly_templates: BTreeMap<u32, SettingsTemplate>,
}

impl Program {
    pub fn exercise(&self, exercise_id: &str) -> Option<&ProgramExercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }
}

/// The complete set of built-in programs
#[derive(Clone, Debug)]
pub struct Catalog {
    pub programs: HashMap<String, Program>,
}

// ============================================================================
// User Progress
// ============================================================================

/// Audit entry for one progression decision
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressionHistoryEntry {
    pub date: NaiveDate,
    pub week: u32,
    pub accepted: bool,
    pub previous_settings: BTreeMap<String, ExerciseSettings>,
    pub new_settings: BTreeMap<String, ExerciseSettings>,
}

/// A program the user switched away from
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgramHistoryEntry {
    pub program_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub week: u32,
}

/// Persisted root of everything the user has done in their program
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
    pub current_program_id: String,
    pub program_start_date: NaiveDate,
    pub days_completed: u32,
    pub current_week: u32,
    #[serde(default)]
    pub manual_overrides: BTreeMap<String, ExerciseSettings>,
    #[serde(default)]
    pub weekly_adjusted_settings: BTreeMap<u32, BTreeMap<String, ExerciseSettings>>,
    #[serde(default)]
    pub progression_history: Vec<ProgressionHistoryEntry>,
    #[serde(default)]
    pub program_history: Vec<ProgramHistoryEntry>,
    #[serde(default)]
    pub missed_days: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub last_progression_popup_date: Option<NaiveDate>,
}

impl UserProgress {
    /// Fresh progress for a program: week 1, nothing completed
    pub fn new(program_id: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            current_program_id: program_id.into(),
            program_start_date: start_date,
            days_completed: 0,
            current_week: 1,
            manual_overrides: BTreeMap::new(),
            weekly_adjusted_settings: BTreeMap::new(),
            progression_history: Vec::new(),
            program_history: Vec::new(),
            missed_days: BTreeSet::new(),
            current_streak: 0,
            longest_streak: 0,
            last_progression_popup_date: None,
        }
    }
}

impl Default for UserProgress {
    fn default() -> Self {
        Self::new(
            crate::catalog::DEFAULT_PROGRAM_ID,
            Utc::now().date_naive(),
        )
    }
}

// ============================================================================
// Sessions and History
// ============================================================================

/// Resumable mid-exercise checkpoint
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionProgress {
    pub exercise_id: String,
    pub completed_sets: u32,
    pub current_set: u32,
    pub current_rep: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_scheme: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme_one_completed: Option<bool>,
}

/// One completed set, session, scheme or full exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedExerciseRecord {
    pub id: Uuid,
    pub exercise_id: String,
    pub exercise_name: String,
    #[serde(default)]
    pub execution_type: Option<ExecutionType>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub hold_time: Option<u32>,
    #[serde(default)]
    pub reps_schema: Option<Vec<u32>>,
    #[serde(default)]
    pub rest_time: Option<u32>,
    pub total_sets: u32,
}

/// One line of the day's exercise list
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanEntry {
    pub exercise_id: String,
    pub exercise_name: String,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// The exercise list for one calendar day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub entries: Vec<PlanEntry>,
}

impl DailyPlan {
    pub fn is_completed(&self, exercise_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.exercise_id == exercise_id && e.completed)
    }

    pub fn all_completed(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.completed)
    }
}
