//! Settings resolution: which parameters apply to an exercise right now.
//!
//! Priority, first match wins:
//! 1. Manual override for the exercise
//! 2. Weekly adjusted settings for the current week
//! 3. The program's weekly template, merged field-by-field over the base
//! 4. The base settings declared by the program
//!
//! All defaulting for absent settings lives in this module.

use crate::{Error, ExecutionType, ExerciseSettings, Program, Result, SettingsTemplate, UserProgress};

/// Resolve the effective settings for one exercise
///
/// Pure function of its inputs. Fails with `NotFound` when the program does
/// not declare the exercise.
pub fn resolve(program: &Program, exercise_id: &str, progress: &UserProgress) -> Result<ExerciseSettings> {
    let exercise = program.exercise(exercise_id).ok_or_else(|| {
        Error::NotFound(format!(
            "exercise '{}' in program '{}'",
            exercise_id, program.id
        ))
    })?;

    if let Some(settings) = progress.manual_overrides.get(exercise_id) {
        return Ok(settings.clone());
    }

    if let Some(settings) = progress
        .weekly_adjusted_settings
        .get(&progress.current_week)
        .and_then(|week| week.get(exercise_id))
    {
        return Ok(settings.clone());
    }

    match template_for_week(program, progress.current_week) {
        Some(template) => Ok(apply_template(&exercise.settings, template)),
        None => Ok(exercise.settings.clone()),
    }
}

/// Resolve, falling back to the safe default for the execution type
///
/// Used wherever a missing exercise must not abort a session.
pub fn resolve_or_default(
    program: &Program,
    exercise_id: &str,
    progress: &UserProgress,
    execution_type: ExecutionType,
) -> ExerciseSettings {
    match resolve(program, exercise_id, progress) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("{}; using default {} settings", e, execution_type);
            default_for(execution_type)
        }
    }
}

/// Conservative settings used when nothing else is known
pub fn default_for(execution_type: ExecutionType) -> ExerciseSettings {
    match execution_type {
        ExecutionType::Hold | ExecutionType::Reps => ExerciseSettings::Hold {
            hold_time: 5,
            reps_schema: vec![3, 3],
            rest_time: 15,
        },
        ExecutionType::Dynamic => ExerciseSettings::Dynamic {
            dynamic_reps: 8,
            dynamic_sets: 2,
            rest_time: 15,
        },
        ExecutionType::FoamRolling => ExerciseSettings::FoamRolling {
            rolling_duration: 30,
            rolling_sessions: 1,
            rest_time: 10,
        },
        ExecutionType::Walk => ExerciseSettings::Walk {
            walk_duration: 5,
            walk_sessions: 1,
        },
    }
}

/// Template for a week: exact match, else the highest earlier week, else the first
pub fn template_for_week(program: &Program, week: u32) -> Option<&SettingsTemplate> {
    program
        .weekly_templates
        .range(..=week)
        .next_back()
        .or_else(|| program.weekly_templates.iter().next())
        .map(|(_, template)| template)
}

/// Overlay the fields a template defines onto base settings
pub fn apply_template(base: &ExerciseSettings, template: &SettingsTemplate) -> ExerciseSettings {
    match base {
        ExerciseSettings::Hold {
            hold_time,
            reps_schema,
            rest_time,
        } => ExerciseSettings::Hold {
            hold_time: template.hold_time.unwrap_or(*hold_time),
            reps_schema: template
                .reps_schema
                .as_ref()
                .filter(|schema| !schema.is_empty())
                .unwrap_or(reps_schema)
                .clone(),
            rest_time: template.rest_time.unwrap_or(*rest_time),
        },
        ExerciseSettings::Dynamic {
            dynamic_reps,
            dynamic_sets,
            rest_time,
        } => ExerciseSettings::Dynamic {
            dynamic_reps: template.dynamic_reps.unwrap_or(*dynamic_reps),
            dynamic_sets: template.dynamic_sets.unwrap_or(*dynamic_sets),
            rest_time: template.rest_time.unwrap_or(*rest_time),
        },
        ExerciseSettings::FoamRolling {
            rolling_duration,
            rolling_sessions,
            rest_time,
        } => ExerciseSettings::FoamRolling {
            rolling_duration: template.rolling_duration.unwrap_or(*rolling_duration),
            rolling_sessions: template.rolling_sessions.unwrap_or(*rolling_sessions),
            rest_time: template.rest_time.unwrap_or(*rest_time),
        },
        ExerciseSettings::Walk {
            walk_duration,
            walk_sessions,
        } => ExerciseSettings::Walk {
            walk_duration: template.walk_duration.unwrap_or(*walk_duration),
            walk_sessions: template.walk_sessions.unwrap_or(*walk_sessions),
        },
    }
}
