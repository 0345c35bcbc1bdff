//! Default catalog of rehabilitation programs.
//!
//! This module provides the built-in programs, their exercises and their
//! planned weekly templates.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Program assigned on first run
pub const DEFAULT_PROGRAM_ID: &str = "lower_back_basics";

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn hold(hold_time: u32, reps_schema: &[u32], rest_time: u32) -> ExerciseSettings {
    ExerciseSettings::Hold {
        hold_time,
        reps_schema: reps_schema.to_vec(),
        rest_time,
    }
}

/// Builds the default catalog with the built-in programs
///
/// Prefer `get_default_catalog()` in production code; this function is
/// retained for tests that need an owned catalog to modify.
pub fn build_default_catalog() -> Catalog {
    let mut programs = HashMap::new();

    // ========================================================================
    // Lower back basics
    // ========================================================================

    let mut back_templates = BTreeMap::new();
    back_templates.insert(
        1,
        SettingsTemplate {
            rest_time: Some(15),
            ..Default::default()
        },
    );
    back_templates.insert(
        3,
        SettingsTemplate {
            hold_time: Some(8),
            reps_schema: Some(vec![4, 3, 2]),
            ..Default::default()
        },
    );
    back_templates.insert(
        5,
        SettingsTemplate {
            hold_time: Some(10),
            reps_schema: Some(vec![5, 4, 3]),
            walk_duration: Some(15),
            ..Default::default()
        },
    );

    programs.insert(
        DEFAULT_PROGRAM_ID.to_string(),
        Program {
            id: DEFAULT_PROGRAM_ID.into(),
            name: "Lower Back Basics".into(),
            weekly_templates: back_templates,
            exercises: vec![
                ProgramExercise {
                    id: "bird_dog".into(),
                    name: "Bird Dog".into(),
                    execution_type: ExecutionType::Hold,
                    settings: hold(7, &[3, 2, 1], 15),
                    two_scheme: true,
                    instructions: vec![
                        "Extend your left arm and right leg, keep the back flat".into(),
                        "Extend your right arm and left leg, keep the back flat".into(),
                    ],
                },
                ProgramExercise {
                    id: "side_plank".into(),
                    name: "Side Plank (knees)".into(),
                    execution_type: ExecutionType::Hold,
                    settings: hold(10, &[3, 3], 20),
                    two_scheme: false,
                    instructions: vec!["Lift the hips and hold a straight line".into()],
                },
                ProgramExercise {
                    id: "curl_up".into(),
                    name: "Modified Curl-up".into(),
                    execution_type: ExecutionType::Reps,
                    settings: hold(5, &[5, 4, 3], 15),
                    two_scheme: false,
                    instructions: vec!["Raise the head and shoulders slightly, then lower".into()],
                },
                ProgramExercise {
                    id: "cat_camel".into(),
                    name: "Cat-Camel".into(),
                    execution_type: ExecutionType::Dynamic,
                    settings: ExerciseSettings::Dynamic {
                        dynamic_reps: 8,
                        dynamic_sets: 2,
                        rest_time: 10,
                    },
                    two_scheme: false,
                    instructions: vec!["Move slowly between a rounded and an arched back".into()],
                },
                ProgramExercise {
                    id: "foam_roll_thoracic".into(),
                    name: "Thoracic Foam Rolling".into(),
                    execution_type: ExecutionType::FoamRolling,
                    settings: ExerciseSettings::FoamRolling {
                        rolling_duration: 45,
                        rolling_sessions: 2,
                        rest_time: 10,
                    },
                    two_scheme: false,
                    instructions: vec!["Roll the upper back from shoulder blades to mid-back".into()],
                },
                ProgramExercise {
                    id: "daily_walk".into(),
                    name: "Brisk Walk".into(),
                    execution_type: ExecutionType::Walk,
                    settings: ExerciseSettings::Walk {
                        walk_duration: 10,
                        walk_sessions: 1,
                    },
                    two_scheme: false,
                    instructions: vec!["Walk at a comfortable, steady pace".into()],
                },
            ],
        },
    );

    // ========================================================================
    // Neck and shoulder
    // ========================================================================

    let mut neck_templates = BTreeMap::new();
    neck_templates.insert(
        2,
        SettingsTemplate {
            hold_time: Some(6),
            dynamic_reps: Some(12),
            ..Default::default()
        },
    );

    programs.insert(
        "neck_shoulder".to_string(),
        Program {
            id: "neck_shoulder".into(),
            name: "Neck & Shoulder Relief".into(),
            weekly_templates: neck_templates,
            exercises: vec![
                ProgramExercise {
                    id: "chin_tuck".into(),
                    name: "Chin Tuck".into(),
                    execution_type: ExecutionType::Hold,
                    settings: hold(5, &[5, 5], 10),
                    two_scheme: false,
                    instructions: vec!["Draw the chin straight back and hold".into()],
                },
                ProgramExercise {
                    id: "scapular_squeeze".into(),
                    name: "Scapular Squeeze".into(),
                    execution_type: ExecutionType::Reps,
                    settings: hold(3, &[8, 8], 15),
                    two_scheme: false,
                    instructions: vec!["Squeeze the shoulder blades together".into()],
                },
                ProgramExercise {
                    id: "shoulder_rolls".into(),
                    name: "Shoulder Rolls".into(),
                    execution_type: ExecutionType::Dynamic,
                    settings: ExerciseSettings::Dynamic {
                        dynamic_reps: 10,
                        dynamic_sets: 2,
                        rest_time: 10,
                    },
                    two_scheme: false,
                    instructions: vec!["Roll the shoulders backwards in large circles".into()],
                },
                ProgramExercise {
                    id: "evening_walk".into(),
                    name: "Evening Walk".into(),
                    execution_type: ExecutionType::Walk,
                    settings: ExerciseSettings::Walk {
                        walk_duration: 15,
                        walk_sessions: 1,
                    },
                    two_scheme: false,
                    instructions: vec!["Walk with relaxed shoulders".into()],
                },
            ],
        },
    );

    Catalog { programs }
}

impl Catalog {
    pub fn program(&self, program_id: &str) -> Option<&Program> {
        self.programs.get(program_id)
    }

    /// Program ids in stable order
    pub fn program_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.programs.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors (empty if valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, program) in &self.programs {
            if &program.id != id {
                errors.push(format!(
                    "Program key '{}' does not match program id '{}'",
                    id, program.id
                ));
            }

            if program.exercises.is_empty() {
                errors.push(format!("Program '{}' has no exercises", id));
            }

            let mut seen = HashSet::new();
            for exercise in &program.exercises {
                if !seen.insert(exercise.id.as_str()) {
                    errors.push(format!(
                        "Program '{}': duplicate exercise id '{}'",
                        id, exercise.id
                    ));
                }

                if let Err(e) = exercise.settings.validate() {
                    errors.push(format!(
                        "Program '{}': exercise '{}': {}",
                        id, exercise.id, e
                    ));
                }

                if !exercise.settings.matches_type(exercise.execution_type) {
                    errors.push(format!(
                        "Program '{}': exercise '{}' is {} but has {} settings",
                        id, exercise.id, exercise.execution_type, exercise.settings
                    ));
                }

                if exercise.two_scheme {
                    if !exercise.execution_type.is_hold_like() {
                        errors.push(format!(
                            "Program '{}': exercise '{}' is two-scheme but not hold/reps",
                            id, exercise.id
                        ));
                    }
                    if exercise.instructions.len() < 2 {
                        errors.push(format!(
                            "Program '{}': exercise '{}' needs one instruction per scheme",
                            id, exercise.id
                        ));
                    }
                }
            }

            for (week, template) in &program.weekly_templates {
                if *week == 0 {
                    errors.push(format!("Program '{}': template for week 0", id));
                }
                if template.reps_schema.as_ref().is_some_and(|s| s.is_empty()) {
                    errors.push(format!(
                        "Program '{}': week {} template has an empty reps_schema",
                        id, week
                    ));
                }
            }
        }

        if !self.programs.contains_key(DEFAULT_PROGRAM_ID) {
            errors.push(format!(
                "Catalog is missing the default program '{}'",
                DEFAULT_PROGRAM_ID
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads() {
        let catalog = build_default_catalog();
        assert_eq!(catalog.programs.len(), 2);
        assert_eq!(catalog.program_ids(), vec!["lower_back_basics", "neck_shoulder"]);
    }

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_every_execution_type_is_covered() {
        let catalog = get_default_catalog();
        let program = catalog.program(DEFAULT_PROGRAM_ID).unwrap();
        for execution_type in [
            ExecutionType::Hold,
            ExecutionType::Reps,
            ExecutionType::Dynamic,
            ExecutionType::FoamRolling,
            ExecutionType::Walk,
        ] {
            assert!(
                program
                    .exercises
                    .iter()
                    .any(|e| e.execution_type == execution_type),
                "No {} exercise in default program",
                execution_type
            );
        }
    }

    #[test]
    fn test_validate_flags_type_mismatch() {
        let mut catalog = build_default_catalog();
        let program = catalog.programs.get_mut(DEFAULT_PROGRAM_ID).unwrap();
        program.exercises[0].execution_type = ExecutionType::Walk;

        let errors = catalog.validate();
        assert!(errors.iter().any(|e| e.contains("bird_dog")));
    }
}
