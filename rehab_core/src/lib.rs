#![forbid(unsafe_code)]

//! Core domain model and business logic for the rehab exercise system.
//!
//! This crate provides:
//! - Domain types (execution types, settings, programs, progress, records)
//! - Built-in program catalog
//! - Settings resolution and weekly progression
//! - The exercise session state machine
//! - Persistence (blob store, checkpoints, daily plans, history, CSV export)
//! - Reminder planning

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod resolver;
pub mod events;
pub mod progression;
pub mod checkpoint;
pub mod plan;
pub mod session;
pub mod history;
pub mod export;
pub mod reminders;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, DEFAULT_PROGRAM_ID};
pub use config::Config;
pub use store::{BlobStore, FileStore, MemoryStore};
pub use resolver::{resolve, resolve_or_default};
pub use events::{SettingsBus, SettingsEvent, SubscriptionId};
pub use progression::ProgressionManager;
pub use session::{CancelOutcome, Cue, ExerciseSession, NullPlayback, Phase, PlaybackSink, TimerState};
pub use history::{HistoryRecorder, OverallStatistics};
pub use export::export_history_csv;
pub use reminders::{Reminder, ReminderPlanner};
