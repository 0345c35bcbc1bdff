use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rehab_core::*;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rehab")]
#[command(about = "Guided rehabilitation exercise tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show program, week, streaks and today's exercises (default)
    Status,

    /// Show effective settings for one exercise or the whole program
    Settings {
        exercise: Option<String>,
    },

    /// Run an exercise with the guided timer
    Run {
        exercise: String,

        /// Resume from today's saved progress if there is any
        #[arg(long = "continue")]
        resume: bool,

        /// Do not wait between ticks (for testing)
        #[arg(long)]
        fast: bool,
    },

    /// Count a completed day
    CompleteDay {
        /// Day to count, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record a missed day
    MissDay {
        date: NaiveDate,
    },

    /// Accept progression to the next week
    Accept {
        /// Week to move to, defaults to the next one
        #[arg(long)]
        week: Option<u32>,
    },

    /// Decline the suggested progression
    Decline {
        #[arg(long)]
        week: Option<u32>,
    },

    /// Reduce the load of every exercise (pain response)
    Reduce {
        /// Fraction to remove, e.g. 0.25
        #[arg(long)]
        percent: Option<f64>,
    },

    /// Step back a number of weeks
    Rollback {
        weeks: u32,
    },

    /// Switch to another program, remembering the current one
    Switch {
        program: String,
    },

    /// Return to the previously used program
    Return,

    /// Show overall history statistics
    Stats,

    /// Export history to CSV
    Export {
        path: PathBuf,
    },

    /// List configured reminders
    Reminders,
}

fn main() -> Result<()> {
    // Initialize logging
    rehab_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;
    let store = FileStore::new(&data_dir);
    tracing::debug!("Using data directory {:?}", data_dir);

    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Config("Invalid catalog".into()));
    }

    let mut manager = ProgressionManager::load(
        &store,
        config.progression.clone(),
        &config.program.default_program,
    );
    let today = Utc::now().date_naive();

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => cmd_status(&store, catalog, &mut manager, today),
        Commands::Settings { exercise } => cmd_settings(catalog, &manager, exercise.as_deref()),
        Commands::Run {
            exercise,
            resume,
            fast,
        } => cmd_run(&store, catalog, &manager, &config, &exercise, resume, fast),
        Commands::CompleteDay { date } => {
            manager.mark_day_completed(Some(date.unwrap_or(today)))?;
            let progress = manager.progress();
            println!(
                "✓ Day {} completed (streak {})",
                progress.days_completed, progress.current_streak
            );
            Ok(())
        }
        Commands::MissDay { date } => {
            if manager.mark_day_missed(date)? {
                println!("Marked {} as missed", date);
            } else {
                println!("{} was already marked as missed", date);
            }
            Ok(())
        }
        Commands::Accept { week } => {
            let program = current_program(catalog, &manager)?;
            let week = week.unwrap_or(manager.progress().current_week + 1);
            manager.accept_progression(program, week, today)?;
            println!("✓ Progressed to week {}", manager.progress().current_week);
            Ok(())
        }
        Commands::Decline { week } => {
            let program = current_program(catalog, &manager)?;
            let week = week.unwrap_or(manager.progress().current_week + 1);
            manager.decline_progression(program, week, today)?;
            println!(
                "Staying on week {} (declined week {})",
                manager.progress().current_week,
                week
            );
            Ok(())
        }
        Commands::Reduce { percent } => {
            let program = current_program(catalog, &manager)?;
            let percent = percent.unwrap_or(config.progression.reduction_percent);
            if !(0.0..1.0).contains(&percent) {
                return Err(Error::Config(format!(
                    "reduction must be in [0, 1), got {}",
                    percent
                )));
            }
            manager.reduce_current_settings(program, percent)?;
            println!("✓ Reduced load by {:.0}%", percent * 100.0);
            Ok(())
        }
        Commands::Rollback { weeks } => {
            let week = manager.rollback_weeks(weeks)?;
            println!("✓ Back to week {}", week);
            Ok(())
        }
        Commands::Switch { program } => {
            let target = catalog
                .program(&program)
                .ok_or_else(|| Error::NotFound(format!("program '{}'", program)))?;
            manager.switch_program_with_history(&target.id, today)?;
            println!("✓ Switched to {}", target.name);
            Ok(())
        }
        Commands::Return => {
            if manager.return_to_previous_program(today)? {
                let progress = manager.progress();
                println!(
                    "✓ Returned to {} at week {}",
                    progress.current_program_id, progress.current_week
                );
            } else {
                println!("No previous program to return to.");
            }
            Ok(())
        }
        Commands::Stats => cmd_stats(&store),
        Commands::Export { path } => {
            let count = export_history_csv(&store, &path)?;
            println!("✓ Exported {} records to {}", count, path.display());
            Ok(())
        }
        Commands::Reminders => {
            let planner = ReminderPlanner::from_config(&config)?;
            for reminder in planner.reminders() {
                println!(
                    "  {} {}",
                    reminder.time.format("%H:%M"),
                    if reminder.enabled { "on" } else { "off" }
                );
            }
            if let Some(next) = planner.next_after(Utc::now().naive_utc()) {
                println!("Next reminder: {}", next.format("%Y-%m-%d %H:%M"));
            }
            Ok(())
        }
    }
}

fn current_program<'c>(catalog: &'c Catalog, manager: &ProgressionManager<'_>) -> Result<&'c Program> {
    let program_id = &manager.progress().current_program_id;
    catalog
        .program(program_id)
        .ok_or_else(|| Error::NotFound(format!("program '{}'", program_id)))
}

fn cmd_status(
    store: &dyn BlobStore,
    catalog: &Catalog,
    manager: &mut ProgressionManager<'_>,
    today: NaiveDate,
) -> Result<()> {
    let program = current_program(catalog, manager)?;
    let progress = manager.progress();

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", program.name);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Week {}  ·  {} days completed", progress.current_week, progress.days_completed);
    println!(
        "  Streak {} (longest {})",
        progress.current_streak, progress.longest_streak
    );
    println!();

    let plan = rehab_core::plan::DailyPlanStore::new(store).ensure_plan(today, program)?;
    for entry in &plan.entries {
        let mark = if entry.completed { "✓" } else { " " };
        println!("  [{}] {}", mark, entry.exercise_name);
    }

    if manager.should_show_progression_popup(today) {
        let next = manager.progress().current_week + 1;
        println!();
        println!("  You are ready to progress to week {}.", next);
        println!("  Run `rehab accept` or `rehab decline`.");
        manager.mark_progression_popup_shown(today)?;
    }

    println!();
    Ok(())
}

fn cmd_settings(catalog: &Catalog, manager: &ProgressionManager<'_>, exercise_id: Option<&str>) -> Result<()> {
    let program = current_program(catalog, manager)?;

    let exercises: Vec<&ProgramExercise> = match exercise_id {
        Some(id) => vec![program
            .exercise(id)
            .ok_or_else(|| Error::NotFound(format!("exercise '{}' in program '{}'", id, program.id)))?],
        None => program.exercises.iter().collect(),
    };

    for exercise in exercises {
        let settings = manager.effective_settings_or_default(program, exercise);
        let marker = if manager.progress().manual_overrides.contains_key(&exercise.id) {
            " (override)"
        } else {
            ""
        };
        println!("  {:<28} {}{}", exercise.name, settings, marker);
    }
    Ok(())
}

/// Prints cues as they happen
struct ConsolePlayback;

impl PlaybackSink for ConsolePlayback {
    fn cue(&mut self, cue: Cue) {
        println!("    ♪ {}", cue);
    }
}

fn cmd_run(
    store: &dyn BlobStore,
    catalog: &Catalog,
    manager: &ProgressionManager<'_>,
    config: &Config,
    exercise_id: &str,
    resume: bool,
    fast: bool,
) -> Result<()> {
    let program = current_program(catalog, manager)?;
    let exercise = program
        .exercise(exercise_id)
        .ok_or_else(|| Error::NotFound(format!("exercise '{}' in program '{}'", exercise_id, program.id)))?;
    let settings = manager.effective_settings_or_default(program, exercise);

    let mut session = ExerciseSession::open(
        store,
        exercise,
        settings,
        config.session.clone(),
        ConsolePlayback,
        Utc::now(),
    );

    println!("\n  {} ({})\n", exercise.name, session.settings());

    if resume && session.resumable().is_some() {
        session.continue_saved()?;
    } else {
        if resume {
            println!("  No saved progress for today, starting fresh.");
        }
        session.start()?;
    }

    let mut last_phase = None;
    while !session.exit_requested() {
        if last_phase != Some(session.phase()) {
            let timer = session.timer();
            println!(
                "  [{}] set {} rep {}: {} ({}s)",
                timer.phase, timer.current_set, timer.current_rep, timer.instruction, timer.current_time
            );
            last_phase = Some(timer.phase);
        }

        if let Some(warning) = session.take_persistence_warning() {
            eprintln!("  ! Progress could not be saved: {}", warning);
        }

        match session.phase() {
            Phase::SchemeCompleted => {
                println!("  Starting scheme 2");
                session.start()?;
                continue;
            }
            _ if !session.timer().is_running => break,
            _ => {}
        }

        if !fast {
            std::thread::sleep(Duration::from_secs(1));
        }
        session.tick();
    }

    if let Some(warning) = session.take_persistence_warning() {
        eprintln!("  ! Progress could not be saved: {}", warning);
    }

    if session.phase() == Phase::Completed {
        println!("\n✓ {} completed!", exercise.name);
    }
    Ok(())
}

fn cmd_stats(store: &dyn BlobStore) -> Result<()> {
    let stats = HistoryRecorder::new(store).overall_statistics();

    println!("Total records: {}", stats.total_records);
    println!("Total sets: {}", stats.total_sets);
    println!("Active days: {}", stats.active_days);
    if let (Some(first), Some(last)) = (stats.first_day, stats.last_day) {
        println!("Active from {} to {}", first, last);
    }

    if !stats.per_exercise.is_empty() {
        println!();
        for (id, totals) in &stats.per_exercise {
            println!(
                "  {:<24} {} records, {} sets",
                id, totals.records, totals.total_sets
            );
        }
    }
    if !stats.per_type.is_empty() {
        println!();
        for (execution_type, count) in &stats.per_type {
            println!("  {:<24} {}", execution_type, count);
        }
    }
    Ok(())
}
