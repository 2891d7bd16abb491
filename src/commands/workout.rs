use clap::{Args, Subcommand};
use daylog_core::{
    normalize::completion, Category, RecordStore, SlotKey, WorkoutPayload, WorkoutType,
};
use std::sync::Arc;

use super::{active_date, date_label, open_editor, save, OutputFormat};
use crate::config::Config;

#[derive(Args)]
pub struct WorkoutCommand {
    #[command(subcommand)]
    pub command: WorkoutSubcommand,
}

#[derive(Subcommand)]
pub enum WorkoutSubcommand {
    /// Show a day's workout log
    Show {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Workout type (A, B, C); all types when omitted
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        workout_type: Option<WorkoutType>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a set as completed
    Set {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        #[arg(long = "type", short = 't', value_name = "TYPE")]
        workout_type: WorkoutType,

        /// Exercise name as it appears in the template
        #[arg(long, short)]
        exercise: String,

        /// Set number, starting at 1
        #[arg(long = "set", short = 's', value_name = "N")]
        set: usize,

        /// Mark the set as not completed instead
        #[arg(long)]
        undo: bool,
    },

    /// Record the working weight of an exercise
    Weight {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        #[arg(long = "type", short = 't', value_name = "TYPE")]
        workout_type: WorkoutType,

        #[arg(long, short)]
        exercise: String,

        /// Weight in kg
        kg: f64,
    },
}

impl WorkoutCommand {
    pub async fn run<S: RecordStore>(
        &self,
        store: Arc<S>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            WorkoutSubcommand::Show {
                date,
                workout_type,
                format,
            } => {
                let active = active_date(date.as_deref())?;
                let editor = open_editor(store, Category::Workout, active.date, config).await?;
                let draft = editor.draft().ok_or("Workout log is not loaded")?;

                let types: Vec<WorkoutType> = match workout_type {
                    Some(t) => vec![*t],
                    None => WorkoutType::ALL.to_vec(),
                };
                let shown: Vec<(WorkoutType, &WorkoutPayload)> = types
                    .into_iter()
                    .filter_map(|t| {
                        let state = draft.slot(&SlotKey::Workout(t))?;
                        state.payload.as_workout().map(|w| (t, w))
                    })
                    .collect();

                match format {
                    OutputFormat::Json => {
                        let payloads: Vec<&WorkoutPayload> = shown.iter().map(|(_, w)| *w).collect();
                        println!("{}", serde_json::to_string_pretty(&payloads)?);
                    }
                    OutputFormat::Text => {
                        println!("Workout log for {}", date_label(&active));
                        for (t, workout) in shown {
                            println!();
                            print_workout(config, t, workout);
                        }
                    }
                }
                Ok(())
            }
            WorkoutSubcommand::Set {
                date,
                workout_type,
                exercise,
                set,
                undo,
            } => {
                let index = set.checked_sub(1).ok_or("Set numbers start at 1")?;
                let active = active_date(date.as_deref())?;
                let editor = open_editor(store, Category::Workout, active.date, config).await?;
                let slot = SlotKey::Workout(*workout_type);
                check_exercise(config, *workout_type, exercise)?;

                if editor.set_set_completed(&slot, exercise, index, !undo) {
                    println!(
                        "{} set {} of {} on {}",
                        if *undo { "Cleared" } else { "Completed" },
                        set,
                        exercise,
                        date_label(&active)
                    );
                } else {
                    println!("Set {} of {} is unchanged.", set, exercise);
                }
                save(&editor).await
            }
            WorkoutSubcommand::Weight {
                date,
                workout_type,
                exercise,
                kg,
            } => {
                if !kg.is_finite() || *kg < 0.0 {
                    return Err(format!("Invalid weight: {}", kg).into());
                }
                let active = active_date(date.as_deref())?;
                let editor = open_editor(store, Category::Workout, active.date, config).await?;
                let slot = SlotKey::Workout(*workout_type);
                check_exercise(config, *workout_type, exercise)?;

                if editor.set_exercise_weight(&slot, exercise, *kg) {
                    println!("Set {} to {} kg on {}", exercise, kg, date_label(&active));
                } else {
                    println!("{} is already at {} kg.", exercise, kg);
                }
                save(&editor).await
            }
        }
    }
}

fn check_exercise(
    config: &Config,
    workout_type: WorkoutType,
    exercise: &str,
) -> Result<(), String> {
    let template = config.templates.workout(workout_type);
    if template.iter().any(|t| t.name == exercise) {
        return Ok(());
    }
    let names: Vec<&str> = template.iter().map(|t| t.name.as_str()).collect();
    Err(format!(
        "Exercise '{}' is not part of workout {}. Options: {}",
        exercise,
        workout_type,
        names.join(", ")
    ))
}

fn print_workout(config: &Config, workout_type: WorkoutType, workout: &WorkoutPayload) {
    let progress = completion(config.templates.workout(workout_type), workout);
    println!("Workout {} ({} exercises done)", workout_type, progress);
    for exercise in &workout.exercises {
        let sets: Vec<&str> = exercise
            .sets
            .iter()
            .map(|s| if s.completed { "[x]" } else { "[ ]" })
            .collect();
        println!(
            "  {:<22} {:>6.1} kg  {}",
            exercise.name,
            exercise.weight,
            sets.join(" ")
        );
    }
}
