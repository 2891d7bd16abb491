mod config_cmd;
mod log;
mod meal;
mod workout;

pub use config_cmd::ConfigCommand;
pub use log::LogCommand;
pub use meal::MealCommand;
pub use workout::WorkoutCommand;

use chrono::NaiveDate;
use clap::ValueEnum;
use daylog_core::{
    ActiveDate, Category, DateNavigator, FlushReason, LoadOutcome, LogEditor, RecordStore,
};
use std::sync::Arc;

use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", value))
}

/// The requested date, or today.
pub fn active_date(date: Option<&str>) -> Result<ActiveDate, String> {
    let navigator = DateNavigator::from_local_clock();
    if let Some(value) = date {
        navigator.set_date(parse_date(value)?);
    }
    Ok(navigator.active())
}

pub fn date_label(active: &ActiveDate) -> String {
    if active.is_today {
        format!("{} (today)", active.date)
    } else {
        active.date.to_string()
    }
}

/// Loads the day into a fresh editor, failing if the store stays unreachable.
pub async fn open_editor<S: RecordStore>(
    store: Arc<S>,
    category: Category,
    date: NaiveDate,
    config: &Config,
) -> Result<LogEditor<S>, Box<dyn std::error::Error>> {
    let editor = LogEditor::new(
        store,
        category,
        Arc::new(config.templates.clone()),
        config.engine.clone(),
    );
    match editor.activate(date).await {
        LoadOutcome::Populated { .. } => Ok(editor),
        LoadOutcome::Failed(e) => Err(e.into()),
        LoadOutcome::Stale => Err(format!("Loading {} {} was interrupted", category, date).into()),
    }
}

/// Writes pending edits before the process exits.
pub async fn save<S: RecordStore>(editor: &LogEditor<S>) -> Result<(), Box<dyn std::error::Error>> {
    let summary = editor.force_flush(FlushReason::Unload).await?;
    if summary.written > 0 {
        println!("Saved.");
    } else {
        println!("No changes to save.");
    }
    Ok(())
}
