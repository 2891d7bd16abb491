use clap::{Args, Subcommand};
use daylog_core::{dedupe, superseded, Category, Filter, LogRecord, RecordStore};
use std::sync::Arc;

use super::{parse_date, OutputFormat};

#[derive(Args)]
pub struct LogCommand {
    #[command(subcommand)]
    pub command: LogSubcommand,
}

#[derive(Subcommand)]
pub enum LogSubcommand {
    /// List the authoritative records in a date range
    List {
        /// Category (workout, nutrition)
        #[arg(long, short)]
        category: Category,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show records superseded by a newer record of the same slot
    Dupes {
        /// Category (workout, nutrition)
        #[arg(long, short)]
        category: Category,

        /// Date (YYYY-MM-DD)
        #[arg(long, short)]
        date: String,

        /// Delete the superseded records
        #[arg(long)]
        prune: bool,
    },
}

impl LogCommand {
    pub async fn run<S: RecordStore>(&self, store: Arc<S>) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            LogSubcommand::List {
                category,
                from,
                to,
                format,
            } => {
                let from = parse_date(from)?;
                let to = parse_date(to)?;
                if from > to {
                    return Err("--from must not be after --to".into());
                }
                let records = store.query(*category).range_by_date(from, to).exec().await?;
                let raw = records.len();
                let records = authoritative(records);

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    }
                    OutputFormat::Text => {
                        if records.is_empty() {
                            println!("No {} records between {} and {}.", category, from, to);
                            return Ok(());
                        }
                        for record in &records {
                            println!("{}", record);
                        }
                        if raw > records.len() {
                            println!();
                            println!(
                                "{} duplicate record(s) hidden; see `daylog log dupes`.",
                                raw - records.len()
                            );
                        }
                    }
                }
                Ok(())
            }
            LogSubcommand::Dupes {
                category,
                date,
                prune,
            } => {
                let date = parse_date(date)?;
                let records = store.filter(*category, &Filter::new().date(date)).await?;
                let losers = superseded(&records);
                if losers.is_empty() {
                    println!("No duplicate {} records on {}.", category, date);
                    return Ok(());
                }

                for record in &losers {
                    println!("{}", record);
                }
                if *prune {
                    for record in &losers {
                        store.delete(*category, &record.id).await?;
                        tracing::info!("Deleted superseded record {}", record.id);
                    }
                    println!();
                    println!("Deleted {} superseded record(s).", losers.len());
                } else {
                    println!();
                    println!("Run again with --prune to delete them.");
                }
                Ok(())
            }
        }
    }
}

/// One record per slot and day, in date order.
fn authoritative(mut records: Vec<LogRecord>) -> Vec<LogRecord> {
    records.sort_by_key(|r| r.date);
    let mut by_date: Vec<Vec<LogRecord>> = Vec::new();
    for record in records {
        match by_date.last_mut() {
            Some(day) if day[0].date == record.date => day.push(record),
            _ => by_date.push(vec![record]),
        }
    }
    by_date.into_iter().flat_map(dedupe).collect()
}
