use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::{Backend, Config};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("store.backend: {}", config.store.backend.value);
                        println!("  source: {}", config.store.backend.source);
                        println!();

                        match config.store.backend.value {
                            Backend::Sqlite => {
                                println!(
                                    "database_path: {}",
                                    config.database_path.value.display()
                                );
                                println!("  source: {}", config.database_path.source);
                            }
                            Backend::Http => {
                                println!(
                                    "store.server_url: {}",
                                    config.store.server_url.value.as_deref().unwrap_or("(not set)")
                                );
                                println!("  source: {}", config.store.server_url.source);
                                println!(
                                    "store.api_key: {}",
                                    if config.store.api_key.value.is_some() {
                                        "(set)"
                                    } else {
                                        "(not set)"
                                    }
                                );
                                println!("  source: {}", config.store.api_key.source);
                            }
                        }
                        println!();

                        let engine = &config.engine;
                        println!("engine.debounce_ms: {}", engine.debounce_ms);
                        println!("engine.guard_ms: {}", engine.guard_ms);
                        println!("engine.seed_lookback_days: {}", engine.seed_lookback_days);
                        println!(
                            "engine.retry: {} retries, {}-{} ms backoff",
                            engine.retry.max_retries,
                            engine.retry.base_delay_ms,
                            engine.retry.max_delay_ms
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
