use clap::{Args, Subcommand};
use daylog_core::{Category, Macros, MenuType, NutritionPayload, RecordStore, SlotKey};
use std::sync::Arc;

use super::{active_date, date_label, open_editor, save, OutputFormat};
use crate::config::Config;

#[derive(Args)]
pub struct MealCommand {
    #[command(subcommand)]
    pub command: MealSubcommand,
}

#[derive(Subcommand)]
pub enum MealSubcommand {
    /// Show a day's meals for a menu
    Show {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Menu (e.g., weekday, weekend)
        #[arg(long, short, default_value = MenuType::DEFAULT)]
        menu: MenuType,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a meal item as eaten
    Check {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        #[arg(long, short, default_value = MenuType::DEFAULT)]
        menu: MenuType,

        /// Meal number within the menu
        #[arg(long = "meal", value_name = "N")]
        meal: u32,

        /// Item name as it appears in the template
        #[arg(long, short)]
        item: String,

        /// Mark the item as not eaten instead
        #[arg(long)]
        undo: bool,
    },

    /// Change the amount of a meal item
    Amount {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        #[arg(long, short, default_value = MenuType::DEFAULT)]
        menu: MenuType,

        #[arg(long = "meal", value_name = "N")]
        meal: u32,

        #[arg(long, short)]
        item: String,

        /// Amount in grams
        grams: f64,
    },
}

impl MealCommand {
    pub async fn run<S: RecordStore>(
        &self,
        store: Arc<S>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MealSubcommand::Show { date, menu, format } => {
                let active = active_date(date.as_deref())?;
                let editor = open_editor(store, Category::Nutrition, active.date, config).await?;
                let draft = editor.draft().ok_or("Nutrition log is not loaded")?;

                let meals: Vec<(u32, &NutritionPayload)> = draft
                    .slots()
                    .iter()
                    .filter_map(|(slot, state)| match slot {
                        SlotKey::Meal { menu: m, number } if m == menu => {
                            state.payload.as_nutrition().map(|n| (*number, n))
                        }
                        _ => None,
                    })
                    .collect();
                if meals.is_empty() {
                    return Err(format!("Menu '{}' has no meals", menu).into());
                }

                match format {
                    OutputFormat::Json => {
                        let payloads: Vec<&NutritionPayload> = meals.iter().map(|(_, n)| *n).collect();
                        println!("{}", serde_json::to_string_pretty(&payloads)?);
                    }
                    OutputFormat::Text => {
                        println!("{} menu for {}", menu, date_label(&active));
                        let mut day = Macros::default();
                        for (number, meal) in meals {
                            println!();
                            print_meal(number, meal);
                            day += meal.totals;
                        }
                        println!();
                        println!("Day total: {}", format_macros(&day));
                    }
                }
                Ok(())
            }
            MealSubcommand::Check {
                date,
                menu,
                meal,
                item,
                undo,
            } => {
                let active = active_date(date.as_deref())?;
                let editor = open_editor(store, Category::Nutrition, active.date, config).await?;
                let slot = SlotKey::meal(menu.clone(), *meal);
                check_item(config, menu, *meal, item)?;

                if editor.set_item_checked(&slot, item, !undo) {
                    println!(
                        "{} {} in meal {} on {}",
                        if *undo { "Unchecked" } else { "Checked" },
                        item,
                        meal,
                        date_label(&active)
                    );
                } else {
                    println!("{} in meal {} is unchanged.", item, meal);
                }
                save(&editor).await
            }
            MealSubcommand::Amount {
                date,
                menu,
                meal,
                item,
                grams,
            } => {
                if !grams.is_finite() || *grams < 0.0 {
                    return Err(format!("Invalid amount: {}", grams).into());
                }
                let active = active_date(date.as_deref())?;
                let editor = open_editor(store, Category::Nutrition, active.date, config).await?;
                let slot = SlotKey::meal(menu.clone(), *meal);
                check_item(config, menu, *meal, item)?;

                if editor.set_item_amount(&slot, item, *grams) {
                    println!("Set {} in meal {} to {} g", item, meal, grams);
                } else {
                    println!("{} in meal {} is already {} g.", item, meal, grams);
                }
                save(&editor).await
            }
        }
    }
}

fn check_item(config: &Config, menu: &MenuType, meal: u32, item: &str) -> Result<(), String> {
    let template = config.templates.meal(menu, meal);
    if template.is_empty() {
        return Err(format!("Menu '{}' has no meal {}", menu, meal));
    }
    if template.iter().any(|t| t.name == item) {
        return Ok(());
    }
    let names: Vec<&str> = template.iter().map(|t| t.name.as_str()).collect();
    Err(format!(
        "Item '{}' is not part of meal {}. Options: {}",
        item,
        meal,
        names.join(", ")
    ))
}

fn format_macros(macros: &Macros) -> String {
    format!(
        "{:.0} kcal, {:.1} g protein, {:.1} g carbs, {:.1} g fat",
        macros.calories, macros.protein, macros.carbs, macros.fat
    )
}

fn print_meal(number: u32, meal: &NutritionPayload) {
    println!("Meal {}", number);
    for item in &meal.items {
        println!(
            "  {} {:<20} {:>6.0} g",
            if item.checked { "[x]" } else { "[ ]" },
            item.name,
            item.amount
        );
    }
    println!("  Eaten: {}", format_macros(&meal.totals));
}
