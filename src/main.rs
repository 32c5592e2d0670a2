use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use lombard_lib::commands::{self, PriceFormOutcome};
use lombard_lib::data::seed::SeedOutcome;
use lombard_lib::engine::schedule;
use lombard_lib::models::config::SiteConfig;
use lombard_lib::models::price::PriceSubmission;
use lombard_lib::models::schedule::DayEntry;
use lombard_lib::utils::export;
use lombard_lib::AppState;

#[derive(Parser)]
#[command(name = "lombard", about = "Pawnshop branches and metal prices")]
struct Cli {
    /// Config file (defaults to $LOMBARD_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the demo branch if it does not exist
    Seed,
    /// List active branches and whether they are open now
    Branches {
        /// Print the map JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show a branch's opening hours
    Schedule { branch_id: String },
    /// Replace a branch's opening hours from a JSON list of day entries
    SetHours { branch_id: String, file: PathBuf },
    /// Show a branch on the public list
    Activate { branch_id: String },
    /// Hide a branch from the public list
    Deactivate { branch_id: String },
    /// Show the current price list
    Prices,
    /// Derive and commit a new price table
    UpdatePrices {
        /// Gold price per gram at the reference purity
        #[arg(long)]
        gold: String,
        /// Silver 925 price per gram
        #[arg(long)]
        silver: String,
        /// Override one derived gold price, e.g. --set 750=6500
        #[arg(long = "set", value_parser = parse_override)]
        overrides: Vec<(u16, String)>,
    },
    /// Write the price table to a CSV file
    ExportPrices { path: PathBuf },
}

fn parse_override(raw: &str) -> Result<(u16, String), String> {
    let (purity, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PURITY=PRICE, got '{}'", raw))?;
    let purity = purity
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("bad purity '{}': {}", purity, e))?;
    Ok((purity, price.to_string()))
}

fn main() -> Result<()> {
    lombard_lib::init_tracing();
    let cli = Cli::parse();

    let config = SiteConfig::load(cli.config.as_deref()).context("loading config")?;
    let state = AppState::open(config).context("opening database")?;
    let now = Utc::now();

    match cli.command {
        Command::Seed => match commands::seed_demo_data(&state, now)? {
            SeedOutcome::Created(branch) => println!("Создан филиал: {}", branch),
            SeedOutcome::AlreadyExists(_) => println!("Филиал уже существует"),
        },
        Command::Branches { json } => {
            let listing = commands::list_branches(&state, now)?;
            if json {
                println!("{}", listing.map_json);
            } else {
                for b in &listing.branches {
                    println!("{} | {}, {} | {} | {}", b.id, b.city, b.address, b.phone, b.status_text);
                }
                println!(
                    "Всего: {}, открыто сейчас: {}",
                    listing.total_branches, listing.open_branches
                );
            }
        }
        Command::Schedule { branch_id } => {
            println!("{}", commands::schedule_preview(&state, &branch_id)?);
        }
        Command::SetHours { branch_id, file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let entries: Vec<DayEntry> = serde_json::from_str(&raw).context("parsing day entries")?;
            let hours = commands::replace_branch_schedule(&state, &branch_id, entries)?;
            println!("{}", schedule::schedule_preview(&hours));
        }
        Command::Activate { branch_id } => commands::set_branch_active(&state, &branch_id, true)?,
        Command::Deactivate { branch_id } => commands::set_branch_active(&state, &branch_id, false)?,
        Command::Prices => {
            let view = commands::get_price_list(&state, now)?;
            let digits = state.config.pricing.precision as usize;
            for entry in view.gold.iter().chain(view.silver.iter()) {
                println!("{} {}: {:.*}", entry.metal.label(), entry.purity, digits, entry.price_per_gram);
            }
            println!("Обновлено: {}", view.latest_update.format("%d.%m.%Y %H:%M"));
        }
        Command::UpdatePrices { gold, silver, overrides } => {
            let submission = PriceSubmission {
                gold_reference: gold,
                silver_price: silver,
                overrides: overrides.into_iter().collect::<BTreeMap<_, _>>(),
            };
            match commands::submit_price_form(&state, submission, now) {
                PriceFormOutcome::Committed { table } => {
                    let digits = state.config.pricing.precision as usize;
                    for entry in table.iter() {
                        println!("{} {}: {:.*}", entry.metal.label(), entry.purity, digits, entry.price_per_gram);
                    }
                }
                PriceFormOutcome::Rejected { error, .. } => {
                    return Err(anyhow!("{} ({})", error.message, error.code));
                }
            }
        }
        Command::ExportPrices { path } => {
            let table = commands::current_prices(&state)?;
            export::write_prices_csv(&table, &path, state.config.pricing.precision)?;
            println!("Wrote {} rows to {}", table.len(), path.display());
        }
    }

    Ok(())
}
