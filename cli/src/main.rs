mod commands;
mod config;
mod openfoodfacts;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    BeverageArgs, BowelArgs, MealArgs, PainArgs, cmd_clear, cmd_day, cmd_delete,
    cmd_export_csv, cmd_export_week, cmd_food_list, cmd_food_register, cmd_food_search,
    cmd_food_show, cmd_food_top, cmd_log_beverage, cmd_log_bowel, cmd_log_meal, cmd_log_pain,
    cmd_status, cmd_summary_clear, cmd_summary_set, cmd_theme,
};
use crate::config::Config;
use crate::openfoodfacts::OpenFoodFactsClient;
use gutlog_core::service::{DataSource, FoodLookupProvider, TrackerService};

#[derive(Parser)]
#[command(
    name = "gutlog",
    version,
    about = "A local-first food and symptom diary",
    long_about = "A local-first food and symptom diary.\n\n\
        Log meals, drinks, pain and bowel movements, rate your day, \
        and export a weekly digest to share with your clinician."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a meal, beverage, pain episode or bowel movement
    Log {
        #[command(subcommand)]
        entry: LogCommands,
    },
    /// Delete an entry by kind and ID
    Delete {
        /// Entry kind: meal, beverage, pain, bowel
        kind: String,
        /// Entry ID (shown by `gutlog day`)
        id: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show everything logged on a day
    Day {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate a day or clear its rating
    Summary {
        #[command(subcommand)]
        command: SummaryCommands,
    },
    /// Manage the food registry
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Export the diary
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Show or change the theme: light, dark or toggle
    Theme {
        value: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show database location, schema version and totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every logged day (foods and settings are kept)
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Log a meal
    Meal(MealArgs),
    /// Log a beverage
    Beverage(BeverageArgs),
    /// Log a pain episode
    Pain(PainArgs),
    /// Log a bowel movement
    Bowel(BowelArgs),
}

#[derive(Subcommand)]
enum SummaryCommands {
    /// Set daily ratings (1-10) and notes; unspecified fields are kept
    Set {
        #[arg(long)]
        feeling: Option<u8>,
        #[arg(long)]
        energy: Option<u8>,
        #[arg(long)]
        sleep: Option<u8>,
        #[arg(long)]
        stress: Option<u8>,
        #[arg(long)]
        notes: Option<String>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a day's summary
    Clear {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food to the registry (classified automatically unless --fodmap is given)
    Register {
        name: String,
        /// FODMAP level: low, high, unknown
        #[arg(long)]
        fodmap: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered foods
    List {
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a food by ID or name
    Show {
        food: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the registry, or `OpenFoodFacts` with --remote
    Search {
        query: String,
        /// Query `OpenFoodFacts` instead of the local registry
        #[arg(long)]
        remote: bool,
        /// Register the Nth remote result
        #[arg(long, value_name = "N")]
        save: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Most frequently logged foods
    Top {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Every entry and summary as CSV
    Csv {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plain-text digest of the week (Monday to Sunday) containing DATE
    Week {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn report_load_problems(svc: &TrackerService) {
    let report = svc.load_report();
    if let DataSource::Recovered { reason, backed_up } = &report.data {
        eprintln!("Warning: stored diary could not be loaded ({reason}); starting empty.");
        if *backed_up {
            eprintln!("         The previous data was kept as a backup in the database.");
        }
    }
    for store in &report.recovered_stores {
        eprintln!("Warning: reset unreadable store {store}");
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = TrackerService::open(&config.db_path)?;
    report_load_problems(&svc);
    let svc = &mut svc;

    match cli.command {
        Commands::Log { entry } => match entry {
            LogCommands::Meal(args) => cmd_log_meal(svc, args),
            LogCommands::Beverage(args) => cmd_log_beverage(svc, args),
            LogCommands::Pain(args) => cmd_log_pain(svc, args),
            LogCommands::Bowel(args) => cmd_log_bowel(svc, args),
        },
        Commands::Delete {
            kind,
            id,
            date,
            json,
        } => cmd_delete(svc, &kind, &id, date, json),
        Commands::Day { date, json } => cmd_day(svc, date, json),
        Commands::Summary { command } => match command {
            SummaryCommands::Set {
                feeling,
                energy,
                sleep,
                stress,
                notes,
                date,
                json,
            } => cmd_summary_set(svc, feeling, energy, sleep, stress, notes, date, json),
            SummaryCommands::Clear { date, json } => cmd_summary_clear(svc, date, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Register { name, fodmap, json } => {
                cmd_food_register(svc, &name, fodmap.as_deref(), json)
            }
            FoodCommands::List { search, json } => cmd_food_list(svc, search.as_deref(), json),
            FoodCommands::Show { food, json } => cmd_food_show(svc, &food, json),
            FoodCommands::Search {
                query,
                remote,
                save,
                json,
            } => {
                let off = remote.then(OpenFoodFactsClient::new).transpose()?;
                let provider = off.as_ref().map(|c| c as &dyn FoodLookupProvider);
                cmd_food_search(svc, provider, &query, save, json)
            }
            FoodCommands::Top { limit, json } => cmd_food_top(svc, limit, json),
        },
        Commands::Export { command } => match command {
            ExportCommands::Csv { output, json } => cmd_export_csv(svc, output.as_deref(), json),
            ExportCommands::Week { date, output, json } => {
                cmd_export_week(svc, date, output.as_deref(), json)
            }
        },
        Commands::Theme { value, json } => cmd_theme(svc, value.as_deref(), json),
        Commands::Status { json } => cmd_status(svc, &config.db_path, json),
        Commands::Clear { yes, json } => cmd_clear(svc, yes, json),
    }
}
