use anyhow::{Result, bail};
use clap::Args;
use serde_json::Map;

use gutlog_core::models::{Beverage, Bowel, Entry, FoodItem, Meal, Pain};
use gutlog_core::service::TrackerService;

use super::helpers::{date_key, describe_entry, exit_not_found, item_names, parse_date, parse_time};

/// Options shared by every `log` subcommand.
#[derive(Args)]
pub(crate) struct EntryOpts {
    /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
    #[arg(long)]
    date: Option<String>,
    /// Time of day (HH:MM, default: now)
    #[arg(long)]
    time: Option<String>,
    /// Replace the entry with this ID instead of adding a new one
    #[arg(long, value_name = "ID")]
    replace: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub(crate) struct MealArgs {
    /// What was eaten, comma separated (e.g. "rice, chicken")
    content: Option<String>,
    /// A single food item; repeat for several. Overrides splitting CONTENT
    #[arg(short, long = "item", value_name = "FOOD")]
    items: Vec<String>,
    /// Meal type: breakfast, lunch, dinner, snack
    #[arg(short = 't', long = "type")]
    meal_type: Option<String>,
    /// Free-text portion (e.g. "large", "half plate")
    #[arg(long)]
    portion: Option<String>,
    #[arg(long)]
    high_fat: bool,
    #[command(flatten)]
    opts: EntryOpts,
}

#[derive(Args)]
pub(crate) struct BeverageArgs {
    /// What was drunk, comma separated
    content: Option<String>,
    /// A single drink item; repeat for several
    #[arg(short, long = "item", value_name = "DRINK")]
    items: Vec<String>,
    /// Free-text volume (e.g. "250ml")
    #[arg(long)]
    volume: Option<String>,
    /// e.g. hot, cold, room
    #[arg(long)]
    temperature: Option<String>,
    #[arg(long)]
    caffeine: bool,
    #[arg(long)]
    alcohol: bool,
    #[arg(long)]
    carbonated: bool,
    #[command(flatten)]
    opts: EntryOpts,
}

#[derive(Args)]
pub(crate) struct PainArgs {
    /// Severity, 1-10
    #[arg(short, long)]
    severity: Option<u8>,
    #[arg(short, long)]
    location: Option<String>,
    /// Duration in minutes
    #[arg(short, long)]
    duration: Option<u32>,
    /// e.g. cramping, sharp, dull
    #[arg(long)]
    character: Option<String>,
    #[arg(long)]
    preceded_by: Option<String>,
    #[arg(long)]
    helped_by: Option<String>,
    #[command(flatten)]
    opts: EntryOpts,
}

#[derive(Args)]
pub(crate) struct BowelArgs {
    /// Bristol stool scale type, 1-7
    #[arg(short, long)]
    bristol: Option<u8>,
    #[arg(short, long)]
    color: Option<String>,
    #[arg(long)]
    blood: bool,
    #[arg(long)]
    mucus: bool,
    #[arg(long)]
    urgency: bool,
    /// Evacuation felt incomplete
    #[arg(long)]
    incomplete: bool,
    #[command(flatten)]
    opts: EntryOpts,
}

fn food_items(content: Option<&str>, items: &[String]) -> Result<Option<Vec<FoodItem>>> {
    let names = item_names(content, items);
    if names.is_empty() {
        bail!("Nothing to log. Provide CONTENT or at least one --item");
    }
    Ok(Some(names.iter().map(|n| FoodItem::named(n)).collect()))
}

fn opt_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn cmd_log_meal(svc: &mut TrackerService, args: MealArgs) -> Result<()> {
    let items = food_items(args.content.as_deref(), &args.items)?;
    let entry = Entry::Meal(Meal {
        id: String::new(),
        time: parse_time(args.opts.time.clone())?,
        meal_type: opt_text(args.meal_type),
        content: args.content.unwrap_or_default().trim().to_string(),
        items,
        portion: opt_text(args.portion),
        high_fat: args.high_fat,
        extra: Map::new(),
    });
    save_entry(svc, entry, args.opts)
}

pub(crate) fn cmd_log_beverage(svc: &mut TrackerService, args: BeverageArgs) -> Result<()> {
    let items = food_items(args.content.as_deref(), &args.items)?;
    let entry = Entry::Beverage(Beverage {
        id: String::new(),
        time: parse_time(args.opts.time.clone())?,
        items,
        content: args.content.unwrap_or_default().trim().to_string(),
        volume: opt_text(args.volume),
        temperature: opt_text(args.temperature),
        caffeine: args.caffeine,
        alcohol: args.alcohol,
        carbonated: args.carbonated,
        extra: Map::new(),
    });
    save_entry(svc, entry, args.opts)
}

pub(crate) fn cmd_log_pain(svc: &mut TrackerService, args: PainArgs) -> Result<()> {
    let entry = Entry::Pain(Pain {
        id: String::new(),
        time: parse_time(args.opts.time.clone())?,
        location: opt_text(args.location),
        severity: args.severity,
        duration: args.duration,
        character: opt_text(args.character),
        preceded_by: opt_text(args.preceded_by),
        helped_by: opt_text(args.helped_by),
        extra: Map::new(),
    });
    save_entry(svc, entry, args.opts)
}

pub(crate) fn cmd_log_bowel(svc: &mut TrackerService, args: BowelArgs) -> Result<()> {
    let entry = Entry::Bowel(Bowel {
        id: String::new(),
        time: parse_time(args.opts.time.clone())?,
        bristol_type: args.bristol,
        color: opt_text(args.color),
        blood: args.blood,
        mucus: args.mucus,
        urgency: args.urgency,
        complete_evacuation: Some(!args.incomplete),
        extra: Map::new(),
    });
    save_entry(svc, entry, args.opts)
}

fn save_entry(svc: &mut TrackerService, entry: Entry, opts: EntryOpts) -> Result<()> {
    let date = date_key(parse_date(opts.date)?);
    let label = entry.kind().label();

    let (saved, verb) = match opts.replace {
        Some(id) => match svc.update_entry(&date, &id, entry)? {
            Some(saved) => (saved, "Updated"),
            None => exit_not_found(&format!("No {label} entry '{id}' on {date}"), opts.json),
        },
        None => (svc.add_entry(&date, entry)?, "Logged"),
    };

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        let id = saved.id();
        let time = saved.time();
        let text = describe_entry(&saved);
        println!("{verb} {label} [{id}] {date} {time}  {text}");
    }
    Ok(())
}
