use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use gutlog_core::models::{DATE_FORMAT, Entry, TIME_FORMAT, split_food_content, validate_time};
use gutlog_core::registry::FoodEntry;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, DATE_FORMAT).with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Storage key of a date, `YYYY-MM-DD`.
pub(crate) fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// `HH:MM`, defaulting to the current local time.
pub(crate) fn parse_time(time: Option<String>) -> Result<String> {
    match time {
        None => Ok(Local::now().format(TIME_FORMAT).to_string()),
        Some(t) => {
            let t = t.trim().to_string();
            validate_time(&t)?;
            Ok(t)
        }
    }
}

/// Explicit `--item` values win; otherwise the free text is split on `,` and `;`.
pub(crate) fn item_names(content: Option<&str>, items: &[String]) -> Vec<String> {
    let explicit: Vec<String> = items
        .iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }
    content.map(split_food_content).unwrap_or_default()
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

fn flag(label: &str, on: bool) -> Option<String> {
    on.then(|| label.to_string())
}

/// One-line human rendering of an entry, without its time.
pub(crate) fn describe_entry(entry: &Entry) -> String {
    let mut parts: Vec<String> = Vec::new();
    match entry {
        Entry::Meal(m) => {
            if let Some(t) = &m.meal_type {
                parts.push(format!("{t}:"));
            }
            parts.push(m.content.clone());
            if let Some(p) = &m.portion {
                parts.push(format!("({p})"));
            }
            parts.extend(flag("[high fat]", m.high_fat));
        }
        Entry::Beverage(b) => {
            parts.push(b.content.clone());
            if let Some(v) = &b.volume {
                parts.push(format!("({v})"));
            }
            if let Some(t) = &b.temperature {
                parts.push(t.clone());
            }
            parts.extend(flag("[caffeine]", b.caffeine));
            parts.extend(flag("[alcohol]", b.alcohol));
            parts.extend(flag("[carbonated]", b.carbonated));
        }
        Entry::Pain(p) => {
            parts.push(p.location.clone().unwrap_or_else(|| "unspecified".to_string()));
            if let Some(s) = p.severity {
                parts.push(format!("severity {s}/10"));
            }
            if let Some(d) = p.duration {
                parts.push(format!("{d} min"));
            }
            if let Some(c) = &p.character {
                parts.push(c.clone());
            }
        }
        Entry::Bowel(b) => {
            match b.bristol_type {
                Some(t) => parts.push(format!("Bristol {t}")),
                None => parts.push("Bristol ?".to_string()),
            }
            if let Some(c) = &b.color {
                parts.push(c.clone());
            }
            parts.extend(flag("[blood]", b.blood));
            parts.extend(flag("[mucus]", b.mucus));
            parts.extend(flag("[urgency]", b.urgency));
            parts.extend(flag("[incomplete]", b.complete_evacuation == Some(false)));
        }
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

pub(crate) fn print_food_table(foods: &[&FoodEntry]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "FODMAP")]
        fodmap: String,
        #[tabled(rename = "External")]
        external: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .enumerate()
        .map(|(i, f)| FoodRow {
            idx: i + 1,
            id: f.id.clone(),
            name: truncate(&f.name, 35),
            fodmap: f.fodmap.as_str().to_string(),
            external: f.external_id.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
