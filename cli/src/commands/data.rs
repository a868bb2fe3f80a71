use anyhow::{Context, Result, bail};
use serde_json::json;
use std::path::Path;

use gutlog_core::export::{format_week_range, generate_csv, weekly_summary};
use gutlog_core::models::{Theme, View};
use gutlog_core::service::{DataSource, TrackerService};

use super::helpers::parse_date;

fn write_output(content: &str, output: Option<&Path>, json: bool, what: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if json {
                println!("{}", json!({ "written": path.display().to_string() }));
            } else {
                eprintln!("Wrote {what} to {}", path.display());
            }
        }
        None if json => println!("{}", json!({ "content": content })),
        None => print!("{content}"),
    }
    Ok(())
}

pub(crate) fn cmd_export_csv(
    svc: &mut TrackerService,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    svc.set_view(View::Export)?;
    let csv = generate_csv(svc.data())?;
    write_output(&csv, output, json, "CSV export")
}

pub(crate) fn cmd_export_week(
    svc: &mut TrackerService,
    date: Option<String>,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    svc.select_date(date)?;
    svc.set_view(View::Week)?;
    let text = weekly_summary(svc.data(), date);
    let what = format!("summary for {}", format_week_range(date));
    write_output(&text, output, json, &what)
}

/// Show the theme, or set it to `light`, `dark` or `toggle`.
pub(crate) fn cmd_theme(svc: &mut TrackerService, value: Option<&str>, json: bool) -> Result<()> {
    let theme = match value {
        None => svc.settings().theme,
        Some(v) if v.trim().eq_ignore_ascii_case("toggle") => svc.toggle_theme()?,
        Some(v) => {
            let theme = Theme::parse(v)?;
            svc.set_theme(theme)?;
            theme
        }
    };

    if json {
        println!("{}", json!({ "theme": theme }));
    } else {
        println!("{theme}");
    }
    Ok(())
}

fn describe_source(source: &DataSource) -> String {
    match source {
        DataSource::Fresh => "new diary".to_string(),
        DataSource::Stored => "loaded".to_string(),
        DataSource::Migrated { from, steps } => {
            format!("migrated from v{from} ({})", steps.join(", "))
        }
        DataSource::Recovered { reason, backed_up } => {
            let backup = if *backed_up { "backed up" } else { "no backup" };
            format!("recovered with empty data, {backup}: {reason}")
        }
    }
}

pub(crate) fn cmd_status(svc: &TrackerService, db_path: &Path, json: bool) -> Result<()> {
    let data = svc.data();
    let report = svc.load_report();
    let entries: usize = data
        .days
        .values()
        .map(|d| d.meals.len() + d.beverages.len() + d.pain.len() + d.bowel.len())
        .sum();
    let first = data.days.keys().next();
    let last = data.days.keys().next_back();

    if json {
        let status = json!({
            "database": db_path.display().to_string(),
            "version": data.version,
            "source": describe_source(&report.data),
            "recoveredStores": report.recovered_stores,
            "days": data.days.len(),
            "entries": entries,
            "firstDay": first,
            "lastDay": last,
            "foods": svc.registry().len(),
            "theme": svc.settings().theme,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Database: {}", db_path.display());
    println!("Version:  {} ({})", data.version, describe_source(&report.data));
    match (first, last) {
        (Some(first), Some(last)) => {
            println!("Days:     {} ({first} .. {last})", data.days.len());
        }
        _ => println!("Days:     0"),
    }
    println!("Entries:  {entries}");
    println!("Foods:    {}", svc.registry().len());
    println!("Theme:    {}", svc.settings().theme);
    for store in &report.recovered_stores {
        println!("Reset:    {store}");
    }
    Ok(())
}

pub(crate) fn cmd_clear(svc: &mut TrackerService, yes: bool, json: bool) -> Result<()> {
    if !yes {
        bail!("This deletes every logged day. Re-run with --yes to confirm");
    }
    let days = svc.data().days.len();
    svc.clear_all()?;

    if json {
        println!("{}", json!({ "cleared": days }));
    } else {
        println!("Cleared {days} day(s). Foods and settings were kept.");
    }
    Ok(())
}
