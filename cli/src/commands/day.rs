use anyhow::{Result, bail};
use serde_json::json;

use gutlog_core::models::{Entry, EntryKind, Summary};
use gutlog_core::service::TrackerService;

use super::helpers::{date_key, describe_entry, exit_not_found, parse_date};

pub(crate) fn cmd_day(svc: &mut TrackerService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    svc.select_date(date)?;
    let key = date_key(date);
    let day = svc.day(&key);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "date": key, "day": day }))?
        );
        return Ok(());
    }

    println!("=== {} ===\n", date.format("%A %Y-%m-%d"));
    if day.is_empty() {
        println!("  Nothing logged.");
        return Ok(());
    }

    let mut entries: Vec<Entry> = EntryKind::ALL
        .iter()
        .flat_map(|kind| day.entries(*kind))
        .collect();
    entries.sort_by(|a, b| a.time().cmp(b.time()));

    for entry in &entries {
        let time = entry.time();
        let label = entry.kind().label().to_uppercase();
        let id = entry.id();
        let text = describe_entry(entry);
        println!("  {time}  {label:<9} {text}  [{id}]");
    }

    if let Some(summary) = &day.summary {
        println!();
        let scale = |v: Option<u8>| v.map_or_else(|| "-".to_string(), |v| format!("{v}/10"));
        println!(
            "  SUMMARY: feeling {} | energy {} | sleep {} | stress {}",
            scale(summary.feeling),
            scale(summary.energy),
            scale(summary.sleep),
            scale(summary.stress)
        );
        if !summary.notes.is_empty() {
            println!("  NOTES: {}", summary.notes);
        }
    }
    Ok(())
}

pub(crate) fn cmd_delete(
    svc: &mut TrackerService,
    kind: &str,
    entry_id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let kind = EntryKind::parse(kind)?;
    let date = date_key(parse_date(date)?);

    if !svc.delete_entry(&date, kind, entry_id)? {
        let label = kind.label();
        exit_not_found(&format!("No {label} entry '{entry_id}' on {date}"), json);
    }
    if json {
        println!("{}", json!({ "deleted": entry_id, "date": date }));
    } else {
        println!("Deleted {} entry {entry_id} from {date}", kind.label());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_summary_set(
    svc: &mut TrackerService,
    feeling: Option<u8>,
    energy: Option<u8>,
    sleep: Option<u8>,
    stress: Option<u8>,
    notes: Option<String>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let scores = [feeling, energy, sleep, stress];
    if scores.iter().all(Option::is_none) && notes.is_none() {
        bail!(
            "Nothing to set. Provide at least one of \
             --feeling, --energy, --sleep, --stress, --notes"
        );
    }
    let date = date_key(parse_date(date)?);

    // Unspecified fields keep their stored values.
    let current = svc.day(&date).summary.unwrap_or_default();
    let summary = Summary {
        feeling: feeling.or(current.feeling),
        energy: energy.or(current.energy),
        sleep: sleep.or(current.sleep),
        stress: stress.or(current.stress),
        notes: notes.map_or(current.notes, |n| n.trim().to_string()),
        extra: current.extra,
    };
    svc.set_summary(&date, Some(summary.clone()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "date": date, "summary": summary }))?
        );
    } else {
        println!("Saved summary for {date}");
    }
    Ok(())
}

pub(crate) fn cmd_summary_clear(
    svc: &mut TrackerService,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = date_key(parse_date(date)?);
    let had_summary = svc.day(&date).summary.is_some();
    svc.set_summary(&date, None)?;

    if json {
        println!("{}", json!({ "date": date, "cleared": had_summary }));
    } else if had_summary {
        println!("Cleared summary for {date}");
    } else {
        println!("No summary on {date}");
    }
    Ok(())
}
