use anyhow::{Result, bail};
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

use gutlog_core::models::Fodmap;
use gutlog_core::registry::{FoodEntry, NewFood};
use gutlog_core::service::{FoodCandidate, FoodLookupProvider, TrackerService};

use super::helpers::{exit_not_found, print_food_table, truncate};

fn parse_fodmap(value: &str) -> Result<Fodmap> {
    match Fodmap::parse(value) {
        Fodmap::Unknown if !value.trim().eq_ignore_ascii_case("unknown") => {
            bail!("Invalid FODMAP level '{value}'. Must be one of: low, high, unknown")
        }
        level => Ok(level),
    }
}

pub(crate) fn cmd_food_register(
    svc: &mut TrackerService,
    name: &str,
    fodmap: Option<&str>,
    json: bool,
) -> Result<()> {
    let fodmap = fodmap.map(parse_fodmap).transpose()?;
    let Some(food) = svc.register_food(NewFood {
        name: name.to_string(),
        fodmap,
        ..NewFood::default()
    })?
    else {
        bail!("Food name cannot be empty");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        println!("[{}] {} ({})", food.id, food.name, food.fodmap);
    }
    Ok(())
}

pub(crate) fn cmd_food_list(svc: &TrackerService, search: Option<&str>, json: bool) -> Result<()> {
    let foods: Vec<&FoodEntry> = match search {
        Some(q) => svc.search_registry(q),
        None => svc.registry().entries().iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
        return Ok(());
    }
    if foods.is_empty() {
        println!("No foods found.");
    } else {
        print_food_table(&foods);
    }
    Ok(())
}

/// Look a food up by registry id first, then by case-insensitive name.
pub(crate) fn cmd_food_show(svc: &TrackerService, food: &str, json: bool) -> Result<()> {
    let Some(entry) = svc
        .find_food_by_id(food)
        .or_else(|| svc.find_food_by_name(food))
    else {
        exit_not_found(&format!("Food '{food}' not found"), json);
    };
    let uses = svc.stats().count(&entry.id);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "food": entry, "uses": uses }))?
        );
        return Ok(());
    }

    println!("ID:       {}", entry.id);
    println!("Name:     {}", entry.name);
    println!("FODMAP:   {}", entry.fodmap);
    if let Some(ext) = &entry.external_id {
        println!("External: {ext}");
    }
    if let Some(details) = &entry.details {
        println!("Details:  {details}");
    }
    println!("Uses:     {uses}");
    Ok(())
}

fn print_candidates(candidates: &[FoodCandidate]) {
    #[derive(Tabled)]
    struct CandidateRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Brand")]
        brand: String,
        #[tabled(rename = "Code")]
        code: String,
    }

    let rows: Vec<CandidateRow> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| CandidateRow {
            idx: i + 1,
            name: truncate(&c.name, 35),
            brand: c.brand.as_deref().map(|b| truncate(b, 20)).unwrap_or_default(),
            code: c.external_id.clone().unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
}

/// Search the registry, or a remote database with `--remote`. `save` registers
/// the chosen (1-based) remote result.
pub(crate) fn cmd_food_search(
    svc: &mut TrackerService,
    provider: Option<&dyn FoodLookupProvider>,
    query: &str,
    save: Option<usize>,
    json: bool,
) -> Result<()> {
    let Some(provider) = provider else {
        if save.is_some() {
            bail!("--save requires --remote");
        }
        return cmd_food_list(svc, Some(query), json);
    };

    let candidates = svc.search_remote(provider, query)?;
    let saved = match save {
        None => None,
        Some(n) => {
            let Some(candidate) = n.checked_sub(1).and_then(|i| candidates.get(i)) else {
                bail!("--save must be between 1 and {}", candidates.len());
            };
            svc.register_candidate(candidate)?
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "results": candidates, "saved": saved }))?
        );
        return Ok(());
    }

    if candidates.is_empty() {
        println!("No results for '{query}'.");
    } else {
        print_candidates(&candidates);
    }
    if let Some(food) = saved {
        println!("Saved as [{}] {} ({})", food.id, food.name, food.fodmap);
    }
    Ok(())
}

pub(crate) fn cmd_food_top(svc: &TrackerService, limit: usize, json: bool) -> Result<()> {
    let top = svc.top_foods(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&top)?);
        return Ok(());
    }
    if top.is_empty() {
        println!("No food usage recorded yet.");
        return Ok(());
    }
    for (i, food) in top.iter().enumerate() {
        let name = food.name.as_deref().unwrap_or("?");
        println!("{:>3}. {name} [{}] x{}", i + 1, food.food_id, food.count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fodmap() {
        assert_eq!(parse_fodmap("LOW").unwrap(), Fodmap::Low);
        assert_eq!(parse_fodmap("high").unwrap(), Fodmap::High);
        assert_eq!(parse_fodmap("unknown").unwrap(), Fodmap::Unknown);
        assert!(parse_fodmap("medium").is_err());
    }
}
