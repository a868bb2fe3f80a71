use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{DATE_FORMAT, DayData, DayRecord, Entry, Summary};

pub const CSV_HEADER: [&str; 4] = ["Date", "Type", "Time", "Details"];
const COMMON_FOODS_LIMIT: usize = 6;

fn opt(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

fn flag(set: bool) -> char {
    if set { 'Y' } else { 'N' }
}

fn scale(value: Option<u8>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn food_text(entry: &Entry) -> String {
    entry.food_names().join(", ")
}

/// One CSV row per entry and summary, days in date order.
pub fn generate_csv(data: &DayData) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;

    for (date, day) in &data.days {
        for meal in &day.meals {
            let foods = food_text(&Entry::Meal(meal.clone()));
            let details = format!(
                "{} - {} - {} - {}",
                opt(meal.meal_type.as_ref()),
                foods,
                opt(meal.portion.as_ref()),
                if meal.high_fat { "High Fat" } else { "" }
            );
            wtr.write_record([date.as_str(), "Meal", meal.time.as_str(), details.as_str()])?;
        }

        for drink in &day.beverages {
            let foods = food_text(&Entry::Beverage(drink.clone()));
            let details = format!(
                "{} - {} - {} - Caffeine:{} Alcohol:{} Carbonated:{}",
                foods,
                opt(drink.volume.as_ref()),
                opt(drink.temperature.as_ref()),
                flag(drink.caffeine),
                flag(drink.alcohol),
                flag(drink.carbonated)
            );
            wtr.write_record([date.as_str(), "Beverage", drink.time.as_str(), details.as_str()])?;
        }

        for pain in &day.pain {
            let details = format!(
                "{} - Severity {}/10 - {}min - {}",
                opt(pain.location.as_ref()),
                pain.severity.map(|s| s.to_string()).unwrap_or_default(),
                pain.duration.map_or_else(|| "?".to_string(), |d| d.to_string()),
                opt(pain.character.as_ref())
            );
            wtr.write_record([date.as_str(), "Pain", pain.time.as_str(), details.as_str()])?;
        }

        for bowel in &day.bowel {
            let details = format!(
                "Bristol {} - {} - Blood:{} Mucus:{} Urgent:{}",
                bowel.bristol_type.map_or_else(|| "?".to_string(), |t| t.to_string()),
                opt(bowel.color.as_ref()),
                flag(bowel.blood),
                flag(bowel.mucus),
                flag(bowel.urgency)
            );
            wtr.write_record([date.as_str(), "Bowel", bowel.time.as_str(), details.as_str()])?;
        }

        if let Some(s) = &day.summary {
            let details = format!(
                "Feeling:{} Energy:{} Sleep:{} Stress:{} - {}",
                scale(s.feeling),
                scale(s.energy),
                scale(s.sleep),
                scale(s.stress),
                s.notes
            );
            wtr.write_record([date.as_str(), "Summary", "", details.as_str()])?;
        }
    }

    let bytes = wtr.into_inner().context("Failed to flush CSV")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Monday through Sunday of the week containing `date`.
#[must_use]
pub fn week_days(date: NaiveDate) -> [NaiveDate; 7] {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    std::array::from_fn(|i| monday + Duration::days(i as i64))
}

/// e.g. `Jan 1 - 7, 2024` or `Jan 29 - Feb 4, 2024`.
#[must_use]
pub fn format_week_range(date: NaiveDate) -> String {
    let days = week_days(date);
    let (start, end) = (days[0], days[6]);
    if start.month() == end.month() {
        format!("{} - {}, {}", start.format("%b %-d"), end.day(), start.year())
    } else {
        format!(
            "{} - {}, {}",
            start.format("%b %-d"),
            end.format("%b %-d"),
            start.year()
        )
    }
}

/// Counts in first-seen order.
fn tally<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    counts
}

fn average(values: &[u32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(f64::from(values.iter().sum::<u32>()) / values.len() as f64)
}

fn fmt_avg(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.1}"))
}

/// Plain-text digest of the week containing `date`, for sharing with a clinician.
#[must_use]
pub fn weekly_summary(data: &DayData, date: NaiveDate) -> String {
    let days: Vec<&DayRecord> = week_days(date)
        .iter()
        .filter_map(|d| data.day(&d.format(DATE_FORMAT).to_string()))
        .collect();

    let meals: Vec<Entry> = days
        .iter()
        .flat_map(|d| d.meals.iter().cloned().map(Entry::Meal))
        .collect();
    let beverages: Vec<_> = days.iter().flat_map(|d| d.beverages.iter()).collect();
    let pain: Vec<_> = days.iter().flat_map(|d| d.pain.iter()).collect();
    let bowel: Vec<_> = days.iter().flat_map(|d| d.bowel.iter()).collect();
    let summaries: Vec<&Summary> = days.iter().filter_map(|d| d.summary.as_ref()).collect();

    let high_fat = meals
        .iter()
        .filter(|m| matches!(m, Entry::Meal(meal) if meal.high_fat))
        .count();

    let food_words: Vec<String> = meals
        .iter()
        .flat_map(Entry::food_names)
        .map(|name| name.trim().to_lowercase())
        .filter(|name| name.chars().count() > 2)
        .collect();
    let mut common = tally(food_words.iter().map(String::as_str));
    common.sort_by(|a, b| b.1.cmp(&a.1));
    let common: Vec<&str> = common
        .iter()
        .take(COMMON_FOODS_LIMIT)
        .map(|(w, _)| *w)
        .collect();

    let mut lines = vec![
        format!("WEEK OF {}", format_week_range(date)),
        "Generated by gutlog".to_string(),
        String::new(),
        format!("MEALS LOGGED: {}", meals.len()),
        format!("- High-fat meals: {high_fat}"),
    ];
    if !common.is_empty() {
        lines.push(format!("- Most common foods: {}", common.join(", ")));
    }

    lines.push(String::new());
    lines.push(format!("BEVERAGES LOGGED: {}", beverages.len()));
    if !beverages.is_empty() {
        lines.push(format!(
            "- Caffeinated: {}, alcoholic: {}, carbonated: {}",
            beverages.iter().filter(|b| b.caffeine).count(),
            beverages.iter().filter(|b| b.alcohol).count(),
            beverages.iter().filter(|b| b.carbonated).count()
        ));
    }

    lines.push(String::new());
    lines.push(format!("PAIN EPISODES: {}", pain.len()));
    if !pain.is_empty() {
        let severities: Vec<u32> = pain
            .iter()
            .map(|p| u32::from(p.severity.unwrap_or(0)))
            .collect();
        lines.push(format!("- Average severity: {}/10", fmt_avg(average(&severities))));
        let locations = tally(pain.iter().filter_map(|p| p.location.as_deref()));
        if !locations.is_empty() {
            let text: Vec<String> = locations
                .iter()
                .map(|(loc, n)| format!("{loc} ({n}x)"))
                .collect();
            lines.push(format!("- Locations: {}", text.join(", ")));
        }
    }

    lines.push(String::new());
    lines.push(format!("BOWEL MOVEMENTS: {}", bowel.len()));
    let mut bristol: Vec<(u8, usize)> = Vec::new();
    for t in bowel.iter().filter_map(|b| b.bristol_type) {
        match bristol.iter_mut().find(|(k, _)| *k == t) {
            Some((_, n)) => *n += 1,
            None => bristol.push((t, 1)),
        }
    }
    bristol.sort_by_key(|(t, _)| *t);
    if !bristol.is_empty() {
        lines.push("- Bristol Type distribution:".to_string());
        for (t, n) in bristol {
            lines.push(format!("  * Type {t}: {n} times"));
        }
    }
    let colors = tally(bowel.iter().filter_map(|b| b.color.as_deref()));
    if !colors.is_empty() {
        let text: Vec<String> = colors
            .iter()
            .map(|(c, n)| format!("{n}x {}", c.to_lowercase()))
            .collect();
        lines.push(format!("- Color: {}", text.join(", ")));
    }

    let metric = |get: fn(&Summary) -> Option<u8>| -> Vec<u32> {
        summaries
            .iter()
            .map(|s| u32::from(get(s).unwrap_or(0)))
            .collect()
    };
    let sleep: Vec<u32> = summaries
        .iter()
        .filter_map(|s| s.sleep)
        .map(u32::from)
        .collect();

    lines.push(String::new());
    lines.push("DAILY METRICS:".to_string());
    lines.push(format!(
        "- Average feeling: {}/10",
        fmt_avg(average(&metric(|s| s.feeling)))
    ));
    lines.push(format!(
        "- Average energy: {}/10",
        fmt_avg(average(&metric(|s| s.energy)))
    ));
    lines.push(format!("- Sleep quality: {}/10", fmt_avg(average(&sleep))));
    lines.push(String::new());
    lines.push("OBSERVATIONS:".to_string());
    lines.push("- (Add your own observations here)".to_string());
    lines.push(String::new());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn data(blob: Value) -> DayData {
        let Value::Object(map) = blob else {
            panic!("expected object")
        };
        DayData::from_blob(map).unwrap()
    }

    fn sample() -> DayData {
        data(json!({
            "_version": 4,
            "2024-01-02": {
                "meals": [
                    {"id": "m_1", "time": "08:00", "type": "Breakfast", "content": "Oatmeal, banana", "highFat": false},
                    {"id": "m_2", "time": "19:00", "type": "Dinner", "content": "", "items": [{"name": "Pizza \"deluxe\"", "foodId": "f_3"}], "highFat": true}
                ],
                "beverages": [{"id": "d_1", "time": "09:00", "items": [{"name": "Coffee"}], "caffeine": true}],
                "pain": [{"id": "p_1", "time": "21:00", "location": "lower left", "severity": 6, "duration": 30}],
                "bowel": [{"id": "b_1", "time": "07:00", "bristolType": 4, "color": "Brown", "urgency": true}],
                "summary": {"feeling": 5, "energy": 4, "notes": "meh"}
            },
            "2024-01-01": {
                "meals": [{"id": "m_0", "time": "12:00", "content": "oatmeal"}],
                "pain": [{"id": "p_0", "time": "13:00", "location": "lower left", "severity": 2}],
                "bowel": [{"id": "b_0", "time": "06:00", "bristolType": 6, "color": "Yellow"}],
                "summary": {"feeling": 7, "energy": 6, "sleep": 8}
            },
            "2024-01-08": {
                "meals": [{"id": "m_9", "time": "12:00", "content": "Next week"}]
            }
        }))
    }

    fn csv_rows(data: &DayData) -> Vec<Vec<String>> {
        let csv = generate_csv(data).unwrap();
        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        assert_eq!(rdr.headers().unwrap(), CSV_HEADER.as_slice());
        rdr.records()
            .map(|r| r.unwrap().iter().map(ToString::to_string).collect())
            .collect()
    }

    #[test]
    fn test_csv_rows_in_date_order() {
        let rows = csv_rows(&sample());
        let row = |fields: [&str; 4]| fields.iter().map(ToString::to_string).collect::<Vec<_>>();

        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0], row(["2024-01-01", "Meal", "12:00", " - oatmeal -  - "]));
        assert!(rows.contains(&row([
            "2024-01-02",
            "Beverage",
            "09:00",
            "Coffee -  -  - Caffeine:Y Alcohol:N Carbonated:N"
        ])));
        assert!(rows.contains(&row([
            "2024-01-02",
            "Bowel",
            "07:00",
            "Bristol 4 - Brown - Blood:N Mucus:N Urgent:Y"
        ])));
        assert!(rows.contains(&row([
            "2024-01-01",
            "Pain",
            "13:00",
            "lower left - Severity 2/10 - ?min - "
        ])));
        assert!(rows.contains(&row([
            "2024-01-02",
            "Summary",
            "",
            "Feeling:5 Energy:4 Sleep:- Stress:- - meh"
        ])));
        assert_eq!(rows[10], row(["2024-01-08", "Meal", "12:00", " - Next week -  - "]));
    }

    #[test]
    fn test_csv_quotes_details() {
        let rows = csv_rows(&sample());
        let pizza = rows.iter().find(|r| r[2] == "19:00").unwrap();
        assert_eq!(pizza[3], "Dinner - Pizza \"deluxe\" -  - High Fat");
        let oats = rows.iter().find(|r| r[2] == "08:00").unwrap();
        assert_eq!(oats[3], "Breakfast - Oatmeal, banana -  - ");
    }

    #[test]
    fn test_week_range() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let days = week_days(date);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(days[6], NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert_eq!(format_week_range(date), "Jan 1 - 7, 2024");

        let spanning = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(format_week_range(spanning), "Jan 29 - Feb 4, 2024");
    }

    #[test]
    fn test_weekly_summary() {
        let text = weekly_summary(&sample(), NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert!(text.starts_with("WEEK OF Jan 1 - 7, 2024\n"));
        assert!(text.contains("MEALS LOGGED: 3\n"));
        assert!(text.contains("- High-fat meals: 1\n"));
        assert!(text.contains("- Most common foods: oatmeal, banana, pizza \"deluxe\"\n"));
        assert!(text.contains("BEVERAGES LOGGED: 1\n- Caffeinated: 1, alcoholic: 0, carbonated: 0\n"));
        assert!(text.contains("PAIN EPISODES: 2\n- Average severity: 4.0/10\n- Locations: lower left (2x)\n"));
        assert!(text.contains("  * Type 4: 1 times\n  * Type 6: 1 times\n"));
        assert!(text.contains("- Color: 1x yellow, 1x brown\n"));
        assert!(text.contains("- Average feeling: 6.0/10\n"));
        assert!(text.contains("- Average energy: 5.0/10\n"));
        assert!(text.contains("- Sleep quality: 8.0/10\n"));
        assert!(!text.contains("Next week"));
    }

    #[test]
    fn test_weekly_summary_empty_week() {
        let text = weekly_summary(&DayData::empty(), NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());
        assert!(text.contains("MEALS LOGGED: 0\n"));
        assert!(!text.contains("Most common foods"));
        assert!(text.contains("PAIN EPISODES: 0\n\nBOWEL MOVEMENTS: 0\n"));
        assert!(text.contains("- Average feeling: N/A/10"));
    }
}
