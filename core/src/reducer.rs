use chrono::NaiveDate;

use crate::models::{DayData, DayRecord, Entry, EntryKind, Settings, Summary, Theme, View};

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub data: DayData,
    pub settings: Settings,
    pub selected_date: NaiveDate,
    pub active_view: View,
}

impl AppState {
    #[must_use]
    pub fn new(data: DayData, settings: Settings, selected_date: NaiveDate) -> Self {
        Self {
            data,
            settings,
            selected_date,
            active_view: View::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddEntry {
        date: String,
        entry: Entry,
    },
    /// Replace the entry `entry_id` in the collection of `entry`'s kind.
    UpdateEntry {
        date: String,
        entry_id: String,
        entry: Entry,
    },
    DeleteEntry {
        date: String,
        kind: EntryKind,
        entry_id: String,
    },
    /// `None` clears the summary.
    SetSummary {
        date: String,
        summary: Option<Summary>,
    },
    SetSelectedDate(NaiveDate),
    SetActiveView(View),
    SetTheme(Theme),
    /// Drops every day record. Settings are kept.
    ClearAllData,
}

/// Never touches `state`; callers may keep earlier snapshots.
#[must_use]
pub fn reduce(state: &AppState, action: Action) -> AppState {
    match action {
        Action::AddEntry { date, entry } => {
            let mut next = state.clone();
            next.data.days.entry(date).or_default().push(entry);
            next
        }
        Action::UpdateEntry {
            date,
            entry_id,
            entry,
        } => {
            let Some(day) = state.data.day(&date) else {
                return state.clone();
            };
            let mut day = day.clone();
            if !day.replace(&entry_id, entry) {
                return state.clone();
            }
            with_day(state, date, day)
        }
        Action::DeleteEntry {
            date,
            kind,
            entry_id,
        } => {
            let Some(day) = state.data.day(&date) else {
                return state.clone();
            };
            let mut day = day.clone();
            if !day.remove(kind, &entry_id) {
                return state.clone();
            }
            with_day(state, date, day)
        }
        Action::SetSummary {
            date,
            summary: Some(summary),
        } => {
            let mut day = state.data.day_or_empty(&date);
            day.summary = Some(summary);
            with_day(state, date, day)
        }
        Action::SetSummary {
            date,
            summary: None,
        } => match state.data.day(&date) {
            Some(day) if day.summary.is_some() => {
                let mut day = day.clone();
                day.summary = None;
                with_day(state, date, day)
            }
            _ => state.clone(),
        },
        Action::SetSelectedDate(date) => AppState {
            selected_date: date,
            ..state.clone()
        },
        Action::SetActiveView(view) => AppState {
            active_view: view,
            ..state.clone()
        },
        Action::SetTheme(theme) => {
            let mut next = state.clone();
            next.settings.theme = theme;
            next
        }
        Action::ClearAllData => AppState {
            data: DayData::empty(),
            ..state.clone()
        },
    }
}

fn with_day(state: &AppState, date: String, day: DayRecord) -> AppState {
    let mut next = state.clone();
    next.data.days.insert(date, day);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bowel, Meal, Pain};
    use serde_json::{Map, json};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn empty_state() -> AppState {
        AppState::new(DayData::empty(), Settings::default(), date())
    }

    fn meal(id: &str, content: &str) -> Entry {
        Entry::Meal(
            serde_json::from_value::<Meal>(json!({"id": id, "time": "08:00", "content": content}))
                .unwrap(),
        )
    }

    fn pain(id: &str, severity: u8) -> Entry {
        Entry::Pain(Pain {
            id: id.into(),
            time: "12:00".into(),
            location: Some("lower".into()),
            severity: Some(severity),
            duration: Some(20),
            character: None,
            preceded_by: None,
            helped_by: None,
            extra: Map::new(),
        })
    }

    fn add(state: &AppState, entry: Entry) -> AppState {
        reduce(
            state,
            Action::AddEntry {
                date: "2024-01-01".into(),
                entry,
            },
        )
    }

    #[test]
    fn test_add_creates_day_lazily() {
        let before = empty_state();
        let after = add(&before, meal("m_1", "Toast"));

        assert!(before.data.days.is_empty());
        let day = after.data.day("2024-01-01").unwrap();
        assert_eq!(day.meals.len(), 1);
        assert!(day.beverages.is_empty());
        assert!(day.pain.is_empty());
        assert!(day.bowel.is_empty());
    }

    #[test]
    fn test_update_replaces_by_id_and_keeps_snapshot() {
        let state = add(&add(&empty_state(), pain("p_1", 3)), pain("p_2", 5));
        let updated = reduce(
            &state,
            Action::UpdateEntry {
                date: "2024-01-01".into(),
                entry_id: "p_1".into(),
                entry: pain("p_1", 9),
            },
        );
        assert_eq!(updated.data.day("2024-01-01").unwrap().pain[0].severity, Some(9));
        assert_eq!(updated.data.day("2024-01-01").unwrap().pain[1].severity, Some(5));
        assert_eq!(state.data.day("2024-01-01").unwrap().pain[0].severity, Some(3));
    }

    #[test]
    fn test_update_missing_is_noop() {
        let state = add(&empty_state(), pain("p_1", 3));
        let missing_entry = reduce(
            &state,
            Action::UpdateEntry {
                date: "2024-01-01".into(),
                entry_id: "p_9".into(),
                entry: pain("p_9", 1),
            },
        );
        assert_eq!(missing_entry, state);

        let missing_day = reduce(
            &state,
            Action::UpdateEntry {
                date: "2030-01-01".into(),
                entry_id: "p_1".into(),
                entry: pain("p_1", 1),
            },
        );
        assert_eq!(missing_day, state);
    }

    #[test]
    fn test_delete_missing_id_returns_equal_state() {
        let state = add(&empty_state(), meal("m_1", "Rice"));
        let after = reduce(
            &state,
            Action::DeleteEntry {
                date: "2024-01-01".into(),
                kind: EntryKind::Meals,
                entry_id: "m_404".into(),
            },
        );
        assert_eq!(after, state);

        let no_day = reduce(
            &state,
            Action::DeleteEntry {
                date: "1999-12-31".into(),
                kind: EntryKind::Meals,
                entry_id: "m_1".into(),
            },
        );
        assert_eq!(no_day, state);
    }

    #[test]
    fn test_delete_removes_only_matching_kind() {
        let bowel = Entry::Bowel(
            serde_json::from_value::<Bowel>(json!({"id": "b_1", "time": "07:00", "bristolType": 4}))
                .unwrap(),
        );
        let state = add(&add(&empty_state(), meal("m_1", "Rice")), bowel);
        let wrong_kind = reduce(
            &state,
            Action::DeleteEntry {
                date: "2024-01-01".into(),
                kind: EntryKind::Pain,
                entry_id: "b_1".into(),
            },
        );
        assert_eq!(wrong_kind, state);

        let deleted = reduce(
            &state,
            Action::DeleteEntry {
                date: "2024-01-01".into(),
                kind: EntryKind::Bowel,
                entry_id: "b_1".into(),
            },
        );
        let day = deleted.data.day("2024-01-01").unwrap();
        assert!(day.bowel.is_empty());
        assert_eq!(day.meals.len(), 1);
    }

    #[test]
    fn test_set_and_clear_summary() {
        let summary = Summary {
            feeling: Some(7),
            notes: "fine".into(),
            ..Summary::default()
        };
        let state = reduce(
            &empty_state(),
            Action::SetSummary {
                date: "2024-01-02".into(),
                summary: Some(summary.clone()),
            },
        );
        assert_eq!(state.data.day("2024-01-02").unwrap().summary, Some(summary));

        let cleared = reduce(
            &state,
            Action::SetSummary {
                date: "2024-01-02".into(),
                summary: None,
            },
        );
        assert!(cleared.data.day("2024-01-02").unwrap().summary.is_none());

        let untouched = reduce(
            &empty_state(),
            Action::SetSummary {
                date: "2024-01-03".into(),
                summary: None,
            },
        );
        assert!(untouched.data.days.is_empty());
    }

    #[test]
    fn test_view_state_actions() {
        let state = empty_state();
        let next_day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let state = reduce(&state, Action::SetSelectedDate(next_day));
        let state = reduce(&state, Action::SetActiveView(View::Week));
        let state = reduce(&state, Action::SetTheme(Theme::Dark));
        assert_eq!(state.selected_date, next_day);
        assert_eq!(state.active_view, View::Week);
        assert_eq!(state.settings.theme, Theme::Dark);
    }

    #[test]
    fn test_clear_all_keeps_settings() {
        let state = reduce(
            &add(&empty_state(), meal("m_1", "Rice")),
            Action::SetTheme(Theme::Dark),
        );
        let cleared = reduce(&state, Action::ClearAllData);
        assert!(cleared.data.days.is_empty());
        assert_eq!(cleared.data.version, state.data.version);
        assert_eq!(cleared.settings.theme, Theme::Dark);
        assert_eq!(state.data.days.len(), 1);
    }
}
