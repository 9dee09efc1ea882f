//! Read-side views over item snapshots.
//!
//! Pure functions; `SyncService` exposes them over its cached snapshot so
//! UI layers never reach into the cache directly.

use chrono::NaiveDate;

use crate::types::Item;

/// Ordering applied to the visible item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOption {
    #[default]
    Unsorted,
    /// Oldest first.
    DateCreated,
    /// Most important first.
    Importance,
}

/// Filters and orders a snapshot for display.
///
/// `Unsorted` preserves the snapshot order; the other options sort stably,
/// so items that compare equal keep their relative positions.
pub fn visible_items(items: &[Item], hide_completed: bool, sort: SortOption) -> Vec<Item> {
    let mut visible: Vec<Item> = items
        .iter()
        .filter(|item| !(hide_completed && item.is_done))
        .cloned()
        .collect();
    match sort {
        SortOption::Unsorted => {}
        SortOption::DateCreated => visible.sort_by_key(|item| item.date_created),
        SortOption::Importance => {
            visible.sort_by(|a, b| b.importance.cmp(&a.importance));
        }
    }
    visible
}

pub fn completed_count(items: &[Item]) -> usize {
    items.iter().filter(|item| item.is_done).count()
}

/// A display group of items sharing a deadline date. `date` is `None` for
/// the trailing group of undated items.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub date: Option<NaiveDate>,
    pub items: Vec<Item>,
}

impl Section {
    pub fn title(&self) -> String {
        match self.date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => "Other".to_string(),
        }
    }
}

/// Groups items by deadline calendar date.
///
/// Dated sections come first in ascending date order; items without a
/// deadline collect into a final "Other" section. Within a section, items
/// keep the order of the input slice.
pub fn sections(items: &[Item]) -> Vec<Section> {
    let mut dated: std::collections::BTreeMap<NaiveDate, Vec<Item>> =
        std::collections::BTreeMap::new();
    let mut undated: Vec<Item> = Vec::new();

    for item in items {
        match item.deadline {
            Some(deadline) => dated
                .entry(deadline.date_naive())
                .or_default()
                .push(item.clone()),
            None => undated.push(item.clone()),
        }
    }

    let mut result: Vec<Section> = dated
        .into_iter()
        .map(|(date, items)| Section {
            date: Some(date),
            items,
        })
        .collect();
    if !undated.is_empty() {
        result.push(Section {
            date: None,
            items: undated,
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Importance;
    use chrono::{TimeZone, Utc};

    fn item(text: &str) -> Item {
        Item::new(text)
    }

    fn done(text: &str) -> Item {
        let mut item = Item::new(text);
        item.is_done = true;
        item
    }

    #[test]
    fn hides_completed_items_when_asked() {
        let items = vec![item("a"), done("b"), item("c")];

        let all = visible_items(&items, false, SortOption::Unsorted);
        assert_eq!(all.len(), 3);

        let active = visible_items(&items, true, SortOption::Unsorted);
        let texts: Vec<&str> = active.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn sorts_by_creation_date_oldest_first() {
        let mut newer = item("newer");
        newer.date_created = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
        let mut older = item("older");
        older.date_created = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();

        let sorted = visible_items(&[newer, older], false, SortOption::DateCreated);
        let texts: Vec<&str> = sorted.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["older", "newer"]);
    }

    #[test]
    fn sorts_by_importance_highest_first_and_stable() {
        let items = vec![
            item("first normal"),
            item("urgent").with_importance(Importance::High),
            item("second normal"),
            item("someday").with_importance(Importance::Low),
        ];

        let sorted = visible_items(&items, false, SortOption::Importance);
        let texts: Vec<&str> = sorted.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["urgent", "first normal", "second normal", "someday"]
        );
    }

    #[test]
    fn counts_completed_items() {
        let items = vec![item("a"), done("b"), done("c")];
        assert_eq!(completed_count(&items), 2);
    }

    #[test]
    fn groups_sections_by_deadline_date_with_other_last() {
        let friday = Utc.with_ymd_and_hms(2024, 7, 5, 9, 0, 0).unwrap();
        let friday_evening = Utc.with_ymd_and_hms(2024, 7, 5, 21, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();

        let items = vec![
            item("report").with_deadline(friday),
            item("groceries"),
            item("standup").with_deadline(monday),
            item("review").with_deadline(friday_evening),
        ];

        let sections = sections(&items);
        assert_eq!(sections.len(), 3);

        assert_eq!(sections[0].title(), "2024-07-01");
        assert_eq!(sections[0].items[0].text, "standup");

        assert_eq!(sections[1].title(), "2024-07-05");
        let friday_texts: Vec<&str> =
            sections[1].items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(friday_texts, vec!["report", "review"]);

        assert_eq!(sections[2].title(), "Other");
        assert_eq!(sections[2].items[0].text, "groceries");
    }

    #[test]
    fn no_other_section_when_every_item_is_dated() {
        let deadline = Utc.with_ymd_and_hms(2024, 7, 5, 9, 0, 0).unwrap();
        let sections = sections(&[item("report").with_deadline(deadline)]);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].date.is_some());
    }
}
