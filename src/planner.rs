//! Calendar grouping of planned actions.
//!
//! Days are calendar days in UTC. Weeks start on Sunday.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::Action;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

/// The dates a view around `anchor` shows. In the year view each entry is the
/// first day of a month. Empty when the view would start before
/// [`NaiveDate::MIN`].
pub fn date_range(view: CalendarView, anchor: NaiveDate) -> Vec<NaiveDate> {
    match view {
        CalendarView::Day => vec![anchor],
        CalendarView::Week => {
            let back = u64::from(anchor.weekday().num_days_from_sunday());
            let Some(start) = anchor.checked_sub_days(Days::new(back)) else {
                return Vec::new();
            };
            start.iter_days().take(7).collect()
        }
        CalendarView::Month => {
            let Some(start) = anchor.with_day(1) else {
                return Vec::new();
            };
            start
                .iter_days()
                .take_while(|d| d.month() == start.month())
                .collect()
        }
        CalendarView::Year => (1..=12)
            .filter_map(|month| NaiveDate::from_ymd_opt(anchor.year(), month, 1))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub start: NaiveDate,
    pub actions: Vec<Action>,
    pub total: usize,
    pub completed: usize,
}

/// Group `actions` into one bucket per entry of [`date_range`]. Buckets are
/// single days except in the year view, where they are whole months.
pub fn bucket(actions: &[Action], view: CalendarView, anchor: NaiveDate) -> Vec<Bucket> {
    date_range(view, anchor)
        .into_iter()
        .map(|start| {
            let mut members: Vec<Action> = actions
                .iter()
                .filter(|a| {
                    let day = a.date.date_naive();
                    match view {
                        CalendarView::Year => {
                            day.year() == start.year() && day.month() == start.month()
                        }
                        _ => day == start,
                    }
                })
                .cloned()
                .collect();
            members.sort_by_key(|a| a.date);

            Bucket {
                start,
                total: members.len(),
                completed: members.iter().filter(|a| a.done).count(),
                actions: members,
            }
        })
        .collect()
}

/// Open actions due at or after `now`, soonest first.
pub fn upcoming(actions: &[Action], now: DateTime<Utc>, limit: usize) -> Vec<Action> {
    let mut open: Vec<Action> = actions
        .iter()
        .filter(|a| !a.done && a.date >= now)
        .cloned()
        .collect();
    open.sort_by_key(|a| a.date);
    open.truncate(limit);
    open
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::models::ActionType;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn action(id: &str, y: i32, m: u32, d: u32, hour: u32, done: bool) -> Action {
        Action {
            id: id.into(),
            project_id: "p".into(),
            kind: ActionType::WaterChange,
            date: Utc.with_ymd_and_hms(y, m, d, hour, 0, 0).unwrap(),
            done,
            notes: None,
        }
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2024-05-15 is a Wednesday.
        let range = date_range(CalendarView::Week, day(2024, 5, 15));
        assert_eq!(range.len(), 7);
        assert_eq!(range[0], day(2024, 5, 12));
        assert_eq!(range[6], day(2024, 5, 18));
    }

    #[test]
    fn week_of_a_sunday_starts_that_day() {
        let range = date_range(CalendarView::Week, day(2024, 5, 12));
        assert_eq!(range[0], day(2024, 5, 12));
    }

    #[test]
    fn weeks_at_the_calendar_edges_do_not_panic() {
        for anchor in NaiveDate::MIN.iter_days().take(7) {
            let range = date_range(CalendarView::Week, anchor);
            let back = i64::from(anchor.weekday().num_days_from_sunday());
            if back > (anchor - NaiveDate::MIN).num_days() {
                assert!(range.is_empty(), "{anchor} should have no full week");
            } else {
                assert_eq!(range.len(), 7);
                assert_eq!(range[0].weekday(), chrono::Weekday::Sun);
            }
        }

        let last = date_range(CalendarView::Week, NaiveDate::MAX);
        assert!(last.contains(&NaiveDate::MAX));
        assert!(bucket(&[], CalendarView::Month, NaiveDate::MIN).len() >= 28);
    }

    #[test]
    fn month_covers_every_day() {
        let feb = date_range(CalendarView::Month, day(2024, 2, 20));
        assert_eq!(feb.len(), 29);
        assert_eq!(feb.first(), Some(&day(2024, 2, 1)));
        assert_eq!(feb.last(), Some(&day(2024, 2, 29)));
    }

    #[test]
    fn year_lists_month_starts() {
        let range = date_range(CalendarView::Year, day(2024, 7, 4));
        assert_eq!(range.len(), 12);
        assert_eq!(range[0], day(2024, 1, 1));
        assert_eq!(range[11], day(2024, 12, 1));
    }

    #[test]
    fn day_view_is_the_anchor() {
        assert_eq!(date_range(CalendarView::Day, day(2024, 5, 1)), vec![day(2024, 5, 1)]);
    }

    #[test]
    fn buckets_count_completed_actions() {
        let actions = vec![
            action("a", 2024, 5, 13, 18, true),
            action("b", 2024, 5, 13, 9, false),
            action("c", 2024, 5, 20, 9, false),
        ];

        let week = bucket(&actions, CalendarView::Week, day(2024, 5, 15));

        let monday = &week[1];
        assert_eq!(monday.start, day(2024, 5, 13));
        assert_eq!((monday.total, monday.completed), (2, 1));
        assert_eq!(monday.actions[0].id, "b");
        assert_eq!(week.iter().map(|b| b.total).sum::<usize>(), 2);
    }

    #[test]
    fn year_buckets_group_by_month() {
        let actions = vec![
            action("a", 2024, 5, 1, 9, false),
            action("b", 2024, 5, 31, 9, true),
            action("c", 2023, 5, 10, 9, false),
        ];

        let year = bucket(&actions, CalendarView::Year, day(2024, 1, 1));

        assert_eq!((year[4].total, year[4].completed), (2, 1));
        assert_eq!(year.iter().map(|b| b.total).sum::<usize>(), 2);
    }

    #[test]
    fn upcoming_skips_done_and_past_and_limits() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let actions = vec![
            action("past", 2024, 5, 9, 9, false),
            action("done", 2024, 5, 11, 9, true),
            action("late", 2024, 5, 20, 9, false),
            action("soon", 2024, 5, 11, 9, false),
            action("later", 2024, 5, 21, 9, false),
        ];

        let ids: Vec<_> = upcoming(&actions, now, 2).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, ["soon", "late"]);
    }

    #[test]
    fn view_parses_lowercase_and_defaults_to_week() {
        assert_eq!(serde_json::from_str::<CalendarView>("\"year\"").unwrap(), CalendarView::Year);
        assert_eq!(CalendarView::default(), CalendarView::Week);
    }
}
