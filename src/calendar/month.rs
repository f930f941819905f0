use chrono::{Datelike, Months, NaiveDate, Weekday};

use crate::calendar::EventStore;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq)]
pub struct MonthLayout {
    pub year: i32,
    pub month: u32,
    pub week_start: Weekday,
    pub weeks: Vec<Week>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Week {
    pub days: Vec<DayCell>,
}

/// One square of the grid. Padding squares before the first and after the
/// last day of the month have no date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DayCell {
    pub date: Option<NaiveDate>,
    pub is_selected: bool,
    pub is_today: bool,
    pub event_count: usize,
    pub previews: Vec<String>,
}

impl DayCell {
    pub fn padding() -> Self {
        Self::default()
    }

    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.is_selected = selected;
        self
    }

    pub fn with_today(mut self, today: bool) -> Self {
        self.is_today = today;
        self
    }

    pub fn with_events(mut self, count: usize, previews: Vec<String>) -> Self {
        self.event_count = count;
        self.previews = previews;
        self
    }

    pub fn is_padding(&self) -> bool {
        self.date.is_none()
    }

    /// Events that did not fit in the preview ("+N more").
    pub fn overflow(&self) -> usize {
        self.event_count.saturating_sub(self.previews.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub week_start: Weekday,
    pub preview_limit: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            preview_limit: 2,
        }
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month `months` away from the one containing `date`.
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let start = month_start(date);
    let shifted = if months >= 0 {
        start.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        start.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(start)
}

pub fn weekday_labels(week_start: Weekday) -> Vec<&'static str> {
    const NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let offset = week_start.num_days_from_monday() as usize;
    (0..7).map(|i| NAMES[(offset + i) % 7]).collect()
}

pub fn calculate_layout<S: KeyValueStore>(
    month: NaiveDate,
    selected: NaiveDate,
    today: NaiveDate,
    store: &EventStore<S>,
    options: &LayoutOptions,
) -> MonthLayout {
    let first_day = month_start(month);
    let year = first_day.year();
    let month = first_day.month();
    let next_month_first = add_months(first_day, 1);

    let mut weeks = Vec::new();
    let mut current_week = Week { days: Vec::new() };

    let days_before = (7 + first_day.weekday().num_days_from_monday()
        - options.week_start.num_days_from_monday())
        % 7;
    for _ in 0..days_before {
        current_week.days.push(DayCell::padding());
    }

    let mut current_date = first_day;
    while current_date < next_month_first {
        let events = store.events_for_date(current_date);
        let previews = events
            .iter()
            .take(options.preview_limit)
            .map(|event| event.title.clone())
            .collect();

        current_week.days.push(
            DayCell::new(current_date)
                .with_selected(current_date == selected)
                .with_today(current_date == today)
                .with_events(events.len(), previews),
        );

        if current_week.days.len() == 7 {
            weeks.push(current_week);
            current_week = Week { days: Vec::new() };
        }

        let Some(next) = current_date.succ_opt() else { break };
        current_date = next;
    }

    if !current_week.days.is_empty() {
        while current_week.days.len() < 7 {
            current_week.days.push(DayCell::padding());
        }
        weeks.push(current_week);
    }

    MonthLayout {
        year,
        month,
        week_start: options.week_start,
        weeks,
    }
}
