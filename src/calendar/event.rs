use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Color used when an event carries none of its own.
pub const DEFAULT_EVENT_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<u32>,
}

/// Everything an event carries except its id, which the store assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub color: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub reminder: Option<bool>,
    pub reminder_time: Option<u32>,
}

impl NewEvent {
    pub fn new(title: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_date,
            end_date: None,
            all_day: false,
            color: None,
            location: None,
            category: None,
            reminder: None,
            reminder_time: None,
        }
    }

    pub fn into_event(self, id: String) -> CalendarEvent {
        CalendarEvent {
            id,
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            all_day: self.all_day,
            color: self.color,
            location: self.location,
            category: self.category,
            reminder: self.reminder,
            reminder_time: self.reminder_time,
        }
    }
}

impl CalendarEvent {
    pub fn data(&self) -> NewEvent {
        NewEvent {
            title: self.title.clone(),
            description: self.description.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            all_day: self.all_day,
            color: self.color.clone(),
            location: self.location.clone(),
            category: self.category.clone(),
            reminder: self.reminder,
            reminder_time: self.reminder_time,
        }
    }

    /// Calendar day of the start in local time.
    pub fn local_start_day(&self) -> NaiveDate {
        self.start_date.with_timezone(&Local).date_naive()
    }

    pub fn starts_on(&self, date: NaiveDate) -> bool {
        self.local_start_day() == date
    }

    pub fn display_color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_EVENT_COLOR)
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        self.end_date.map(|end| (end - self.start_date).num_minutes())
    }

    /// "9:00 AM - 10:30 AM", with " (All day)" appended for all-day events.
    pub fn time_label(&self, twelve_hour: bool) -> String {
        let pattern = if twelve_hour { "%-I:%M %p" } else { "%H:%M" };
        let mut label = self.start_date.with_timezone(&Local).format(pattern).to_string();
        if let Some(end) = self.end_date {
            label.push_str(" - ");
            label.push_str(&end.with_timezone(&Local).format(pattern).to_string());
        }
        if self.all_day {
            label.push_str(" (All day)");
        }
        label
    }
}
