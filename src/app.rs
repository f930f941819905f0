use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use thiserror::Error;

use crate::calendar::month::{calculate_layout, LayoutOptions};
use crate::calendar::{CalendarEvent, CalendarView, EventStore, MonthLayout, NewEvent, StoreError};
use crate::storage::KeyValueStore;

/// The event store plus the selection state surfaces read from it.
pub struct CalendarContext<S: KeyValueStore> {
    store: EventStore<S>,
    selected_date: NaiveDate,
    view: CalendarView,
}

impl<S: KeyValueStore> CalendarContext<S> {
    pub fn new(store: EventStore<S>) -> Self {
        Self {
            store,
            selected_date: Local::now().date_naive(),
            view: CalendarView::default(),
        }
    }

    pub fn with_view(mut self, view: CalendarView) -> Self {
        self.view = view;
        self
    }

    pub fn store(&self) -> &EventStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EventStore<S> {
        &mut self.store
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn set_selected_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
    }

    pub fn view(&self) -> CalendarView {
        self.view
    }

    pub fn set_view(&mut self, view: CalendarView) {
        self.view = view;
    }

    pub fn selected_events(&self) -> Vec<&CalendarEvent> {
        self.store.events_for_date(self.selected_date)
    }

    pub fn month_layout(&self, options: &LayoutOptions) -> MonthLayout {
        calculate_layout(
            self.selected_date,
            self.selected_date,
            Local::now().date_naive(),
            &self.store,
            options,
        )
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Invalid time '{0}'. Use HH:MM.")]
    InvalidTime(String),
    #[error("Invalid color '{0}'. Use #rgb or #rrggbb.")]
    InvalidColor(String),
    #[error("Event {0} no longer exists")]
    EventNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Draft state of the add/edit dialog. Text fields hold exactly what the
/// user typed; nothing reaches the store until `submit`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventForm {
    pub title: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_date: Option<NaiveDate>,
    pub end_time: String,
    pub all_day: bool,
    pub description: String,
    pub location: String,
    pub category: String,
    pub color: String,
    pub reminder: Option<bool>,
    pub reminder_time: Option<u32>,
    pub event_id: Option<String>,
}

impl EventForm {
    pub fn new(date: NaiveDate) -> Self {
        let now = Local::now();
        Self {
            title: String::new(),
            date,
            start_time: format!("{:02}:00", now.hour()),
            end_date: None,
            end_time: String::new(),
            all_day: false,
            description: String::new(),
            location: String::new(),
            category: String::new(),
            color: String::new(),
            reminder: None,
            reminder_time: None,
            event_id: None,
        }
    }

    pub fn for_event(event: &CalendarEvent) -> Self {
        let start = event.start_date.with_timezone(&Local);
        let end = event.end_date.map(|end| end.with_timezone(&Local));
        Self {
            title: event.title.clone(),
            date: start.date_naive(),
            start_time: start.format("%H:%M").to_string(),
            end_date: end.map(|end| end.date_naive()),
            end_time: end.map(|end| end.format("%H:%M").to_string()).unwrap_or_default(),
            all_day: event.all_day,
            description: event.description.clone().unwrap_or_default(),
            location: event.location.clone().unwrap_or_default(),
            category: event.category.clone().unwrap_or_default(),
            color: event.color.clone().unwrap_or_default(),
            reminder: event.reminder,
            reminder_time: event.reminder_time,
            event_id: Some(event.id.clone()),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.event_id.is_some()
    }

    pub fn validate(&self) -> Result<NewEvent, FormError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormError::MissingTitle);
        }

        let start_date = local_timestamp(self.date, &self.start_time)?;
        // The end falls on the start day unless an end day was given.
        let end_date = match self.end_time.trim() {
            "" => None,
            text => Some(local_timestamp(self.end_date.unwrap_or(self.date), text)?),
        };

        Ok(NewEvent {
            title: title.to_string(),
            description: non_blank(&self.description),
            start_date,
            end_date,
            all_day: self.all_day,
            color: parse_color(&self.color)?,
            location: non_blank(&self.location),
            category: non_blank(&self.category),
            reminder: self.reminder,
            reminder_time: self.reminder_time,
        })
    }

    /// Creates or updates the event depending on whether the form was
    /// opened for an existing one.
    pub fn submit<S: KeyValueStore>(&self, context: &mut CalendarContext<S>) -> Result<CalendarEvent, FormError> {
        let data = self.validate()?;
        let store = context.store_mut();
        match &self.event_id {
            Some(id) => {
                let event = data.into_event(id.clone());
                if !store.update(event.clone())? {
                    return Err(FormError::EventNotFound(id.clone()));
                }
                Ok(event)
            }
            None => Ok(store.create(data)?),
        }
    }
}

fn local_timestamp(date: NaiveDate, text: &str) -> Result<DateTime<Utc>, FormError> {
    let time = parse_time(text)?;
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| FormError::InvalidTime(text.to_string()))
}

/// Accepts "9", "14", "930", "0930" and "09:30".
pub fn parse_time(text: &str) -> Result<NaiveTime, FormError> {
    let invalid = || FormError::InvalidTime(text.to_string());
    let digits = text.trim().replace(':', "");
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let num: u32 = digits.parse().map_err(|_| invalid())?;
    let (hour, minute) = if digits.len() <= 2 { (num, 0) } else { (num / 100, num % 100) };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Normalizes to lower-case `#rrggbb`. Blank input means no color.
pub fn parse_color(text: &str) -> Result<Option<String>, FormError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FormError::InvalidColor(text.to_string()));
    }
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => return Err(FormError::InvalidColor(text.to_string())),
    };
    Ok(Some(format!("#{}", expanded.to_ascii_lowercase())))
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
