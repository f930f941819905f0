use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Granularity a calendar surface shows. Only `Month` has a layout model;
/// the others can be selected but nothing renders them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl CalendarView {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarView::Day => "day",
            CalendarView::Week => "week",
            CalendarView::Month => "month",
            CalendarView::Year => "year",
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, CalendarView::Month)
    }
}

impl fmt::Display for CalendarView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(CalendarView::Day),
            "week" => Ok(CalendarView::Week),
            "month" => Ok(CalendarView::Month),
            "year" => Ok(CalendarView::Year),
            other => Err(format!("Unknown calendar view '{}'", other)),
        }
    }
}
