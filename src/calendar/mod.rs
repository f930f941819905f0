pub mod event;
pub mod month;
pub mod store;
pub mod view;

pub use event::{CalendarEvent, NewEvent, DEFAULT_EVENT_COLOR};
pub use month::{DayCell, MonthLayout, Week};
pub use store::{EventStore, StoreError, DEFAULT_SLOT_KEY};
pub use view::CalendarView;
