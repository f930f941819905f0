pub mod app;
pub mod calendar;
pub mod storage;

pub use app::{CalendarContext, EventForm, FormError};
pub use calendar::{CalendarEvent, CalendarView, EventStore, NewEvent, StoreError};
pub use storage::{KeyValueStore, MemoryStorage, SqliteStorage};
