use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::{CalendarEvent, NewEvent};
use crate::storage::{KeyValueStore, StorageError};

/// Slot the event snapshot lives under unless configured otherwise.
pub const DEFAULT_SLOT_KEY: &str = "calendarEvents";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Failed to decode stored events: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Failed to encode events: {0}")]
    Encode(#[source] serde_json::Error),
}

type ChangeListener = Box<dyn FnMut(&[CalendarEvent])>;

/// Owns the calendar's events and writes a full snapshot of them to one
/// storage slot after every mutation.
pub struct EventStore<S: KeyValueStore> {
    events: Vec<CalendarEvent>,
    storage: S,
    slot: String,
    listeners: Vec<ChangeListener>,
}

pub fn encode_events(events: &[CalendarEvent]) -> Result<String, StoreError> {
    serde_json::to_string(events).map_err(StoreError::Encode)
}

pub fn decode_events(raw: &str) -> Result<Vec<CalendarEvent>, StoreError> {
    serde_json::from_str(raw).map_err(StoreError::Decode)
}

impl<S: KeyValueStore> EventStore<S> {
    /// Loads whatever the slot holds. Unreadable or undecodable content
    /// leaves the store empty.
    pub fn open(storage: S, slot: impl Into<String>) -> Self {
        let slot = slot.into();
        let events = match storage.get(&slot) {
            Ok(Some(raw)) => match decode_events(&raw) {
                Ok(events) => {
                    tracing::info!("Loaded {} events from slot '{}'", events.len(), slot);
                    events
                }
                Err(e) => {
                    tracing::warn!("Discarding saved events in slot '{}': {}", slot, e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!("Failed to read slot '{}': {}", slot, e);
                Vec::new()
            }
        };

        Self {
            events,
            storage,
            slot,
            listeners: Vec::new(),
        }
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn get(&self, id: &str) -> Option<&CalendarEvent> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Registers a callback run with the full collection after each mutation.
    pub fn on_change(&mut self, listener: impl FnMut(&[CalendarEvent]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn create(&mut self, data: NewEvent) -> Result<CalendarEvent, StoreError> {
        let event = data.into_event(Uuid::new_v4().to_string());
        tracing::debug!("Creating event {} '{}'", event.id, event.title);
        self.events.push(event.clone());
        self.commit()?;
        Ok(event)
    }

    /// Replaces the event with the same id. Returns `false` and leaves the
    /// collection untouched when no such event exists.
    pub fn update(&mut self, event: CalendarEvent) -> Result<bool, StoreError> {
        let found = match self.events.iter_mut().find(|existing| existing.id == event.id) {
            Some(existing) => {
                *existing = event;
                true
            }
            None => {
                tracing::debug!("Ignoring update for unknown event {}", event.id);
                false
            }
        };
        self.commit()?;
        Ok(found)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.events.len();
        self.events.retain(|event| event.id != id);
        let removed = self.events.len() != before;
        if removed {
            tracing::debug!("Deleted event {}", id);
        }
        self.commit()?;
        Ok(removed)
    }

    /// Events starting on `date` in local time. An event spanning several
    /// days only appears on its start day.
    pub fn events_for_date(&self, date: NaiveDate) -> Vec<&CalendarEvent> {
        self.events
            .iter()
            .filter(|event| event.starts_on(date))
            .collect()
    }

    /// Events starting within `[start, end]`, both ends inclusive.
    pub fn events_for_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&CalendarEvent> {
        self.events
            .iter()
            .filter(|event| event.start_date >= start && event.start_date <= end)
            .collect()
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        for listener in self.listeners.iter_mut() {
            listener(&self.events);
        }
        self.persist()
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let snapshot = encode_events(&self.events)?;
        if let Err(e) = self.storage.set(&self.slot, &snapshot) {
            tracing::error!("Failed to save events to slot '{}': {}", self.slot, e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::slot::MockKeyValueStore;
    use crate::storage::{MemoryStorage, SqliteStorage};
    use chrono::{Duration, Local, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().with_timezone(&Utc)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_store() -> EventStore<MemoryStorage> {
        EventStore::open(MemoryStorage::new(), DEFAULT_SLOT_KEY)
    }

    fn titles(events: &[&CalendarEvent]) -> Vec<String> {
        events.iter().map(|event| event.title.clone()).collect()
    }

    #[test]
    fn new_store_is_empty() {
        let store = create_test_store();
        assert!(store.is_empty());
        assert_eq!(store.slot(), "calendarEvents");
    }

    #[test]
    fn create_assigns_id_and_appends() {
        let mut store = create_test_store();

        let first = store.create(NewEvent::new("First", local(2024, 3, 1, 9, 0))).unwrap();
        let second = store.create(NewEvent::new("Second", local(2024, 3, 1, 8, 0))).unwrap();

        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id);
        assert_eq!(store.events(), &[first, second]);
    }

    #[test]
    fn ten_thousand_creates_yield_unique_ids() {
        let mut store = create_test_store();
        let start = local(2024, 3, 1, 9, 0);

        // Deleting as we go keeps each snapshot write small.
        let ids: HashSet<String> = (0..10_000)
            .map(|i| {
                let id = store.create(NewEvent::new(format!("Event {}", i), start)).unwrap().id;
                store.delete(&id).unwrap();
                id
            })
            .collect();

        assert_eq!(ids.len(), 10_000);
        assert!(store.is_empty());
    }

    #[test]
    fn standup_is_found_only_on_its_day() {
        let mut store = create_test_store();
        let standup = store.create(NewEvent::new("Standup", local(2024, 3, 1, 9, 0))).unwrap();

        assert_eq!(store.events_for_date(day(2024, 3, 1)), vec![&standup]);
        assert!(store.events_for_date(day(2024, 3, 2)).is_empty());
    }

    #[test]
    fn events_for_date_ignores_time_of_day_and_keeps_order() {
        let mut store = create_test_store();
        store.create(NewEvent::new("Late", local(2024, 3, 1, 23, 59))).unwrap();
        store.create(NewEvent::new("Other day", local(2024, 3, 2, 0, 0))).unwrap();
        store.create(NewEvent::new("Midnight", local(2024, 3, 1, 0, 0))).unwrap();

        let found = store.events_for_date(day(2024, 3, 1));

        assert_eq!(titles(&found), vec!["Late", "Midnight"]);
    }

    #[test]
    fn multi_day_event_only_matches_its_start_day() {
        let mut store = create_test_store();
        let mut trip = NewEvent::new("Trip", local(2024, 3, 1, 9, 0));
        trip.end_date = Some(local(2024, 3, 4, 18, 0));
        store.create(trip).unwrap();

        assert_eq!(store.events_for_date(day(2024, 3, 1)).len(), 1);
        assert!(store.events_for_date(day(2024, 3, 2)).is_empty());
    }

    #[test]
    fn range_is_inclusive_at_both_ends() {
        let mut store = create_test_store();
        let start = local(2024, 3, 1, 9, 0);
        let end = local(2024, 3, 1, 17, 0);
        store.create(NewEvent::new("Before", start - Duration::seconds(1))).unwrap();
        store.create(NewEvent::new("At start", start)).unwrap();
        store.create(NewEvent::new("Middle", local(2024, 3, 1, 12, 0))).unwrap();
        store.create(NewEvent::new("At end", end)).unwrap();
        store.create(NewEvent::new("After", end + Duration::seconds(1))).unwrap();

        let found = store.events_for_range(start, end);

        assert_eq!(titles(&found), vec!["At start", "Middle", "At end"]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let mut store = create_test_store();
        store.create(NewEvent::new("Lunch", local(2024, 3, 1, 12, 0))).unwrap();

        assert!(store.events_for_range(local(2024, 3, 2, 0, 0), local(2024, 3, 1, 0, 0)).is_empty());
    }

    #[test]
    fn update_replaces_only_the_matching_event() {
        let mut store = create_test_store();
        let review = store.create(NewEvent::new("Review", local(2024, 3, 1, 10, 0))).unwrap();
        let lunch = store.create(NewEvent::new("Lunch", local(2024, 3, 1, 12, 0))).unwrap();

        let mut renamed = review.clone();
        renamed.title = "Design review".to_string();
        assert!(store.update(renamed).unwrap());

        let found = store.events_for_date(day(2024, 3, 1));
        assert_eq!(titles(&found), vec!["Design review", "Lunch"]);
        assert_eq!(found[0].id, review.id);
        assert_eq!(found[1], &lunch);
    }

    #[test]
    fn update_with_unknown_id_leaves_collection_unchanged() {
        let mut store = create_test_store();
        store.create(NewEvent::new("Review", local(2024, 3, 1, 10, 0))).unwrap();
        let before = store.events().to_vec();

        let stranger = NewEvent::new("Ghost", local(2024, 3, 1, 11, 0)).into_event("missing".to_string());
        let found = store.update(stranger).unwrap();

        assert!(!found);
        assert_eq!(store.events(), before.as_slice());
    }

    #[test]
    fn delete_twice_is_idempotent() {
        let mut store = create_test_store();
        let keep = store.create(NewEvent::new("Keep", local(2024, 3, 1, 9, 0))).unwrap();
        let dropped = store.create(NewEvent::new("Drop", local(2024, 3, 1, 10, 0))).unwrap();

        assert!(store.delete(&dropped.id).unwrap());
        let after_first = store.events().to_vec();
        assert!(!store.delete(&dropped.id).unwrap());

        assert_eq!(store.events(), after_first.as_slice());
        assert_eq!(store.events(), &[keep]);
    }

    #[test]
    fn every_mutation_writes_a_full_snapshot() {
        let mut store = create_test_store();
        let event = store.create(NewEvent::new("Standup", local(2024, 3, 1, 9, 0))).unwrap();

        let raw = store.storage().get(DEFAULT_SLOT_KEY).unwrap().unwrap();
        assert_eq!(decode_events(&raw).unwrap(), vec![event.clone()]);

        store.delete(&event.id).unwrap();
        let raw = store.storage().get(DEFAULT_SLOT_KEY).unwrap().unwrap();
        assert_eq!(raw, "[]");
    }

    #[test]
    fn reopening_the_slot_restores_events_with_dates() {
        let mut store = create_test_store();
        let mut data = NewEvent::new("Offsite", local(2024, 3, 1, 9, 0));
        data.end_date = Some(local(2024, 3, 1, 17, 0));
        data.all_day = true;
        data.color = Some("#10b981".to_string());
        data.reminder = Some(true);
        data.reminder_time = Some(30);
        store.create(data).unwrap();
        store.create(NewEvent::new("Dinner", local(2024, 3, 1, 19, 0))).unwrap();
        let saved = store.events().to_vec();

        let reopened = EventStore::open(store.into_storage(), DEFAULT_SLOT_KEY);

        assert_eq!(reopened.events(), saved.as_slice());
        assert_eq!(reopened.events_for_date(day(2024, 3, 1)).len(), 2);
    }

    #[test]
    fn reopening_sqlite_slot_restores_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.db");
        let saved = {
            let mut store = EventStore::open(SqliteStorage::open(&path).unwrap(), DEFAULT_SLOT_KEY);
            store.create(NewEvent::new("Standup", local(2024, 3, 1, 9, 0))).unwrap();
            store.events().to_vec()
        };

        let reopened = EventStore::open(SqliteStorage::open(&path).unwrap(), DEFAULT_SLOT_KEY);

        assert_eq!(reopened.events(), saved.as_slice());
    }

    #[test]
    fn corrupt_slot_falls_back_to_empty() {
        let storage = MemoryStorage::with_slot(DEFAULT_SLOT_KEY, "{not json");

        let store = EventStore::open(storage, DEFAULT_SLOT_KEY);

        assert!(store.is_empty());
    }

    #[test]
    fn entry_missing_start_date_discards_snapshot() {
        let storage = MemoryStorage::with_slot(DEFAULT_SLOT_KEY, r#"[{"id":"a","title":"No start"}]"#);

        let store = EventStore::open(storage, DEFAULT_SLOT_KEY);

        assert!(store.is_empty());
    }

    #[test]
    fn loads_snapshot_written_by_browser() {
        let raw = r##"[{"id":"9b1d","title":"Standup","startDate":"2024-03-01T09:00:00.000Z","allDay":false,"color":"#3b82f6"}]"##;
        let storage = MemoryStorage::with_slot(DEFAULT_SLOT_KEY, raw);

        let store = EventStore::open(storage, DEFAULT_SLOT_KEY);

        assert_eq!(store.len(), 1);
        let event = store.get("9b1d").unwrap();
        assert_eq!(event.start_date, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        assert_eq!(event.color.as_deref(), Some("#3b82f6"));
    }

    #[test]
    fn unreadable_storage_falls_back_to_empty() {
        let mut storage = MockKeyValueStore::new();
        storage
            .expect_get()
            .returning(|_| Err(StorageError::Io(std::io::Error::other("locked"))));

        let store = EventStore::open(storage, DEFAULT_SLOT_KEY);

        assert!(store.is_empty());
    }

    #[test]
    fn failed_write_is_reported_and_keeps_the_event() {
        let mut storage = MockKeyValueStore::new();
        storage.expect_get().returning(|_| Ok(None));
        storage
            .expect_set()
            .times(1)
            .returning(|_, _| Err(StorageError::Io(std::io::Error::other("disk full"))));
        let mut store = EventStore::open(storage, DEFAULT_SLOT_KEY);

        let result = store.create(NewEvent::new("Standup", local(2024, 3, 1, 9, 0)));

        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn writes_go_to_the_configured_slot() {
        let mut storage = MockKeyValueStore::new();
        storage.expect_get().withf(|key| key == "work").returning(|_| Ok(None));
        storage
            .expect_set()
            .withf(|key, value| key == "work" && value.contains("\"title\":\"Standup\""))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut store = EventStore::open(storage, "work");

        store.create(NewEvent::new("Standup", local(2024, 3, 1, 9, 0))).unwrap();
    }

    #[test]
    fn listeners_see_every_mutation() {
        let mut store = create_test_store();
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&sizes);
        store.on_change(move |events| seen.borrow_mut().push(events.len()));

        let event = store.create(NewEvent::new("Standup", local(2024, 3, 1, 9, 0))).unwrap();
        store.update(event.clone()).unwrap();
        store.delete(&event.id).unwrap();

        assert_eq!(*sizes.borrow(), vec![1, 1, 0]);
    }

    #[test]
    fn encode_then_decode_preserves_content() {
        let mut offsite = NewEvent::new("Offsite", Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).unwrap());
        offsite.end_date = Some(Utc.with_ymd_and_hms(2024, 3, 2, 17, 0, 0).unwrap());
        offsite.description = Some("Quarterly planning".to_string());
        offsite.location = Some("HQ".to_string());
        offsite.category = Some("work".to_string());
        let events = vec![
            offsite.into_event("a".to_string()),
            NewEvent::new("Gym", Utc.with_ymd_and_hms(2024, 3, 3, 7, 0, 0).unwrap()).into_event("b".to_string()),
        ];

        let decoded = decode_events(&encode_events(&events).unwrap()).unwrap();

        assert_eq!(decoded, events);
    }

    proptest! {
        #[test]
        fn range_query_matches_bounds(
            offsets in prop::collection::vec(0i64..10_000, 0..40),
            a in 0i64..10_000,
            b in 0i64..10_000,
        ) {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut store = create_test_store();
            for offset in &offsets {
                store.create(NewEvent::new(offset.to_string(), base + Duration::minutes(*offset))).unwrap();
            }
            let (lo, hi) = (a.min(b), a.max(b));

            let found: Vec<String> = store
                .events_for_range(base + Duration::minutes(lo), base + Duration::minutes(hi))
                .iter()
                .map(|event| event.title.clone())
                .collect();
            let expected: Vec<String> = offsets
                .iter()
                .filter(|offset| lo <= **offset && **offset <= hi)
                .map(|offset| offset.to_string())
                .collect();

            prop_assert_eq!(found, expected);
        }

        #[test]
        fn date_query_partitions_events_by_local_day(
            hours in prop::collection::vec(0i64..24 * 10, 0..40),
            day_offset in 0u64..10,
        ) {
            let base_local = Local.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
            let base = base_local.with_timezone(&Utc);
            let target = day(2024, 5, 1) + chrono::Days::new(day_offset);
            let mut store = create_test_store();
            for hour in &hours {
                store.create(NewEvent::new(hour.to_string(), base + Duration::hours(*hour))).unwrap();
            }

            let found: Vec<String> = store
                .events_for_date(target)
                .iter()
                .map(|event| event.title.clone())
                .collect();
            let expected: Vec<String> = hours
                .iter()
                .filter(|hour| (base_local + Duration::hours(**hour)).date_naive() == target)
                .map(|hour| hour.to_string())
                .collect();

            prop_assert_eq!(found, expected);
        }

        #[test]
        fn snapshot_round_trip_restores_store(count in 0usize..20, minutes in 0i64..100_000) {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut store = create_test_store();
            for i in 0..count {
                let mut data = NewEvent::new(format!("Event {}", i), base + Duration::minutes(minutes + i as i64));
                data.end_date = (i % 2 == 0).then(|| base + Duration::minutes(minutes + 60));
                store.create(data).unwrap();
            }
            let saved = store.events().to_vec();

            let reopened = EventStore::open(store.into_storage(), DEFAULT_SLOT_KEY);

            prop_assert_eq!(reopened.events(), saved.as_slice());
        }
    }
}
