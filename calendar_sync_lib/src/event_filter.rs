use gcal_lib::gcal_event::Event;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClassifiedEvents {
    pub events_to_upsert: Vec<Event>,
    pub events_to_delete: Vec<Event>,
}

/// Split fetched events into those to store and those to remove. Only a
/// `cancelled` status marks an event for deletion; order is kept within
/// each side.
#[must_use]
pub fn filter_events_by_status(events: Vec<Event>) -> ClassifiedEvents {
    let (events_to_delete, events_to_upsert) = events.into_iter().partition(Event::is_cancelled);
    ClassifiedEvents {
        events_to_upsert,
        events_to_delete,
    }
}

#[cfg(test)]
mod tests {
    use gcal_lib::gcal_event::{Event, EventStatus};
    use stack_string::StackString;

    use crate::event_filter::filter_events_by_status;

    fn event(id: &str, status: Option<EventStatus>) -> Event {
        Event {
            id: Some(id.into()),
            status,
            ..Event::default()
        }
    }

    #[test]
    fn test_filter_events_by_status() {
        let events = vec![
            event("a", Some(EventStatus::Confirmed)),
            event("b", Some(EventStatus::Cancelled)),
            event("c", Some(EventStatus::Tentative)),
            event("d", None),
            event("e", Some(EventStatus::Cancelled)),
            event("f", Some(EventStatus::Unknown)),
        ];
        let classified = filter_events_by_status(events);
        assert_eq!(
            classified.events_to_upsert.len() + classified.events_to_delete.len(),
            6
        );
        let upsert_ids: Vec<_> = classified
            .events_to_upsert
            .iter()
            .filter_map(|e| e.id.as_ref().map(StackString::as_str))
            .collect();
        let delete_ids: Vec<_> = classified
            .events_to_delete
            .iter()
            .filter_map(|e| e.id.as_ref().map(StackString::as_str))
            .collect();
        assert_eq!(upsert_ids, vec!["a", "c", "d", "f"]);
        assert_eq!(delete_ids, vec!["b", "e"]);
        assert!(classified.events_to_delete.iter().all(Event::is_cancelled));
    }

    #[test]
    fn test_filter_empty() {
        let classified = filter_events_by_status(Vec::new());
        assert!(classified.events_to_upsert.is_empty());
        assert!(classified.events_to_delete.is_empty());
    }
}
