//! Change notification.
//!
//! Collections raise low-level [`CollectionEvent`]s; the definition
//! translates them into [`ModelEvent`]s through [`TRANSLATION`] and hands
//! them to the subscribers registered for the entity kind.

use std::collections::BTreeMap;
use std::fmt;

use crate::entity::EntityKind;

/// Structural events raised by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectionEvent {
    Inserted,
    Replaced,
    Updated,
    RenamePending,
    Renamed,
    Erased,
    Invalidated,
}

/// Domain-level change codes delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCode {
    Added,
    Changed,
    /// Sent before a rename is applied; the only code that honours rejection.
    Renaming,
    Renamed,
    Removed,
    /// A dependency changed; the entity must be revalidated.
    Invalidated,
}

pub(crate) const TRANSLATION: &[(CollectionEvent, ChangeCode)] = &[
    (CollectionEvent::Inserted, ChangeCode::Added),
    (CollectionEvent::Replaced, ChangeCode::Changed),
    (CollectionEvent::Updated, ChangeCode::Changed),
    (CollectionEvent::RenamePending, ChangeCode::Renaming),
    (CollectionEvent::Renamed, ChangeCode::Renamed),
    (CollectionEvent::Erased, ChangeCode::Removed),
    (CollectionEvent::Invalidated, ChangeCode::Invalidated),
];

pub(crate) fn translate(event: CollectionEvent) -> ChangeCode {
    TRANSLATION
        .iter()
        .find(|(from, _)| *from == event)
        .map(|(_, to)| *to)
        .unwrap_or(ChangeCode::Changed)
}

/// A change to one entity of a data definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEvent {
    pub kind: EntityKind,
    pub code: ChangeCode,
    pub name: String,
    /// Previous name for `Renaming` / `Renamed`.
    pub old_name: Option<String>,
}

/// Subscriber verdict. Only meaningful for [`ChangeCode::Renaming`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResponse {
    Accept,
    Reject(String),
}

/// Handle returned by [`DataDefinition::subscribe`](crate::DataDefinition::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Which entity kinds a subscriber wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Kind(EntityKind),
}

type Callback = Box<dyn FnMut(&ModelEvent) -> EventResponse + Send>;

struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
}

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    all: Vec<Subscriber>,
    by_kind: BTreeMap<EntityKind, Vec<Subscriber>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self, filter: EventFilter, callback: Callback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let subscriber = Subscriber { id, callback };
        match filter {
            EventFilter::All => self.all.push(subscriber),
            EventFilter::Kind(kind) => self.by_kind.entry(kind).or_default().push(subscriber),
        }
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.len();
        self.all.retain(|s| s.id != id);
        for list in self.by_kind.values_mut() {
            list.retain(|s| s.id != id);
        }
        before != self.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.all.len() + self.by_kind.values().map(Vec::len).sum::<usize>()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to the subscribers of `route` only.
    pub(crate) fn notify_routed(&mut self, route: EntityKind, event: &ModelEvent) -> Option<String> {
        let mut rejection = None;
        if let Some(list) = self.by_kind.get_mut(&route) {
            for subscriber in list.iter_mut() {
                if let EventResponse::Reject(reason) = (subscriber.callback)(event) {
                    rejection.get_or_insert(reason);
                }
            }
        }
        rejection
    }

    /// Deliver an event; returns the first rejection reason, if any.
    ///
    /// Every subscriber sees the event even after a rejection.
    pub(crate) fn notify(&mut self, event: &ModelEvent) -> Option<String> {
        let mut rejection = None;
        let kind_list = self.by_kind.get_mut(&event.kind);
        let targeted = kind_list.into_iter().flat_map(|list| list.iter_mut());
        for subscriber in targeted.chain(self.all.iter_mut()) {
            if let EventResponse::Reject(reason) = (subscriber.callback)(event) {
                rejection.get_or_insert(reason);
            }
        }
        rejection
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn event(kind: EntityKind, code: ChangeCode) -> ModelEvent {
        ModelEvent {
            kind,
            code,
            name: "x".to_string(),
            old_name: None,
        }
    }

    #[test]
    fn translation_table_covers_every_collection_event() {
        assert_eq!(translate(CollectionEvent::Inserted), ChangeCode::Added);
        assert_eq!(translate(CollectionEvent::Erased), ChangeCode::Removed);
        assert_eq!(
            translate(CollectionEvent::RenamePending),
            ChangeCode::Renaming
        );
        assert_eq!(TRANSLATION.len(), 7);
    }

    #[test]
    fn kind_filter_limits_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscribers::default();
        let sink = Arc::clone(&seen);
        subs.subscribe(
            EventFilter::Kind(EntityKind::StructType),
            Box::new(move |e| {
                sink.lock().unwrap().push(e.kind);
                EventResponse::Accept
            }),
        );

        subs.notify(&event(EntityKind::DataType, ChangeCode::Added));
        subs.notify(&event(EntityKind::StructType, ChangeCode::Added));

        assert_eq!(*seen.lock().unwrap(), vec![EntityKind::StructType]);
    }

    #[test]
    fn first_rejection_is_reported_and_unsubscribe_works() {
        let mut subs = Subscribers::default();
        let id = subs.subscribe(
            EventFilter::All,
            Box::new(|_| EventResponse::Reject("no".to_string())),
        );
        assert_eq!(
            subs.notify(&event(EntityKind::Unit, ChangeCode::Renaming)),
            Some("no".to_string())
        );
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        assert_eq!(subs.notify(&event(EntityKind::Unit, ChangeCode::Renaming)), None);
    }
}
