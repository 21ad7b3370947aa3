//! Append-only operation log.
//!
//! Every committed event gets one [`LogRecord`] holding the event row and
//! the operations it applied. Reverting marks the record instead of erasing
//! it, so the log is a full history of what was attempted and undone.

use oced_types::{EventId, EventTime};
use serde::{Deserialize, Serialize};

use crate::ops::AppliedOp;
use crate::records::EventRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Committed,
    Reverted,
}

/// One committed event and the operations needed to undo it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub event: EventRecord,
    pub applied: Vec<AppliedOp>,
    pub status: LogStatus,
}

impl LogRecord {
    pub fn event_id(&self) -> EventId {
        self.event.event_id
    }

    pub fn is_live(&self) -> bool {
        self.status == LogStatus::Committed
    }
}

/// Records in event-id order plus the stack of live event ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    records: Vec<LogRecord>,
    live: Vec<EventId>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a freshly committed event. Event ids are assigned in
    /// increasing order, which keeps `records` sorted.
    pub(crate) fn append(&mut self, event: EventRecord, applied: Vec<AppliedOp>) {
        self.live.push(event.event_id);
        self.records.push(LogRecord {
            event,
            applied,
            status: LogStatus::Committed,
        });
    }

    pub fn get(&self, event_id: EventId) -> Option<&LogRecord> {
        self.records
            .binary_search_by_key(&event_id, LogRecord::event_id)
            .ok()
            .map(|index| &self.records[index])
    }

    /// The most recent live record.
    pub fn latest_live(&self) -> Option<&LogRecord> {
        self.live.last().and_then(|id| self.get(*id))
    }

    /// Time of the most recent live event, if any.
    pub fn max_time(&self) -> Option<EventTime> {
        self.latest_live().map(|record| record.event.time)
    }

    /// Mark the latest live record as reverted. Returns `false` when
    /// `event_id` is not on top of the live stack.
    pub(crate) fn mark_reverted(&mut self, event_id: EventId) -> bool {
        if self.live.last() != Some(&event_id) {
            return false;
        }
        let Ok(index) = self
            .records
            .binary_search_by_key(&event_id, LogRecord::event_id)
        else {
            return false;
        };
        self.live.pop();
        self.records[index].status = LogStatus::Reverted;
        true
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Ids of live events, oldest first.
    pub fn live_events(&self) -> &[EventId] {
        &self.live
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    fn event(id: u64, time: &str) -> EventRecord {
        EventRecord {
            event_id: EventId::new(id),
            time: EventTime::parse(time).unwrap(),
            event_type: "tick".into(),
            events_attributes: BTreeMap::new(),
            object_ids_involved: BTreeSet::new(),
            object_relation_ids_involved: BTreeSet::new(),
            object_attribute_value_ids_involved: BTreeSet::new(),
        }
    }

    #[test]
    fn empty_log() {
        let log = OperationLog::new();
        assert!(log.is_empty());
        assert!(log.latest_live().is_none());
        assert!(log.max_time().is_none());
    }

    #[test]
    fn revert_is_a_stack() {
        let mut log = OperationLog::new();
        log.append(event(1, "2024-01-01T00:00:00Z"), Vec::new());
        log.append(event(2, "2024-01-02T00:00:00Z"), Vec::new());

        assert!(!log.mark_reverted(EventId::new(1)));
        assert!(log.mark_reverted(EventId::new(2)));
        assert!(!log.mark_reverted(EventId::new(2)));

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(EventId::new(2)).unwrap().status, LogStatus::Reverted);
        assert_eq!(log.live_events(), &[EventId::new(1)]);
        assert_eq!(log.max_time(), Some(EventTime::parse("2024-01-01T00:00:00Z").unwrap()));
    }

    #[test]
    fn ids_after_a_revert_stay_sorted() {
        let mut log = OperationLog::new();
        log.append(event(1, "2024-01-01T00:00:00Z"), Vec::new());
        assert!(log.mark_reverted(EventId::new(1)));
        log.append(event(2, "2024-01-01T00:00:00Z"), Vec::new());

        assert!(log.get(EventId::new(1)).is_some());
        assert!(log.get(EventId::new(2)).unwrap().is_live());
        assert!(log.get(EventId::new(3)).is_none());
        assert_eq!(log.latest_live().unwrap().event_id(), EventId::new(2));
    }
}
