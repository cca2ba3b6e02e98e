use dataseal_types::{EventSink, ProtocolEvent, Result, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hashing::{event_id, HashRef};

/// One committed event as published to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1
    pub sequence: u64,
    pub id: HashRef,
    pub timestamp: Timestamp,
    pub event: ProtocolEvent,
}

/// Append-only public event log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event and return its record
    pub fn append(&mut self, event: ProtocolEvent, timestamp: Timestamp) -> Result<&EventRecord> {
        let sequence = self.records.len() as u64 + 1;
        let id = event_id(sequence, &event)?;
        debug!(sequence, event = event.name(), "Event appended");
        self.records.push(EventRecord {
            sequence,
            id,
            timestamp,
            event,
        });
        Ok(&self.records[self.records.len() - 1])
    }

    /// Append the events of one committed transaction, in order.
    /// Either every event is appended or none is.
    pub fn append_all(
        &mut self,
        events: impl IntoIterator<Item = ProtocolEvent>,
        timestamp: Timestamp,
    ) -> Result<u64> {
        let mut batch = Vec::new();
        for event in events {
            let sequence = self.last_sequence() + batch.len() as u64 + 1;
            batch.push(EventRecord {
                sequence,
                id: event_id(sequence, &event)?,
                timestamp,
                event,
            });
        }
        if !batch.is_empty() {
            debug!(first = batch[0].sequence, count = batch.len(), "Events appended");
        }
        self.records.extend(batch);
        Ok(self.last_sequence())
    }

    /// Records with `sequence > cursor`, at most `limit` of them
    pub fn events_after(&self, cursor: u64, limit: usize) -> &[EventRecord] {
        let start = (cursor as usize).min(self.records.len());
        let end = start.saturating_add(limit).min(self.records.len());
        &self.records[start..end]
    }

    pub fn for_task(&self, task_id: TaskId) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|record| record.event.task_id() == Some(task_id))
            .collect()
    }

    pub fn last_sequence(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }
}

/// Events emitted inside a transaction, held back until it commits
#[derive(Debug, Clone, Default)]
pub struct PendingEvents {
    events: Vec<ProtocolEvent>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_inner(self) -> Vec<ProtocolEvent> {
        self.events
    }
}

impl EventSink for PendingEvents {
    fn emit(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }
}
