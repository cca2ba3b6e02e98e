use std::collections::HashSet;

use crate::log::{EventLog, EventRecord};

/// Anything an observer can poll for committed events
pub trait EventSource {
    fn events_after(&self, cursor: u64, limit: usize) -> Vec<EventRecord>;
}

impl EventSource for EventLog {
    fn events_after(&self, cursor: u64, limit: usize) -> Vec<EventRecord> {
        EventLog::events_after(self, cursor, limit).to_vec()
    }
}

/// Polling observer that tracks its last-seen sequence and drops records at
/// or below it, so redelivered events reach handlers once. Event ids are only
/// held for the delivery being accepted.
#[derive(Debug, Clone)]
pub struct EventPoller {
    cursor: u64,
    batch_size: usize,
}

impl EventPoller {
    pub fn new(batch_size: usize) -> Self {
        Self::starting_at(0, batch_size)
    }

    /// Resume after a previously persisted cursor
    pub fn starting_at(cursor: u64, batch_size: usize) -> Self {
        EventPoller {
            cursor,
            batch_size: batch_size.max(1),
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Fetch the next batch of unseen records
    pub fn poll(&mut self, source: &impl EventSource) -> Vec<EventRecord> {
        let batch = source.events_after(self.cursor, self.batch_size);
        self.accept(batch)
    }

    /// Feed records delivered by any channel, in any order. Duplicates and
    /// records at or below the cursor are filtered out.
    pub fn accept(&mut self, mut records: Vec<EventRecord>) -> Vec<EventRecord> {
        records.sort_by_key(|record| record.sequence);
        let mut window = HashSet::with_capacity(records.len());
        let mut fresh = Vec::with_capacity(records.len());
        for record in records {
            if record.sequence <= self.cursor || !window.insert(record.id.clone()) {
                continue;
            }
            self.cursor = record.sequence;
            fresh.push(record);
        }
        fresh
    }
}
