mod hashing;
mod log;
mod poller;

pub use hashing::{event_id, HashRef};
pub use log::{EventLog, EventRecord, PendingEvents};
pub use poller::{EventPoller, EventSource};
