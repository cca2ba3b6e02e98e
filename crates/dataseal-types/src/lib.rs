mod account;
mod amount;
mod ids;
mod score;
mod digest;
mod task;
mod event;
mod error;
mod journal;

pub use account::AccountId;
pub use amount::{Amount, BPS_DENOMINATOR};
pub use ids::{MarketId, TaskId, Timestamp};
pub use score::Score;
pub use digest::{Attestation, AttestationKey, CommitmentDigest};
pub use task::{DisputeResolution, Task, TaskState};
pub use event::{EventSink, ProtocolEvent, SlashReason};
pub use error::{DataSealError, ErrorCategory, Result};
pub use journal::{JournaledMap, Transactional};
