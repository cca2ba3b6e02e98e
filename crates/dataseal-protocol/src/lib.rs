mod config;
mod error;
mod protocol;
mod state;

pub use config::{ModuleAccounts, ProtocolConfig};
pub use error::{ProtocolError, Result};
pub use protocol::{Protocol, SubmissionReceipt, Tx, ValidationReceipt};
pub use state::{ProtocolState, ProtocolStatus};
