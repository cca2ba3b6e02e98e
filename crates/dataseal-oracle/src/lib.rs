mod oracle;
mod registry;

pub use oracle::{OracleAccounts, OracleParams, OracleRecord, SlashOutcome};
pub use registry::OracleRegistry;
