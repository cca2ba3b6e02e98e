use dataseal_types::{AccountId, Amount, Result};
use std::collections::BTreeMap;

/// Ledger trait for managing account balances and transfers.
/// Stands in for the settlement substrate: every transfer is all-or-nothing.
pub trait Ledger {
    /// Fund an account from outside the system
    fn deposit(&mut self, account: &AccountId, amount: Amount) -> Result<()>;

    /// Remove value from an account to an external destination
    fn withdraw(&mut self, account: &AccountId, amount: Amount) -> Result<()>;

    /// Move value between accounts
    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()>;

    /// Balance of an account (zero if unknown)
    fn balance(&self, account: &AccountId) -> Amount;

    /// Sum of all balances
    fn total_supply(&self) -> Amount;

    /// Check if account has sufficient balance
    fn has_sufficient(&self, account: &AccountId, required: Amount) -> bool {
        self.balance(account) >= required
    }

    /// Create a new account (if it doesn't exist)
    fn create_account(&mut self, account: &AccountId) -> Result<()>;

    /// List all accounts
    fn list_accounts(&self) -> Vec<AccountId>;

    /// Get a snapshot of all account balances (for checkpoint/restore)
    fn snapshot(&self) -> LedgerSnapshot;

    /// Restore from a snapshot
    fn restore(&mut self, snapshot: &LedgerSnapshot) -> Result<()>;
}

/// Snapshot of ledger state for checkpoint/restore
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LedgerSnapshot {
    pub accounts: BTreeMap<AccountId, Amount>,
}
