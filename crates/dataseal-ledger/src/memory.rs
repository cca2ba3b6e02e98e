use dataseal_types::{AccountId, Amount, DataSealError, JournaledMap, Result, Transactional};
use std::collections::BTreeMap;

use crate::ledger::{Ledger, LedgerSnapshot};

/// In-memory ledger implementation
/// Suitable for testing and devnet use
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    accounts: JournaledMap<AccountId, Amount>,
}

impl MemoryLedger {
    /// Create a new empty in-memory ledger
    pub fn new() -> Self {
        MemoryLedger {
            accounts: JournaledMap::new(),
        }
    }

    /// Initialize with pre-funded accounts
    pub fn with_accounts(accounts: BTreeMap<AccountId, Amount>) -> Self {
        MemoryLedger {
            accounts: accounts.into(),
        }
    }

    fn ensure_non_negative(amount: Amount, what: &str) -> Result<()> {
        if amount.is_negative() {
            return Err(DataSealError::InvalidAmount(format!(
                "{} amount must be non-negative",
                what
            )));
        }
        Ok(())
    }

    fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let available = self.balance(account);
        if available < amount {
            return Err(DataSealError::InsufficientBalance {
                account: account.clone(),
                required: amount,
                available,
            });
        }
        self.accounts
            .insert(account.clone(), available.checked_sub(amount)?);
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let current = self.balance(account);
        self.accounts
            .insert(account.clone(), current.checked_add(amount)?);
        Ok(())
    }
}

impl Transactional for MemoryLedger {
    fn begin(&mut self) {
        self.accounts.begin();
    }

    fn commit(&mut self) {
        self.accounts.commit();
    }

    fn rollback(&mut self) {
        self.accounts.rollback();
    }
}

impl Ledger for MemoryLedger {
    fn deposit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        Self::ensure_non_negative(amount, "deposit")?;
        self.credit(account, amount)
    }

    fn withdraw(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        Self::ensure_non_negative(amount, "withdrawal")?;
        self.debit(account, amount)
    }

    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        Self::ensure_non_negative(amount, "transfer")?;

        if amount.is_zero() {
            return Ok(()); // No-op for zero transfers
        }

        // Credit first on a copy of the receiver balance so an overflow
        // cannot leave the sender debited.
        let credited = self.balance(to).checked_add(amount)?;
        self.debit(from, amount)?;
        if from == to {
            return self.credit(to, amount);
        }
        self.accounts.insert(to.clone(), credited);
        Ok(())
    }

    fn balance(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).copied().unwrap_or(Amount::ZERO)
    }

    fn total_supply(&self) -> Amount {
        self.accounts
            .values()
            .fold(Amount::ZERO, |acc, amount| acc + *amount)
    }

    fn create_account(&mut self, account: &AccountId) -> Result<()> {
        self.accounts.get_or_insert_with(account.clone(), || Amount::ZERO);
        Ok(())
    }

    fn list_accounts(&self) -> Vec<AccountId> {
        self.accounts.keys().cloned().collect()
    }

    fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            accounts: self.accounts.to_map(),
        }
    }

    fn restore(&mut self, snapshot: &LedgerSnapshot) -> Result<()> {
        self.accounts = snapshot.accounts.clone().into();
        Ok(())
    }
}
