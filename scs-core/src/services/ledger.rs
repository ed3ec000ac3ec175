//! Account ledger - in-memory balances owned by the transaction gateway
//!
//! A single mutex guards the whole balance map, so every deposit and
//! withdrawal is atomic with respect to every other one.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::AccountLedgerEntry;

/// Result of a withdrawal attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withdrawal {
    Completed { balance: Decimal },
    InsufficientFunds { balance: Decimal },
    NoAccount,
}

#[derive(Debug, Default)]
pub struct Ledger {
    balances: Mutex<HashMap<String, Decimal>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded with opening balances
    pub fn with_accounts<I, S>(accounts: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let mut balances = HashMap::new();
        for (username, balance) in accounts {
            let username = username.into();
            if balance < Decimal::ZERO {
                return Err(Error::validation(format!(
                    "opening balance for '{}' cannot be negative",
                    username
                )));
            }
            balances.insert(username, balance);
        }
        Ok(Self {
            balances: Mutex::new(balances),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Decimal>>> {
        self.balances
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    pub fn balance(&self, username: &str) -> Result<Option<Decimal>> {
        Ok(self.lock()?.get(username).copied())
    }

    /// Credit `amount`, opening a zero-balance account first if needed
    pub fn deposit(&self, username: &str, amount: Decimal) -> Result<Decimal> {
        require_positive(amount)?;
        let mut balances = self.lock()?;
        let balance = balances.entry(username.to_string()).or_insert(Decimal::ZERO);
        *balance += amount;
        Ok(*balance)
    }

    /// Debit `amount` unless it exceeds the balance; never opens an account
    pub fn withdraw(&self, username: &str, amount: Decimal) -> Result<Withdrawal> {
        require_positive(amount)?;
        let mut balances = self.lock()?;
        let Some(balance) = balances.get_mut(username) else {
            return Ok(Withdrawal::NoAccount);
        };
        if amount > *balance {
            return Ok(Withdrawal::InsufficientFunds { balance: *balance });
        }
        *balance -= amount;
        Ok(Withdrawal::Completed { balance: *balance })
    }

    /// Snapshot of every account, sorted by username
    pub fn accounts(&self) -> Result<Vec<AccountLedgerEntry>> {
        let balances = self.lock()?;
        let mut entries: Vec<_> = balances
            .iter()
            .map(|(username, balance)| AccountLedgerEntry {
                username: username.clone(),
                balance: *balance,
            })
            .collect();
        entries.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(entries)
    }
}

fn require_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_deposit_opens_account() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance("alice").unwrap(), None);
        assert_eq!(ledger.deposit("alice", dec!(500)).unwrap(), dec!(500));
        assert_eq!(ledger.balance("alice").unwrap(), Some(dec!(500)));
    }

    #[test]
    fn test_overdraw_is_refused() {
        let ledger = Ledger::new();
        ledger.deposit("alice", dec!(500)).unwrap();

        assert_eq!(
            ledger.withdraw("alice", dec!(600)).unwrap(),
            Withdrawal::InsufficientFunds { balance: dec!(500) }
        );
        assert_eq!(ledger.balance("alice").unwrap(), Some(dec!(500)));

        assert_eq!(
            ledger.withdraw("alice", dec!(500)).unwrap(),
            Withdrawal::Completed { balance: dec!(0) }
        );
    }

    #[test]
    fn test_withdraw_unknown_user_opens_nothing() {
        let ledger = Ledger::new();
        assert_eq!(ledger.withdraw("ghost", dec!(1)).unwrap(), Withdrawal::NoAccount);
        assert!(ledger.accounts().unwrap().is_empty());
    }

    #[test]
    fn test_amounts_must_be_positive() {
        let ledger = Ledger::new();
        assert!(matches!(ledger.deposit("alice", dec!(0)), Err(Error::Validation(_))));
        assert!(matches!(ledger.withdraw("alice", dec!(-5)), Err(Error::Validation(_))));
    }

    #[test]
    fn test_seeded_ledger() {
        let ledger = Ledger::with_accounts([("marko", dec!(500)), ("ana", dec!(20.50))]).unwrap();
        let accounts = ledger.accounts().unwrap();
        assert_eq!(accounts[0].username, "ana");
        assert_eq!(accounts[1].balance, dec!(500));
        assert!(Ledger::with_accounts([("x", dec!(-1))]).is_err());
    }

    #[test]
    fn test_concurrent_deposits_are_not_lost() {
        let ledger = Arc::new(Ledger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.deposit("alice", dec!(1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.balance("alice").unwrap(), Some(dec!(800)));
    }
}
