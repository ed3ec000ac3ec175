//! Account ledger domain model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance of one ATM user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedgerEntry {
    pub username: String,
    pub balance: Decimal,
}

/// Outcome of a deposit or withdrawal
///
/// Business failures (not authenticated, insufficient funds) are reported
/// here with `ok == false` and a readable message rather than as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub ok: bool,
    pub message: String,
    /// Balance after the operation, when the account exists
    pub balance: Option<Decimal>,
}

impl TransactionOutcome {
    pub fn success(message: impl Into<String>, balance: Decimal) -> Self {
        Self {
            ok: true,
            message: message.into(),
            balance: Some(balance),
        }
    }

    pub fn failure(message: impl Into<String>, balance: Option<Decimal>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            balance,
        }
    }
}
