use serde::{Deserialize, Serialize};

use crate::constants::MIN_TRANSACTION_FEE;
use crate::error::ValidationError;
use crate::Transaction;

/// A transaction as posted by a client: every field may be missing and the
/// timestamp is never trusted from the outside.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<f64>,
    pub transaction_fee: Option<f64>,
}

impl TransactionRequest {
    /// Accept the request and stamp it with the server-side `timestamp`.
    pub fn into_transaction(self, timestamp: f64) -> Result<Transaction, ValidationError> {
        check(&self)?;
        match self {
            TransactionRequest {
                from: Some(from),
                to: Some(to),
                amount: Some(amount),
                transaction_fee: Some(fee),
            } => Ok(Transaction {
                from,
                to,
                amount,
                transaction_fee: Some(fee),
                timestamp,
            }),
            // `check` has already rejected every shape with a missing field
            TransactionRequest { from: None, .. } => Err(ValidationError::MissingSender),
            TransactionRequest { to: None, .. } => Err(ValidationError::MissingRecipient),
            TransactionRequest { amount: None, .. } => Err(ValidationError::NonPositiveAmount),
            TransactionRequest {
                transaction_fee: None,
                ..
            } => Err(ValidationError::FeeTooLow),
        }
    }
}

pub fn is_valid(tx: &TransactionRequest) -> bool {
    check(tx).is_ok()
}

/// Recipient, sender, amount, fee: the first failing rule wins.
pub fn check(tx: &TransactionRequest) -> Result<(), ValidationError> {
    if tx.to.as_deref().is_none_or(str::is_empty) {
        return Err(ValidationError::MissingRecipient);
    }
    if tx.from.as_deref().is_none_or(str::is_empty) {
        return Err(ValidationError::MissingSender);
    }
    if !tx.amount.is_some_and(|amount| amount > 0.0) {
        return Err(ValidationError::NonPositiveAmount);
    }
    if !tx.transaction_fee.is_some_and(|fee| fee >= MIN_TRANSACTION_FEE) {
        return Err(ValidationError::FeeTooLow);
    }
    Ok(())
}
