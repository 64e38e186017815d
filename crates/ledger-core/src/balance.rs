//! Account balances, derived by replaying the whole chain. There is no
//! index: every call walks every transaction of every block.

use crate::{Chain, Transaction};

/// Credits and debits apply independently, so a self-transfer nets to zero.
pub fn balance_of(chain: &Chain, account: &str) -> f64 {
    chain.transactions().fold(0.0, |mut balance, tx| {
        if tx.to == account {
            balance += tx.amount;
        }
        if tx.from == account {
            balance -= tx.amount;
        }
        balance
    })
}

/// Whether the sender can cover both the amount and the fee.
pub fn has_sufficient_funds(chain: &Chain, tx: &Transaction) -> bool {
    balance_of(chain, &tx.from) - tx.amount - tx.fee() >= 0.0
}

/// Every entry in the chain that touches `account`, in chain order.
pub fn transactions_for<'a>(chain: &'a Chain, account: &'a str) -> impl Iterator<Item = &'a Transaction> + 'a {
    chain
        .transactions()
        .filter(move |tx| tx.to == account || tx.from == account)
}
