//! Custody seam for the underlying asset.
//!
//! The ledger never stores asset balances itself; it asks an [`AssetCustody`]
//! to pull value in from a depositor or push it back out, and treats any
//! error as a failed operation.

use std::collections::{HashMap, VecDeque};

use core_types::{Address, Amount};
use parking_lot::Mutex;

use crate::error::TransferError;

pub trait AssetCustody: Send + Sync {
    /// Moves `amount` from `from` into the ledger's custody.
    fn transfer_in(&self, from: Address, amount: Amount) -> Result<(), TransferError>;
    /// Moves `amount` out of the ledger's custody to `to`.
    fn transfer_out(&self, to: Address, amount: Amount) -> Result<(), TransferError>;
}

#[derive(Default)]
struct CustodyBook {
    balances: HashMap<Address, Amount>,
    held: Amount,
    scripted_failures: VecDeque<TransferError>,
}

/// Balance book standing in for the deposit token.
///
/// Accounts must be funded with [`InMemoryCustody::mint`] before they can
/// deposit. Failures queued with [`InMemoryCustody::fail_next`] are returned
/// by the next transfers in FIFO order, without moving any value.
#[derive(Default)]
pub struct InMemoryCustody {
    book: Mutex<CustodyBook>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, to: Address, amount: Amount) {
        let mut book = self.book.lock();
        let balance = book.balances.entry(to).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.book.lock().balances.get(account).copied().unwrap_or(0)
    }

    /// Total value currently held on behalf of the ledger.
    pub fn held(&self) -> Amount {
        self.book.lock().held
    }

    pub fn fail_next(&self, error: TransferError) {
        self.book.lock().scripted_failures.push_back(error);
    }
}

impl AssetCustody for InMemoryCustody {
    fn transfer_in(&self, from: Address, amount: Amount) -> Result<(), TransferError> {
        let mut book = self.book.lock();
        if let Some(err) = book.scripted_failures.pop_front() {
            return Err(err);
        }
        let available = book.balances.get(&from).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from,
                requested: amount,
                available,
            });
        }
        let held = book.held.checked_add(amount).ok_or_else(|| TransferError::Rejected {
            reason: "custody balance overflow".to_string(),
        })?;
        book.balances.insert(from, available - amount);
        book.held = held;
        Ok(())
    }

    fn transfer_out(&self, to: Address, amount: Amount) -> Result<(), TransferError> {
        let mut book = self.book.lock();
        if let Some(err) = book.scripted_failures.pop_front() {
            return Err(err);
        }
        if book.held < amount {
            return Err(TransferError::Rejected {
                reason: format!("custody holds {}, cannot release {amount}", book.held),
            });
        }
        let balance = book.balances.get(&to).copied().unwrap_or(0);
        let credited = balance.checked_add(amount).ok_or_else(|| TransferError::Rejected {
            reason: "recipient balance overflow".to_string(),
        })?;
        book.held -= amount;
        book.balances.insert(to, credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = Address::from_low_u8(1);

    #[test]
    fn transfers_move_value_between_account_and_custody() {
        let custody = InMemoryCustody::new();
        custody.mint(ALICE, 100);
        custody.transfer_in(ALICE, 60).unwrap();
        assert_eq!(custody.balance_of(&ALICE), 40);
        assert_eq!(custody.held(), 60);

        custody.transfer_out(ALICE, 10).unwrap();
        assert_eq!(custody.balance_of(&ALICE), 50);
        assert_eq!(custody.held(), 50);
    }

    #[test]
    fn transfer_in_without_funds_fails() {
        let custody = InMemoryCustody::new();
        custody.mint(ALICE, 5);
        let err = custody.transfer_in(ALICE, 6).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientFunds {
                account: ALICE,
                requested: 6,
                available: 5
            }
        );
        assert_eq!(custody.balance_of(&ALICE), 5);
    }

    #[test]
    fn scripted_failures_fire_in_order_then_clear() {
        let custody = InMemoryCustody::new();
        custody.mint(ALICE, 10);
        custody.fail_next(TransferError::TimedOut);
        custody.fail_next(TransferError::Rejected {
            reason: "paused".into(),
        });

        assert_eq!(custody.transfer_in(ALICE, 1), Err(TransferError::TimedOut));
        assert!(matches!(
            custody.transfer_in(ALICE, 1),
            Err(TransferError::Rejected { .. })
        ));
        custody.transfer_in(ALICE, 1).unwrap();
        assert_eq!(custody.balance_of(&ALICE), 9);
    }
}
