use std::collections::{BTreeMap, HashMap, HashSet};

use core_types::{Address, Amount, ParticipantPolicy, entries_for, types::amount_str};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, OperationError};

/// A depositor's principal and the entries derived from it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(with = "amount_str")]
    pub amount: Amount,
    #[serde(with = "amount_str")]
    pub entries: Amount,
}

impl Position {
    pub fn with_amount(amount: Amount) -> Self {
        Self {
            amount,
            entries: entries_for(amount),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }
}

/// Point-in-time copy of the whole ledger, also the persisted form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub owner: Address,
    pub asset: Address,
    #[serde(with = "amount_str")]
    pub total_deposits: Amount,
    #[serde(with = "amount_str")]
    pub prize_pool: Amount,
    #[serde(with = "amount_str")]
    pub total_entries: Amount,
    pub positions: BTreeMap<Address, Position>,
    pub participants: Vec<Address>,
}

/// Planned change to one position plus the aggregates it implies.
///
/// Built from a read of the current state, applied only after custody succeeds.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PositionUpdate {
    pub account: Address,
    pub before: Position,
    pub after: Position,
    pub total_deposits: Amount,
    pub total_entries: Amount,
    pub membership: MembershipChange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MembershipChange {
    None,
    Join,
    Leave,
}

/// Unsynchronized accounting state. [`crate::PooledLedger`] owns the lock around it.
#[derive(Clone, Debug)]
pub struct LedgerState {
    owner: Address,
    asset: Address,
    policy: ParticipantPolicy,
    total_deposits: Amount,
    prize_pool: Amount,
    total_entries: Amount,
    positions: HashMap<Address, Position>,
    participants: Vec<Address>,
    participant_index: HashSet<Address>,
}

impl LedgerState {
    pub fn new(owner: Address, asset: Address, policy: ParticipantPolicy) -> Self {
        Self {
            owner,
            asset,
            policy,
            total_deposits: 0,
            prize_pool: 0,
            total_entries: 0,
            positions: HashMap::new(),
            participants: Vec::new(),
            participant_index: HashSet::new(),
        }
    }

    /// Rebuilds state from a snapshot, refusing snapshots that break the accounting invariants.
    ///
    /// Under [`ParticipantPolicy::PruneOnExit`] participants without principal are dropped
    /// first, so a snapshot written under `Retain` can be reopened with pruning enabled.
    pub fn restore(
        snapshot: LedgerSnapshot,
        policy: ParticipantPolicy,
    ) -> Result<Self, LedgerError> {
        let mut participants = snapshot.participants;
        if policy == ParticipantPolicy::PruneOnExit {
            let before = participants.len();
            participants.retain(|account| {
                snapshot
                    .positions
                    .get(account)
                    .is_some_and(|position| !position.is_empty())
            });
            let pruned = before - participants.len();
            if pruned > 0 {
                info!("pruned {pruned} participants without principal on restore");
            }
        }
        let participant_index: HashSet<Address> = participants.iter().copied().collect();
        let state = Self {
            owner: snapshot.owner,
            asset: snapshot.asset,
            policy,
            total_deposits: snapshot.total_deposits,
            prize_pool: snapshot.prize_pool,
            total_entries: snapshot.total_entries,
            positions: snapshot.positions.into_iter().collect(),
            participants,
            participant_index,
        };
        state.verify_invariants()?;
        Ok(state)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner: self.owner,
            asset: self.asset,
            total_deposits: self.total_deposits,
            prize_pool: self.prize_pool,
            total_entries: self.total_entries,
            positions: self
                .positions
                .iter()
                .map(|(account, position)| (*account, *position))
                .collect(),
            participants: self.participants.clone(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn asset(&self) -> Address {
        self.asset
    }

    pub fn total_deposits(&self) -> Amount {
        self.total_deposits
    }

    pub fn prize_pool(&self) -> Amount {
        self.prize_pool
    }

    pub fn total_entries(&self) -> Amount {
        self.total_entries
    }

    pub fn position(&self, account: &Address) -> Position {
        self.positions.get(account).copied().unwrap_or_default()
    }

    pub fn is_participant(&self, account: &Address) -> bool {
        self.participant_index.contains(account)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participants(&self) -> &[Address] {
        &self.participants
    }

    pub(crate) fn plan_deposit(
        &self,
        account: Address,
        amount: Amount,
    ) -> Result<PositionUpdate, OperationError> {
        if amount == 0 {
            return Err(OperationError::InvalidAmount);
        }
        let before = self.position(&account);
        let new_amount = before
            .amount
            .checked_add(amount)
            .ok_or(OperationError::Overflow)?;
        let total_deposits = self
            .total_deposits
            .checked_add(amount)
            .ok_or(OperationError::Overflow)?;
        let membership = if self.is_participant(&account) {
            MembershipChange::None
        } else {
            MembershipChange::Join
        };
        self.plan_position(
            account,
            before,
            Position::with_amount(new_amount),
            total_deposits,
            membership,
        )
    }

    pub(crate) fn plan_withdraw(
        &self,
        account: Address,
        amount: Amount,
    ) -> Result<PositionUpdate, OperationError> {
        if amount == 0 {
            return Err(OperationError::InvalidAmount);
        }
        let before = self.position(&account);
        if amount > before.amount {
            return Err(OperationError::InsufficientBalance {
                requested: amount,
                available: before.amount,
            });
        }
        let new_amount = before.amount - amount;
        let total_deposits = self
            .total_deposits
            .checked_sub(amount)
            .ok_or(OperationError::Overflow)?;
        let membership = match self.policy {
            ParticipantPolicy::PruneOnExit if new_amount == 0 && self.is_participant(&account) => {
                MembershipChange::Leave
            }
            _ => MembershipChange::None,
        };
        self.plan_position(
            account,
            before,
            Position::with_amount(new_amount),
            total_deposits,
            membership,
        )
    }

    fn plan_position(
        &self,
        account: Address,
        before: Position,
        after: Position,
        total_deposits: Amount,
        membership: MembershipChange,
    ) -> Result<PositionUpdate, OperationError> {
        let total_entries = self
            .total_entries
            .checked_sub(before.entries)
            .and_then(|rest| rest.checked_add(after.entries))
            .ok_or(OperationError::Overflow)?;
        Ok(PositionUpdate {
            account,
            before,
            after,
            total_deposits,
            total_entries,
            membership,
        })
    }

    pub(crate) fn apply(&mut self, update: &PositionUpdate) {
        self.positions.insert(update.account, update.after);
        self.total_deposits = update.total_deposits;
        self.total_entries = update.total_entries;
        match update.membership {
            MembershipChange::None => {}
            MembershipChange::Join => {
                if self.participant_index.insert(update.account) {
                    self.participants.push(update.account);
                }
            }
            MembershipChange::Leave => {
                if self.participant_index.remove(&update.account) {
                    self.participants.retain(|p| p != &update.account);
                }
            }
        }
    }

    /// Checks the caller and amount for a yield injection and returns the resulting prize pool.
    pub(crate) fn plan_yield(
        &self,
        caller: Address,
        amount: Amount,
    ) -> Result<Amount, OperationError> {
        self.ensure_owner(caller)?;
        if amount == 0 {
            return Err(OperationError::InvalidAmount);
        }
        self.prize_pool
            .checked_add(amount)
            .ok_or(OperationError::Overflow)
    }

    pub(crate) fn set_prize_pool(&mut self, prize_pool: Amount) {
        self.prize_pool = prize_pool;
    }

    pub(crate) fn ensure_owner(&self, caller: Address) -> Result<(), OperationError> {
        if caller != self.owner {
            return Err(OperationError::Unauthorized { caller });
        }
        Ok(())
    }

    pub(crate) fn set_owner(&mut self, owner: Address) {
        self.owner = owner;
    }

    /// Recomputes every aggregate from the positions and compares with the maintained values.
    pub fn verify_invariants(&self) -> Result<(), LedgerError> {
        let mut deposits: Amount = 0;
        let mut entries: Amount = 0;
        for (account, position) in &self.positions {
            if position.entries != entries_for(position.amount) {
                return Err(violation(format!(
                    "{account} holds {} entries for amount {}",
                    position.entries, position.amount
                )));
            }
            if !position.is_empty() && !self.is_participant(account) {
                return Err(violation(format!(
                    "{account} has a non-zero position but is not a participant"
                )));
            }
            deposits = deposits
                .checked_add(position.amount)
                .ok_or_else(|| violation("deposit sum overflows".to_string()))?;
            entries = entries
                .checked_add(position.entries)
                .ok_or_else(|| violation("entries sum overflows".to_string()))?;
        }
        if deposits != self.total_deposits {
            return Err(violation(format!(
                "total deposits {} != sum of positions {deposits}",
                self.total_deposits
            )));
        }
        if entries != self.total_entries {
            return Err(violation(format!(
                "total entries {} != sum of positions {entries}",
                self.total_entries
            )));
        }
        if self.participant_index.len() != self.participants.len() {
            return Err(violation("participant list contains duplicates".to_string()));
        }
        if self.policy == ParticipantPolicy::PruneOnExit {
            if let Some(idle) = self
                .participants
                .iter()
                .find(|account| self.position(account).is_empty())
            {
                return Err(violation(format!(
                    "{idle} is a participant with no position"
                )));
            }
        }
        Ok(())
    }
}

fn violation(detail: String) -> LedgerError {
    LedgerError::InvariantViolation { detail }
}
