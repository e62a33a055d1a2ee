use std::sync::Arc;

use core_types::{
    Address, Amount, ONE_TOKEN,
    status::{
        MetricSample, OverallStatus, ServiceMetricsReporter, ServiceStatusReporter,
        ServiceStatusSnapshot, StatusGauge, gauge_samples,
    },
};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::{
    config::LedgerConfig,
    custody::AssetCustody,
    error::{OperationError, Result, TransferError},
    events::{EventSink, LedgerEvent},
    ledger::{LedgerSnapshot, LedgerState, MembershipChange, Position, PositionUpdate},
    storage,
};

const SERVICE_NAME: &str = "pool-ledger";

/// Outcome of a committed deposit or withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionReceipt {
    pub account: Address,
    pub amount: Amount,
    /// The account's position after the operation.
    pub position: Position,
}

/// Pooled-deposit ledger.
///
/// Every mutation runs under the write half of a single lock, from validation
/// through the custody call to the event emission, so operations are
/// linearizable and a failed transfer leaves no trace. Queries take the read
/// half and only ever see committed state.
pub struct PooledLedger {
    config: LedgerConfig,
    state: RwLock<LedgerState>,
    custody: Arc<dyn AssetCustody>,
    events: Arc<dyn EventSink>,
    /// Serializes snapshot writers so a stale snapshot never lands over a newer one.
    persist_lock: Mutex<()>,
}

impl PooledLedger {
    /// Creates an empty ledger owned by `config.owner`.
    pub fn new(
        config: LedgerConfig,
        custody: Arc<dyn AssetCustody>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let state = LedgerState::new(config.owner, config.asset, config.participant_policy);
        Self {
            config,
            state: RwLock::new(state),
            custody,
            events,
            persist_lock: Mutex::new(()),
        }
    }

    /// Opens the ledger persisted under `config.state_dir`, or starts empty when none exists.
    pub fn bootstrap(
        config: LedgerConfig,
        custody: Arc<dyn AssetCustody>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.ensure_dirs()?;
        let path = config.snapshot_path();
        let Some(snapshot) = storage::read_snapshot(&path)? else {
            info!("no ledger snapshot at {}; starting empty", path.display());
            return Ok(Self::new(config, custody, events));
        };
        Self::from_snapshot(config, snapshot, custody, events)
    }

    /// Rebuilds a ledger from an already loaded snapshot without touching the filesystem.
    ///
    /// A persisted owner takes precedence over the configured one since ownership may have
    /// been transferred after the snapshot's creation.
    pub fn from_snapshot(
        config: LedgerConfig,
        snapshot: LedgerSnapshot,
        custody: Arc<dyn AssetCustody>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        if snapshot.asset != config.asset {
            warn!(
                "snapshot asset {} differs from configured asset {}; keeping snapshot value",
                snapshot.asset, config.asset
            );
        }
        if snapshot.owner != config.owner {
            info!(
                "snapshot owner {} supersedes configured owner {}",
                snapshot.owner, config.owner
            );
        }
        let state = LedgerState::restore(snapshot, config.participant_policy)?;
        info!(
            "restored ledger from {}: deposits={} prize_pool={} participants={}",
            config.snapshot_path().display(),
            state.total_deposits(),
            state.prize_pool(),
            state.participant_count()
        );
        Ok(Self {
            config,
            state: RwLock::new(state),
            custody,
            events,
            persist_lock: Mutex::new(()),
        })
    }

    /// Writes a consistent snapshot to the configured state directory.
    pub fn persist(&self) -> Result<()> {
        let _writer = self.persist_lock.lock();
        let snapshot = self.snapshot();
        self.config.ensure_dirs()?;
        let path = self.config.snapshot_path();
        storage::write_snapshot(&path, &snapshot)?;
        info!("persisted ledger snapshot to {}", path.display());
        Ok(())
    }

    pub fn deposit(
        &self,
        caller: Address,
        amount: Amount,
    ) -> std::result::Result<PositionReceipt, OperationError> {
        self.mutate_position(
            "deposit",
            amount,
            |state| state.plan_deposit(caller, amount),
            || self.custody.transfer_in(caller, amount),
            |update| LedgerEvent::Deposited {
                account: update.account,
                amount,
                entries: update.after.entries,
            },
        )
    }

    pub fn withdraw(
        &self,
        caller: Address,
        amount: Amount,
    ) -> std::result::Result<PositionReceipt, OperationError> {
        self.mutate_position(
            "withdraw",
            amount,
            |state| state.plan_withdraw(caller, amount),
            || self.custody.transfer_out(caller, amount),
            |update| LedgerEvent::Withdrawn {
                account: update.account,
                amount,
                entries: update.after.entries,
            },
        )
    }

    /// Pulls `amount` of yield from the owner into the prize pool and returns the new pool size.
    pub fn collect_yield(
        &self,
        caller: Address,
        amount: Amount,
    ) -> std::result::Result<Amount, OperationError> {
        let mut state = self.state.write();
        let prize_pool = state.plan_yield(caller, amount).inspect_err(log_rejection)?;
        self.custody
            .transfer_in(caller, amount)
            .inspect_err(|err| log_transfer_failure("collect_yield", caller, amount, err))?;
        state.set_prize_pool(prize_pool);
        self.events.emit(&LedgerEvent::YieldCollected { amount });
        debug!("yield collected: amount={amount} prize_pool={prize_pool}");
        Ok(prize_pool)
    }

    pub fn transfer_ownership(
        &self,
        caller: Address,
        new_owner: Address,
    ) -> std::result::Result<(), OperationError> {
        let mut state = self.state.write();
        state.ensure_owner(caller).inspect_err(log_rejection)?;
        if new_owner.is_zero() {
            return Err(OperationError::InvalidOwner);
        }
        let previous = state.owner();
        state.set_owner(new_owner);
        self.events.emit(&LedgerEvent::OwnershipTransferred {
            previous,
            new: new_owner,
        });
        info!("ownership transferred from {previous} to {new_owner}");
        Ok(())
    }

    fn mutate_position<P, T, E>(
        &self,
        op: &'static str,
        amount: Amount,
        plan: P,
        transfer: T,
        event: E,
    ) -> std::result::Result<PositionReceipt, OperationError>
    where
        P: FnOnce(&LedgerState) -> std::result::Result<PositionUpdate, OperationError>,
        T: FnOnce() -> std::result::Result<(), TransferError>,
        E: FnOnce(&PositionUpdate) -> LedgerEvent,
    {
        let mut state = self.state.write();
        let update = plan(&*state)?;
        transfer().inspect_err(|err| log_transfer_failure(op, update.account, amount, err))?;
        state.apply(&update);
        self.events.emit(&event(&update));
        debug!(
            "{op} by {} committed: amount {} -> {}, entries {} -> {}, total_entries={}",
            update.account,
            update.before.amount,
            update.after.amount,
            update.before.entries,
            update.after.entries,
            update.total_entries
        );
        match update.membership {
            MembershipChange::Join => debug!("{} joined participants", update.account),
            MembershipChange::Leave => debug!("{} left participants", update.account),
            MembershipChange::None => {}
        }
        Ok(PositionReceipt {
            account: update.account,
            amount,
            position: update.after,
        })
    }

    /// Returns `(amount, entries)` for `account`; zeros when it never deposited.
    pub fn get_user_deposit(&self, account: &Address) -> (Amount, Amount) {
        let position = self.state.read().position(account);
        (position.amount, position.entries)
    }

    pub fn total_deposits(&self) -> Amount {
        self.state.read().total_deposits()
    }

    pub fn prize_pool(&self) -> Amount {
        self.state.read().prize_pool()
    }

    pub fn get_total_entries(&self) -> Amount {
        self.state.read().total_entries()
    }

    pub fn get_participant_count(&self) -> usize {
        self.state.read().participant_count()
    }

    pub fn is_participant(&self, account: &Address) -> bool {
        self.state.read().is_participant(account)
    }

    /// Participants in first-deposit order.
    pub fn participants(&self) -> Vec<Address> {
        self.state.read().participants().to_vec()
    }

    pub fn owner(&self) -> Address {
        self.state.read().owner()
    }

    pub fn asset(&self) -> Address {
        self.state.read().asset()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().snapshot()
    }

    pub fn verify_invariants(&self) -> Result<()> {
        self.state.read().verify_invariants()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn gauges(state: &LedgerState) -> Vec<StatusGauge> {
        vec![
            StatusGauge::new("total deposits", as_tokens(state.total_deposits()))
                .with_unit("tokens"),
            StatusGauge::new("prize pool", as_tokens(state.prize_pool())).with_unit("tokens"),
            StatusGauge::new("total entries", state.total_entries() as f64),
            StatusGauge::new("participants", state.participant_count() as f64),
        ]
    }
}

impl ServiceStatusReporter for PooledLedger {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn status(&self) -> ServiceStatusSnapshot {
        let state = self.state.read();
        let (overall, errors) = match state.verify_invariants() {
            Ok(()) => (OverallStatus::Ok, Vec::new()),
            Err(err) => (OverallStatus::Crit, vec![err.to_string()]),
        };
        ServiceStatusSnapshot {
            name: SERVICE_NAME.to_string(),
            overall,
            warnings: Vec::new(),
            errors,
            gauges: Self::gauges(&state),
        }
    }
}

impl ServiceMetricsReporter for PooledLedger {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn collect_metrics(&self) -> Vec<MetricSample> {
        let state = self.state.read();
        gauge_samples(SERVICE_NAME, &Self::gauges(&state))
    }
}

fn as_tokens(amount: Amount) -> f64 {
    amount as f64 / ONE_TOKEN as f64
}

fn log_rejection(err: &OperationError) {
    if let OperationError::Unauthorized { caller } = err {
        warn!("rejected privileged call from {caller}");
    }
}

fn log_transfer_failure(op: &str, account: Address, amount: Amount, err: &TransferError) {
    warn!("{op} for {account} aborted: transfer of {amount} failed: {err}");
}
