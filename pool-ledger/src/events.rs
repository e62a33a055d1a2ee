use std::sync::mpsc::{self, Receiver, Sender};

use core_types::{Address, Amount, types::amount_str};
use parking_lot::Mutex;
use serde::Serialize;

/// Notification emitted after a mutation commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// `entries` is the account's entries total after the deposit.
    Deposited {
        account: Address,
        #[serde(with = "amount_str")]
        amount: Amount,
        #[serde(with = "amount_str")]
        entries: Amount,
    },
    /// `entries` is the account's entries total after the withdrawal.
    Withdrawn {
        account: Address,
        #[serde(with = "amount_str")]
        amount: Amount,
        #[serde(with = "amount_str")]
        entries: Amount,
    },
    YieldCollected {
        #[serde(with = "amount_str")]
        amount: Amount,
    },
    OwnershipTransferred {
        previous: Address,
        new: Address,
    },
}

/// Consumer of ledger notifications. Called while the ledger's write lock is held.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &LedgerEvent) {}
}

/// In-memory, append-only event record.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LedgerEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn last(&self) -> Option<LedgerEvent> {
        self.events.lock().last().cloned()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &LedgerEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forwards events to a subscriber over an mpsc channel.
///
/// A dropped receiver only disables delivery; it never fails the ledger operation.
pub struct ChannelSink {
    tx: Mutex<Sender<LedgerEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<LedgerEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &LedgerEvent) {
        if self.tx.lock().send(event.clone()).is_err() {
            log::debug!("ledger event subscriber gone; dropping {event:?}");
        }
    }
}
