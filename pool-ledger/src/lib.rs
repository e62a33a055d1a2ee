//! Pooled-deposit ledger for the no-loss prize vault.
//!
//! The crate exposes:
//! - [`PooledLedger`]: serialized deposit, withdrawal and yield accounting over an injected
//!   [`AssetCustody`], publishing [`LedgerEvent`]s to an [`EventSink`].
//! - [`LedgerState`] / [`Position`]: the unsynchronized accounting state and per-account record.
//! - [`storage`]: checksummed JSON snapshots of the ledger.

pub mod config;
pub mod controller;
pub mod custody;
pub mod error;
pub mod events;
pub mod ledger;
pub mod storage;

pub use config::LedgerConfig;
pub use controller::{PooledLedger, PositionReceipt};
pub use custody::{AssetCustody, InMemoryCustody};
pub use error::{LedgerError, OperationError, TransferError};
pub use events::{ChannelSink, EventLog, EventSink, LedgerEvent, NullSink};
pub use ledger::{LedgerSnapshot, LedgerState, Position};
