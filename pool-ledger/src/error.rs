use std::path::PathBuf;

use core_types::{Address, Amount};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failure reported by the custody collaborator while moving the underlying asset.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("account {account} holds {available}, cannot move {requested}")]
    InsufficientFunds {
        account: Address,
        requested: Amount,
        available: Amount,
    },
    #[error("transfer rejected: {reason}")]
    Rejected { reason: String },
    #[error("transfer timed out")]
    TimedOut,
}

/// Rejection of a single ledger operation. No state changes when one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },
    #[error("caller {caller} is not the owner")]
    Unauthorized { caller: Address },
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),
    #[error("arithmetic overflow")]
    Overflow,
    #[error("owner must not be the zero address")]
    InvalidOwner,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("snapshot missing: {path}")]
    MissingSnapshot { path: PathBuf },
    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("snapshot checksum mismatch: recorded {recorded:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { recorded: u32, computed: u32 },
    #[error("ledger invariant violated: {detail}")]
    InvariantViolation { detail: String },
    #[error("operation rejected: {0}")]
    Operation(#[from] OperationError),
    #[error("snapshot encoding error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransferError> for LedgerError {
    fn from(value: TransferError) -> Self {
        OperationError::from(value).into()
    }
}
