use std::{env, path::PathBuf, process, sync::Arc};

use core_types::{
    Address, Amount, SettingsError, VaultSettings,
    status::{OverallStatus, ServiceMetricsReporter, ServiceStatusReporter},
    types::{AddressParseError, format_tokens},
};
use pool_ledger::{
    AssetCustody, LedgerConfig, LedgerError, NullSink, PooledLedger, TransferError, storage,
};
use thiserror::Error;

fn main() {
    if let Err(err) = run() {
        eprintln!("prize-vault failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = CliArgs::parse()?;
    let settings = match &args.config {
        Some(path) => VaultSettings::load_from_file(path)?,
        None => VaultSettings::load()?,
    };
    let config = LedgerConfig::from_settings(&settings)?;
    let snapshot_path = config.snapshot_path();
    let snapshot = storage::load_snapshot(&snapshot_path)?;
    let ledger = PooledLedger::from_snapshot(
        config,
        snapshot,
        Arc::new(ReadOnlyCustody),
        Arc::new(NullSink),
    )?;

    println!("Ledger snapshot: {}", snapshot_path.display());
    println!(
        "Owner: {}; asset: {}; participant policy: {:?}",
        ledger.owner(),
        ledger.asset(),
        ledger.config().participant_policy
    );
    println!(
        "Total deposits: {} ({} units); prize pool: {} ({} units); total entries: {}",
        format_tokens(ledger.total_deposits()),
        ledger.total_deposits(),
        format_tokens(ledger.prize_pool()),
        ledger.prize_pool(),
        ledger.get_total_entries()
    );
    println!("Participants: {}", ledger.get_participant_count());

    if args.list_participants {
        for account in ledger.participants() {
            let (amount, entries) = ledger.get_user_deposit(&account);
            print_position(&account, amount, entries);
        }
    }

    if let Some(account) = args.address {
        let (amount, entries) = ledger.get_user_deposit(&account);
        println!();
        println!(
            "Position for {account} (participant={}):",
            ledger.is_participant(&account)
        );
        print_position(&account, amount, entries);
    }

    let status = ledger.status();
    println!();
    println!("Status {}: {:?}", status.name, status.overall);
    for sample in ledger.collect_metrics() {
        println!("  {:>36} = {}", sample.metric, sample.value);
    }
    if status.overall == OverallStatus::Crit {
        return Err(AppError::Unhealthy(status.errors.join("; ")));
    }
    Ok(())
}

fn print_position(account: &Address, amount: Amount, entries: Amount) {
    println!(
        "  {account}: amount={} ({amount} units) entries={entries}",
        format_tokens(amount)
    );
}

/// Custody for a reporting host: the ledger is opened read-only, so every transfer is refused.
struct ReadOnlyCustody;

impl AssetCustody for ReadOnlyCustody {
    fn transfer_in(&self, _from: Address, _amount: Amount) -> Result<(), TransferError> {
        Err(read_only())
    }

    fn transfer_out(&self, _to: Address, _amount: Amount) -> Result<(), TransferError> {
        Err(read_only())
    }
}

fn read_only() -> TransferError {
    TransferError::Rejected {
        reason: "prize-vault report host does not move funds".to_string(),
    }
}

struct CliArgs {
    config: Option<PathBuf>,
    address: Option<Address>,
    list_participants: bool,
}

impl CliArgs {
    fn parse() -> Result<Self, AppError> {
        let mut config = None;
        let mut address = None;
        let mut list_participants = false;
        for arg in env::args().skip(1) {
            if let Some(value) = arg.strip_prefix("--config=") {
                config = Some(PathBuf::from(value));
            } else if let Some(value) = arg.strip_prefix("--address=") {
                address = Some(value.parse()?);
            } else if arg == "--participants" {
                list_participants = true;
            } else {
                return Err(AppError::UnknownArg(arg));
            }
        }
        Ok(Self {
            config,
            address,
            list_participants,
        })
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error("unknown argument: {0} (usage: prize-vault [--config=PATH] [--address=0x..] [--participants])")]
    UnknownArg(String),
    #[error(transparent)]
    Address(#[from] AddressParseError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("ledger unhealthy: {0}")]
    Unhealthy(String),
}
