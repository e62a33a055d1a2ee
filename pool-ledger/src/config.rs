use std::{fs, path::PathBuf};

use core_types::{Address, ParticipantPolicy, VaultSettings, config::SettingsError};

use crate::error::Result;

pub const DEFAULT_STATE_DIR: &str = "vault.state";
pub const SNAPSHOT_FILE: &str = "ledger-snapshot.json";

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub owner: Address,
    pub asset: Address,
    pub participant_policy: ParticipantPolicy,
    pub state_dir: PathBuf,
}

impl LedgerConfig {
    pub fn new(owner: Address, asset: Address) -> Self {
        Self {
            owner,
            asset,
            participant_policy: ParticipantPolicy::default(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }

    pub fn from_settings(settings: &VaultSettings) -> std::result::Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            owner: settings.owner()?,
            asset: settings.asset,
            participant_policy: settings.participant_policy,
            state_dir: settings.state_dir.clone(),
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join(SNAPSHOT_FILE)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir)?;
        }
        Ok(())
    }
}
