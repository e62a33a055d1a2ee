use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Address;

pub const DEFAULT_SETTINGS_FILE: &str = "vault.toml";
pub const ENV_PREFIX: &str = "VAULT";

/// What happens to participant membership once a position is fully withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantPolicy {
    /// Membership is never revoked; an address stays a participant after exiting.
    #[default]
    Retain,
    /// Membership is dropped when principal reaches zero and restored on the next deposit.
    PruneOnExit,
}

/// Operator settings for a vault host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default)]
    pub asset: Address,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub participant_policy: ParticipantPolicy,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("vault.state")
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings error: {0}")]
    Config(#[from] ConfigError),
    #[error("owner address is required (set `owner` or {ENV_PREFIX}_OWNER)")]
    MissingOwner,
    #[error("owner address must not be the zero address")]
    ZeroOwner,
}

impl VaultSettings {
    /// Reads `vault.toml` (optional) overlaid with `VAULT_*` environment variables.
    pub fn load() -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::with_name(DEFAULT_SETTINGS_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(settings)
    }

    /// Reads a single settings file with no environment overlay.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;
        Self::from_config(settings)
    }

    fn from_config(settings: Config) -> Result<Self, SettingsError> {
        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        match self.owner {
            None => Err(SettingsError::MissingOwner),
            Some(owner) if owner.is_zero() => Err(SettingsError::ZeroOwner),
            Some(_) => Ok(()),
        }
    }

    /// Owner address; only meaningful after [`VaultSettings::validate`] succeeded.
    pub fn owner(&self) -> Result<Address, SettingsError> {
        self.owner.ok_or(SettingsError::MissingOwner)
    }
}
