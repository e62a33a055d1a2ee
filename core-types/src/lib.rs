// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared value types, settings, and status reporting for the prize vault.

pub mod config;
pub mod status;
pub mod types;

pub use config::{ParticipantPolicy, SettingsError, VaultSettings};
pub use types::{Address, Amount, ONE_TOKEN, entries_for, tokens};
