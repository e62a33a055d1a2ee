use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};

use crate::{
    error::{LedgerError, Result},
    ledger::LedgerSnapshot,
};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    checksum: u32,
    state: LedgerSnapshot,
}

/// Writes the snapshot next to `path` and renames it into place.
pub fn write_snapshot(path: &Path, snapshot: &LedgerSnapshot) -> Result<()> {
    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        checksum: state_checksum(snapshot)?,
        state: snapshot.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&file)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a snapshot if one exists. An absent or empty file means a fresh ledger.
pub fn read_snapshot(path: &Path) -> Result<Option<LedgerSnapshot>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if bytes.is_empty() {
        return Ok(None);
    }
    let file: SnapshotFile = serde_json::from_slice(&bytes)?;
    if file.version != SNAPSHOT_VERSION {
        return Err(LedgerError::UnsupportedVersion {
            found: file.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    let computed = state_checksum(&file.state)?;
    if computed != file.checksum {
        return Err(LedgerError::ChecksumMismatch {
            recorded: file.checksum,
            computed,
        });
    }
    Ok(Some(file.state))
}

/// Like [`read_snapshot`] but treats a missing snapshot as an error.
pub fn load_snapshot(path: &Path) -> Result<LedgerSnapshot> {
    read_snapshot(path)?.ok_or_else(|| LedgerError::MissingSnapshot {
        path: path.to_path_buf(),
    })
}

fn state_checksum(snapshot: &LedgerSnapshot) -> Result<u32> {
    let canonical = serde_json::to_vec(snapshot)?;
    let mut hasher = Crc32::new();
    hasher.update(&canonical);
    Ok(hasher.finalize())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerState, Position};
    use core_types::{Address, ONE_TOKEN, ParticipantPolicy};
    use tempfile::tempdir;

    fn sample() -> LedgerSnapshot {
        let alice = Address::from_low_u8(1);
        let mut snapshot = LedgerState::new(
            Address::from_low_u8(0xaa),
            Address::from_low_u8(0xbb),
            ParticipantPolicy::Retain,
        )
        .snapshot();
        let position = Position::with_amount(1000 * ONE_TOKEN + 7);
        snapshot.positions.insert(alice, position);
        snapshot.participants.push(alice);
        snapshot.total_deposits = position.amount;
        snapshot.total_entries = position.entries;
        snapshot.prize_pool = 42 * ONE_TOKEN;
        snapshot
    }

    #[test]
    fn missing_and_empty_files_read_as_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger-snapshot.json");
        assert!(read_snapshot(&path).unwrap().is_none());
        fs::write(&path, b"").unwrap();
        assert!(read_snapshot(&path).unwrap().is_none());
        assert!(matches!(
            load_snapshot(&dir.path().join("absent.json")),
            Err(LedgerError::MissingSnapshot { .. })
        ));
    }

    #[test]
    fn written_snapshot_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger-snapshot.json");
        let snapshot = sample();
        write_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn tampered_amount_fails_checksum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger-snapshot.json");
        write_snapshot(&path, &sample()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let tampered = text.replace("42000000000000000000", "43000000000000000000");
        assert_ne!(text, tampered);
        fs::write(&path, tampered).unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(LedgerError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger-snapshot.json");
        write_snapshot(&path, &sample()).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["version"] = serde_json::json!(99);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(LedgerError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
