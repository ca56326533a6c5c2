//! Crash recovery and backup support (§4.6 step 3).
//!
//! When the lifecycle supervisor finds a stale PID file whose process no
//! longer exists, it moves all working-directory state paths aside into a
//! timestamped `crash.<unix_ts>/` directory and restores from the last
//! known-good backup before continuing startup. Backups are plain
//! directory copies rather than RocksDB checkpoints, so the same code path
//! works uniformly across the Name DB, the Atlas DB and the zone-file
//! directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    pub max_backups: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("backups"),
            max_backups: 5,
        }
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Move every path in `state_paths` into `working_dir/crash.<unix_ts>/`,
/// returning the crash directory. Called when a stale PID file is detected
/// (process gone, file present) at startup.
pub fn snapshot_to_crash_dir(working_dir: &Path, state_paths: &[PathBuf], unix_ts: u64) -> io::Result<PathBuf> {
    let crash_dir = working_dir.join(format!("crash.{unix_ts}"));
    fs::create_dir_all(&crash_dir)?;
    for path in state_paths {
        if !path.exists() {
            continue;
        }
        let dest = crash_dir.join(path.file_name().unwrap_or_default());
        warn!("moving stale state {:?} into {:?}", path, dest);
        if path.is_dir() {
            copy_dir_recursive(path, &dest)?;
            fs::remove_dir_all(path)?;
        } else {
            fs::copy(path, &dest)?;
            fs::remove_file(path)?;
        }
    }
    Ok(crash_dir)
}

/// Restore `dest` from the most recent directory under `config.backup_dir`.
/// No-op (returns `Ok(None)`) if no backup exists — a first-ever startup
/// has nothing to restore.
pub fn restore_from_backup(config: &BackupConfig, dest: &Path) -> io::Result<Option<PathBuf>> {
    if !config.backup_dir.exists() {
        return Ok(None);
    }
    let mut backups: Vec<PathBuf> = fs::read_dir(&config.backup_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    backups.sort();
    let Some(latest) = backups.pop() else {
        return Ok(None);
    };
    info!("restoring {:?} from backup {:?}", dest, latest);
    copy_dir_recursive(&latest, dest)?;
    Ok(Some(latest))
}

/// Create a timestamped backup of `src` under `config.backup_dir`, pruning
/// old backups beyond `config.max_backups`.
pub fn create_backup(config: &BackupConfig, src: &Path, unix_ts: u64) -> io::Result<PathBuf> {
    fs::create_dir_all(&config.backup_dir)?;
    let dest = config.backup_dir.join(format!("backup_{unix_ts}"));
    copy_dir_recursive(src, &dest)?;

    let mut backups: Vec<PathBuf> = fs::read_dir(&config.backup_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    backups.sort();
    while backups.len() > config.max_backups {
        let oldest = backups.remove(0);
        fs::remove_dir_all(&oldest)?;
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_is_noop_without_prior_backup() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackupConfig {
            backup_dir: dir.path().join("backups"),
            max_backups: 5,
        };
        let dest = dir.path().join("db");
        assert!(restore_from_backup(&config, &dest).unwrap().is_none());
    }

    #[test]
    fn backup_then_restore_roundtrips_contents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("db");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("lastblock"), b"42").unwrap();

        let config = BackupConfig {
            backup_dir: dir.path().join("backups"),
            max_backups: 5,
        };
        create_backup(&config, &src, 1000).unwrap();

        let restored = dir.path().join("restored");
        let used = restore_from_backup(&config, &restored).unwrap();
        assert!(used.is_some());
        assert_eq!(fs::read(restored.join("lastblock")).unwrap(), b"42");
    }

    #[test]
    fn snapshot_to_crash_dir_moves_state_paths() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("name_db");
        fs::create_dir_all(&db_path).unwrap();
        fs::write(db_path.join("marker"), b"x").unwrap();

        let crash_dir = snapshot_to_crash_dir(dir.path(), &[db_path.clone()], 99).unwrap();
        assert!(!db_path.exists());
        assert!(crash_dir.join("name_db").join("marker").exists());
    }
}
