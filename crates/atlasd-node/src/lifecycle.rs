//! Lifecycle Supervisor (spec §4.6): startup sequence, crash recovery, and
//! the shutdown signal wiring that flips the process-wide running flag.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use atlasd_db::{restore_from_backup, snapshot_to_crash_dir, BackupConfig};

use crate::pidfile::{PidFile, StaleCheck};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pid file error: {0}")]
    PidFile(#[from] crate::pidfile::PidFileError),
}

pub struct Lifecycle {
    pub running: Arc<AtomicBool>,
    pub working_dir: PathBuf,
    pidfile: PidFile,
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl Lifecycle {
    /// Runs the startup sequence (§4.6 steps 1-3): ensures the working
    /// directory exists with mode 0700, detects a stale prior instance, and
    /// if the PID file is stale (process gone), snapshots state aside into
    /// `crash.<ts>/` and restores from the last known-good backup.
    pub fn startup(working_dir: &Path, chain_name: &str, state_paths: &[PathBuf]) -> Result<Self, LifecycleError> {
        ensure_working_dir(working_dir)?;

        let pidfile = PidFile::new(working_dir, chain_name);
        match pidfile.check()? {
            StaleCheck::Clean => {}
            StaleCheck::AlreadyRunning(pid) => return Err(LifecycleError::AlreadyRunning(pid)),
            StaleCheck::Stale(pid) => {
                warn!(pid, "stale pid file detected, running crash recovery");
                let ts = unix_now();
                let crash_dir = snapshot_to_crash_dir(working_dir, state_paths, ts)?;
                info!(?crash_dir, "moved pre-recovery state aside");
                for path in state_paths {
                    let backup_config = BackupConfig { backup_dir: working_dir.join("backups"), max_backups: 5 };
                    if let Some(used) = restore_from_backup(&backup_config, path)? {
                        info!(?path, ?used, "restored from backup");
                    }
                }
            }
        }

        pidfile.write(std::process::id())?;

        Ok(Self {
            running: Arc::new(AtomicBool::new(true)),
            working_dir: working_dir.to_path_buf(),
            pidfile,
        })
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Registers SIGINT/SIGTERM/SIGQUIT handlers that only clear the running
    /// flag (§4.6 shutdown): the main loop observes the flag and drives the
    /// rest of teardown itself.
    #[cfg(unix)]
    pub fn spawn_signal_handlers(&self) {
        let running = self.running.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
            let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
            let mut sigquit = signal(SignalKind::quit()).expect("install SIGQUIT handler");
            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigquit.recv() => info!("received SIGQUIT"),
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    /// Unlinks the PID file; final step of shutdown (§4.6).
    pub fn finish_shutdown(&self) -> Result<(), LifecycleError> {
        self.pidfile.remove()?;
        info!("shutdown complete, pid file removed");
        Ok(())
    }
}

fn ensure_working_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(dir)?.permissions();
        perms.set_mode(0o700);
        std::fs::set_permissions(dir, perms)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_is_clean_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("wd");
        let lifecycle = Lifecycle::startup(&working_dir, "atlasd", &[]).unwrap();
        assert!(lifecycle.is_running());
        assert!(lifecycle.pidfile.path().exists());
    }

    #[test]
    fn startup_refuses_when_pid_file_points_to_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("wd");
        std::fs::create_dir_all(&working_dir).unwrap();
        let pidfile = PidFile::new(&working_dir, "atlasd");
        pidfile.write(std::process::id()).unwrap();

        let result = Lifecycle::startup(&working_dir, "atlasd", &[]);
        assert!(matches!(result, Err(LifecycleError::AlreadyRunning(_))));
    }

    #[test]
    fn startup_recovers_from_stale_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("wd");
        std::fs::create_dir_all(&working_dir).unwrap();
        let pidfile = PidFile::new(&working_dir, "atlasd");
        pidfile.write(999_999).unwrap();

        let db_path = working_dir.join("name_db");
        std::fs::create_dir_all(&db_path).unwrap();
        std::fs::write(db_path.join("marker"), b"stale-state").unwrap();

        let lifecycle = Lifecycle::startup(&working_dir, "atlasd", &[db_path.clone()]).unwrap();
        assert!(lifecycle.is_running());
        assert!(!db_path.exists(), "stale state should have been moved aside");

        let crash_dirs: Vec<_> = std::fs::read_dir(&working_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("crash."))
            .collect();
        assert_eq!(crash_dirs.len(), 1);
    }

    #[test]
    fn finish_shutdown_removes_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("wd");
        let lifecycle = Lifecycle::startup(&working_dir, "atlasd", &[]).unwrap();
        lifecycle.finish_shutdown().unwrap();
        assert!(!PidFile::new(&working_dir, "atlasd").path().exists());
    }
}
