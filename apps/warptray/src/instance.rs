//! Single-instance guard backed by a pid file.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

const LOCK_FILE_NAME: &str = "warptray.lock";

/// Held for the lifetime of the tray process. The pid file is removed on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Takes the lock in the system temp directory.
    pub fn acquire() -> anyhow::Result<Self> {
        Self::acquire_at(std::env::temp_dir().join(LOCK_FILE_NAME))
    }

    /// Takes the lock at `path`. Fails if another live process holds it;
    /// a lock left behind by a dead process is replaced.
    pub fn acquire_at(path: PathBuf) -> anyhow::Result<Self> {
        let own_pid = std::process::id();

        if let Ok(content) = std::fs::read_to_string(&path) {
            match content.trim().parse::<u32>() {
                Ok(pid) if pid != own_pid && process_alive(pid) => {
                    bail!("warptray is already running (pid {pid})");
                }
                _ => tracing::debug!(path = %path.display(), "replacing stale lock file"),
            }
        }

        std::fs::write(&path, own_pid.to_string())
            .with_context(|| format!("writing lock file {}", path.display()))?;
        tracing::debug!(path = %path.display(), pid = own_pid, "instance lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let ours = std::fs::read_to_string(&self.path)
            .map(|c| c.trim() == std::process::id().to_string())
            .unwrap_or(false);
        if ours && let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "failed to remove lock file: {e}");
        }
    }
}

fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}
