//! The checkpoint horizon: a monotonically advancing marker plus the
//! two-phase write protocol that advances it (spec.md §3 "Backup horizon
//! `H`", §4.1 "Backup log and checkpoint").

use crate::backup_log::BackupLog;
use crate::error::{DurabilityError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The durable checkpoint marker: "HORIZON" file holding the current
/// epoch, written with the rename-into-place pattern the teacher uses
/// for its MANIFEST.
pub struct Checkpoint {
    path: PathBuf,
    current: u64,
    pending: Option<u64>,
}

impl Checkpoint {
    /// Create a fresh checkpoint marker at epoch 0.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cp = Checkpoint {
            path,
            current: 0,
            pending: None,
        };
        cp.persist(0)?;
        Ok(cp)
    }

    /// Load an existing checkpoint marker.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| DurabilityError::Corrupt("horizon marker not utf8".into()))?;
        let current: u64 = text
            .trim()
            .parse()
            .map_err(|_| DurabilityError::Corrupt("horizon marker not an integer".into()))?;
        Ok(Checkpoint {
            path,
            current,
            pending: None,
        })
    }

    /// The current durable horizon.
    pub fn horizon(&self) -> u64 {
        self.current
    }

    /// Step 1 of spec.md §4.1's write path: declare an intended new
    /// horizon. `flush` is expected to flush every dirty tile and
    /// synchronize the partition files; it runs before anything durable
    /// changes.
    pub fn start<F>(&mut self, new_horizon: u64, mut flush: F) -> Result<()>
    where
        F: FnMut() -> std::io::Result<()>,
    {
        if new_horizon <= self.current {
            return Err(DurabilityError::InvalidHorizon(format!(
                "new horizon {new_horizon} does not advance past {}",
                self.current
            )));
        }
        debug!(new_horizon, current = self.current, "horizon_write_start");
        flush().map_err(DurabilityError::Io)?;
        self.pending = Some(new_horizon);
        Ok(())
    }

    /// Step 2: once `start`'s flush is durable, atomically rename the
    /// marker forward and truncate the backup log of everything that
    /// predates the new horizon (step 3, folded in here since a horizon
    /// with no truncation is never observably different from one
    /// without it).
    pub fn finish(&mut self, log: &mut BackupLog) -> Result<()> {
        let new_horizon = self
            .pending
            .take()
            .ok_or_else(|| DurabilityError::InvalidHorizon("no pending horizon".into()))?;
        self.persist(new_horizon)?;
        self.current = new_horizon;
        log.truncate_older_than(new_horizon)?;
        info!(horizon = new_horizon, "horizon_write_finish");
        Ok(())
    }

    /// Roll back to the current durable horizon by replaying the backup
    /// log in reverse, via `apply`. Used both for explicit
    /// `rollback_to(H)` requests and for fast-forwarding a read replica
    /// (spec.md §4.1).
    pub fn rollback<A>(&mut self, log: &mut BackupLog, apply: A) -> Result<()>
    where
        A: FnMut(u32, u64, &[u8]) -> Result<()>,
    {
        log.rollback(apply)?;
        self.pending = None;
        Ok(())
    }

    fn persist(&self, horizon: u64) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut f = File::create(&tmp)?;
            write!(f, "{horizon}")?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        if let Some(parent) = self.path.parent() {
            if parent.exists() {
                File::open(parent)?.sync_all()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_rejects_non_advancing_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let mut cp = Checkpoint::create(dir.path().join("HORIZON")).unwrap();
        assert!(cp.start(0, || Ok(())).is_err());
        assert!(cp.start(1, || Ok(())).is_ok());
    }

    #[test]
    fn finish_without_start_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut cp = Checkpoint::create(dir.path().join("HORIZON")).unwrap();
        let mut log = BackupLog::create(dir.path().join("backup.log"), 0).unwrap();
        assert!(cp.finish(&mut log).is_err());
    }

    #[test]
    fn start_then_finish_advances_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("HORIZON");
        let mut cp = Checkpoint::create(&marker).unwrap();
        let mut log = BackupLog::create(dir.path().join("backup.log"), 0).unwrap();

        log.record(0, 1, 0, b"pre-image").unwrap();
        cp.start(5, || Ok(())).unwrap();
        cp.finish(&mut log).unwrap();

        assert_eq!(cp.horizon(), 5);
        assert!(log.is_empty());

        let reloaded = Checkpoint::load(&marker).unwrap();
        assert_eq!(reloaded.horizon(), 5);
    }
}
