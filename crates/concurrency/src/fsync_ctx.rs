//! Background fsync coordination (spec.md §5 "Background I/O (checkpoint
//! fsync) may run on a helper thread, coordinated via an `fsync_ctx`
//! record with a guard word").
//!
//! A request thread never blocks on fsync directly — it hands the flush
//! closure to a helper thread and polls a guard word at its own budget
//! test points, the same non-blocking-wait shape spec.md's suspension
//! model uses everywhere else.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

const GUARD_RUNNING: u8 = 0;
const GUARD_DONE_OK: u8 = 1;
const GUARD_DONE_ERR: u8 = 2;

/// Outcome of a background fsync once it completes.
#[derive(Debug)]
pub enum FsyncOutcome {
    /// Still running; caller should retry later (the suspension-point
    /// shape spec.md's budget model already uses elsewhere).
    Pending,
    /// Completed successfully.
    Done,
    /// Completed with an I/O error.
    Failed(std::io::Error),
}

/// A handle to one in-flight background fsync.
pub struct FsyncCtx {
    guard: Arc<AtomicU8>,
    error: Arc<Mutex<Option<std::io::Error>>>,
    join: Option<thread::JoinHandle<()>>,
}

impl FsyncCtx {
    /// Spawn `flush` on a helper thread, returning immediately with a
    /// handle the caller polls via [`FsyncCtx::poll`].
    pub fn spawn<F>(flush: F) -> Self
    where
        F: FnOnce() -> std::io::Result<()> + Send + 'static,
    {
        let guard = Arc::new(AtomicU8::new(GUARD_RUNNING));
        let error = Arc::new(Mutex::new(None));

        let guard2 = guard.clone();
        let error2 = error.clone();
        let join = thread::spawn(move || match flush() {
            Ok(()) => guard2.store(GUARD_DONE_OK, Ordering::Release),
            Err(e) => {
                *error2.lock() = Some(e);
                guard2.store(GUARD_DONE_ERR, Ordering::Release);
            }
        });

        FsyncCtx {
            guard,
            error,
            join: Some(join),
        }
    }

    /// Non-blocking check of the guard word. Consumes the handle once a
    /// terminal outcome is observed; returns `Pending` (without consuming
    /// anything) otherwise.
    pub fn poll(&mut self) -> FsyncOutcome {
        match self.guard.load(Ordering::Acquire) {
            GUARD_RUNNING => FsyncOutcome::Pending,
            GUARD_DONE_OK => {
                self.join();
                FsyncOutcome::Done
            }
            GUARD_DONE_ERR => {
                self.join();
                let err = self
                    .error
                    .lock()
                    .take()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "fsync failed"));
                FsyncOutcome::Failed(err)
            }
            _ => unreachable!("guard word has only three states"),
        }
    }

    /// Block until the background fsync completes, for callers (e.g.
    /// `Database::close`) that must not return before durability is
    /// guaranteed.
    pub fn wait(mut self) -> std::io::Result<()> {
        loop {
            match self.poll() {
                FsyncOutcome::Pending => thread::yield_now(),
                FsyncOutcome::Done => return Ok(()),
                FsyncOutcome::Failed(e) => return Err(e),
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn reports_success() {
        let mut ctx = FsyncCtx::spawn(|| {
            thread::sleep(Duration::from_millis(5));
            Ok(())
        });
        loop {
            match ctx.poll() {
                FsyncOutcome::Pending => thread::sleep(Duration::from_millis(1)),
                FsyncOutcome::Done => break,
                FsyncOutcome::Failed(e) => panic!("unexpected failure: {e}"),
            }
        }
    }

    #[test]
    fn reports_failure() {
        let mut ctx = FsyncCtx::spawn(|| Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        loop {
            match ctx.poll() {
                FsyncOutcome::Pending => thread::sleep(Duration::from_millis(1)),
                FsyncOutcome::Done => panic!("expected failure"),
                FsyncOutcome::Failed(_) => break,
            }
        }
    }

    #[test]
    fn wait_blocks_until_done() {
        let started = Arc::new(AtomicBool::new(false));
        let started2 = started.clone();
        let ctx = FsyncCtx::spawn(move || {
            started2.store(true, Ordering::SeqCst);
            Ok(())
        });
        ctx.wait().unwrap();
        assert!(started.load(Ordering::SeqCst));
    }
}
