//! Crontab-backed job store: every mutation is a read-modify-write cycle
//! over the whole crontab.
//!
//! Two concurrent writers race at the `crontab -` boundary; the OS swaps the
//! spool file whole, so the loser's tagged entries are simply rewritten on
//! its next cycle. A process-local mutex narrows the window for writers
//! inside this process.

use std::sync::Arc;

use {tokio::sync::Mutex, tracing::warn};

use crate::{
    codec::{CrontabSnapshot, parse_crontab, render_crontab},
    crontab_io::{CrontabIo, SystemCrontab},
    error::Result,
    schedule::resolve_job_next_run,
    types::CronJob,
};

pub struct CrontabStore {
    io: Arc<dyn CrontabIo>,
    write_lock: Mutex<()>,
}

impl CrontabStore {
    pub fn new(io: Arc<dyn CrontabIo>) -> Self {
        Self {
            io,
            write_lock: Mutex::new(()),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemCrontab))
    }

    /// Read and decode the current crontab.
    pub async fn load(&self, now_ms: u64) -> Result<CrontabSnapshot> {
        let lines = self.io.read().await?;
        let snapshot = parse_crontab(&lines, now_ms);
        for error in &snapshot.errors {
            warn!(error = %error, "skipped unreadable crontab entry");
        }
        Ok(snapshot)
    }

    /// Read, apply `mutate` to the decoded job list, recompute derived state,
    /// and write the whole crontab back. Returns the written job list.
    pub async fn mutate<F>(&self, now_ms: u64, mutate: F) -> Result<Vec<CronJob>>
    where
        F: FnOnce(&mut Vec<CronJob>) -> Result<()>,
    {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.load(now_ms).await?;
        let mut jobs = snapshot.jobs;
        mutate(&mut jobs)?;
        for job in &mut jobs {
            job.state.next_run_at_ms = resolve_job_next_run(job, now_ms);
        }
        let content = render_crontab(&snapshot.lines, &jobs)?;
        self.io.write(&content).await?;
        Ok(jobs)
    }
}
