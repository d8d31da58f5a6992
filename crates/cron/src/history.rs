//! Run-history reconstruction from the system log.
//!
//! `cron(8)` logs each command it runs; those lines are the only durable
//! record of past runs. Everything here is best-effort: a missing journal
//! or log file yields an empty history, never an error.

use {
    async_trait::async_trait,
    chrono::{NaiveDateTime, TimeZone, Utc},
    tokio::process::Command,
    tracing::debug,
};

use crate::{
    codec::RUN_COMMAND,
    types::{CronRunLogEntry, RunStatus},
};

/// Where log lines come from. Journald units are tried first, then the
/// classic syslog files.
#[async_trait]
pub trait RunHistorySource: Send + Sync {
    async fn read(&self) -> Option<String>;
}

/// journalctl (cron.service, then crond.service), then /var/log/cron, then
/// /var/log/syslog.
pub struct SystemLogSource;

#[async_trait]
impl RunHistorySource for SystemLogSource {
    async fn read(&self) -> Option<String> {
        for unit in ["cron.service", "crond.service"] {
            if let Some(content) = journal_output(unit).await {
                return Some(content);
            }
        }
        for path in ["/var/log/cron", "/var/log/syslog"] {
            if let Ok(content) = tokio::fs::read_to_string(path).await {
                if !content.trim().is_empty() {
                    return Some(content);
                }
            }
        }
        debug!("no cron log source available");
        None
    }
}

async fn journal_output(unit: &str) -> Option<String> {
    let output = Command::new("journalctl")
        .args(["-u", unit, "--no-pager", "-o", "short-iso"])
        .output()
        .await
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    (!stdout.trim().is_empty()).then_some(stdout)
}

/// Fixed log content, for tests.
pub struct StaticLogSource(pub String);

#[async_trait]
impl RunHistorySource for StaticLogSource {
    async fn read(&self) -> Option<String> {
        (!self.0.is_empty()).then(|| self.0.clone())
    }
}

/// Extract the newest-first run history for one job from `source`.
pub async fn read_job_runs(
    source: &dyn RunHistorySource,
    job_id: &str,
    limit: usize,
    now_ms: u64,
) -> Vec<CronRunLogEntry> {
    match source.read().await {
        Some(content) => extract_runs(&content, job_id, limit, now_ms),
        None => Vec::new(),
    }
}

/// Scan `content` in reverse for run-command lines mentioning `job_id`.
/// A leading `YYYY-MM-DD HH:MM:SS` (space or `T` separator) is read as UTC;
/// lines without one get `now_ms`. "error" anywhere in the line marks the
/// run failed.
pub fn extract_runs(
    content: &str,
    job_id: &str,
    limit: usize,
    now_ms: u64,
) -> Vec<CronRunLogEntry> {
    let mut entries = Vec::new();
    for line in content.lines().rev() {
        if !(line.contains(RUN_COMMAND) && line.contains(job_id)) {
            continue;
        }
        let ts = parse_leading_timestamp(line).unwrap_or(now_ms);
        let status = if line.to_lowercase().contains("error") {
            RunStatus::Error
        } else {
            RunStatus::Ok
        };
        entries.push(CronRunLogEntry {
            ts,
            job_id: job_id.to_string(),
            status,
        });
        if entries.len() >= limit {
            break;
        }
    }
    entries
}

fn parse_leading_timestamp(line: &str) -> Option<u64> {
    let head = line.get(..19)?;
    let normalized = head.replacen('T', " ", 1);
    let naive = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    let ms = Utc.from_utc_datetime(&naive).timestamp_millis();
    (ms >= 0).then_some(ms as u64)
}
