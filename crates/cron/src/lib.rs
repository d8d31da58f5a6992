//! Crontab-backed job scheduling.
//!
//! The host OS crontab is the source of truth: jobs are persisted as tagged
//! crontab entries, `cron(8)` fires them by invoking `openclaw cron run
//! <id>`, and every mutation re-reads, rewrites, and atomically replaces the
//! crontab. Unrelated crontab lines the user owns pass through untouched.

pub mod codec;
pub mod crontab_io;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod isolated;
pub mod schedule;
pub mod service;
pub mod ssrf;
pub mod store;
pub mod system_events;
pub mod types;
pub mod webhook;

pub use error::{Error, Result};
