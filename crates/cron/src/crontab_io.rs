//! The two crontab side effects: `crontab -l` and `crontab -`.

use std::process::Stdio;

use {async_trait::async_trait, tokio::io::AsyncWriteExt, tokio::process::Command};

use crate::error::{Error, Result};

/// Access to the per-user crontab.
#[async_trait]
pub trait CrontabIo: Send + Sync {
    /// Current crontab content as lines. "No crontab for user" is an empty
    /// list, not an error.
    async fn read(&self) -> Result<Vec<String>>;
    /// Replace the whole crontab with `content`.
    async fn write(&self, content: &str) -> Result<()>;
}

/// Real crontab, via `crontab(1)`.
pub struct SystemCrontab;

#[async_trait]
impl CrontabIo for SystemCrontab {
    async fn read(&self) -> Result<Vec<String>> {
        let output = Command::new("crontab").arg("-l").output().await?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Ok(stdout.lines().map(String::from).collect());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("no crontab") {
            Ok(Vec::new())
        } else {
            Err(Error::crontab(format!(
                "crontab -l failed: {}",
                stderr.trim()
            )))
        }
    }

    async fn write(&self, content: &str) -> Result<()> {
        let mut child = Command::new("crontab")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::crontab(format!(
                "crontab - failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// In-memory crontab for tests.
pub struct MemoryCrontab {
    content: std::sync::Mutex<String>,
}

impl MemoryCrontab {
    pub fn new() -> Self {
        Self {
            content: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: std::sync::Mutex::new(content.into()),
        }
    }

    pub fn contents(&self) -> String {
        self.content
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MemoryCrontab {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CrontabIo for MemoryCrontab {
    async fn read(&self) -> Result<Vec<String>> {
        let content = self.content.lock().unwrap_or_else(|e| e.into_inner());
        if content.is_empty() {
            return Ok(Vec::new());
        }
        Ok(content.lines().map(String::from).collect())
    }

    async fn write(&self, new_content: &str) -> Result<()> {
        let mut content = self.content.lock().unwrap_or_else(|e| e.into_inner());
        *content = new_content.to_string();
        Ok(())
    }
}
