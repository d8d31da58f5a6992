//! Host scheduler introspection: raw capture of the crontab and the user's
//! systemd timers/units, for the `scheduler.status` method.

use std::time::Duration;

use {
    async_trait::async_trait,
    serde_json::{Value, json},
    tokio::{process::Command, time::timeout},
};

use crate::services::{SchedulerService, ServiceResult};

/// Per-block subprocess ceiling; a hung `systemctl` must not wedge the RPC.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SystemSchedulerService;

#[async_trait]
impl SchedulerService for SystemSchedulerService {
    async fn status(&self) -> ServiceResult {
        let crontab = capture_block("crontab", &["-l"]).await;
        let timers = capture_block("systemctl", &["--user", "list-timers", "--all"]).await;
        let units =
            capture_block("systemctl", &["--user", "list-units", "--type=service"]).await;
        Ok(json!({
            "crontab": crontab,
            "timers": timers,
            "units": units,
        }))
    }
}

/// Run one command and report either its stdout or an error string. "No
/// crontab" is normalized to success with empty output.
async fn capture_block(program: &str, args: &[&str]) -> Value {
    let result = timeout(CAPTURE_TIMEOUT, Command::new(program).args(args).output()).await;
    match result {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            if output.status.success() {
                json!({ "output": stdout })
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                if stderr.to_lowercase().contains("no crontab") {
                    json!({ "output": "" })
                } else {
                    json!({ "error": format!("{program} exited with {}: {}", output.status, stderr.trim()) })
                }
            }
        }
        Ok(Err(e)) => json!({ "error": format!("{program} failed to start: {e}") }),
        Err(_) => json!({ "error": format!("{program} timed out") }),
    }
}
