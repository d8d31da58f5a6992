//! Default isolated turn runner: a bounded subprocess invocation of the
//! configured agent command, fresh session per run.

use std::{process::Stdio, sync::Arc, time::Duration};

use {
    tokio::{process::Command, time::timeout},
    tracing::{info, warn},
};

use openclaw_config::OpenclawConfig;

use crate::{
    dispatch::{IsolatedTurnFn, IsolatedTurnRequest, IsolatedTurnResult},
    types::RunStatus,
};

/// Build the subprocess-backed turn runner from config. The turn message is
/// appended as the final argument of `cron.agent_command`.
pub fn subprocess_turn_runner(cfg: &OpenclawConfig) -> IsolatedTurnFn {
    let command = cfg.cron.agent_command.clone();
    let default_timeout = cfg.cron.agent_timeout_seconds;
    Arc::new(move |request: IsolatedTurnRequest| {
        let command = command.clone();
        Box::pin(run_turn(command, default_timeout, request))
    })
}

async fn run_turn(
    command: Vec<String>,
    default_timeout_seconds: u64,
    request: IsolatedTurnRequest,
) -> anyhow::Result<IsolatedTurnResult> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("cron.agent_command is empty");
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    let timeout_seconds = request.timeout_seconds.unwrap_or(default_timeout_seconds);

    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(model) = &request.model {
        cmd.arg("--model").arg(model);
    }
    if let Some(thinking) = &request.thinking {
        cmd.arg("--thinking").arg(thinking);
    }
    cmd.arg(&request.message);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!(job_id = %request.job_id, session_id = %session_id, "spawning isolated agent turn");

    let output = match timeout(Duration::from_secs(timeout_seconds), cmd.output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(job_id = %request.job_id, timeout_seconds, "isolated agent turn timed out");
            return Ok(IsolatedTurnResult {
                status: Some(RunStatus::Error),
                error: Some(format!(
                    "isolated agent turn timed out after {timeout_seconds}s"
                )),
                session_id: Some(session_id),
                ..Default::default()
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        Ok(IsolatedTurnResult {
            status: Some(RunStatus::Ok),
            summary: (!stdout.is_empty()).then_some(stdout),
            session_id: Some(session_id),
            ..Default::default()
        })
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Ok(IsolatedTurnResult {
            status: Some(RunStatus::Error),
            summary: (!stdout.is_empty()).then_some(stdout),
            error: Some(if stderr.is_empty() {
                format!("agent command exited with {}", output.status)
            } else {
                stderr
            }),
            session_id: Some(session_id),
            ..Default::default()
        })
    }
}
