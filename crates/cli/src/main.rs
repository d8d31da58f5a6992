use std::sync::Arc;

use {
    anyhow::{Context, Result},
    clap::{Parser, Subcommand},
    serde_json::json,
    tracing_subscriber::EnvFilter,
};

use {
    openclaw_gateway::{GatewayState, MethodRegistry},
    openclaw_protocol::RequestFrame,
};

#[derive(Parser)]
#[command(name = "openclaw", about = "openclaw — crontab-backed job scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Explicit config file (overrides discovery).
    #[arg(long, global = true, env = "OPENCLAW_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Cron job management.
    Cron {
        #[command(subcommand)]
        action: CronAction,
    },
}

#[derive(Subcommand)]
enum CronAction {
    /// Run a job now. Invoked by cron(8); forces past the due check.
    Run { id: String },
    /// List scheduled jobs.
    List {
        /// Include disabled jobs.
        #[arg(long)]
        include_disabled: bool,
    },
    /// Show scheduler status.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    let cfg = match &cli.config {
        Some(path) => openclaw_config::load_from(path)?,
        None => openclaw_config::load()?,
    };

    let state = GatewayState::live(cfg).context("failed to initialize gateway services")?;
    let registry = MethodRegistry::new();

    let (method, params) = match cli.command {
        Commands::Cron { action } => match action {
            // The run command is the cron(8) entry point; it must take the
            // same path an RPC client would, with mode=force.
            CronAction::Run { id } => ("cron.run", json!({ "id": id, "mode": "force" })),
            CronAction::List { include_disabled } => {
                ("cron.list", json!({ "includeDisabled": include_disabled }))
            }
            CronAction::Status => ("cron.status", json!({})),
        },
    };

    let frame = RequestFrame {
        r#type: "req".into(),
        id: uuid_like_request_id(),
        method: method.into(),
        params: Some(params),
    };
    let response = registry.handle_frame(state, frame).await;

    if response.ok {
        let payload = response.payload.unwrap_or(serde_json::Value::Null);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        Ok(())
    } else {
        let error = response
            .error
            .map(|e| format!("{}: {}", e.code, e.message))
            .unwrap_or_else(|| "unknown error".into());
        anyhow::bail!(error)
    }
}

fn init_logging(level: &str, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn uuid_like_request_id() -> String {
    format!("cli-{}", std::process::id())
}
