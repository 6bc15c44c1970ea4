use clap::Parser;
use pose_client::{cli::execute, Cli, TerminalRenderer};
use std::{future::pending, process::ExitCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs go to stderr so they never interleave with the typed-out feedback.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pose_client=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Ctrl-C handler unavailable");
        pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();
    tracing::debug!(?cli, "Starting judging round");

    let mut renderer = TerminalRenderer::new(std::io::stdout());
    match execute(&cli, &mut renderer, ctrl_c()).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::debug!(error = ?e, "Judging round failed");
            renderer.show_error(&e.to_string())?;
            Ok(ExitCode::FAILURE)
        }
    }
}
