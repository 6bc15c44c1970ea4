//! Command line definition and the judging round it drives.

use crate::{
    client::{ClientError, JudgeClient, StreamOutcome},
    render::TerminalRenderer,
    upload::load_comparison,
};
use clap::{Parser, ValueEnum};
use std::{future::Future, io::Write, path::PathBuf};

/// Pose Off! Ask the AI judge how well you copied a pose.
#[derive(Parser, Debug)]
#[command(name = "pose-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The pose to copy
    pub target: PathBuf,

    /// Your attempt at it
    pub attempt: PathBuf,

    /// Base URL of the judge server
    #[arg(long, env = "POSE_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Wait for the full verdict instead of streaming the feedback
    #[arg(long)]
    pub no_stream: bool,

    /// How the images are sent
    #[arg(long, value_enum, default_value_t = BodyEncoding::Multipart)]
    pub body: BodyEncoding,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `multipart/form-data` with one file part per image
    #[default]
    Multipart,
    /// JSON with base64 image data
    Json,
}

/// Runs one judging round. Resolving `stop` abandons a streamed verdict.
pub async fn execute<W, S>(
    cli: &Cli,
    renderer: &mut TerminalRenderer<W>,
    stop: S,
) -> Result<(), ClientError>
where
    W: Write,
    S: Future<Output = ()>,
{
    let comparison = load_comparison(&cli.target, &cli.attempt).await?;
    let client = JudgeClient::new(&cli.server, cli.body)?;

    renderer.show_judging()?;

    if cli.no_stream {
        let verdict = client.compare(&comparison).await?;
        renderer.show_verdict(&verdict)?;
        return Ok(());
    }

    let mut written = Ok(());
    let outcome = client
        .compare_stream(&comparison, stop, |partial| {
            if written.is_ok() {
                written = renderer.show_partial(partial);
            }
        })
        .await?;
    written?;

    match outcome {
        StreamOutcome::Verdict(verdict) => renderer.show_verdict(&verdict)?,
        StreamOutcome::Stopped => renderer.show_stopped()?,
    }

    Ok(())
}
