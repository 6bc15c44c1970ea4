pub mod cli;
pub mod client;
pub mod render;
pub mod upload;

pub use cli::{BodyEncoding, Cli};
pub use client::{ClientError, JudgeClient, StreamOutcome};
pub use render::TerminalRenderer;
