mod gemini;
mod judge;
mod routes;
mod server;
mod sse;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
pub use gemini::{response_schema, GeminiJudge};
pub use judge::{JudgeError, PoseJudge, TextStream};
pub use routes::{CompareError, COMPARE_ROUTE, COMPARE_STREAM_ROUTE};
pub use server::{build_router, SharedState};
pub use telemetry::Metrics;
