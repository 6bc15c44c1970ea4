use async_trait::async_trait;
use futures::Stream;
use pose_verdict::ComparisonRequest;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("API Key not configured")]
    MissingCredential,
    #[error("Request to the model failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Model API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Malformed model response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("No response from AI")]
    EmptyResponse,
    #[error("Prompt blocked by the model: {0}")]
    Blocked(String),
}

impl JudgeError {
    /// The model answered, just not with anything usable as a verdict.
    pub fn is_unusable_answer(&self) -> bool {
        matches!(self, JudgeError::EmptyResponse | JudgeError::Blocked(_))
    }
}

/// Model text as it arrives, in order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, JudgeError>> + Send>>;

#[async_trait]
pub trait PoseJudge: Send + Sync + 'static {
    /// Whether a provider credential is available. Routes refuse to read the
    /// request body when it is not.
    fn is_configured(&self) -> bool;

    /// Returns the complete model answer, expected to be a JSON verdict.
    async fn judge(&self, request: ComparisonRequest) -> Result<String, JudgeError>;

    /// Returns the model answer as it is generated. Errors raised before the
    /// first chunk are returned directly; later ones end the stream.
    async fn judge_stream(&self, request: ComparisonRequest) -> Result<TextStream, JudgeError>;
}
