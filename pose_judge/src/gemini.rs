//! Gemini client for the pose judge.
//!
//! Sends one multimodal `generateContent` request carrying the judging
//! instructions and both photos inline, with the answer constrained to the
//! `{ score, feedback }` schema.

use crate::{
    config::GeminiConfig,
    judge::{JudgeError, PoseJudge, TextStream},
    sse::SseDecoder,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use pose_verdict::{ComparisonRequest, ImagePayload};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

const API_KEY_HEADER: &str = "x-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const JUDGE_PROMPT: &str = r#"You are a judge in a high-energy party game called "Pose Off!".

Your task is to compare two images:
1. The TARGET POSE (the goal).
2. The ATTEMPT (the player's recreation).

Analyze the similarity based on:
- Limb angles and positioning (arms, legs).
- Body orientation.
- Facial expression (if visible/relevant).

Be lenient but fair. This is a fun party game.
"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
enum Part {
    #[serde(rename = "text")]
    Text(&'static str),
    #[serde(rename = "inlineData")]
    InlineData(InlineData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl From<&ImagePayload> for Part {
    fn from(image: &ImagePayload) -> Self {
        Part::InlineData(InlineData {
            mime_type: image.mime_type.clone(),
            data: image.to_base64(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Answer text of the first candidate, skipping thought summaries.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }
}

/// Schema the model's answer is constrained to.
pub fn response_schema(feedback_language: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": {
                "type": "NUMBER",
                "description": "Similarity score between 0 and 100"
            },
            "feedback": {
                "type": "STRING",
                "description": format!(
                    "Short, fun, punchy feedback in {}. If score is high, praise them! \
                     If low, roast them gently but encourage a retry.",
                    feedback_language
                )
            }
        },
        "required": ["score", "feedback"],
        "propertyOrdering": ["score", "feedback"]
    })
}

#[derive(Clone)]
pub struct GeminiJudge {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    response_schema: Value,
}

impl GeminiJudge {
    pub fn new(config: &GeminiConfig) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key().map(str::to_string),
            timeout: Duration::from_secs(config.timeout_secs),
            response_schema: response_schema(&config.feedback_language),
        })
    }

    fn build_request(&self, request: &ComparisonRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text(JUDGE_PROMPT),
                    Part::from(&request.target),
                    Part::from(&request.attempt),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: self.response_schema.clone(),
            },
        }
    }

    async fn send(
        &self,
        method: &str,
        request: &ComparisonRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, JudgeError> {
        let api_key = self.api_key.as_deref().ok_or(JudgeError::MissingCredential)?;

        let mut builder = self
            .client
            .post(format!("{}/models/{}:{}", self.base_url, self.model, method))
            .header(API_KEY_HEADER, api_key)
            .json(&self.build_request(request));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API error ({}): {}", status, body);
            return Err(JudgeError::Api { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl PoseJudge for GeminiJudge {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn judge(&self, request: ComparisonRequest) -> Result<String, JudgeError> {
        let response = self
            .send("generateContent", &request, Some(self.timeout))
            .await?;
        let body: GenerateContentResponse = serde_json::from_slice(&response.bytes().await?)?;

        let text = body.text();
        if text.trim().is_empty() {
            return Err(match body.block_reason() {
                Some(reason) => JudgeError::Blocked(reason.to_string()),
                None => JudgeError::EmptyResponse,
            });
        }

        tracing::debug!(chars = text.len(), "Received verdict from Gemini");
        Ok(text)
    }

    // No total timeout here: it would cut off long generations mid-stream.
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn judge_stream(&self, request: ComparisonRequest) -> Result<TextStream, JudgeError> {
        let response = self
            .send("streamGenerateContent?alt=sse", &request, None)
            .await?;

        Ok(relay_text(response))
    }
}

fn relay_text(response: reqwest::Response) -> TextStream {
    let mut body = Box::pin(response.bytes_stream());

    Box::pin(stream! {
        let mut decoder = SseDecoder::default();
        loop {
            let (events, done) = match body.next().await {
                Some(Ok(bytes)) => (decoder.push(&bytes), false),
                Some(Err(e)) => {
                    tracing::error!("Gemini stream interrupted: {:?}", e);
                    yield Err(JudgeError::Request(e));
                    break;
                }
                None => (decoder.finish(), true),
            };

            let mut failed = false;
            for data in events {
                match event_text(&data) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!("Bad Gemini stream event: {}", e);
                        yield Err(e);
                        failed = true;
                        break;
                    }
                }
            }

            if done || failed {
                break;
            }
        }
    })
}

fn event_text(data: &str) -> Result<Option<String>, JudgeError> {
    let chunk: GenerateContentResponse = serde_json::from_str(data)?;
    let text = chunk.text();
    if !text.is_empty() {
        return Ok(Some(text));
    }
    match chunk.block_reason() {
        Some(reason) => Err(JudgeError::Blocked(reason.to_string())),
        None => Ok(None),
    }
}
