use crate::cli::BodyEncoding;
use futures::StreamExt;
use pose_verdict::{
    ComparisonRequest, ImageError, ImagePayload, JsonComparisonBody, Verdict, VerdictError,
    VerdictStream, ATTEMPT_FIELD, COMPARE_PATH, COMPARE_STREAM_PATH, TARGET_FIELD,
};
use reqwest::multipart::{Form, Part};
use std::{future::Future, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not read {}: {source}", path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("Invalid server URL {0}")]
    InvalidServerUrl(String),
    #[error("Could not set up the HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("Connection lost. Try again!")]
    Connection(#[from] reqwest::Error),
    #[error("Connection lost. Try again! ({status}: {body})")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to parse AI response.")]
    Parse(#[from] VerdictError),
    #[error("Unsupported image type: {0}")]
    InvalidMime(String),
    #[error("Could not write to the terminal: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, PartialEq)]
pub enum StreamOutcome {
    Verdict(Verdict),
    /// The player stopped reading before the stream completed.
    Stopped,
}

pub struct JudgeClient {
    http: reqwest::Client,
    base_url: String,
    encoding: BodyEncoding,
}

impl JudgeClient {
    pub fn new(base_url: &str, encoding: BodyEncoding) -> Result<Self, ClientError> {
        reqwest::Url::parse(base_url)
            .map_err(|e| ClientError::InvalidServerUrl(format!("`{base_url}`: {e}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(ClientError::HttpClient)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            encoding,
        })
    }

    /// Posts the pair to the one-shot route and parses the answer.
    #[instrument(skip(self, comparison))]
    pub async fn compare(&self, comparison: &ComparisonRequest) -> Result<Verdict, ClientError> {
        let response = self.post(COMPARE_PATH, comparison).await?;
        let text = response.text().await?;

        Ok(Verdict::parse(&text)?)
    }

    /// Posts the pair to the streaming route. Every chunk that moves the
    /// interim feedback is reported through `on_partial`; the verdict is parsed
    /// once the stream ends. Resolving `stop` abandons the stream.
    #[instrument(skip_all)]
    pub async fn compare_stream<S, P>(
        &self,
        comparison: &ComparisonRequest,
        stop: S,
        mut on_partial: P,
    ) -> Result<StreamOutcome, ClientError>
    where
        S: Future<Output = ()>,
        P: FnMut(&str),
    {
        tokio::pin!(stop);

        let response = tokio::select! {
            _ = &mut stop => return Ok(StreamOutcome::Stopped),
            response = self.post(COMPARE_STREAM_PATH, comparison) => response?,
        };

        let chunks = response.bytes_stream();
        tokio::pin!(chunks);
        let mut verdict = VerdictStream::new();

        loop {
            tokio::select! {
                _ = &mut stop => {
                    tracing::info!(received = verdict.text().len(), "Stopped reading the verdict stream");
                    return Ok(StreamOutcome::Stopped);
                }
                chunk = chunks.next() => match chunk {
                    Some(chunk) => {
                        if let Some(partial) = verdict.push(&chunk?) {
                            on_partial(&partial);
                        }
                    }
                    None => break,
                },
            }
        }

        tracing::debug!(text = verdict.text(), "Verdict stream complete");
        Ok(StreamOutcome::Verdict(verdict.finish()?))
    }

    async fn post(
        &self,
        path: &str,
        comparison: &ComparisonRequest,
    ) -> Result<reqwest::Response, ClientError> {
        let request = self.http.post(format!("{}{}", self.base_url, path));
        let request = match self.encoding {
            BodyEncoding::Multipart => request.multipart(multipart_form(comparison)?),
            BodyEncoding::Json => request.json(&JsonComparisonBody::from_request(comparison)),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "Judge rejected the comparison");
            return Err(ClientError::Rejected { status, body });
        }

        Ok(response)
    }
}

fn multipart_form(comparison: &ComparisonRequest) -> Result<Form, ClientError> {
    Ok(Form::new()
        .part(TARGET_FIELD, image_part(&comparison.target, TARGET_FIELD)?)
        .part(ATTEMPT_FIELD, image_part(&comparison.attempt, ATTEMPT_FIELD)?))
}

fn image_part(image: &ImagePayload, file_name: &'static str) -> Result<Part, ClientError> {
    Part::bytes(image.data.clone())
        .file_name(file_name)
        .mime_str(&image.mime_type)
        .map_err(|_| ClientError::InvalidMime(image.mime_type.clone()))
}
