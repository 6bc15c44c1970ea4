use super::{upload::read_comparison, COMPARE_ROUTE};
use crate::{judge::JudgeError, server::SharedState};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Request, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pose_verdict::{ImageError, Verdict};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("API Key not configured")]
    MissingCredential,
    #[error("Images required")]
    MissingImages,
    #[error("{0}")]
    InvalidBody(String),
    #[error("{1}")]
    BodyRejected(StatusCode, String),
    #[error("The AI judge is unavailable. Try again!")]
    Upstream(#[source] JudgeError),
    #[error("HTTP builder failed: {0}")]
    HttpBuilder(String),
}

impl From<ImageError> for CompareError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Missing => CompareError::MissingImages,
            other => CompareError::InvalidBody(other.to_string()),
        }
    }
}

impl From<MultipartRejection> for CompareError {
    fn from(err: MultipartRejection) -> Self {
        CompareError::BodyRejected(err.status(), err.body_text())
    }
}

impl From<MultipartError> for CompareError {
    fn from(err: MultipartError) -> Self {
        CompareError::BodyRejected(err.status(), err.body_text())
    }
}

impl From<JsonRejection> for CompareError {
    fn from(err: JsonRejection) -> Self {
        CompareError::BodyRejected(err.status(), err.body_text())
    }
}

impl From<JudgeError> for CompareError {
    fn from(err: JudgeError) -> Self {
        match err {
            JudgeError::MissingCredential => CompareError::MissingCredential,
            other => CompareError::Upstream(other),
        }
    }
}

impl IntoResponse for CompareError {
    fn into_response(self) -> Response {
        let status = match &self {
            CompareError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            CompareError::MissingImages => StatusCode::BAD_REQUEST,
            CompareError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            CompareError::BodyRejected(status, _) => *status,
            CompareError::Upstream(JudgeError::Request(e)) if e.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            CompareError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CompareError::HttpBuilder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            CompareError::Upstream(source) => tracing::error!("Judging failed: {}", source),
            CompareError::MissingCredential => {
                tracing::error!("Rejecting comparison: no Gemini API key configured")
            }
            other => tracing::info!("Rejecting comparison: {}", other),
        }

        (status, self.to_string()).into_response()
    }
}

/// Judges the pair in one go and answers with the verdict as JSON. An empty,
/// blocked or unparsable model answer becomes the fallback verdict.
#[instrument(skip(state, request))]
pub async fn compare(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Json<Verdict>, CompareError> {
    state.metrics.record_request(COMPARE_ROUTE);

    if !state.judge.is_configured() {
        return Err(CompareError::MissingCredential);
    }
    let comparison = read_comparison(request).await?;

    let started = Instant::now();
    let answer = state.judge.judge(comparison).await;
    state
        .metrics
        .record_judge_duration(started.elapsed().as_millis() as u64, COMPARE_ROUTE);

    let verdict = match answer {
        Ok(text) => Verdict::parse(&text).unwrap_or_else(|e| {
            tracing::warn!("Unparsable verdict ({}): {}", e, text);
            state.metrics.record_fallback(COMPARE_ROUTE);
            Verdict::fallback()
        }),
        Err(e) if e.is_unusable_answer() => {
            tracing::warn!("Unusable model answer: {}", e);
            state.metrics.record_fallback(COMPARE_ROUTE);
            Verdict::fallback()
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(score = verdict.score, "Verdict ready");
    Ok(Json(verdict))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{
        app, body_text, both_images, json_request, multipart_request, MockAnswer, MockJudge,
    };
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest};
    use tower::ServiceExt;

    fn verdict_json(body: &str) -> Verdict {
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_returns_parsed_verdict() {
        let judge = MockJudge::new(vec![MockAnswer::Text(
            r#"{"score": 91, "feedback": "Perfect copy!"}"#.to_string(),
        )]);

        let response = app(judge.clone())
            .oneshot(both_images("/api/compare"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            verdict_json(&body_text(response).await),
            Verdict {
                score: 91.0,
                feedback: "Perfect copy!".to_string()
            }
        );

        let seen = judge.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].target.data, b"target-bytes");
        assert_eq!(seen[0].target.mime_type, "image/png");
        assert_eq!(seen[0].attempt.data, b"attempt-bytes");
        assert_eq!(seen[0].attempt.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_missing_credential_is_500_for_any_input() {
        let requests = vec![
            both_images("/api/compare"),
            multipart_request("/api/compare", &[("targetImage", "image/png", "x")]),
            json_request("/api/compare", "not json at all"),
            HttpRequest::post("/api/compare").body(Body::empty()).unwrap(),
        ];

        for request in requests {
            let response = app(MockJudge::unconfigured()).oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body_text(response).await, "API Key not configured");
        }
    }

    #[tokio::test]
    async fn test_missing_image_is_400() {
        let requests = vec![
            multipart_request("/api/compare", &[("targetImage", "image/png", "x")]),
            multipart_request("/api/compare", &[("attemptImage", "image/png", "x")]),
            multipart_request(
                "/api/compare",
                &[
                    ("targetImage", "image/png", "x"),
                    ("attemptImage", "application/octet-stream", ""),
                ],
            ),
            json_request("/api/compare", r#"{"attemptImage": {"data": "eA==", "type": "image/png"}}"#),
            HttpRequest::post("/api/compare").body(Body::empty()).unwrap(),
        ];

        for request in requests {
            let judge = MockJudge::new(vec![]);
            let response = app(judge.clone()).oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(response).await, "Images required");
            assert!(judge.seen.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_json_body_with_base64_images() {
        let judge = MockJudge::new(vec![MockAnswer::Text(
            r#"{"score": 40, "feedback": "Meh"}"#.to_string(),
        )]);
        let body = r#"{
            "targetImage": {"data": "dGFyZ2V0", "type": "image/webp"},
            "attemptImage": {"data": "YXR0ZW1wdA==", "type": "image/heic"}
        }"#;

        let response = app(judge.clone())
            .oneshot(json_request("/api/compare", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let seen = judge.seen.lock().unwrap();
        assert_eq!(seen[0].target.data, b"target");
        assert_eq!(seen[0].attempt.mime_type, "image/heic");
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_400() {
        let bad_base64 = r#"{
            "targetImage": {"data": "%%%", "type": "image/png"},
            "attemptImage": {"data": "eA==", "type": "image/png"}
        }"#;
        let requests = vec![
            json_request("/api/compare", bad_base64),
            json_request("/api/compare", "{"),
            HttpRequest::post("/api/compare")
                .header("content-type", "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        ];

        for request in requests {
            let response = app(MockJudge::new(vec![])).oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413() {
        let judge = MockJudge::new(vec![]);
        let oversized = "x".repeat(2 * 1024 * 1024);

        let response = app(judge.clone())
            .oneshot(multipart_request(
                "/api/compare",
                &[
                    ("targetImage", "image/png", oversized.as_str()),
                    ("attemptImage", "image/png", "x"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(judge.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_answer_falls_back() {
        let judge = MockJudge::new(vec![MockAnswer::Text("I think they look alike!".to_string())]);

        let response = app(judge).oneshot(both_images("/api/compare")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["score"], 0.0);
        assert_eq!(body["feedback"], "Oops! The AI got confused. Try again!");
    }

    #[tokio::test]
    async fn test_empty_or_blocked_answer_falls_back() {
        let judge = MockJudge::new(vec![
            MockAnswer::Error(JudgeError::EmptyResponse),
            MockAnswer::Error(JudgeError::Blocked("SAFETY".to_string())),
        ]);
        let app = app(judge);

        for _ in 0..2 {
            let response = app.clone().oneshot(both_images("/api/compare")).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(verdict_json(&body_text(response).await), Verdict::fallback());
        }
    }

    #[tokio::test]
    async fn test_upstream_failure_is_502() {
        let judge = MockJudge::new(vec![MockAnswer::Error(JudgeError::Api {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "overloaded".to_string(),
        })]);

        let response = app(judge).oneshot(both_images("/api/compare")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_text(response).await,
            "The AI judge is unavailable. Try again!"
        );
    }

    #[tokio::test]
    async fn test_resubmission_after_failure_is_independent() {
        let judge = MockJudge::new(vec![
            MockAnswer::Error(JudgeError::Api {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            }),
            MockAnswer::Text("garbage".to_string()),
            MockAnswer::Text(r#"{"score": 77, "feedback": "Better!"}"#.to_string()),
        ]);
        let app = app(judge.clone());

        let first = app.clone().oneshot(both_images("/api/compare")).await.unwrap();
        let second = app.clone().oneshot(both_images("/api/compare")).await.unwrap();
        let third = app.oneshot(both_images("/api/compare")).await.unwrap();

        assert_eq!(first.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(verdict_json(&body_text(second).await), Verdict::fallback());
        assert_eq!(verdict_json(&body_text(third).await).score, 77.0);
        assert_eq!(judge.seen.lock().unwrap().len(), 3);
    }
}
