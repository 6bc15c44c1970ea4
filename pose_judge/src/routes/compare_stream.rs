use super::{upload::read_comparison, CompareError, COMPARE_STREAM_ROUTE};
use crate::server::SharedState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    response::Response,
};
use std::time::Instant;
use tracing::instrument;

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Relays the model's text as it is generated. The concatenated body is the
/// JSON verdict; nothing is parsed or rewritten on the way through.
#[instrument(skip(state, request))]
pub async fn compare_stream(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Response, CompareError> {
    state.metrics.record_request(COMPARE_STREAM_ROUTE);

    if !state.judge.is_configured() {
        return Err(CompareError::MissingCredential);
    }
    let comparison = read_comparison(request).await?;

    let started = Instant::now();
    let stream = state.judge.judge_stream(comparison).await;
    state
        .metrics
        .record_judge_duration(started.elapsed().as_millis() as u64, COMPARE_STREAM_ROUTE);
    let stream = stream?;
    tracing::debug!("Relaying model stream");

    let response = Response::builder()
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from_stream(stream))
        .map_err(|e| CompareError::HttpBuilder(e.to_string()))?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{
        app, body_text, both_images, json_request, multipart_request, MockAnswer, MockJudge,
    };
    use crate::judge::JudgeError;
    use axum::{
        body::to_bytes,
        http::{header, StatusCode},
    };
    use pose_verdict::VerdictStream;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_relays_chunks_that_concatenate_to_a_verdict() {
        let judge = MockJudge::new(vec![MockAnswer::Chunks(vec![
            Ok(r#"{"score": 8"#.to_string()),
            Ok(r#"8, "feedback": "Great j"#.to_string()),
            Ok(r#"ob!"}"#.to_string()),
        ])]);

        let response = app(judge)
            .oneshot(both_images("/api/compare/stream"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let body = body_text(response).await;
        assert_eq!(body, r#"{"score": 88, "feedback": "Great job!"}"#);

        let mut stream = VerdictStream::new();
        stream.push(body.as_bytes());
        let verdict = stream.finish().unwrap();
        assert_eq!(verdict.score, 88.0);
        assert_eq!(verdict.feedback, "Great job!");
    }

    #[tokio::test]
    async fn test_accepts_json_body() {
        let judge = MockJudge::new(vec![MockAnswer::Text(
            r#"{"score": 5, "feedback": "Try again"}"#.to_string(),
        )]);
        let body = r#"{
            "targetImage": {"data": "dGFyZ2V0", "type": "image/png"},
            "attemptImage": {"data": "YXR0ZW1wdA==", "type": "image/png"}
        }"#;

        let response = app(judge.clone())
            .oneshot(json_request("/api/compare/stream", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            r#"{"score": 5, "feedback": "Try again"}"#
        );
        assert_eq!(judge.seen.lock().unwrap()[0].attempt.data, b"attempt");
    }

    #[tokio::test]
    async fn test_missing_credential_is_500() {
        let response = app(MockJudge::unconfigured())
            .oneshot(multipart_request("/api/compare/stream", &[]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "API Key not configured");
    }

    #[tokio::test]
    async fn test_missing_image_is_400() {
        let response = app(MockJudge::new(vec![]))
            .oneshot(multipart_request(
                "/api/compare/stream",
                &[("attemptImage", "image/png", "x")],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Images required");
    }

    #[tokio::test]
    async fn test_failure_before_first_chunk_is_502() {
        let judge = MockJudge::new(vec![MockAnswer::Error(JudgeError::Api {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: "unsupported mime type".to_string(),
        })]);

        let response = app(judge)
            .oneshot(both_images("/api/compare/stream"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_failure_mid_stream_aborts_the_body() {
        let judge = MockJudge::new(vec![MockAnswer::Chunks(vec![
            Ok(r#"{"score": 3"#.to_string()),
            Err(JudgeError::EmptyResponse),
        ])]);

        let response = app(judge)
            .oneshot(both_images("/api/compare/stream"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
    }
}
