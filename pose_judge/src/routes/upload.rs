use super::CompareError;
use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header,
    Json,
};
use pose_verdict::{ComparisonRequest, ImagePayload, ImageRole, JsonComparisonBody};

/// Reads the two images from either a multipart form or a JSON body with
/// base64 payloads.
pub async fn read_comparison(request: Request) -> Result<ComparisonRequest, CompareError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &()).await?;
        read_multipart(multipart).await
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<JsonComparisonBody>::from_request(request, &()).await?;
        Ok(body.into_request()?)
    } else if content_type.is_empty() {
        Err(CompareError::MissingImages)
    } else {
        Err(CompareError::InvalidBody(format!(
            "Unsupported content type `{}`. Send multipart/form-data or application/json.",
            content_type
        )))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<ComparisonRequest, CompareError> {
    let mut target = None;
    let mut attempt = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(role) = field.name().and_then(ImageRole::from_field_name) else {
            continue;
        };
        let mime_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        tracing::debug!(field = %role, bytes = data.len(), mime_type = ?mime_type, "Read upload");

        let payload = ImagePayload::new(data.to_vec(), mime_type.as_deref());
        match role {
            ImageRole::Target => target = Some(payload),
            ImageRole::Attempt => attempt = Some(payload),
        }
    }

    Ok(ComparisonRequest::from_parts(target, attempt)?)
}
