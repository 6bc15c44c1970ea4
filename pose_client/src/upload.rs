use crate::client::ClientError;
use pose_verdict::{ComparisonRequest, ImagePayload};
use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type from the file extension, the way a browser labels a file input.
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("avif") => "image/avif",
        _ => OCTET_STREAM,
    }
}

pub async fn read_image(path: &Path) -> Result<ImagePayload, ClientError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::ReadImage {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "Read image");

    Ok(ImagePayload::new(data, Some(mime_type_for(path))))
}

pub async fn load_comparison(
    target: &Path,
    attempt: &Path,
) -> Result<ComparisonRequest, ClientError> {
    let target = read_image(target).await?;
    let attempt = read_image(attempt).await?;

    Ok(ComparisonRequest::from_parts(Some(target), Some(attempt))?)
}
