use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Images required")]
    Missing,
    #[error("{0} is not valid base64: {1}")]
    InvalidBase64(ImageRole, base64::DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Target,
    Attempt,
}

impl ImageRole {
    pub fn field_name(&self) -> &'static str {
        match self {
            ImageRole::Target => crate::TARGET_FIELD,
            ImageRole::Attempt => crate::ATTEMPT_FIELD,
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        match name {
            crate::TARGET_FIELD => Some(Self::Target),
            crate::ATTEMPT_FIELD => Some(Self::Attempt),
            _ => None,
        }
    }
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Raw image bytes as uploaded, with the MIME type the uploader declared.
#[derive(Clone, PartialEq)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(data: Vec<u8>, mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        Self {
            data,
            mime_type: mime_type.to_string(),
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    pub target: ImagePayload,
    pub attempt: ImagePayload,
}

impl ComparisonRequest {
    /// Pairs the two uploads. Empty uploads count as missing, the way a
    /// browser submits an untouched file input.
    pub fn from_parts(
        target: Option<ImagePayload>,
        attempt: Option<ImagePayload>,
    ) -> Result<Self, ImageError> {
        match (
            target.filter(|t| !t.data.is_empty()),
            attempt.filter(|a| !a.data.is_empty()),
        ) {
            (Some(target), Some(attempt)) => Ok(Self { target, attempt }),
            _ => Err(ImageError::Missing),
        }
    }
}

/// One image in the JSON request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedImage {
    pub data: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl EncodedImage {
    pub fn encode(payload: &ImagePayload) -> Self {
        Self {
            data: payload.to_base64(),
            mime_type: Some(payload.mime_type.clone()),
        }
    }

    /// Accepts plain base64 or a `data:<mime>;base64,<payload>` URL. The MIME
    /// type inside a data URL is used only when `type` is absent.
    pub fn decode(self, role: ImageRole) -> Result<ImagePayload, ImageError> {
        let (url_mime, encoded) = split_data_url(&self.data);
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ImageError::InvalidBase64(role, e))?;
        let mime_type = self.mime_type.as_deref().or(url_mime);

        Ok(ImagePayload::new(data, mime_type))
    }
}

fn split_data_url(data: &str) -> (Option<&str>, &str) {
    let Some(rest) = data.strip_prefix("data:") else {
        return (None, data);
    };
    match rest.split_once(";base64,") {
        Some((mime, payload)) => (Some(mime), payload),
        None => (None, data),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonComparisonBody {
    #[serde(default)]
    pub target_image: Option<EncodedImage>,
    #[serde(default)]
    pub attempt_image: Option<EncodedImage>,
}

impl JsonComparisonBody {
    pub fn from_request(request: &ComparisonRequest) -> Self {
        Self {
            target_image: Some(EncodedImage::encode(&request.target)),
            attempt_image: Some(EncodedImage::encode(&request.attempt)),
        }
    }

    pub fn into_request(self) -> Result<ComparisonRequest, ImageError> {
        let (Some(target), Some(attempt)) = (self.target_image, self.attempt_image) else {
            return Err(ImageError::Missing);
        };
        if target.data.is_empty() || attempt.data.is_empty() {
            return Err(ImageError::Missing);
        }

        ComparisonRequest::from_parts(
            Some(target.decode(ImageRole::Target)?),
            Some(attempt.decode(ImageRole::Attempt)?),
        )
    }
}
