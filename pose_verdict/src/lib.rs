mod image;
mod partial;
mod stream;
mod verdict;

pub use image::{
    ComparisonRequest, EncodedImage, ImageError, ImagePayload, ImageRole, JsonComparisonBody,
};
pub use partial::extract_partial_feedback;
pub use stream::VerdictStream;
pub use verdict::{Verdict, VerdictError, FALLBACK_FEEDBACK};

/// Multipart field and JSON key of the reference pose.
pub const TARGET_FIELD: &str = "targetImage";
/// Multipart field and JSON key of the player's recreation.
pub const ATTEMPT_FIELD: &str = "attemptImage";

/// One-shot route: answers with the verdict as JSON.
pub const COMPARE_PATH: &str = "/api/compare";
/// Streaming route: relays the model text as `text/plain`.
pub const COMPARE_STREAM_PATH: &str = "/api/compare/stream";
