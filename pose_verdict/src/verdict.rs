use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FALLBACK_FEEDBACK: &str = "Oops! The AI got confused. Try again!";

#[derive(Error, Debug)]
pub enum VerdictError {
    #[error("Failed to parse AI response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The judge's answer. `score` is meant to be 0-100 but is passed through as
/// the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: f64,
    pub feedback: String,
}

impl Verdict {
    pub fn fallback() -> Self {
        Self {
            score: 0.0,
            feedback: FALLBACK_FEEDBACK.to_string(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, VerdictError> {
        Ok(serde_json::from_str(text.trim())?)
    }
}
