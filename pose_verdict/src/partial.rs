//! Best-effort peek at the `feedback` value of a JSON verdict that is still
//! arriving. Only used for the typing effect: it stops at the first `"` it
//! sees, so escaped quotes cut the text short. The parsed verdict replaces
//! whatever this returns once the stream ends.

use regex::Regex;
use std::sync::LazyLock;

static FEEDBACK_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""feedback":\s*"([^"]*)"#).expect("feedback pattern is valid")
});

/// Finds the first `"feedback":` key followed (after optional whitespace) by
/// an opening quote and returns the text up to the next quote or the end of
/// the buffer, with `\n` and `\"` unescaped. `None` when there is no such key
/// yet or its value is still empty.
pub fn extract_partial_feedback(buffer: &str) -> Option<String> {
    let raw = FEEDBACK_VALUE.captures(buffer)?.get(1)?.as_str();
    if raw.is_empty() {
        return None;
    }
    Some(shallow_unescape(raw))
}

fn shallow_unescape(raw: &str) -> String {
    raw.replace("\\n", "\n").replace("\\\"", "\"")
}
