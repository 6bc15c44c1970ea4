use crate::{partial::extract_partial_feedback, Verdict, VerdictError};

/// Accumulates a streamed verdict chunk by chunk.
///
/// Chunks are decoded as UTF-8 in arrival order; a character split across two
/// chunks is held back until its remaining bytes arrive.
#[derive(Debug, Default)]
pub struct VerdictStream {
    pending: Vec<u8>,
    text: String,
}

impl VerdictStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the interim feedback, if any is visible yet.
    pub fn push(&mut self, chunk: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
        extract_partial_feedback(&self.text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parses everything received. A truncated trailing character is decoded
    /// lossily first.
    pub fn finish(mut self) -> Result<Verdict, VerdictError> {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        Verdict::parse(&self.text)
    }

    fn decode_pending(&mut self) {
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match e.error_len() {
                        Some(invalid) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid_up_to + invalid;
                        }
                        None => {
                            consumed += valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interim_feedback_then_final_verdict() {
        let mut stream = VerdictStream::new();

        assert_eq!(stream.push(br#"{"score": 8"#), None);
        assert_eq!(
            stream.push(br#"8, "feedback": "Great j"#).as_deref(),
            Some("Great j")
        );
        assert_eq!(
            stream.push(br#"ob!"}"#).as_deref(),
            Some("Great job!")
        );

        let verdict = stream.finish().unwrap();
        assert_eq!(verdict.score, 88.0);
        assert_eq!(verdict.feedback, "Great job!");
    }

    #[test]
    fn test_character_split_across_chunks() {
        let text = r#"{"score": 70, "feedback": "好"}"#.as_bytes();
        let split = text.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let mut stream = VerdictStream::new();

        stream.push(&text[..split]);
        assert_eq!(stream.text(), r#"{"score": 70, "feedback": ""#);

        assert_eq!(stream.push(&text[split..]).as_deref(), Some("好"));
        assert_eq!(stream.finish().unwrap().feedback, "好");
    }

    #[test]
    fn test_invalid_bytes_become_replacement_characters() {
        let mut stream = VerdictStream::new();

        stream.push(b"ab\xffcd");

        assert_eq!(stream.text(), "ab\u{FFFD}cd");
    }

    #[test]
    fn test_truncated_stream_fails_to_parse() {
        let mut stream = VerdictStream::new();
        stream.push(br#"{"score": 88, "feedback": "Great j"#);

        assert!(stream.finish().is_err());
    }

    #[test]
    fn test_independent_streams_share_nothing() {
        let mut first = VerdictStream::new();
        first.push(br#"{"score": 1, "feedback": "first"}"#);
        let _ = first.finish();

        let mut second = VerdictStream::new();
        assert_eq!(second.push(br#"{"score": 2"#), None);
        assert_eq!(second.text(), r#"{"score": 2"#);
    }
}
