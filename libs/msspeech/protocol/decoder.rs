use serde_json::Value;

/// Incremental payload decoder
///
/// Body bytes are accumulated across transport deliveries and decoded once
/// the final fragment has arrived. A body that is not a complete JSON
/// document is surfaced as a JSON string holding its text.
#[derive(Debug, Default)]
pub struct PayloadDecoder {
    buffer: Vec<u8>,
}

impl PayloadDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode everything fed so far and reset for the next message
    ///
    /// An empty body decodes to `None`.
    pub fn finish(&mut self) -> Option<Value> {
        if self.buffer.is_empty() {
            return None;
        }

        let value = match serde_json::from_slice::<Value>(&self.buffer) {
            Ok(value) => value,
            Err(_) => Value::String(String::from_utf8_lossy(&self.buffer).into_owned()),
        };
        self.reset();
        Some(value)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_across_feeds() {
        let mut decoder = PayloadDecoder::new();
        decoder.feed(br#"{"Text":"hel"#);
        decoder.feed(br#"lo","Offset":5}"#);
        assert_eq!(decoder.finish(), Some(json!({"Text": "hello", "Offset": 5})));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_empty_body_has_no_payload() {
        let mut decoder = PayloadDecoder::new();
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_invalid_json_falls_back_to_text() {
        let mut decoder = PayloadDecoder::new();
        decoder.feed(b"{\"broken\": ");
        assert_eq!(decoder.finish(), Some(Value::String("{\"broken\": ".to_string())));

        decoder.feed(b"plain words");
        assert_eq!(decoder.finish(), Some(Value::String("plain words".to_string())));
    }
}
