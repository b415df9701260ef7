//! Wire frame codec
//!
//! Every frame is an HTTP-like header block followed by a body:
//!
//! ```text
//! Path: speech.config\r\n
//! X-Timestamp: 2024-03-01T12:30:05.1234567Z\r\n
//! X-RequestId: 0f8fad5bd9cb469fa16570867728950e\r\n
//! Content-Type: application/json;charset=utf-8\r\n
//! \r\n
//! {"system": {...}, "os": {...}, "device": {...}}
//! ```
//!
//! Binary frames additionally carry the header block length as a big-endian
//! u16 in front of the headers.

use crate::core::logging::{log_warn, Logger};
use crate::protocol::constants::*;
use crate::protocol::decoder::PayloadDecoder;
use crate::protocol::{ids, timestamp};
use crate::traits::error::FrameError;
use crate::traits::transport::WsMessage;
use serde_json::Value;

const TERMINATOR: &[u8] = b"\r\n\r\n";

/// One outgoing frame, built fresh for every write opportunity
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub path: &'static str,
    pub binary: bool,
    pub timestamp: String,
    pub request_id: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl OutgoingMessage {
    /// Text frame with a JSON body
    pub fn json(path: &'static str, request_id: impl Into<String>, body: &Value) -> Self {
        Self {
            path,
            binary: false,
            timestamp: timestamp::now(),
            request_id: request_id.into(),
            content_type: CONTENT_TYPE_JSON,
            body: body.to_string().into_bytes(),
        }
    }

    /// Text frame with a JSON body and a freshly generated request id
    pub fn json_with_new_id(path: &'static str, body: &Value) -> Self {
        Self::json(path, ids::generate_id(), body)
    }

    /// Binary audio frame. An empty chunk marks the end of the stream
    pub fn audio(request_id: impl Into<String>, chunk: &[u8]) -> Self {
        Self {
            path: PATH_AUDIO,
            binary: true,
            timestamp: timestamp::now(),
            request_id: request_id.into(),
            content_type: CONTENT_TYPE_AUDIO,
            body: chunk.to_vec(),
        }
    }

    /// The four header lines plus the blank terminator line
    pub fn header_block(&self) -> String {
        format!(
            "{}: {}\r\n{}: {}\r\n{}: {}\r\n{}: {}\r\n\r\n",
            PATH_HEADER,
            self.path,
            TIMESTAMP_HEADER,
            self.timestamp,
            REQUEST_ID_HEADER,
            self.request_id,
            CONTENT_TYPE_HEADER,
            self.content_type
        )
    }

    /// Append the wire form to `out`, after anything the caller already
    /// reserved there. Returns the number of bytes appended.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        let headers = self.header_block();

        if self.binary {
            // Header block is four short fixed lines, far below u16::MAX
            let length = headers.len() as u16;
            out.extend_from_slice(&length.to_be_bytes());
        }
        out.extend_from_slice(headers.as_bytes());
        out.extend_from_slice(&self.body);

        out.len() - start
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 256 + self.body.len());
        self.serialize_into(&mut out);
        out
    }

    /// Wire form wrapped in the matching WebSocket frame kind
    pub fn encode(&self) -> WsMessage {
        let bytes = self.to_bytes();
        if self.binary {
            WsMessage::Binary(bytes)
        } else {
            match String::from_utf8(bytes) {
                Ok(text) => WsMessage::Text(text),
                Err(e) => WsMessage::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            }
        }
    }
}

/// A fully reassembled inbound message
///
/// Lives only for the duration of dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub headers: Vec<(String, String)>,
    pub path: String,
    pub request_id: String,
    pub content_type: String,
    /// Absent for empty bodies
    pub payload: Option<Value>,
}

impl ParsedMessage {
    /// Header lookup, case-insensitive on the name
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Outcome of feeding one transport delivery
#[derive(Debug, PartialEq)]
pub enum ParseStep {
    /// More deliveries are needed before a message is complete
    Partial,
    Complete(ParsedMessage),
}

struct HeaderFields {
    headers: Vec<(String, String)>,
    path: String,
    request_id: String,
    content_type: String,
}

enum Assembly {
    /// Collecting header bytes until the blank line shows up
    Headers(Vec<u8>),
    /// Headers parsed; body bytes go to the decoder
    Body(HeaderFields),
    /// Skipping the rest of a malformed transport frame
    Discarding,
}

/// Reassembles inbound frames from transport deliveries
///
/// A message completes on the delivery flagged as the final fragment of the
/// transport frame. Header bytes may be split across deliveries.
pub struct InboundAssembler {
    state: Assembly,
    decoder: PayloadDecoder,
    logger: Logger,
}

impl InboundAssembler {
    pub fn new(logger: Logger) -> Self {
        Self {
            state: Assembly::Headers(Vec::new()),
            decoder: PayloadDecoder::new(),
            logger,
        }
    }

    /// True while a message has been started but not completed
    pub fn in_progress(&self) -> bool {
        match &self.state {
            Assembly::Headers(buffer) => !buffer.is_empty(),
            Assembly::Body(_) | Assembly::Discarding => true,
        }
    }

    /// Drop any partial message and decoder state
    pub fn reset(&mut self) {
        self.state = Assembly::Headers(Vec::new());
        self.decoder.reset();
    }

    /// Feed one delivery
    ///
    /// After an error the remainder of the transport frame is skipped, so the
    /// next frame starts from a clean state.
    pub fn push(&mut self, data: &[u8], is_final: bool) -> Result<ParseStep, FrameError> {
        let state = std::mem::replace(&mut self.state, Assembly::Headers(Vec::new()));

        match state {
            Assembly::Discarding => {
                if !is_final {
                    self.state = Assembly::Discarding;
                }
                Ok(ParseStep::Partial)
            }
            Assembly::Headers(mut buffer) => {
                let search_from = buffer.len().saturating_sub(TERMINATOR.len() - 1);
                buffer.extend_from_slice(data);

                let position = match find_terminator(&buffer, search_from) {
                    Some(position) => position,
                    None if is_final => {
                        self.decoder.reset();
                        return Err(FrameError::MissingTerminator);
                    }
                    None => {
                        self.state = Assembly::Headers(buffer);
                        return Ok(ParseStep::Partial);
                    }
                };

                let fields = match self.parse_headers(&buffer[..position]) {
                    Ok(fields) => fields,
                    Err(e) => {
                        self.fail(is_final);
                        return Err(e);
                    }
                };

                self.decoder.feed(&buffer[position + TERMINATOR.len()..]);
                Ok(self.continue_body(fields, is_final))
            }
            Assembly::Body(fields) => {
                self.decoder.feed(data);
                Ok(self.continue_body(fields, is_final))
            }
        }
    }

    fn continue_body(&mut self, fields: HeaderFields, is_final: bool) -> ParseStep {
        if !is_final {
            self.state = Assembly::Body(fields);
            return ParseStep::Partial;
        }

        ParseStep::Complete(ParsedMessage {
            headers: fields.headers,
            path: fields.path,
            request_id: fields.request_id,
            content_type: fields.content_type,
            payload: self.decoder.finish(),
        })
    }

    fn fail(&mut self, is_final: bool) {
        self.decoder.reset();
        self.state = if is_final {
            Assembly::Headers(Vec::new())
        } else {
            Assembly::Discarding
        };
    }

    fn parse_headers(&self, block: &[u8]) -> Result<HeaderFields, FrameError> {
        if block.is_empty() {
            return Err(FrameError::NoHeaders);
        }

        let text = String::from_utf8_lossy(block);
        let mut headers = Vec::new();
        for line in text.split("\r\n").filter(|line| !line.is_empty()) {
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => {
                    log_warn!(self.logger, "Skipping malformed header line: {}", line);
                }
            }
        }

        let required = |name: &'static str| {
            find_header(&headers, name)
                .map(str::to_string)
                .ok_or(FrameError::MissingHeader(name))
        };
        let path = required(PATH_HEADER)?;
        let request_id = required(REQUEST_ID_HEADER)?;
        let content_type = required(CONTENT_TYPE_HEADER)?;

        Ok(HeaderFields {
            headers,
            path,
            request_id,
            content_type,
        })
    }
}

fn find_terminator(buffer: &[u8], from: usize) -> Option<usize> {
    buffer[from..]
        .windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assembler() -> InboundAssembler {
        InboundAssembler::new(Logger::default())
    }

    fn frame(path: &str, body: &str) -> Vec<u8> {
        format!(
            "Path: {}\r\nX-RequestId: 123\r\nContent-Type: application/json\r\n\r\n{}",
            path, body
        )
        .into_bytes()
    }

    fn complete(step: ParseStep) -> ParsedMessage {
        match step {
            ParseStep::Complete(message) => message,
            ParseStep::Partial => panic!("expected a complete message"),
        }
    }

    #[test]
    fn test_text_serialization_layout() {
        let message = OutgoingMessage::json("speech.config", "abc", &json!({"a": 1}));
        let bytes = message.to_bytes();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("Path: speech.config\r\nX-Timestamp: "));
        assert!(text.contains("\r\nX-RequestId: abc\r\nContent-Type: application/json;charset=utf-8\r\n\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"a\":1}"));
        assert!(matches!(message.encode(), WsMessage::Text(_)));
    }

    #[test]
    fn test_binary_serialization_has_length_prefix() {
        let message = OutgoingMessage::audio("abc", &[1, 2, 3]);
        let bytes = message.to_bytes();
        let header_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;

        assert_eq!(header_len, message.header_block().len());
        assert_eq!(&bytes[2 + header_len..], &[1, 2, 3]);
        assert!(String::from_utf8_lossy(&bytes[2..2 + header_len]).contains("Content-Type: audio/x-wav"));
    }

    #[test]
    fn test_serialize_into_keeps_reserved_prefix() {
        let message = OutgoingMessage::audio("abc", &[]);
        let mut out = vec![0xAA; 16];
        let written = message.serialize_into(&mut out);

        assert_eq!(out.len(), 16 + written);
        assert_eq!(&out[..16], &[0xAA; 16]);
    }

    #[test]
    fn test_parse_single_delivery() {
        let mut assembler = assembler();
        let message = complete(assembler.push(&frame("turn.start", r#"{"x":1}"#), true).unwrap());

        assert_eq!(message.path, "turn.start");
        assert_eq!(message.request_id, "123");
        assert_eq!(message.content_type, "application/json");
        assert_eq!(message.payload, Some(json!({"x": 1})));
        assert!(!assembler.in_progress());
    }

    #[test]
    fn test_parse_empty_body() {
        let mut assembler = assembler();
        let message = complete(assembler.push(&frame("turn.end", ""), true).unwrap());
        assert_eq!(message.payload, None);
    }

    #[test]
    fn test_every_split_offset_yields_same_message() {
        let bytes = frame("speech.hypothesis", r#"{"Text":"hello world","Offset":100,"Duration":200}"#);
        let expected = complete(assembler().push(&bytes, true).unwrap());

        for split in 0..=bytes.len() {
            let mut assembler = assembler();
            assert_eq!(assembler.push(&bytes[..split], false).unwrap(), ParseStep::Partial);
            let message = complete(assembler.push(&bytes[split..], true).unwrap());
            assert_eq!(message, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_many_small_deliveries() {
        let bytes = frame("speech.phrase", r#"{"RecognitionStatus":"NoMatch"}"#);
        let mut assembler = assembler();
        let chunks: Vec<&[u8]> = bytes.chunks(3).collect();
        let (last, rest) = chunks.split_last().unwrap();

        for chunk in rest {
            assert_eq!(assembler.push(chunk, false).unwrap(), ParseStep::Partial);
        }
        let message = complete(assembler.push(last, true).unwrap());
        assert_eq!(message.payload, Some(json!({"RecognitionStatus": "NoMatch"})));
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        for name in ["PATH", "path", "Path"] {
            let bytes = format!("{}: turn.end\r\nx-requestid: 1\r\ncontent-TYPE: a\r\n\r\n", name);
            let message = complete(assembler().push(bytes.as_bytes(), true).unwrap());
            assert_eq!(message.path, "turn.end");
            assert_eq!(message.header("X-REQUESTID"), Some("1"));
        }
    }

    #[test]
    fn test_header_values_are_trimmed() {
        let bytes = b"Path:   turn.end  \r\nX-RequestId:1\r\nContent-Type: a:b\r\n\r\n";
        let message = complete(assembler().push(bytes, true).unwrap());
        assert_eq!(message.path, "turn.end");
        assert_eq!(message.content_type, "a:b");
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let bytes = b"Path: turn.end\r\nContent-Type: a\r\n\r\n{}";
        assert_eq!(
            assembler().push(bytes, true),
            Err(FrameError::MissingHeader(REQUEST_ID_HEADER))
        );
    }

    #[test]
    fn test_missing_terminator_and_empty_headers() {
        assert_eq!(
            assembler().push(b"Path: turn.end\r\n", true),
            Err(FrameError::MissingTerminator)
        );
        assert_eq!(assembler().push(b"\r\n\r\n{}", true), Err(FrameError::NoHeaders));
    }

    #[test]
    fn test_resynchronizes_after_bad_frame() {
        let mut assembler = assembler();
        assert!(assembler.push(b"Bogus: 1\r\n\r\n{", false).is_err());
        // rest of the bad frame is skipped
        assert_eq!(assembler.push(b"\"a\":1}", true).unwrap(), ParseStep::Partial);

        let message = complete(assembler.push(&frame("turn.end", ""), true).unwrap());
        assert_eq!(message.path, "turn.end");
    }

    #[test]
    fn test_truncated_json_becomes_string_payload() {
        let message = complete(assembler().push(&frame("speech.phrase", "{\"a\":"), true).unwrap());
        assert_eq!(message.payload, Some(Value::String("{\"a\":".to_string())));
    }

    #[test]
    fn test_round_trip_outgoing_text() {
        let outgoing = OutgoingMessage::json("telemetry", "feed", &json!({"k": [1, 2]}));
        let message = complete(assembler().push(&outgoing.to_bytes(), true).unwrap());

        assert_eq!(message.path, outgoing.path);
        assert_eq!(message.request_id, outgoing.request_id);
        assert_eq!(message.content_type, outgoing.content_type);
        assert_eq!(message.header("x-timestamp"), Some(outgoing.timestamp.as_str()));
        assert_eq!(message.payload, Some(json!({"k": [1, 2]})));
    }

    #[test]
    fn test_reset_drops_partial_message() {
        let mut assembler = assembler();
        assembler.push(b"Path: turn", false).unwrap();
        assert!(assembler.in_progress());
        assembler.reset();
        assert!(!assembler.in_progress());
    }
}
