//! Response routing
//!
//! Maps a reassembled message to its typed payload by path and hands it to
//! the matching callback. Unknown paths are ignored.

use crate::core::handle::ConnectionHandle;
use crate::core::logging::{log_debug, log_warn, Logger};
use crate::protocol::codec::ParsedMessage;
use crate::protocol::constants::*;
use crate::protocol::messages::*;
use crate::traits::callbacks::SpeechCallbacks;
use crate::traits::error::DecodeError;

/// Inbound message kinds the client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    SpeechStartDetected,
    SpeechEndDetected,
    SpeechHypothesis,
    SpeechPhrase,
    TurnStart,
    TurnEnd,
}

impl ResponseKind {
    const ROUTES: [(&'static str, ResponseKind); 6] = [
        (PATH_SPEECH_START_DETECTED, ResponseKind::SpeechStartDetected),
        (PATH_SPEECH_END_DETECTED, ResponseKind::SpeechEndDetected),
        (PATH_SPEECH_HYPOTHESIS, ResponseKind::SpeechHypothesis),
        (PATH_SPEECH_PHRASE, ResponseKind::SpeechPhrase),
        (PATH_TURN_START, ResponseKind::TurnStart),
        (PATH_TURN_END, ResponseKind::TurnEnd),
    ];

    /// Case-insensitive path lookup
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ROUTES
            .iter()
            .find(|(route, _)| route.eq_ignore_ascii_case(path))
            .map(|(_, kind)| *kind)
    }
}

/// A decoded response, borrowing from its `ParsedMessage`
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage<'a> {
    SpeechStartDetected(SpeechStartDetected<'a>),
    SpeechEndDetected(SpeechEndDetected<'a>),
    SpeechHypothesis(SpeechHypothesis<'a>),
    SpeechResult(SpeechResult<'a>),
    TurnStart(TurnStart<'a>),
    TurnEnd(TurnEnd<'a>),
}

impl<'a> InboundMessage<'a> {
    /// Decode by path. `Ok(None)` for paths the client does not handle
    pub fn decode(message: &'a ParsedMessage, logger: &Logger) -> Result<Option<Self>, DecodeError> {
        let kind = match ResponseKind::from_path(&message.path) {
            Some(kind) => kind,
            None => {
                log_debug!(logger, "Ignoring message with unknown path: {}", message.path);
                return Ok(None);
            }
        };

        let decoded = match kind {
            ResponseKind::SpeechStartDetected => {
                InboundMessage::SpeechStartDetected(SpeechStartDetected::decode(message)?)
            }
            ResponseKind::SpeechEndDetected => {
                let (end, offset_error) = SpeechEndDetected::decode(message);
                if let Some(e) = offset_error {
                    log_warn!(logger, "{}", e);
                }
                InboundMessage::SpeechEndDetected(end)
            }
            ResponseKind::SpeechHypothesis => {
                InboundMessage::SpeechHypothesis(SpeechHypothesis::decode(message)?)
            }
            ResponseKind::SpeechPhrase => InboundMessage::SpeechResult(SpeechResult::decode(message)?),
            ResponseKind::TurnStart => InboundMessage::TurnStart(TurnStart::decode(message)?),
            ResponseKind::TurnEnd => InboundMessage::TurnEnd(TurnEnd { message }),
        };

        Ok(Some(decoded))
    }

    pub fn kind(&self) -> ResponseKind {
        match self {
            InboundMessage::SpeechStartDetected(_) => ResponseKind::SpeechStartDetected,
            InboundMessage::SpeechEndDetected(_) => ResponseKind::SpeechEndDetected,
            InboundMessage::SpeechHypothesis(_) => ResponseKind::SpeechHypothesis,
            InboundMessage::SpeechResult(_) => ResponseKind::SpeechPhrase,
            InboundMessage::TurnStart(_) => ResponseKind::TurnStart,
            InboundMessage::TurnEnd(_) => ResponseKind::TurnEnd,
        }
    }

    /// Invoke the callback for this message
    pub fn dispatch(&self, callbacks: &mut dyn SpeechCallbacks, connection: &ConnectionHandle) {
        match self {
            InboundMessage::SpeechStartDetected(m) => callbacks.speech_start_detected(connection, m),
            InboundMessage::SpeechEndDetected(m) => callbacks.speech_end_detected(connection, m),
            InboundMessage::SpeechHypothesis(m) => callbacks.speech_hypothesis(connection, m),
            InboundMessage::SpeechResult(m) => callbacks.speech_result(connection, m),
            InboundMessage::TurnStart(m) => callbacks.turn_start(connection, m),
            InboundMessage::TurnEnd(m) => callbacks.turn_end(connection, m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parsed(path: &str, payload: Option<Value>) -> ParsedMessage {
        ParsedMessage {
            headers: Vec::new(),
            path: path.to_string(),
            request_id: "r".to_string(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            payload,
        }
    }

    #[test]
    fn test_routes_are_case_insensitive() {
        assert_eq!(ResponseKind::from_path("TURN.END"), Some(ResponseKind::TurnEnd));
        assert_eq!(
            ResponseKind::from_path("speech.startdetected"),
            Some(ResponseKind::SpeechStartDetected)
        );
        assert_eq!(ResponseKind::from_path("speech.fragment"), None);
    }

    #[test]
    fn test_unknown_path_is_ignored() {
        let message = parsed("speech.fragment", Some(json!({})));
        assert_eq!(InboundMessage::decode(&message, &Logger::default()), Ok(None));
    }

    #[test]
    fn test_turn_end_needs_no_payload() {
        let message = parsed("turn.end", None);
        let decoded = InboundMessage::decode(&message, &Logger::default()).unwrap().unwrap();
        assert_eq!(decoded.kind(), ResponseKind::TurnEnd);
    }

    #[test]
    fn test_decode_errors_propagate() {
        let message = parsed("speech.hypothesis", Some(json!({"Text": 5})));
        assert!(InboundMessage::decode(&message, &Logger::default()).is_err());
    }
}
