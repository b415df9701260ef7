//! Typed service responses
//!
//! Each type borrows from the `ParsedMessage` it was decoded from, so none of
//! them can outlive the dispatch of that message.

use crate::protocol::codec::ParsedMessage;
use crate::protocol::constants::*;
use crate::traits::error::DecodeError;
use serde_json::{Map, Value};
use std::fmt;

/// Offset and duration of a recognised span, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhraseTiming {
    pub offset: f64,
    pub duration: f64,
}

impl PhraseTiming {
    fn decode(path: &'static str, payload: &Value) -> Result<Self, DecodeError> {
        Ok(Self {
            offset: ticks_field(path, payload, KEY_OFFSET)?,
            duration: ticks_field(path, payload, KEY_DURATION)?,
        })
    }
}

/// Integer 100 ns tick field converted to seconds
fn ticks_field(path: &'static str, payload: &Value, key: &str) -> Result<f64, DecodeError> {
    payload
        .get(key)
        .filter(|value| value.is_i64() || value.is_u64())
        .and_then(Value::as_f64)
        .map(|ticks| ticks / TICKS_PER_SECOND)
        .ok_or_else(|| DecodeError::invalid(path, key, "int"))
}

fn str_field<'a>(path: &'static str, object: &'a Value, key: &str) -> Result<&'a str, DecodeError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::invalid(path, key, "string"))
}

fn require_payload<'a>(path: &'static str, message: &'a ParsedMessage) -> Result<&'a Value, DecodeError> {
    message.payload.as_ref().ok_or(DecodeError::MissingPayload { path })
}

/// `speech.startDetected`
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechStartDetected<'a> {
    pub message: &'a ParsedMessage,
    pub offset: f64,
}

impl<'a> SpeechStartDetected<'a> {
    pub fn decode(message: &'a ParsedMessage) -> Result<Self, DecodeError> {
        let path = PATH_SPEECH_START_DETECTED;
        let payload = require_payload(path, message)?;
        Ok(Self {
            message,
            offset: ticks_field(path, payload, KEY_OFFSET)?,
        })
    }
}

/// `speech.endDetected`
///
/// The offset is informational; the message is delivered even without it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechEndDetected<'a> {
    pub message: &'a ParsedMessage,
    pub offset: Option<f64>,
}

impl<'a> SpeechEndDetected<'a> {
    /// Returns the message plus the offset error, if the offset was unusable
    pub fn decode(message: &'a ParsedMessage) -> (Self, Option<DecodeError>) {
        let path = PATH_SPEECH_END_DETECTED;
        let offset = match &message.payload {
            Some(payload) => ticks_field(path, payload, KEY_OFFSET),
            None => Err(DecodeError::MissingPayload { path }),
        };

        match offset {
            Ok(offset) => (Self { message, offset: Some(offset) }, None),
            Err(e) => (Self { message, offset: None }, Some(e)),
        }
    }
}

/// `speech.hypothesis`: interim text while the utterance is in progress
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechHypothesis<'a> {
    pub message: &'a ParsedMessage,
    pub text: &'a str,
    pub timing: PhraseTiming,
}

impl<'a> SpeechHypothesis<'a> {
    pub fn decode(message: &'a ParsedMessage) -> Result<Self, DecodeError> {
        let path = PATH_SPEECH_HYPOTHESIS;
        let payload = require_payload(path, message)?;
        Ok(Self {
            message,
            text: str_field(path, payload, KEY_TEXT)?,
            timing: PhraseTiming::decode(path, payload)?,
        })
    }
}

/// Final outcome of one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognitionStatus {
    Success,
    EndOfDictation,
    NoMatch,
    InitialSilenceTimeout,
    BabbleTimeout,
    Error,
}

impl RecognitionStatus {
    const TABLE: [(&'static str, RecognitionStatus); 6] = [
        (STATUS_SUCCESS, RecognitionStatus::Success),
        (STATUS_END_OF_DICTATION, RecognitionStatus::EndOfDictation),
        (STATUS_NO_MATCH, RecognitionStatus::NoMatch),
        (STATUS_INITIAL_SILENCE_TIMEOUT, RecognitionStatus::InitialSilenceTimeout),
        (STATUS_BABBLE_TIMEOUT, RecognitionStatus::BabbleTimeout),
        (STATUS_ERROR, RecognitionStatus::Error),
    ];

    /// Case-insensitive exact match against the service vocabulary
    pub fn parse(value: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, status)| *status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionStatus::Success => STATUS_SUCCESS,
            RecognitionStatus::EndOfDictation => STATUS_END_OF_DICTATION,
            RecognitionStatus::NoMatch => STATUS_NO_MATCH,
            RecognitionStatus::InitialSilenceTimeout => STATUS_INITIAL_SILENCE_TIMEOUT,
            RecognitionStatus::BabbleTimeout => STATUS_BABBLE_TIMEOUT,
            RecognitionStatus::Error => STATUS_ERROR,
        }
    }
}

impl fmt::Display for RecognitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognition alternative
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseResult<'a> {
    /// NaN for simple results
    pub confidence: f64,
    pub lexical: &'a str,
    pub itn: &'a str,
    pub masked_itn: &'a str,
    pub display: String,
    pub timing: PhraseTiming,
    /// The NBest entry this result came from (detailed results only)
    pub raw: Option<&'a Map<String, Value>>,
}

/// `speech.phrase`
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResult<'a> {
    pub message: &'a ParsedMessage,
    pub status: RecognitionStatus,
    pub is_detailed: bool,
    /// Empty unless `status` is `Success`
    pub phrases: Vec<PhraseResult<'a>>,
}

impl<'a> SpeechResult<'a> {
    pub fn decode(message: &'a ParsedMessage) -> Result<Self, DecodeError> {
        let path = PATH_SPEECH_PHRASE;
        let payload = message
            .payload
            .as_ref()
            .filter(|payload| payload.is_object())
            .ok_or_else(|| DecodeError::invalid(path, "payload", "object"))?;

        let status_text = str_field(path, payload, KEY_RECOGNITION_STATUS)?;
        let status = RecognitionStatus::parse(status_text).ok_or_else(|| {
            DecodeError::UnknownRecognitionStatus {
                path,
                value: status_text.to_string(),
            }
        })?;

        let mut result = Self {
            message,
            status,
            is_detailed: false,
            phrases: Vec::new(),
        };
        if status != RecognitionStatus::Success {
            return Ok(result);
        }

        // Alternatives share the message-level timing
        let timing = PhraseTiming::decode(path, payload)?;

        match payload.get(KEY_DISPLAY_TEXT) {
            Some(display) => {
                let display = match display.as_str() {
                    Some(text) => text.to_string(),
                    None => display.to_string(),
                };
                result.phrases.push(PhraseResult {
                    confidence: f64::NAN,
                    lexical: "",
                    itn: "",
                    masked_itn: "",
                    display,
                    timing,
                    raw: None,
                });
            }
            None => {
                result.is_detailed = true;
                let nbest = payload
                    .get(KEY_NBEST)
                    .and_then(Value::as_array)
                    .ok_or_else(|| DecodeError::invalid(path, KEY_NBEST, "array"))?;

                result.phrases = nbest
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| decode_nbest_entry(path, i, entry, timing))
                    .collect::<Result<_, _>>()?;
            }
        }

        Ok(result)
    }
}

fn decode_nbest_entry<'a>(
    path: &'static str,
    index: usize,
    entry: &'a Value,
    timing: PhraseTiming,
) -> Result<PhraseResult<'a>, DecodeError> {
    let field = |key: &str| format!("{}[{}].{}", KEY_NBEST, index, key);

    let object = entry
        .as_object()
        .ok_or_else(|| DecodeError::invalid(path, format!("{}[{}]", KEY_NBEST, index), "object"))?;
    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::invalid(path, field(key), "string"))
    };

    Ok(PhraseResult {
        confidence: object
            .get(KEY_CONFIDENCE)
            .and_then(Value::as_f64)
            .ok_or_else(|| DecodeError::invalid(path, field(KEY_CONFIDENCE), "double"))?,
        lexical: text(KEY_LEXICAL)?,
        itn: text(KEY_ITN)?,
        masked_itn: text(KEY_MASKED_ITN)?,
        display: text(KEY_DISPLAY)?.to_string(),
        timing,
        raw: Some(object),
    })
}

/// `turn.start`
#[derive(Debug, Clone, PartialEq)]
pub struct TurnStart<'a> {
    pub message: &'a ParsedMessage,
    pub service_tag: &'a str,
}

impl<'a> TurnStart<'a> {
    pub fn decode(message: &'a ParsedMessage) -> Result<Self, DecodeError> {
        let path = PATH_TURN_START;
        let context = message
            .payload
            .as_ref()
            .and_then(|payload| payload.get(KEY_CONTEXT))
            .filter(|context| context.is_object())
            .ok_or_else(|| DecodeError::invalid(path, KEY_CONTEXT, "object"))?;

        let service_tag = context
            .get(KEY_SERVICE_TAG)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DecodeError::invalid(path, format!("{}.{}", KEY_CONTEXT, KEY_SERVICE_TAG), "string")
            })?;

        Ok(Self { message, service_tag })
    }
}

/// `turn.end`, no payload fields required
#[derive(Debug, Clone, PartialEq)]
pub struct TurnEnd<'a> {
    pub message: &'a ParsedMessage,
}
