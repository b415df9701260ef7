use thiserror::Error;

/// Framing failures while reassembling an inbound message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame ended before a `\r\n\r\n` header terminator was seen
    #[error("missing header terminator")]
    MissingTerminator,

    /// The header block is empty
    #[error("frame has no headers")]
    NoHeaders,

    /// One of the mandatory headers is absent
    #[error("{0} header does not exist")]
    MissingHeader(&'static str),
}

/// Payload validation failures for a known message path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The message carries no JSON payload at all
    #[error("{path} has no payload")]
    MissingPayload { path: &'static str },

    /// A required field is absent or has the wrong JSON type
    #[error("{path}: {field} is not of type {expected}")]
    InvalidField {
        path: &'static str,
        field: String,
        expected: &'static str,
    },

    /// RecognitionStatus holds a value outside the known table
    #[error("{path}: recognition status is of unknown value: {value}")]
    UnknownRecognitionStatus { path: &'static str, value: String },
}

impl DecodeError {
    pub(crate) fn invalid(path: &'static str, field: impl Into<String>, expected: &'static str) -> Self {
        DecodeError::InvalidField {
            path,
            field: field.into(),
            expected,
        }
    }
}

/// Main error type for msspeech
#[derive(Error, Debug)]
pub enum SpeechError {
    /// WebSocket write failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The socket task is gone, so nothing more can be written
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Inbound frame could not be reassembled
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Inbound payload did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Operation invoked while the connection is in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Handshake header does not fit in the space left for it
    #[error("Not enough buffer for {what}: {needed}/{available}")]
    BufferTooSmall {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// Caller supplied request id is not a UUID
    #[error("Request ID is in incorrect format: {0}")]
    InvalidRequestId(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error (config files, audio readers)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for msspeech operations
pub type Result<T> = std::result::Result<T, SpeechError>;
