//! Wire vocabulary: header names, message paths, JSON keys

// Headers
pub const PATH_HEADER: &str = "Path";
pub const REQUEST_ID_HEADER: &str = "X-RequestId";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const CONNECTION_ID_HEADER: &str = "X-ConnectionId";

// Content types
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=utf-8";
pub const CONTENT_TYPE_AUDIO: &str = "audio/x-wav";

// Outgoing paths
pub const PATH_SPEECH_CONFIG: &str = "speech.config";
pub const PATH_AUDIO: &str = "audio";
pub const PATH_TELEMETRY: &str = "telemetry";

// Inbound paths
pub const PATH_SPEECH_START_DETECTED: &str = "speech.startDetected";
pub const PATH_SPEECH_END_DETECTED: &str = "speech.endDetected";
pub const PATH_SPEECH_HYPOTHESIS: &str = "speech.hypothesis";
pub const PATH_SPEECH_PHRASE: &str = "speech.phrase";
pub const PATH_TURN_START: &str = "turn.start";
pub const PATH_TURN_END: &str = "turn.end";

// Response payload keys
pub const KEY_TEXT: &str = "Text";
pub const KEY_RECOGNITION_STATUS: &str = "RecognitionStatus";
pub const KEY_DISPLAY_TEXT: &str = "DisplayText";
pub const KEY_NBEST: &str = "NBest";
pub const KEY_CONFIDENCE: &str = "Confidence";
pub const KEY_LEXICAL: &str = "Lexical";
pub const KEY_ITN: &str = "ITN";
pub const KEY_MASKED_ITN: &str = "MaskedITN";
pub const KEY_DISPLAY: &str = "Display";
pub const KEY_CONTEXT: &str = "context";
pub const KEY_SERVICE_TAG: &str = "serviceTag";
pub const KEY_OFFSET: &str = "Offset";
pub const KEY_DURATION: &str = "Duration";

// Recognition status values
pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_END_OF_DICTATION: &str = "EndOfDictation";
pub const STATUS_NO_MATCH: &str = "NoMatch";
pub const STATUS_INITIAL_SILENCE_TIMEOUT: &str = "InitialSilenceTimeout";
pub const STATUS_BABBLE_TIMEOUT: &str = "BabbleTimeout";
pub const STATUS_ERROR: &str = "Error";

// Telemetry keys
pub const TELEMETRY_RECEIVED_MESSAGES: &str = "ReceivedMessages";
pub const TELEMETRY_METRICS: &str = "Metrics";
pub const TELEMETRY_METRIC_NAME: &str = "Name";
pub const TELEMETRY_MICROPHONE: &str = "Microphone";
pub const TELEMETRY_START: &str = "Start";
pub const TELEMETRY_END: &str = "End";
pub const TELEMETRY_ERROR: &str = "Error";

/// Service time fields are 100 ns ticks
pub const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Default capacity of the audio staging buffer
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 4096;

/// Default space available for handshake headers
pub const DEFAULT_HANDSHAKE_HEADER_BUDGET: usize = 4096;
