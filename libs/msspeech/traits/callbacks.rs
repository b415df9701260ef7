use crate::core::handle::ConnectionHandle;
use crate::protocol::messages::{
    SpeechEndDetected, SpeechHypothesis, SpeechResult, SpeechStartDetected, TurnEnd, TurnStart,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::Level;

/// Outgoing messages whose JSON body may be augmented by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTarget {
    /// The speech.config message sent right after the handshake
    SpeechConfig,
}

/// Destination for formatted log records
///
/// Installed through `LogConfig` for a whole context, or per connection
/// through `SpeechCallbacks::log_sink`.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(Level, &str) + Send + Sync,
{
    fn log(&self, level: Level, message: &str) {
        self(level, message)
    }
}

/// Caller callbacks for one connection
///
/// Every method has a no-op default so implementations only override what
/// they care about. All callbacks run inside `Context::service_step`.
///
/// Parsed messages are borrowed for the duration of the call only; copy out
/// anything that must outlive it.
///
/// # Example
/// ```ignore
/// struct Printer;
///
/// impl SpeechCallbacks for Printer {
///     fn client_ready(&mut self, connection: &ConnectionHandle) {
///         let _ = connection.start_stream(ReaderSource::new(file), None);
///     }
///
///     fn speech_result(&mut self, _connection: &ConnectionHandle, message: &SpeechResult<'_>) {
///         for phrase in &message.phrases {
///             println!("{}", phrase.display);
///         }
///     }
/// }
/// ```
pub trait SpeechCallbacks: Send {
    /// Network connection established. The client is not ready for audio yet
    fn connection_established(&mut self, _connection: &ConnectionHandle) {}

    /// Connecting failed (network or HTTP). `http_status` is 0 when no HTTP response was seen
    fn connection_error(&mut self, _connection: &ConnectionHandle, _http_status: u16, _message: &str) {}

    /// The connection was closed
    fn connection_closed(&mut self, _connection: &ConnectionHandle) {}

    /// speech.config was sent; audio streaming may start
    fn client_ready(&mut self, _connection: &ConnectionHandle) {}

    /// Return a complete `Name: Value` header line to authenticate the upgrade request.
    /// It must not exceed `max_len` bytes
    fn authentication_header(&mut self, _connection: &ConnectionHandle, _max_len: usize) -> Option<String> {
        None
    }

    /// Adjust the JSON body of an outgoing message before it is serialized
    fn message_overlay(&mut self, _connection: &ConnectionHandle, _target: OverlayTarget, _body: &mut Value) {}

    fn speech_start_detected(&mut self, _connection: &ConnectionHandle, _message: &SpeechStartDetected<'_>) {}

    fn speech_end_detected(&mut self, _connection: &ConnectionHandle, _message: &SpeechEndDetected<'_>) {}

    fn speech_hypothesis(&mut self, _connection: &ConnectionHandle, _message: &SpeechHypothesis<'_>) {}

    fn speech_result(&mut self, _connection: &ConnectionHandle, _message: &SpeechResult<'_>) {}

    fn turn_start(&mut self, _connection: &ConnectionHandle, _message: &TurnStart<'_>) {}

    fn turn_end(&mut self, _connection: &ConnectionHandle, _message: &TurnEnd<'_>) {}

    /// Per-connection log sink. Overrides the context sink when present
    fn log_sink(&self) -> Option<Arc<dyn LogSink>> {
        None
    }
}

/// Callbacks that ignore everything
pub struct NoCallbacks;

impl SpeechCallbacks for NoCallbacks {}
