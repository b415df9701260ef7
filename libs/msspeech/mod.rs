//! # msspeech
//!
//! Client for the speech recognition streaming protocol spoken over a
//! WebSocket: HTTP-like framed JSON control messages and binary audio on a
//! single duplex connection.
//!
//! ## Features
//!
//! - **Sans-IO protocol core**: `Connection` reacts to transport events and never blocks
//! - **Pull-based audio**: sources return data, end, error or would-block; streaming resumes on request
//! - **Partial delivery reassembly**: frames split at any byte offset parse identically
//! - **Per-turn telemetry**: arrival timestamps and microphone usage are reported after every turn
//! - **Thread-safe handles**: start/resume from any thread, applied inside the service step

pub mod core;
pub mod protocol;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    config::{ConfigError, ResultFormat, SpeechConfig},
    connection::{Connection, ConnectionOptions},
    connection_state::{ConnectionState, Metrics, SessionStatus},
    context::{Context, ContextOptions, StepCanceller, StepOutcome},
    handle::ConnectionHandle,
    logging::{LogConfig, LogLevel, Logger},
};

// Re-export protocol message types
pub use protocol::{
    DeviceInfo, PhraseResult, PhraseTiming, PlatformInfo, RecognitionStatus, SpeechEndDetected,
    SpeechHypothesis, SpeechResult, SpeechStartDetected, TurnEnd, TurnStart,
};
