//! Speech protocol: framing, payloads, telemetry and audio sessions
//!
//! Nothing in here performs I/O.

pub mod codec;
pub mod constants;
pub mod decoder;
pub mod dispatcher;
pub mod ids;
pub mod messages;
pub mod speech_config;
pub mod streaming;
pub mod telemetry;
pub mod timestamp;

pub use codec::{InboundAssembler, OutgoingMessage, ParseStep, ParsedMessage};
pub use decoder::PayloadDecoder;
pub use dispatcher::{InboundMessage, ResponseKind};
pub use messages::{
    PhraseResult, PhraseTiming, RecognitionStatus, SpeechEndDetected, SpeechHypothesis,
    SpeechResult, SpeechStartDetected, TurnEnd, TurnStart,
};
pub use speech_config::{DeviceInfo, PlatformInfo};
pub use streaming::{StreamStep, StreamingSession};
pub use telemetry::{MicrophoneMetric, Telemetry};
