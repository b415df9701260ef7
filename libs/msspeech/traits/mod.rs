//! # msspeech traits
//!
//! Seams between the protocol core and the outside world:
//!
//! - **Transport**: where outgoing frames go and how write opportunities are requested
//! - **AudioSource**: pull-based audio input with a would-block signal
//! - **SpeechCallbacks**: caller notifications and hooks for one connection
//! - **LogSink**: destination for formatted log records
//!
//! ## Example
//!
//! ```rust,ignore
//! use msspeech::*;
//!
//! struct Results;
//!
//! impl SpeechCallbacks for Results {
//!     fn speech_hypothesis(&mut self, _c: &ConnectionHandle, message: &SpeechHypothesis) {
//!         println!("... {}", message.text);
//!     }
//! }
//! ```

pub mod audio;
pub mod callbacks;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use audio::{AudioPull, AudioSource, ReaderSource};
pub use callbacks::{LogSink, NoCallbacks, OverlayTarget, SpeechCallbacks};
pub use error::{DecodeError, FrameError, Result, SpeechError};
pub use transport::{Transport, WsMessage};
