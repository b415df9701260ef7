//! Connection state machine, event loop, configuration and logging
//!
//! ## Example
//!
//! ```rust,ignore
//! use msspeech::core::*;
//!
//! let config = SpeechConfig::load("config/speech.yaml")?;
//! let mut context = Context::new(config.context_options())?;
//! let handle = context.connect(&config.endpoint_uri(), Box::new(MyCallbacks))?;
//!
//! loop {
//!     context.service_step(Duration::from_millis(50));
//!     if handle.connection_state() == ConnectionState::Disconnected {
//!         break;
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod connection_state;
pub mod context;
pub mod handle;
pub mod logging;

// Re-export main types
pub use config::{ConfigError, ResultFormat, SpeechConfig};
pub use connection::{Connection, ConnectionOptions};
pub use connection_state::{
    AtomicConnectionState, AtomicMetrics, AtomicSessionStatus, ConnectionState, Metrics,
    SessionStatus,
};
pub use context::{ChannelTransport, Context, ContextOptions, StepCanceller, StepOutcome};
pub use handle::{ConnectionHandle, Waker};
pub use logging::{LogConfig, LogLevel, Logger};
