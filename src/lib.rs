//! Speech recognition client - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, logging, shutdown)
//! - **msspeech**: Protocol client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use msspeech_client::bin_common::{load_config_from_env, ConfigType};
//! use msspeech_client::msspeech::SpeechConfig;
//! ```

// Re-export workspace libraries for convenience
pub use msspeech;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use logging::init_tracing_with_level;
    pub use shutdown::ShutdownManager;
}
