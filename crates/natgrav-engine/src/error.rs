//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the demo before its
//! step loop starts. Once the loop runs, failures are caught and logged by
//! the sessions themselves.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Session configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: natgrav_core::ConfigError,
    },

    /// The `scenario` section could not be read.
    #[error("scenario error: {message}")]
    Scenario {
        /// Description of the scenario failure.
        message: String,
    },

    /// The tokio runtime could not install the shutdown signal handler.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
