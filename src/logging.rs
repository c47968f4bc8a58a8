//! Logging setup.

use thiserror::Error;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

/// The error type for installing the global subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// A global subscriber was already set
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

/// Global `tracing` subscriber setup for the command line tool.
pub struct Logging;

impl Logging {
    /// Logs to stderr at INFO, or at whatever `RUST_LOG` asks for.
    pub fn try_init() -> Result<(), LoggingError> {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .try_init()
            .map_err(|e| LoggingError::TryInitError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        // The first call may race with other tests installing a subscriber, the second never wins.
        let _ = Logging::try_init();
        assert!(Logging::try_init().is_err());
    }
}
