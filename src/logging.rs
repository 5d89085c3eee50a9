//! tracing-subscriber setup for the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{WeaveError, WeaveResult};

/// Build the filter: `RUST_LOG` wins, otherwise `level`.
pub fn filter(level: &str) -> WeaveResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| WeaveError::Config(format!("invalid log level '{}': {}", level, e)))
}

/// Install a global stderr subscriber. Calling it twice is an error.
pub fn init(level: &str) -> WeaveResult<()> {
    tracing_subscriber::registry()
        .with(filter(level)?)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| WeaveError::Config(format!("logging already initialised: {}", e)))
}
