//! Structured debug logging setup

use mediagraph_core::{MediaError, MediaResult};
use tracing_subscriber::EnvFilter;

/// Filter used when neither the caller nor `RUST_LOG` provides one
pub const DEFAULT_FILTER: &str = "info";

/// Install a global `fmt` subscriber filtered by `filter`
///
/// `filter` uses the `RUST_LOG` directive syntax, e.g.
/// `mediagraph_filter=debug,info`. Fails if the directives do not parse or
/// a global subscriber is already installed.
pub fn init_logging(filter: &str) -> MediaResult<()> {
    let filter = EnvFilter::try_new(filter).map_err(|e| {
        MediaError::configuration(format!("invalid log filter '{}': {}", filter, e))
    })?;
    install(filter)
}

/// Install a global subscriber filtered by `RUST_LOG`, or `default` when
/// the variable is unset or invalid
pub fn init_logging_from_env(default: &str) -> MediaResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    install(filter)
}

fn install(filter: EnvFilter) -> MediaResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| MediaError::configuration(format!("logging already initialised: {}", e)))?;
    tracing::debug!("logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        let err = init_logging("mediagraph=verbose").unwrap_err();
        assert!(matches!(err, MediaError::Configuration { .. }));
    }
}
