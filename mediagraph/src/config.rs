//! Configuration types and defaults

use mediagraph_core::{MediaError, MediaResult};
#[cfg(feature = "filter")]
use mediagraph_filter::NegotiationConfig;
use serde::{Deserialize, Serialize};

/// Global mediagraph configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Install a `tracing` subscriber on init
    pub debug_logging: bool,
    /// Filter directives for that subscriber
    pub log_filter: String,
    /// Settings for filter graph negotiation
    #[cfg(feature = "filter")]
    pub negotiation: NegotiationConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_filter: "info".to_string(),
            #[cfg(feature = "filter")]
            negotiation: NegotiationConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Parse a configuration from JSON, missing fields keep their defaults
    pub fn from_json_str(json: &str) -> MediaResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| MediaError::configuration(format!("invalid configuration: {}", e)))
    }

    /// Enable logging with the given filter
    pub fn with_logging(mut self, filter: &str) -> Self {
        self.debug_logging = true;
        self.log_filter = filter.to_string();
        self
    }
}
