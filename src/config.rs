// src/config.rs

use crate::error::NilaOidcError;
use std::time::Duration;

/// Default limit on the size of a fetched discovery document or key set.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Settings for the bundled HTTP document retriever.
///
/// Construct it with [`RetrieverConfigBuilder`]; `RetrieverConfig::default()`
/// gives the same values as an untouched builder.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Reject any address that is not `https://`. Defaults to `true`.
    pub require_https: bool,
    /// Per-request timeout. Defaults to 30 seconds.
    pub timeout: Duration,
    /// Largest response body accepted, in bytes. Defaults to 1 MiB.
    pub max_response_bytes: usize,
    /// The `User-Agent` header sent with each request.
    pub user_agent: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            require_https: true,
            timeout: Duration::from_secs(30),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// A builder for creating a `RetrieverConfig` instance.
#[derive(Default)]
pub struct RetrieverConfigBuilder {
    require_https: Option<bool>,
    timeout: Option<Duration>,
    max_response_bytes: Option<usize>,
    user_agent: Option<String>,
}

impl RetrieverConfigBuilder {
    /// Creates a new `RetrieverConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether plain `http://` addresses are refused.
    pub fn require_https(mut self, require: bool) -> Self {
        self.require_https = Some(require);
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the maximum accepted response size in bytes.
    pub fn max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = Some(max);
        self
    }

    /// Overrides the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Consumes the builder and returns a `RetrieverConfig` object.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout or the response size limit is zero.
    pub fn build(self) -> Result<RetrieverConfig, NilaOidcError> {
        let defaults = RetrieverConfig::default();

        let timeout = self.timeout.unwrap_or(defaults.timeout);
        if timeout.is_zero() {
            return Err(NilaOidcError::InvalidConfiguration("timeout must be greater than zero".to_string()));
        }

        let max_response_bytes = self.max_response_bytes.unwrap_or(defaults.max_response_bytes);
        if max_response_bytes == 0 {
            return Err(NilaOidcError::InvalidConfiguration(
                "max_response_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(RetrieverConfig {
            require_https: self.require_https.unwrap_or(defaults.require_https),
            timeout,
            max_response_bytes,
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        })
    }
}
