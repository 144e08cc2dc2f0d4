use std::env;
use std::time::Duration;

/// Safety margin subtracted from the token lifetime when scheduling a renewal
pub const RENEWAL_MARGIN: Duration = Duration::from_millis(2000);

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Lifetime of an issued token, in seconds (FTOKEN_EXPIRES_SECONDS)
    pub expires_seconds: u64,
    /// Timeout applied to each token request
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expires_seconds: 240,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let expires_seconds: u64 = env::var("FTOKEN_EXPIRES_SECONDS")
            .unwrap_or_else(|_| "240".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidExpiry)?;

        let fetch_timeout_secs: u64 = env::var("FTOKEN_FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Self::new(expires_seconds, Duration::from_secs(fetch_timeout_secs))
    }

    /// Builds a validated configuration
    pub fn new(expires_seconds: u64, fetch_timeout: Duration) -> Result<Self, ConfigError> {
        // The renewal delay must stay positive after the margin is taken off
        if Duration::from_secs(expires_seconds) <= RENEWAL_MARGIN {
            return Err(ConfigError::InvalidExpiry);
        }
        if fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(Self {
            expires_seconds,
            fetch_timeout,
        })
    }

    /// Delay after which a token is renewed: `expires_seconds * 1000 - 2000` ms
    pub fn renewal_delay(&self) -> Duration {
        Duration::from_secs(self.expires_seconds).saturating_sub(RENEWAL_MARGIN)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FTOKEN_EXPIRES_SECONDS must be a number greater than 2")]
    InvalidExpiry,

    #[error("FTOKEN_FETCH_TIMEOUT_SECS must be a positive number")]
    InvalidTimeout,
}
