//! Client configuration loaded from defaults, a TOML file and the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::core::DefaultRetryPolicy;
use crate::data::Headers;
use crate::error::ConfigError;

/// Prefix of environment variables read by [`ClientConfig::load`].
pub const ENV_PREFIX: &str = "FETCHKIT_";

static USER_AGENT: Lazy<String> = Lazy::new(|| {
    format!(
        "fetchkit/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
});

/// `fetchkit/<version> (<os>; <arch>)`
pub fn default_user_agent() -> &'static str {
    &USER_AGENT
}

/// Headers every request carries unless it sets them itself.
pub fn default_headers() -> Headers {
    ClientConfig::default().default_headers()
}

/// Settings for a [`Client`](crate::Client) and its transport.
///
/// ```toml
/// user_agent = "my-app/2.0"
/// timeout_ms = 5000
/// max_retries = 2
/// backoff_multiplier = 1.0
/// serve_fresh = true
/// pinned_certs = ["/etc/my-app/root.pem"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub accept_charset: String,
    /// Initial per-attempt timeout.
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_multiplier: f32,
    /// Base of the exponential pause between attempts; 0 disables it.
    pub retry_backoff_ms: u64,
    pub slow_request_ms: u64,
    pub trust_all_certs: bool,
    pub accept_invalid_hostnames: bool,
    /// PEM files; when non-empty only these roots are trusted.
    pub pinned_certs: Vec<PathBuf>,
    /// Serve unexpired cache entries without a network exchange.
    pub serve_fresh: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent().to_owned(),
            accept_charset: "UTF-8".to_owned(),
            timeout_ms: DefaultRetryPolicy::DEFAULT_TIMEOUT.as_millis() as u64,
            max_retries: DefaultRetryPolicy::DEFAULT_MAX_RETRIES,
            backoff_multiplier: DefaultRetryPolicy::DEFAULT_BACKOFF_MULTIPLIER,
            retry_backoff_ms: 0,
            slow_request_ms: 3000,
            trust_all_certs: false,
            accept_invalid_hostnames: false,
            pinned_certs: Vec::new(),
            serve_fresh: false,
        }
    }
}

impl ClientConfig {
    /// Defaults, overlaid by `path` (if it exists), overlaid by `FETCHKIT_*`
    /// environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?)
    }

    /// Defaults overlaid by a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Ok(Self::figment().merge(Toml::string(toml)).extract()?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_ms)
    }

    pub fn retry_policy(&self) -> DefaultRetryPolicy {
        DefaultRetryPolicy::new(self.timeout(), self.max_retries, self.backoff_multiplier)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn default_headers(&self) -> Headers {
        let mut headers = Headers::new();
        if !self.user_agent.is_empty() {
            headers.insert("User-Agent", self.user_agent.as_str());
        }
        if !self.accept_charset.is_empty() {
            headers.insert("Accept-Charset", self.accept_charset.as_str());
        }
        headers
    }

    /// Read every pinned certificate file.
    pub fn pinned_cert_pems(&self) -> Result<Vec<Vec<u8>>, ConfigError> {
        self.pinned_certs
            .iter()
            .map(|path| {
                std::fs::read(path).map_err(|source| ConfigError::Certificate {
                    path: path.display().to_string(),
                    source,
                })
            })
            .collect()
    }

    /// A transport builder carrying the TLS settings of this config.
    #[cfg(feature = "reqwest")]
    pub fn transport_builder(&self) -> Result<crate::ReqwestTransportBuilder, ConfigError> {
        let builder = crate::ReqwestTransport::builder()
            .trust_all_certs(self.trust_all_certs)
            .accept_invalid_hostnames(self.accept_invalid_hostnames);
        Ok(self
            .pinned_cert_pems()?
            .into_iter()
            .fold(builder, |builder, pem| builder.pin_certificate(pem)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RetryPolicy;
    use std::io::Write;

    #[test]
    fn defaults_match_retry_policy_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.retry_policy(), DefaultRetryPolicy::default());
        assert!(config.user_agent.starts_with("fetchkit/"));

        let headers = config.default_headers();
        assert_eq!(headers.get("user-agent"), Some(default_user_agent()));
        assert_eq!(headers.get("accept-charset"), Some("UTF-8"));
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            user_agent = "probe/1"
            timeout_ms = 1000
            max_retries = 3
            backoff_multiplier = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.user_agent, "probe/1");
        assert_eq!(config.accept_charset, "UTF-8");
        let state = config.retry_policy().start();
        assert_eq!(state.max_attempts, 3);
        assert_eq!(state.timeout, Duration::from_secs(1));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "serve_fresh = true\nslow_request_ms = 10").unwrap();

        let config = ClientConfig::load(file.path()).unwrap();

        assert!(config.serve_fresh);
        assert_eq!(config.slow_request_threshold(), Duration::from_millis(10));
    }

    #[test]
    fn bad_value_is_an_error() {
        assert!(matches!(
            ClientConfig::from_toml_str("max_retries = \"many\""),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn missing_pinned_cert_is_reported() {
        let config = ClientConfig {
            pinned_certs: vec![PathBuf::from("/no/such/root.pem")],
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.pinned_cert_pems(),
            Err(ConfigError::Certificate { path, .. }) if path == "/no/such/root.pem"
        ));
    }
}
