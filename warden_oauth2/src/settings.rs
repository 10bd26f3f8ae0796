use std::{fmt, time::Duration};

use serde::Deserialize;
use warden::{
    jwa::Algorithm,
    jwt::{Audience, Issuer},
};

use crate::{
    AuthorityKeysProvider, ConfigError, JwksClient, JwtValidator, UrlKeysProvider,
    ValidatorConfig,
};

/// Deserializable validator configuration
///
/// Exactly one key source must be configured: an OpenID Connect `authority`
/// or a `jwks_url` for asymmetric tokens, or a shared `secret` for HMAC
/// tokens. When both `authority` and `jwks_url` are set, the authority wins.
/// Durations are given in seconds.
///
/// ```
/// use warden_oauth2::ValidatorSettings;
///
/// let settings: ValidatorSettings = serde_json::from_str(r#"{
///     "authority": "https://login.example.com/tenant",
///     "valid_issuers": ["https://login.example.com/tenant"],
///     "valid_audiences": ["api://orders"]
/// }"#).unwrap();
///
/// assert_eq!(settings.refresh_interval, 120);
/// assert!(settings.require_kid);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    /// The issuer base URL used for key discovery
    pub authority: Option<String>,

    /// The location of the key set
    pub jwks_url: Option<String>,

    /// A shared secret for HMAC-signed tokens
    pub secret: Option<String>,

    /// Acceptable `iss` values
    pub valid_issuers: Vec<Issuer>,

    /// Acceptable `aud` values
    pub valid_audiences: Vec<Audience>,

    /// Acceptable signing algorithms; empty selects the default for the key source
    pub algorithms: Vec<Algorithm>,

    /// Minimum seconds between refreshes triggered by unknown key ids
    pub refresh_interval: u64,

    /// Maximum age in seconds of a cached key set; `0` disables expiry
    pub cache_time: u64,

    /// Tolerated clock skew in seconds
    pub leeway: u64,

    /// Whether tokens must name their signing key
    pub require_kid: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            authority: None,
            jwks_url: None,
            secret: None,
            valid_issuers: Vec::new(),
            valid_audiences: Vec::new(),
            algorithms: Vec::new(),
            refresh_interval: crate::jwks::DEFAULT_REFRESH_INTERVAL.as_secs(),
            cache_time: crate::jwks::DEFAULT_CACHE_TIME.as_secs(),
            leeway: 0,
            require_kid: true,
        }
    }
}

impl fmt::Debug for ValidatorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorSettings")
            .field("authority", &self.authority)
            .field("jwks_url", &self.jwks_url)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("valid_issuers", &self.valid_issuers)
            .field("valid_audiences", &self.valid_audiences)
            .field("algorithms", &self.algorithms)
            .field("refresh_interval", &self.refresh_interval)
            .field("cache_time", &self.cache_time)
            .field("leeway", &self.leeway)
            .field("require_kid", &self.require_kid)
            .finish()
    }
}

impl ValidatorSettings {
    /// Builds the validator these settings describe
    ///
    /// # Errors
    ///
    /// * `MissingKeySource` if no key source is configured
    /// * `AmbiguousKeySource` if a secret is combined with a remote source
    /// * any error from [`JwtValidator::asymmetric`] or
    ///   [`JwtValidator::symmetric`]
    pub fn build(&self) -> Result<JwtValidator, ConfigError> {
        let config = ValidatorConfig::new(
            self.valid_issuers.iter().cloned(),
            self.valid_audiences.iter().cloned(),
        )
        .with_algorithms(self.algorithms.iter().copied())
        .with_leeway(Duration::from_secs(self.leeway))
        .require_kid(self.require_kid);

        let remote = self.authority.is_some() || self.jwks_url.is_some();

        match (&self.secret, remote) {
            (Some(_), true) => Err(ConfigError::AmbiguousKeySource),
            (Some(secret), false) => JwtValidator::symmetric(config, secret.as_bytes()),
            (None, false) => Err(ConfigError::MissingKeySource),
            (None, true) => {
                let builder = match (&self.authority, &self.jwks_url) {
                    (Some(authority), _) => {
                        JwksClient::builder(AuthorityKeysProvider::new(authority.as_str())?)
                    }
                    (None, Some(url)) => JwksClient::builder(UrlKeysProvider::new(url.as_str())?),
                    (None, None) => return Err(ConfigError::MissingKeySource),
                };

                let client = builder
                    .with_refresh_interval(Duration::from_secs(self.refresh_interval))
                    .with_cache_time(Duration::from_secs(self.cache_time))
                    .build();

                JwtValidator::asymmetric(config, client)
            }
        }
    }
}
