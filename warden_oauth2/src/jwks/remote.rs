use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::{
    header::{self, HeaderValue},
    Client, StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use warden::Jwks;

use super::KeysProvider;
use crate::{ConfigError, JwksError};

fn default_client() -> Result<Client, ConfigError> {
    Client::builder()
        .user_agent(concat!("warden_oauth2/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ConfigError::HttpClient)
}

#[derive(Debug)]
struct LastResponse {
    jwks: Jwks,
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
}

/// A provider that fetches a key set from a URL
///
/// Responses carrying an `ETag` or `Last-Modified` header are remembered,
/// and subsequent fetches are made conditional on them. A
/// `304 Not Modified` response yields the remembered key set.
#[derive(Debug)]
pub struct UrlKeysProvider {
    client: Client,
    url: String,
    last: ArcSwapOption<LastResponse>,
}

impl UrlKeysProvider {
    /// Constructs a provider for the given URL with a default HTTP client
    ///
    /// # Errors
    ///
    /// The HTTP client could not be constructed.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self::with_client(default_client()?, url))
    }

    /// Constructs a provider for the given URL using an existing HTTP client
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            last: ArcSwapOption::empty(),
        }
    }

    /// The URL the key set is fetched from
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeysProvider for UrlKeysProvider {
    #[tracing::instrument(skip(self), fields(jwks.url = %self.url))]
    async fn fetch_keys(&self) -> Result<Jwks, JwksError> {
        tracing::debug!("fetching JWKS");
        let mut request = self.client.get(&self.url);

        let last = self.last.load_full();
        if let Some(last) = &last {
            if let Some(etag) = &last.etag {
                request = request.header(header::IF_NONE_MATCH, etag);
            } else if let Some(last_modified) = &last.last_modified {
                request = request.header(header::IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request.send().await.map_err(JwksError::fetch)?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return match last {
                Some(last) => {
                    tracing::debug!("JWKS not modified");
                    Ok(last.jwks.clone())
                }
                None => Err(JwksError::fetch(
                    "server answered `304 Not Modified` to an unconditional request",
                )),
            };
        }

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(
                    http.status_code = err.status().map(|s| s.as_u16()),
                    "unexpected response status"
                );
                return Err(JwksError::fetch(err));
            }
        };

        let etag = response.headers().get(header::ETAG).map(ToOwned::to_owned);
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .map(ToOwned::to_owned);

        let body = response.bytes().await.map_err(JwksError::fetch)?;
        let jwks: Jwks = serde_json::from_slice(&body).map_err(JwksError::format)?;

        if etag.is_some() || last_modified.is_some() {
            self.last.store(Some(Arc::new(LastResponse {
                jwks: jwks.clone(),
                etag,
                last_modified,
            })));
        }

        Ok(jwks)
    }
}

#[derive(Deserialize)]
struct Discovery {
    jwks_uri: Option<String>,
}

/// A provider that locates the key set through OpenID Connect discovery
///
/// The discovery document is read from
/// `{authority}/.well-known/openid-configuration` on first use, and the key
/// set is then fetched from its `jwks_uri`. The discovered location is kept
/// for subsequent fetches.
#[derive(Debug)]
pub struct AuthorityKeysProvider {
    client: Client,
    authority: String,
    discovered: ArcSwapOption<UrlKeysProvider>,
}

impl AuthorityKeysProvider {
    /// Constructs a provider for the given authority with a default HTTP client
    ///
    /// # Errors
    ///
    /// The HTTP client could not be constructed.
    pub fn new(authority: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self::with_client(default_client()?, authority))
    }

    /// Constructs a provider for the given authority using an existing HTTP client
    pub fn with_client(client: Client, authority: impl Into<String>) -> Self {
        Self {
            client,
            authority: authority.into(),
            discovered: ArcSwapOption::empty(),
        }
    }

    /// The location of the discovery document
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.authority.trim_end_matches('/')
        )
    }

    #[tracing::instrument(skip(self), fields(oidc.authority = %self.authority))]
    async fn discover(&self) -> Result<Arc<UrlKeysProvider>, JwksError> {
        let response = self
            .client
            .get(self.discovery_url())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(JwksError::fetch)?;

        let body = response.bytes().await.map_err(JwksError::fetch)?;
        let discovery: Discovery = serde_json::from_slice(&body).map_err(JwksError::format)?;

        let jwks_uri = discovery
            .jwks_uri
            .ok_or_else(|| JwksError::format("discovery document has no `jwks_uri`"))?;

        tracing::debug!(jwks.url = %jwks_uri, "discovered JWKS location");

        let provider = Arc::new(UrlKeysProvider::with_client(self.client.clone(), jwks_uri));
        self.discovered.store(Some(Arc::clone(&provider)));
        Ok(provider)
    }
}

#[async_trait]
impl KeysProvider for AuthorityKeysProvider {
    async fn fetch_keys(&self) -> Result<Jwks, JwksError> {
        let provider = match self.discovered.load_full() {
            Some(provider) => provider,
            None => self.discover().await?,
        };

        provider.fetch_keys().await
    }
}
