use async_trait::async_trait;
use warden::Jwks;

use super::KeysProvider;
use crate::JwksError;

/// A provider that always returns the same key set
#[derive(Clone, Debug, Default)]
pub struct StaticKeysProvider {
    jwks: Jwks,
}

impl StaticKeysProvider {
    /// Constructs a provider for a fixed key set
    pub fn new(jwks: Jwks) -> Self {
        Self { jwks }
    }
}

impl From<Jwks> for StaticKeysProvider {
    fn from(jwks: Jwks) -> Self {
        Self::new(jwks)
    }
}

#[async_trait]
impl KeysProvider for StaticKeysProvider {
    async fn fetch_keys(&self) -> Result<Jwks, JwksError> {
        Ok(self.jwks.clone())
    }
}
