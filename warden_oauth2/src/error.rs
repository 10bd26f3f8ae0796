//! Errors raised while fetching keys and validating tokens

use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;
use warden::{
    error::{ClaimsRejected, JwtVerifyError},
    jwa::Algorithm,
    jwk::KeyId,
};

type SharedSource = Arc<dyn StdError + Send + Sync + 'static>;

/// An error from the JWKS client
///
/// Cloneable so that every caller sharing a single fetch observes the same
/// failure.
#[derive(Clone, Debug, Error)]
pub enum JwksError {
    /// No key in the current key set carries the requested id
    #[error("no key found with id `{0}`")]
    UnknownKey(KeyId),

    /// The key set could not be retrieved
    #[error("unable to fetch JWKS")]
    KeysFetch(#[source] SharedSource),

    /// The key set (or discovery document) was retrieved but is malformed
    #[error("malformed JWKS document")]
    KeysFormat(#[source] SharedSource),
}

impl JwksError {
    /// Constructs a fetch failure from its cause
    pub fn fetch(source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self::KeysFetch(Arc::from(source.into()))
    }

    /// Constructs a format failure from its cause
    pub fn format(source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self::KeysFormat(Arc::from(source.into()))
    }
}

/// A token was not accepted
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The token is not a well-formed compact JWS
    #[error("token is not a well-formed JWT")]
    InvalidTokenFormat(#[source] JwtVerifyError),

    /// The token names an algorithm that is unknown, not allowed, or not
    /// usable with the selected key
    #[error("token algorithm `{0}` is not accepted")]
    UnsupportedAlgorithm(String),

    /// The token header carries no `kid` and one is required
    #[error("token header does not name a key")]
    MissingKeyId,

    /// No key matches the token
    #[error("no matching key found to validate JWT")]
    UnknownKey {
        /// The key id named by the token, if any
        kid: Option<KeyId>,
    },

    /// The key set could not be retrieved
    #[error("unable to fetch JWKS")]
    KeysFetch(#[source] SharedSource),

    /// The key set was retrieved but is malformed
    #[error("malformed JWKS document")]
    KeysFormat(#[source] SharedSource),

    /// The signature does not match the token contents
    #[error("token signature is invalid")]
    InvalidSignature,

    /// A claim was rejected
    #[error("token claim `{claim}` was rejected")]
    InvalidClaims {
        /// The claim that was rejected
        claim: &'static str,

        /// Why it was rejected
        #[source]
        source: ClaimsRejected,
    },
}

impl ValidationError {
    /// The rejected claim, if the token was refused because of one
    #[must_use]
    pub fn claim(&self) -> Option<&'static str> {
        match self {
            Self::InvalidClaims { claim, .. } => Some(*claim),
            _ => None,
        }
    }

    /// Classifies a failure to verify a token decomposed with `alg`
    pub(crate) fn from_verify(err: JwtVerifyError, alg: &str) -> Self {
        match err {
            JwtVerifyError::JwkVerifyError(e) if e.is_signature_mismatch() => {
                Self::InvalidSignature
            }
            JwtVerifyError::JwkVerifyError(_) => Self::UnsupportedAlgorithm(alg.to_owned()),
            JwtVerifyError::UnknownAlgorithm(e) => Self::UnsupportedAlgorithm(e.name().to_owned()),
            JwtVerifyError::ClaimsRejected(source) => Self::InvalidClaims {
                claim: source.claim(),
                source,
            },
            other => Self::InvalidTokenFormat(other),
        }
    }
}

impl From<JwksError> for ValidationError {
    fn from(err: JwksError) -> Self {
        match err {
            JwksError::UnknownKey(kid) => Self::UnknownKey { kid: Some(kid) },
            JwksError::KeysFetch(source) => Self::KeysFetch(source),
            JwksError::KeysFormat(source) => Self::KeysFormat(source),
        }
    }
}

/// A validator or key source was configured inconsistently
#[derive(Debug, Error)]
pub enum ConfigError {
    /// At least one valid issuer is required
    #[error("no valid issuers configured")]
    MissingIssuers,

    /// At least one valid audience is required
    #[error("no valid audiences configured")]
    MissingAudiences,

    /// Neither a remote key source nor a shared secret was configured
    #[error("no key source configured; set one of `authority`, `jwks_url`, or `secret`")]
    MissingKeySource,

    /// Both a remote key source and a shared secret were configured
    #[error("a shared secret cannot be combined with a remote key source")]
    AmbiguousKeySource,

    /// A shared secret must not be empty
    #[error("shared secret is empty")]
    EmptySecret,

    /// The algorithm cannot be used with the configured key source
    #[error("algorithm `{0}` cannot be used with a shared secret")]
    IncompatibleAlgorithm(Algorithm),

    /// The HTTP client could not be constructed
    #[error("unable to construct HTTP client")]
    HttpClient(#[source] reqwest::Error),
}
