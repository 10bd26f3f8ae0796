//! Errors raised while handling keys and tokens

#![allow(missing_copy_implementations)]

use std::{error::Error as StdError, fmt};

use thiserror::Error;

use crate::jwa;

/// A key was asked to work with an algorithm it does not support
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("key incompatible with algorithm '{alg}'")]
pub struct IncompatibleAlgorithm {
    alg: jwa::Algorithm,
}

impl IncompatibleAlgorithm {
    /// The requested algorithm
    #[must_use]
    pub fn algorithm(&self) -> jwa::Algorithm {
        self.alg
    }
}

#[inline]
pub(crate) fn incompatible_algorithm(alg: jwa::Algorithm) -> IncompatibleAlgorithm {
    IncompatibleAlgorithm { alg }
}

/// An `alg` value names no algorithm this crate implements
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

impl UnknownAlgorithm {
    /// The unrecognized algorithm name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.alg
    }
}

#[inline]
pub(crate) fn unknown_algorithm(alg: String) -> UnknownAlgorithm {
    UnknownAlgorithm { alg }
}

/// The `use` declared by a key forbids the requested operation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("key usage does not permit this operation")]
pub struct JwkUsageMismatch {
    _p: (),
}

pub(crate) const fn jwk_usage_mismatch() -> JwkUsageMismatch {
    JwkUsageMismatch { _p: () }
}

/// A token does not split into exactly three sections
#[derive(Clone, Copy, Debug, Error)]
#[error("malformed JWT")]
pub struct MalformedJwt {
    _p: (),
}

pub(crate) fn malformed_jwt() -> MalformedJwt {
    MalformedJwt { _p: () }
}

/// One of the three dot-separated sections of a compact JWT
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// The JOSE header
    Header,
    /// The claims payload
    Payload,
    /// The signature
    Signature,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Header => "header",
            Self::Payload => "payload",
            Self::Signature => "signature",
        })
    }
}

/// A JWT section could not be decoded, deserialized, or serialized
#[derive(Debug, Error)]
#[error("malformed JWT {section}")]
pub struct MalformedJwtSection {
    section: Section,
    #[source]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl MalformedJwtSection {
    /// The offending section
    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }
}

/// Wraps a cause as a malformed `section`, for use with `map_err`
pub(crate) fn malformed<E>(section: Section) -> impl FnOnce(E) -> MalformedJwtSection
where
    E: Into<Box<dyn StdError + Send + Sync + 'static>>,
{
    move |source| MalformedJwtSection {
        section,
        source: source.into(),
    }
}

/// A signature was checked and found wrong
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("signature mismatch")]
pub struct SignatureMismatch {
    _p: (),
}

pub(crate) const fn signature_mismatch() -> SignatureMismatch {
    SignatureMismatch { _p: () }
}

/// The key material was rejected
#[derive(Debug, Error)]
#[error("key rejected: {reason}")]
pub struct KeyRejected {
    reason: &'static str,
}

pub(crate) const fn key_rejected(reason: &'static str) -> KeyRejected {
    KeyRejected { reason }
}

/// The key holds no material capable of producing signatures
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("cannot sign without a private key")]
pub struct MissingPrivateKey {
    _p: (),
}

pub(crate) const fn missing_private_key() -> MissingPrivateKey {
    MissingPrivateKey { _p: () }
}

/// Signing failed
#[derive(Debug, Error)]
pub enum SigningError {
    /// The key cannot be used for signing operations
    #[error(transparent)]
    MissingPrivateKey(#[from] MissingPrivateKey),

    /// JWK cannot be used for signature creation
    #[error(transparent)]
    JwkUsageMismatch(#[from] JwkUsageMismatch),

    /// Key cannot be used with this algorithm
    #[error(transparent)]
    IncompatibleAlgorithm(#[from] IncompatibleAlgorithm),
}

/// A key refused a signature
#[derive(Debug, Error)]
pub enum JwkVerifyError {
    /// JWT cannot be used with this algorithm
    #[error(transparent)]
    IncompatibleAlgorithm(#[from] IncompatibleAlgorithm),

    /// JWK cannot be used for signature verification
    #[error(transparent)]
    JwkUsageMismatch(#[from] JwkUsageMismatch),

    /// Signature is invalid
    #[error(transparent)]
    SignatureMismatch(#[from] SignatureMismatch),
}

impl JwkVerifyError {
    /// Whether the error is due to an incompatible algorithm
    #[must_use]
    pub fn is_incompatible_alg(&self) -> bool {
        matches!(self, Self::IncompatibleAlgorithm(_))
    }

    /// Whether the error is due to a usage mismatch
    #[must_use]
    pub fn is_usage_mismatch(&self) -> bool {
        matches!(self, Self::JwkUsageMismatch(_))
    }

    /// Whether the error is due to a signature mismatch
    #[must_use]
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Self::SignatureMismatch(_))
    }
}

/// A token failed verification
#[derive(Debug, Error)]
pub enum JwtVerifyError {
    /// The JWT was rejected by the JWK
    #[error("token rejected by JWK")]
    JwkVerifyError(#[from] JwkVerifyError),

    /// The JWT names an algorithm that is not supported
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    /// The JWT is malformed, without a discernible header, payload, and signature
    #[error(transparent)]
    MalformedToken(#[from] MalformedJwt),

    /// A JWT section could not be decoded
    #[error(transparent)]
    MalformedSection(#[from] MalformedJwtSection),

    /// The JWT was rejected by the claims validator
    #[error("token rejected by claims validator")]
    ClaimsRejected(#[from] ClaimsRejected),
}

impl JwtVerifyError {
    /// Whether the token could not be taken apart into its sections
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedToken(_) | Self::MalformedSection(_))
    }
}

/// A token could not be produced
#[derive(Debug, Error)]
pub enum JwtSigningError {
    /// The key refused to sign
    #[error(transparent)]
    SigningError(#[from] SigningError),

    /// The header names an algorithm that is not supported
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    /// The header or claims could not be serialized
    #[error(transparent)]
    Encoding(#[from] MalformedJwtSection),
}

/// The claims or header of a verified token were not accepted
#[derive(Debug, Error)]
pub enum ClaimsRejected {
    /// The token algorithm is not acceptable
    #[error("invalid algorithm")]
    InvalidAlgorithm,

    /// The token audience is not acceptable
    #[error("invalid audience")]
    InvalidAudience,

    /// The token issuer is not acceptable
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The token is expired according to the `exp` claim
    #[error("token expired")]
    TokenExpired,

    /// The token is not yet valid according to the `nbf` claim
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// A required claim is missing
    #[error("required {0} claim missing")]
    MissingRequiredClaim(&'static str),

    /// A registered claim holds a value of the wrong type
    #[error("{0} claim has an unexpected type")]
    MalformedClaim(&'static str),
}

impl ClaimsRejected {
    /// The name of the claim (or header) that caused the rejection
    #[must_use]
    pub fn claim(&self) -> &'static str {
        match self {
            Self::InvalidAlgorithm => "alg",
            Self::InvalidAudience => "aud",
            Self::InvalidIssuer => "iss",
            Self::TokenExpired => "exp",
            Self::TokenNotYetValid => "nbf",
            Self::MissingRequiredClaim(c) | Self::MalformedClaim(c) => c,
        }
    }
}
